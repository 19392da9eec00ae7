use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Battery level the platform reports when monitoring is off or the level
/// cannot be read.
pub const UNKNOWN_BATTERY_LEVEL: f32 = -1.0;

pub struct Device<E> {
    context: CapabilityContext<DeviceOperation, E>,
}

impl<Ev> Capability<Ev> for Device<Ev> {
    type Operation = DeviceOperation;
    type MappedSelf<MappedEv> = Device<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Device::new(self.context.map_event(f))
    }
}

impl<E> Device<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<DeviceOperation, E>) -> Self {
        Self { context }
    }

    pub fn snapshot<F>(&self, include_battery: bool, callback: F)
    where
        F: FnOnce(DeviceResult) -> E + Send + 'static,
    {
        self.request(DeviceOperation::Snapshot { include_battery }, callback);
    }

    pub fn set_battery_monitoring<F>(&self, enabled: bool, callback: F)
    where
        F: FnOnce(DeviceResult) -> E + Send + 'static,
    {
        self.request(DeviceOperation::SetBatteryMonitoring { enabled }, callback);
    }

    fn request<F>(&self, operation: DeviceOperation, callback: F)
    where
        F: FnOnce(DeviceResult) -> E + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context.request_from_shell(operation).await;
            context.update_app(callback(result));
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeviceOperation {
    Snapshot { include_battery: bool },
    SetBatteryMonitoring { enabled: bool },
}

impl Operation for DeviceOperation {
    type Output = DeviceResult;
}

/// Point-in-time device metadata used to stamp a report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSnapshot {
    pub device_name: String,
    pub system_name: String,
    pub system_version: String,
    pub model: String,
    /// Platform-provided per-vendor identifier. Some platforms cannot
    /// provide one (e.g. before first unlock).
    pub vendor_id: Option<String>,
    pub app_version: String,
    /// Seconds since the Unix epoch, fractional.
    pub epoch_secs: f64,
    /// 0.0..=1.0, or [`UNKNOWN_BATTERY_LEVEL`]. Only present when requested.
    pub battery_level: Option<f32>,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeviceError {
    #[error("device information unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("battery monitoring not supported on this platform")]
    BatteryUnsupported,

    #[error("unexpected device output for {operation}")]
    UnexpectedOutput { operation: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DeviceOutput {
    Snapshot(DeviceSnapshot),
    BatteryMonitoring { enabled: bool },
}

impl DeviceOutput {
    pub fn into_snapshot(self) -> Result<DeviceSnapshot, DeviceError> {
        match self {
            Self::Snapshot(snapshot) => Ok(snapshot),
            Self::BatteryMonitoring { .. } => Err(DeviceError::UnexpectedOutput {
                operation: "snapshot".to_string(),
            }),
        }
    }

    pub fn into_battery_monitoring(self) -> Result<bool, DeviceError> {
        match self {
            Self::BatteryMonitoring { enabled } => Ok(enabled),
            Self::Snapshot(_) => Err(DeviceError::UnexpectedOutput {
                operation: "set_battery_monitoring".to_string(),
            }),
        }
    }
}

pub type DeviceResult = Result<DeviceOutput, DeviceError>;
