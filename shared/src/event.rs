use serde::{Deserialize, Serialize};

use crate::capabilities::{AuthorizationStatus, DeviceResult, HttpError, LocationFix};
use crate::report::{ReportRequest, ReportTrigger};
use crate::settings::SettingKey;

#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("value too long ({len} > {max})")]
    TooLong { len: usize, max: usize },
}

// --- Bounded text ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BoundedText<const MAX: usize>(String);

impl<const MAX: usize> BoundedText<MAX> {
    pub fn new(s: impl Into<String>) -> Result<Self, ValidationError> {
        let s = s.into();
        if s.len() > MAX {
            return Err(ValidationError::TooLong {
                len: s.len(),
                max: MAX,
            });
        }
        Ok(Self(s))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

pub type DeviceLabel = BoundedText<256>;

// --- Events ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    Noop,
    AppStarted,

    // Field commits (end of editing / return key)
    ServerUrlCommitted { text: String },
    DeviceLabelCommitted { text: String },
    DelayCommitted { text: String },

    // Switches and buttons
    GpsToggled { enabled: bool },
    BatteryToggled { enabled: bool },
    AutoReportToggled { enabled: bool },
    SendReportPressed,
    DismissError,

    // Pushed by the shell's location manager
    LocationsUpdated { fixes: Vec<LocationFix> },

    // Capability responses
    #[serde(skip)]
    SettingLoaded {
        key: SettingKey,
        result: Result<Option<Vec<u8>>, String>,
    },
    #[serde(skip)]
    SettingPersisted {
        key: SettingKey,
        result: Result<(), String>,
    },
    #[serde(skip)]
    LocationAuthorizationChanged { status: AuthorizationStatus },
    #[serde(skip)]
    LocationUnavailable { reason: String },
    #[serde(skip)]
    TimerElapsed { generation: u64 },
    #[serde(skip)]
    BatteryMonitoringChanged { result: DeviceResult },
    #[serde(skip)]
    DeviceSnapshotReceived {
        request: ReportRequest,
        result: DeviceResult,
    },
    #[serde(skip)]
    ReportCompleted {
        trigger: ReportTrigger,
        result: Result<u16, HttpError>,
    },
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::AppStarted => "app_started",
            Self::ServerUrlCommitted { .. } => "server_url_committed",
            Self::DeviceLabelCommitted { .. } => "device_label_committed",
            Self::DelayCommitted { .. } => "delay_committed",
            Self::GpsToggled { .. } => "gps_toggled",
            Self::BatteryToggled { .. } => "battery_toggled",
            Self::AutoReportToggled { .. } => "auto_report_toggled",
            Self::SendReportPressed => "send_report_pressed",
            Self::DismissError => "dismiss_error",
            Self::LocationsUpdated { .. } => "locations_updated",
            Self::SettingLoaded { .. } => "setting_loaded",
            Self::SettingPersisted { .. } => "setting_persisted",
            Self::LocationAuthorizationChanged { .. } => "location_authorization_changed",
            Self::LocationUnavailable { .. } => "location_unavailable",
            Self::TimerElapsed { .. } => "timer_elapsed",
            Self::BatteryMonitoringChanged { .. } => "battery_monitoring_changed",
            Self::DeviceSnapshotReceived { .. } => "device_snapshot_received",
            Self::ReportCompleted { .. } => "report_completed",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::ServerUrlCommitted { .. }
                | Self::DeviceLabelCommitted { .. }
                | Self::DelayCommitted { .. }
                | Self::GpsToggled { .. }
                | Self::BatteryToggled { .. }
                | Self::AutoReportToggled { .. }
                | Self::SendReportPressed
                | Self::DismissError
        )
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::Noop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_text() {
        assert!(DeviceLabel::new("My Device").is_ok());
        assert_eq!(
            DeviceLabel::new("x".repeat(257)),
            Err(ValidationError::TooLong { len: 257, max: 256 })
        );
        assert_eq!(DeviceLabel::new("abc").unwrap().into_inner(), "abc");
    }

    #[test]
    fn test_user_initiated_events() {
        assert!(Event::SendReportPressed.is_user_initiated());
        assert!(Event::AutoReportToggled { enabled: true }.is_user_initiated());
        assert!(!Event::TimerElapsed { generation: 1 }.is_user_initiated());
        assert!(!Event::AppStarted.is_user_initiated());
    }

    #[test]
    fn test_shell_events_serialize() {
        let event = Event::LocationsUpdated {
            fixes: vec![LocationFix::new(1.5, -2.25)],
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
