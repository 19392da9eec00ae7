use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::capabilities::{DeviceSnapshot, UNKNOWN_BATTERY_LEVEL};
use crate::model::LocationSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportTrigger {
    Manual,
    Auto,
}

impl ReportTrigger {
    #[must_use]
    pub const fn is_auto(self) -> bool {
        matches!(self, Self::Auto)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Auto => "auto",
        }
    }
}

/// Which optional fields go into a report, and whether reports are sent on a
/// timer. Replaced as a whole on every toggle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFlags {
    pub send_gps: bool,
    pub send_battery: bool,
    pub auto_report: bool,
}

impl ReportFlags {
    #[must_use]
    pub const fn with_gps(self, send_gps: bool) -> Self {
        Self { send_gps, ..self }
    }

    #[must_use]
    pub const fn with_battery(self, send_battery: bool) -> Self {
        Self {
            send_battery,
            ..self
        }
    }

    #[must_use]
    pub const fn with_auto_report(self, auto_report: bool) -> Self {
        Self {
            auto_report,
            ..self
        }
    }
}

/// A report in progress: the flags are frozen when the report is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub trigger: ReportTrigger,
    pub flags: ReportFlags,
}

/// Everything that ends up on the wire, in wire order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub device: String,
    pub device_time: String,
    pub device_name: String,
    pub system_name: String,
    pub system_version: String,
    pub model: String,
    pub uuid: String,
    pub app_version: String,
    pub auto_message: bool,
    pub battery_level: Option<String>,
    pub position: Option<(String, String)>,
}

impl ReportPayload {
    /// Assembles the payload for `request`.
    ///
    /// `fallback_install_id` stands in for the vendor identifier when the
    /// platform has none to offer.
    #[must_use]
    pub fn assemble(
        request: ReportRequest,
        device_label: &str,
        snapshot: &DeviceSnapshot,
        fallback_install_id: Option<&str>,
        location: &LocationSample,
    ) -> Self {
        let uuid = snapshot
            .vendor_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or(fallback_install_id)
            .unwrap_or_default()
            .to_string();

        let battery_level = request.flags.send_battery.then(|| {
            let level = snapshot.battery_level.unwrap_or(UNKNOWN_BATTERY_LEVEL);
            format_battery_percent(level)
        });

        let position = request
            .flags
            .send_gps
            .then(|| (location.latitude.clone(), location.longitude.clone()));

        Self {
            device: device_label.to_string(),
            device_time: snapshot.epoch_secs.to_string(),
            device_name: snapshot.device_name.clone(),
            system_name: snapshot.system_name.clone(),
            system_version: snapshot.system_version.clone(),
            model: snapshot.model.clone(),
            uuid,
            app_version: snapshot.app_version.clone(),
            auto_message: request.trigger.is_auto(),
            battery_level,
            position,
        }
    }

    /// Field pairs in wire order.
    #[must_use]
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![
            ("device", self.device.as_str()),
            ("deviceTime", self.device_time.as_str()),
            ("deviceName", self.device_name.as_str()),
            ("systemName", self.system_name.as_str()),
            ("systemVersion", self.system_version.as_str()),
            ("model", self.model.as_str()),
            ("uuid", self.uuid.as_str()),
            ("appVersion", self.app_version.as_str()),
            ("autoMessage", if self.auto_message { "true" } else { "false" }),
        ];

        if let Some(level) = &self.battery_level {
            pairs.push(("batteryLevel", level.as_str()));
        }
        if let Some((latitude, longitude)) = &self.position {
            pairs.push(("latitude", latitude.as_str()));
            pairs.push(("longitude", longitude.as_str()));
        }

        pairs
    }

    /// `key=value` pairs joined with `&`, form-urlencoded.
    #[must_use]
    pub fn to_form_body(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs())
            .finish()
    }
}

/// Level in 0.0..=1.0 as a plain percentage number.
#[must_use]
pub fn format_battery_percent(level: f32) -> String {
    (level * 100.0).to_string()
}
