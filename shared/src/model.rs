use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::capabilities::{AuthorizationStatus, LocationFix};
use crate::countdown::Countdown;
use crate::report::ReportFlags;
use crate::settings::Settings;
use crate::{AppError, ErrorKind, COORDINATE_DECIMALS, UNKNOWN_COORDINATE};

/// Last known position, already formatted for the wire.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LocationSample {
    pub latitude: String,
    pub longitude: String,
}

impl Default for LocationSample {
    fn default() -> Self {
        Self {
            latitude: UNKNOWN_COORDINATE.to_string(),
            longitude: UNKNOWN_COORDINATE.to_string(),
        }
    }
}

impl LocationSample {
    #[must_use]
    pub fn is_known(&self) -> bool {
        self.latitude != UNKNOWN_COORDINATE && self.longitude != UNKNOWN_COORDINATE
    }

    /// Keeps only the newest fix of a batch. Returns whether the sample
    /// changed; an empty batch or an unusable last fix leaves it alone.
    pub fn record(&mut self, fixes: &[LocationFix]) -> bool {
        let Some(fix) = fixes.last() else {
            return false;
        };

        if !fix.is_valid() {
            warn!(
                latitude = fix.latitude,
                longitude = fix.longitude,
                accuracy = ?fix.horizontal_accuracy_m,
                "dropping unusable location fix"
            );
            return false;
        }

        self.latitude = format_coordinate(fix.latitude);
        self.longitude = format_coordinate(fix.longitude);
        true
    }
}

#[must_use]
pub fn format_coordinate(degrees: f64) -> String {
    format!("{:.*}", COORDINATE_DECIMALS, degrees)
}

#[derive(Default, Debug)]
pub struct Model {
    pub settings: Settings,
    pub flags: ReportFlags,
    pub countdown: Countdown,
    pub location: LocationSample,
    pub location_authorization: AuthorizationStatus,
    pub battery_monitoring: bool,
    /// Fallback device identifier, persisted on first launch.
    pub install_id: Option<String>,
    pub reports_in_flight: u32,
    pub reports_sent: u64,
    pub reports_failed: u64,
    pub active_error: Option<AppError>,
}

impl Model {
    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.active_error = None;
    }

    /// Clears a validation error once the offending input has been fixed.
    pub fn clear_validation_error(&mut self, field: &str) {
        let stale = self.active_error.as_ref().is_some_and(|e| {
            e.kind == ErrorKind::Validation && e.context_value("field") == Some(field)
        });
        if stale {
            self.active_error = None;
        }
    }
}
