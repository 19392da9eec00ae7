#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod capabilities;
pub mod countdown;
pub mod event;
pub mod model;
pub mod report;
pub mod settings;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use crux_core::App as CruxApp;
pub use event::Event;
pub use model::Model;

pub const DEFAULT_SERVER_URL: &str = "http://the.link.here";
pub const DEFAULT_DEVICE_LABEL: &str = "My iPhone";
pub const DEFAULT_DELAY_MINUTES: u32 = 10;
pub const MIN_DELAY_MINUTES: u32 = 1;
pub const MAX_DELAY_MINUTES: u32 = 60;
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const UNKNOWN_COORDINATE: &str = "unknown";
pub const COORDINATE_DECIMALS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    Storage,
    Network,
    Device,
    Location,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::Storage => "STORAGE_ERROR",
            Self::Network => "NETWORK_ERROR",
            Self::Device => "DEVICE_ERROR",
            Self::Location => "LOCATION_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Storage | Self::Network | Self::Device | Self::Location => {
                ErrorSeverity::Transient
            }
            Self::Validation | Self::Internal => ErrorSeverity::Permanent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context.get(key).map(String::as_str)
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Validation => self.message.clone(),
            ErrorKind::Storage => "Unable to save settings on this device.".into(),
            ErrorKind::Network => "Unable to reach the report server.".into(),
            ErrorKind::Device => "Device information is currently unavailable.".into(),
            ErrorKind::Location => {
                "Unable to determine your location. Please check your location settings.".into()
            }
            ErrorKind::Internal => "An unexpected error occurred.".into(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<event::ValidationError> for AppError {
    fn from(e: event::ValidationError) -> Self {
        match e {
            event::ValidationError::InvalidUrl { url, reason } => {
                AppError::new(ErrorKind::Validation, format!("Server URL is not valid: {reason}"))
                    .with_context("url", url)
            }
            event::ValidationError::TooLong { len, max } => AppError::new(
                ErrorKind::Validation,
                format!("Value is too long ({len} characters, maximum {max})."),
            ),
        }
    }
}

impl From<capabilities::KvError> for AppError {
    fn from(e: capabilities::KvError) -> Self {
        let kind = match e {
            capabilities::KvError::InvalidKey { .. } => ErrorKind::Internal,
            capabilities::KvError::ValueTooLarge { .. }
            | capabilities::KvError::NotUtf8 { .. }
            | capabilities::KvError::Storage { .. } => ErrorKind::Storage,
        };
        AppError::new(kind, e.to_string())
    }
}

impl From<capabilities::HttpError> for AppError {
    fn from(e: capabilities::HttpError) -> Self {
        let error = AppError::new(ErrorKind::Network, e.to_string());
        match e.status() {
            Some(status) => error.with_context("http_status", status.to_string()),
            None => error,
        }
    }
}

impl From<capabilities::DeviceError> for AppError {
    fn from(e: capabilities::DeviceError) -> Self {
        AppError::new(ErrorKind::Device, e.to_string())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserFacingError {
    pub message: String,
    pub is_transient: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_transient: e.severity == ErrorSeverity::Transient,
            error_code: e.code().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewModel {
    pub server_url: String,
    pub device_label: String,
    pub delay_text: String,
    pub gps_enabled: bool,
    pub battery_enabled: bool,
    pub auto_report_enabled: bool,
    pub countdown_label: String,
    pub countdown_secs: u32,
    pub latitude: String,
    pub longitude: String,
    pub location_authorized: bool,
    pub location_authorization: String,
    pub reports_in_flight: u32,
    pub error: Option<UserFacingError>,
}

pub mod app {
    use tracing::{debug, info, warn};
    use uuid::Uuid;

    use super::{AppError, ErrorKind, UserFacingError, ViewModel, TICK_INTERVAL};
    use crate::capabilities::{
        check_status, decode_text, encode_text, Capabilities, DeviceOutput, DeviceSnapshot,
        Endpoint, HttpError, LocationAccuracy, LocationOutput, FORM_CONTENT_TYPE,
    };
    use crate::countdown::TickOutcome;
    use crate::event::{DeviceLabel, Event};
    use crate::model::Model;
    use crate::report::{ReportPayload, ReportRequest, ReportTrigger};
    use crate::settings::{DelayMinutes, SettingKey};

    const SERVER_URL_FIELD: &str = "server_url";
    const DEVICE_LABEL_FIELD: &str = "device_label";

    #[derive(Default)]
    pub struct App;

    impl App {
        fn location_event(output: LocationOutput) -> Event {
            match output {
                LocationOutput::Authorization(status) => {
                    Event::LocationAuthorizationChanged { status }
                }
                LocationOutput::UpdatesStarted => Event::Noop,
                LocationOutput::Unavailable { reason } => Event::LocationUnavailable { reason },
            }
        }

        fn load_setting(key: SettingKey, caps: &Capabilities) {
            let kv_key = match key.kv_key() {
                Ok(k) => k,
                Err(e) => {
                    warn!(key = key.storage_name(), error = %e, "cannot build settings key");
                    return;
                }
            };

            caps.kv.get(kv_key.raw(), move |result| Event::SettingLoaded {
                key,
                result: result.map_err(|e| e.to_string()),
            });
        }

        fn store_setting(key: SettingKey, text: &str, caps: &Capabilities) {
            let kv_key = match key.kv_key() {
                Ok(k) => k,
                Err(e) => {
                    warn!(key = key.storage_name(), error = %e, "cannot build settings key");
                    return;
                }
            };

            caps.kv.set(kv_key.raw(), encode_text(text), move |result| {
                Event::SettingPersisted {
                    key,
                    result: result.map(|_| ()).map_err(|e| e.to_string()),
                }
            });
        }

        /// Writes all three user settings, whichever one changed.
        fn persist_settings(model: &Model, caps: &Capabilities) {
            for key in SettingKey::USER_SETTINGS {
                if let Some(text) = model.settings.stored_text(key) {
                    Self::store_setting(key, &text, caps);
                }
            }
        }

        fn apply_loaded(model: &mut Model, key: SettingKey, text: String) {
            match key {
                SettingKey::InstallId => {
                    if !text.trim().is_empty() {
                        model.install_id = Some(text);
                    }
                }
                SettingKey::Delay => {
                    model.settings.apply_stored(key, text);
                    model.countdown.set_delay(model.settings.delay);
                }
                SettingKey::ServerUrl | SettingKey::DeviceLabel => {
                    model.settings.apply_stored(key, text);
                }
            }
        }

        fn ensure_install_id(model: &mut Model, caps: &Capabilities) {
            if model.install_id.is_some() {
                return;
            }
            let id = Uuid::new_v4().to_string();
            info!(install_id = %id, "generated install id");
            Self::store_setting(SettingKey::InstallId, &id, caps);
            model.install_id = Some(id);
        }

        fn validate_server_url(model: &mut Model) -> Option<Endpoint> {
            match Endpoint::new(&model.settings.server_url) {
                Ok(endpoint) => {
                    model.clear_validation_error(SERVER_URL_FIELD);
                    Some(endpoint)
                }
                Err(e) => {
                    warn!(error = %e, "server url rejected");
                    model.set_error(AppError::from(e).with_context("field", SERVER_URL_FIELD));
                    None
                }
            }
        }

        fn schedule_tick(generation: u64, caps: &Capabilities) {
            caps.timer
                .notify_after(TICK_INTERVAL, move |_| Event::TimerElapsed { generation });
        }

        /// Starts a report. The device snapshot comes back asynchronously;
        /// the flags in effect right now travel with it.
        fn send_report(trigger: ReportTrigger, model: &mut Model, caps: &Capabilities) {
            if Self::validate_server_url(model).is_none() {
                return;
            }

            let request = ReportRequest {
                trigger,
                flags: model.flags,
            };
            debug!(trigger = trigger.as_str(), "requesting device snapshot");
            caps.device
                .snapshot(request.flags.send_battery, move |result| {
                    Event::DeviceSnapshotReceived { request, result }
                });
        }

        fn post_report(
            request: ReportRequest,
            snapshot: &DeviceSnapshot,
            model: &mut Model,
            caps: &Capabilities,
        ) {
            // The URL may have been edited while the snapshot was pending.
            let Some(endpoint) = Self::validate_server_url(model) else {
                return;
            };

            let payload = ReportPayload::assemble(
                request,
                &model.settings.device_label,
                snapshot,
                model.install_id.as_deref(),
                &model.location,
            );

            let trigger = request.trigger;
            model.reports_in_flight = model.reports_in_flight.saturating_add(1);
            info!(
                trigger = trigger.as_str(),
                host = endpoint.host(),
                gps = request.flags.send_gps,
                battery = request.flags.send_battery,
                "sending report"
            );

            caps.http
                .post(endpoint.as_str())
                .header("Content-Type", FORM_CONTENT_TYPE)
                .body_string(payload.to_form_body())
                .send(move |result| Event::ReportCompleted {
                    trigger,
                    result: match result {
                        Ok(response) => Ok(u16::from(response.status())),
                        Err(e) => Err(HttpError::transport(e.to_string())),
                    },
                });
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            let event_name = event.name();
            if event.is_user_initiated() {
                info!(event = event_name, "user action");
            } else {
                debug!(event = event_name, "event");
            }

            match event {
                Event::Noop => {}

                Event::AppStarted => {
                    for key in SettingKey::USER_SETTINGS {
                        Self::load_setting(key, caps);
                    }
                    Self::load_setting(SettingKey::InstallId, caps);

                    caps.location
                        .request_always_authorization(Self::location_event);
                    caps.location
                        .start_updates(LocationAccuracy::Best, true, Self::location_event);

                    caps.render.render();
                }

                Event::ServerUrlCommitted { text } => {
                    model.settings.server_url = text;
                    let _ = Self::validate_server_url(model);
                    Self::persist_settings(model, caps);
                    caps.render.render();
                }

                Event::DeviceLabelCommitted { text } => {
                    match DeviceLabel::new(text) {
                        Ok(label) => {
                            model.settings.device_label = label.into_inner();
                            model.clear_validation_error(DEVICE_LABEL_FIELD);
                            Self::persist_settings(model, caps);
                        }
                        Err(e) => {
                            warn!(error = %e, "device label rejected");
                            model.set_error(
                                AppError::from(e).with_context("field", DEVICE_LABEL_FIELD),
                            );
                        }
                    }
                    caps.render.render();
                }

                Event::DelayCommitted { text } => {
                    let delay = DelayMinutes::from_text(&text);
                    model.settings.delay = delay;
                    model.countdown.set_delay(delay);
                    debug!(minutes = delay.get(), "delay normalized");
                    Self::persist_settings(model, caps);
                    caps.render.render();
                }

                Event::GpsToggled { enabled } => {
                    model.flags = model.flags.with_gps(enabled);
                    caps.render.render();
                }

                Event::BatteryToggled { enabled } => {
                    model.flags = model.flags.with_battery(enabled);
                    caps.device.set_battery_monitoring(enabled, |result| {
                        Event::BatteryMonitoringChanged { result }
                    });
                    caps.render.render();
                }

                Event::AutoReportToggled { enabled } => {
                    model.flags = model.flags.with_auto_report(enabled);
                    if enabled {
                        let generation = model.countdown.arm();
                        info!(
                            secs = model.countdown.remaining_secs(),
                            generation, "auto report armed"
                        );
                        Self::schedule_tick(generation, caps);
                    } else {
                        model.countdown.disarm();
                        info!(
                            secs = model.countdown.remaining_secs(),
                            "auto report disarmed"
                        );
                    }
                    caps.render.render();
                }

                Event::SendReportPressed => {
                    Self::send_report(ReportTrigger::Manual, model, caps);
                    caps.render.render();
                }

                Event::DismissError => {
                    model.clear_error();
                    caps.render.render();
                }

                Event::LocationsUpdated { fixes } => {
                    if model.location.record(&fixes) {
                        caps.render.render();
                    }
                }

                Event::SettingLoaded { key, result } => {
                    // Only a read that positively found nothing counts as absent.
                    let absent = match result {
                        Ok(Some(bytes)) => {
                            let text = key
                                .kv_key()
                                .and_then(|kv_key| decode_text(&kv_key, bytes));
                            match text {
                                Ok(text) => {
                                    let blank = text.trim().is_empty();
                                    Self::apply_loaded(model, key, text);
                                    blank
                                }
                                Err(e) => {
                                    let error = AppError::from(e);
                                    warn!(
                                        key = key.storage_name(),
                                        code = error.code(),
                                        %error,
                                        "ignoring stored setting"
                                    );
                                    false
                                }
                            }
                        }
                        Ok(None) => {
                            debug!(
                                key = key.storage_name(),
                                "setting not stored, keeping default"
                            );
                            true
                        }
                        Err(message) => {
                            warn!(
                                key = key.storage_name(),
                                error = %message,
                                "setting load failed"
                            );
                            false
                        }
                    };

                    if key == SettingKey::InstallId && absent {
                        Self::ensure_install_id(model, caps);
                    }
                    caps.render.render();
                }

                Event::SettingPersisted { key, result } => match result {
                    Ok(()) => debug!(key = key.storage_name(), "setting persisted"),
                    Err(message) => {
                        warn!(key = key.storage_name(), error = %message, "setting write failed");
                    }
                },

                Event::LocationAuthorizationChanged { status } => {
                    info!(status = status.as_str(), "location authorization changed");
                    model.location_authorization = status;
                    caps.render.render();
                }

                Event::LocationUnavailable { reason } => {
                    let error = AppError::new(ErrorKind::Location, reason);
                    warn!(code = error.code(), %error, "location updates unavailable");
                }

                Event::TimerElapsed { generation } => {
                    if generation != model.countdown.generation() {
                        debug!(
                            generation,
                            current = model.countdown.generation(),
                            "dropping stale tick"
                        );
                        return;
                    }

                    if model.countdown.tick() == TickOutcome::Fire {
                        info!("countdown elapsed, sending automatic report");
                        Self::send_report(ReportTrigger::Auto, model, caps);
                    }
                    if model.countdown.is_armed() {
                        Self::schedule_tick(generation, caps);
                    }
                    caps.render.render();
                }

                Event::BatteryMonitoringChanged { result } => {
                    match result.and_then(DeviceOutput::into_battery_monitoring) {
                        Ok(enabled) => {
                            model.battery_monitoring = enabled;
                        }
                        Err(e) => {
                            let error = AppError::from(e);
                            warn!(code = error.code(), %error, "battery monitoring unavailable");
                        }
                    }
                }

                Event::DeviceSnapshotReceived { request, result } => {
                    match result.and_then(DeviceOutput::into_snapshot) {
                        Ok(snapshot) => {
                            Self::post_report(request, &snapshot, model, caps);
                            caps.render.render();
                        }
                        Err(e) => {
                            let error = AppError::from(e);
                            warn!(
                                trigger = request.trigger.as_str(),
                                code = error.code(),
                                %error,
                                "report dropped, no device snapshot"
                            );
                        }
                    }
                }

                Event::ReportCompleted { trigger, result } => {
                    model.reports_in_flight = model.reports_in_flight.saturating_sub(1);
                    match result.and_then(check_status) {
                        Ok(()) => {
                            model.reports_sent = model.reports_sent.saturating_add(1);
                            debug!(trigger = trigger.as_str(), "report delivered");
                        }
                        Err(e) => {
                            model.reports_failed = model.reports_failed.saturating_add(1);
                            let error = AppError::from(e);
                            warn!(
                                trigger = trigger.as_str(),
                                code = error.code(),
                                %error,
                                "report not accepted"
                            );
                        }
                    }
                    caps.render.render();
                }
            }
        }

        fn view(&self, model: &Model) -> ViewModel {
            ViewModel {
                server_url: model.settings.server_url.clone(),
                device_label: model.settings.device_label.clone(),
                delay_text: model.settings.delay.to_string(),
                gps_enabled: model.flags.send_gps,
                battery_enabled: model.flags.send_battery,
                auto_report_enabled: model.flags.auto_report,
                countdown_label: model.countdown.label(),
                countdown_secs: model.countdown.remaining_secs(),
                latitude: model.location.latitude.clone(),
                longitude: model.location.longitude.clone(),
                location_authorized: model.location_authorization.is_authorized(),
                location_authorization: model.location_authorization.as_str().to_string(),
                reports_in_flight: model.reports_in_flight,
                error: model.active_error.as_ref().map(UserFacingError::from),
            }
        }
    }
}
