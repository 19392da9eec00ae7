mod device;
mod http;
mod kv;
mod location;
mod timer;

pub use self::device::{
    Device, DeviceError, DeviceOperation, DeviceOutput, DeviceResult, DeviceSnapshot,
    UNKNOWN_BATTERY_LEVEL,
};
pub use self::http::{
    check_status, Endpoint, HttpError, FORM_CONTENT_TYPE, MAX_URL_LENGTH, SUCCESS_STATUS,
};
pub use self::kv::{decode_text, encode_text, KeyNamespace, KvError, KvKey};
pub use self::location::{
    AuthorizationStatus, Location, LocationAccuracy, LocationFix, LocationOperation,
    LocationOutput,
};
pub use self::timer::{Timer, TimerOperation, TimerOutput};

// Render, Http and KeyValue are Crux's built-in capabilities; Location,
// Device and Timer are shell requests specific to this app.
pub use crux_core::render::Render;
pub use crux_http::Http;
pub use crux_kv::KeyValue;

use crate::event::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub kv: KeyValue<Event>,
    pub render: Render<Event>,
    pub location: Location<Event>,
    pub device: Device<Event>,
    pub timer: Timer<Event>,
}
