use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

pub struct Location<E> {
    context: CapabilityContext<LocationOperation, E>,
}

impl<Ev> Capability<Ev> for Location<Ev> {
    type Operation = LocationOperation;
    type MappedSelf<MappedEv> = Location<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Location::new(self.context.map_event(f))
    }
}

impl<E> Location<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<LocationOperation, E>) -> Self {
        Self { context }
    }

    /// Asks the platform for "always" authorization. The shell answers with
    /// the resulting status once the user (or a cached decision) settles it.
    pub fn request_always_authorization<F>(&self, callback: F)
    where
        F: FnOnce(LocationOutput) -> E + Send + 'static,
    {
        self.request(LocationOperation::RequestAlwaysAuthorization, callback);
    }

    /// Starts continuous updates. Fixes are pushed by the shell as
    /// `Event::LocationsUpdated` batches for as long as the process lives.
    pub fn start_updates<F>(&self, accuracy: LocationAccuracy, allow_background: bool, callback: F)
    where
        F: FnOnce(LocationOutput) -> E + Send + 'static,
    {
        self.request(
            LocationOperation::StartUpdates {
                accuracy,
                allow_background,
            },
            callback,
        );
    }

    fn request<F>(&self, operation: LocationOperation, callback: F)
    where
        F: FnOnce(LocationOutput) -> E + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let output = context.request_from_shell(operation).await;
            context.update_app(callback(output));
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum LocationOperation {
    RequestAlwaysAuthorization,
    StartUpdates {
        accuracy: LocationAccuracy,
        allow_background: bool,
    },
}

impl Operation for LocationOperation {
    type Output = LocationOutput;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LocationAccuracy {
    Best,
    NearestTenMeters,
    HundredMeters,
    Kilometer,
}

impl Default for LocationAccuracy {
    fn default() -> Self {
        LocationAccuracy::Best
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum AuthorizationStatus {
    #[default]
    NotDetermined,
    Restricted,
    Denied,
    AuthorizedAlways,
    AuthorizedWhenInUse,
}

impl AuthorizationStatus {
    #[must_use]
    pub const fn is_authorized(self) -> bool {
        matches!(self, Self::AuthorizedAlways | Self::AuthorizedWhenInUse)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotDetermined => "not_determined",
            Self::Restricted => "restricted",
            Self::Denied => "denied",
            Self::AuthorizedAlways => "authorized_always",
            Self::AuthorizedWhenInUse => "authorized_when_in_use",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum LocationOutput {
    Authorization(AuthorizationStatus),
    UpdatesStarted,
    Unavailable { reason: String },
}

/// One raw fix as delivered by the platform, in degrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Radius of uncertainty. Platforms report a negative value when the
    /// coordinates are not usable.
    #[serde(default)]
    pub horizontal_accuracy_m: Option<f64>,
}

impl LocationFix {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            horizontal_accuracy_m: None,
        }
    }

    #[must_use]
    pub const fn with_accuracy(self, horizontal_accuracy_m: f64) -> Self {
        Self {
            horizontal_accuracy_m: Some(horizontal_accuracy_m),
            ..self
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && self.horizontal_accuracy_m.map_or(true, |m| m >= 0.0)
    }
}
