//! Backend-facing types: provider identities, raw fixes, events.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::settings::ListenerSettings;

/// Identity of a named location provider (e.g. satellite or network based).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(String);

impl ProviderId {
    /// Create a provider id from a platform name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The satellite-based provider name used by provider-list platforms.
    pub fn gps() -> Self {
        Self::new("gps")
    }

    /// The network-based provider name used by provider-list platforms.
    pub fn network() -> Self {
        Self::new("network")
    }

    /// The passive pseudo-provider name used by provider-list platforms.
    pub fn passive() -> Self {
        Self::new("passive")
    }

    /// The provider name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// One raw location reading reported by a provider.
///
/// `provider` is `None` for backends whose readings carry no provider
/// identity (single-manager platforms).
#[derive(Debug, Clone, PartialEq)]
pub struct Fix {
    /// Which provider produced this reading, if the platform says.
    pub provider: Option<ProviderId>,

    /// Latitude in degrees.
    pub latitude: f64,

    /// Longitude in degrees.
    pub longitude: f64,

    /// When the reading was measured (UTC).
    pub timestamp: DateTime<Utc>,

    /// Horizontal error radius in meters, if reported.
    pub accuracy: Option<f64>,

    /// Altitude in meters relative to sea level, if reported.
    pub altitude: Option<f64>,

    /// Altitude error range in meters, if reported.
    pub altitude_accuracy: Option<f64>,

    /// Heading in degrees relative to true north, if reported.
    pub heading: Option<f64>,

    /// Speed over ground in meters per second, if reported.
    pub speed: Option<f64>,
}

impl Fix {
    /// Create a fix with the required fields only.
    pub fn new(
        provider: Option<ProviderId>,
        latitude: f64,
        longitude: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            provider,
            latitude,
            longitude,
            timestamp,
            accuracy: None,
            altitude: None,
            altitude_accuracy: None,
            heading: None,
            speed: None,
        }
    }

    /// Attach a horizontal accuracy in meters.
    pub fn with_accuracy(mut self, meters: f64) -> Self {
        self.accuracy = Some(meters);
        self
    }

    /// Attach an altitude in meters.
    pub fn with_altitude(mut self, meters: f64) -> Self {
        self.altitude = Some(meters);
        self
    }

    /// Attach an altitude accuracy in meters.
    pub fn with_altitude_accuracy(mut self, meters: f64) -> Self {
        self.altitude_accuracy = Some(meters);
        self
    }

    /// Attach a heading in degrees.
    pub fn with_heading(mut self, degrees: f64) -> Self {
        self.heading = Some(degrees);
        self
    }

    /// Attach a speed in meters per second.
    pub fn with_speed(mut self, meters_per_second: f64) -> Self {
        self.speed = Some(meters_per_second);
        self
    }

    /// Horizontal accuracy, with a missing value reading as exact (0 m).
    ///
    /// Platform convention: providers that omit accuracy report their best
    /// reading, and the selection heuristic was tuned against that.
    pub fn accuracy_meters(&self) -> f64 {
        self.accuracy.unwrap_or(0.0)
    }
}

/// Events a backend delivers to a registered listener.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    /// A raw fix arrived from one of the registered providers.
    FixReceived(Fix),
    /// A provider transitioned to enabled.
    ProviderEnabled(ProviderId),
    /// A provider transitioned to disabled.
    ProviderDisabled(ProviderId),
    /// The platform revoked location authorization.
    AuthorizationFailed,
}

/// Handle for an active listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(pub u64);

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "registration-{}", self.0)
    }
}

/// Parameters for a listener registration.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    /// Providers the listener wants fixes from.
    pub providers: Vec<ProviderId>,

    /// Minimum interval between fixes.
    pub min_interval: Duration,

    /// Minimum travelled distance between fixes, in meters.
    pub min_distance: f64,

    /// Power/accuracy hints.
    pub settings: ListenerSettings,
}

impl RegistrationRequest {
    /// Registration for a transient one-shot request: fastest cadence, and
    /// automatic pausing disabled since only a single update is wanted.
    pub fn one_shot(providers: Vec<ProviderId>) -> Self {
        Self {
            providers,
            min_interval: Duration::ZERO,
            min_distance: 0.0,
            settings: ListenerSettings {
                pause_automatically: false,
                ..Default::default()
            },
        }
    }

    /// Registration for a continuous session at the caller's cadence.
    pub fn continuous(
        providers: Vec<ProviderId>,
        min_interval: Duration,
        min_distance: f64,
        settings: ListenerSettings,
    ) -> Self {
        Self {
            providers,
            min_interval,
            min_distance,
            settings,
        }
    }
}

/// Errors a backend can report at the registration boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The platform denied location access.
    #[error("location access denied by the platform")]
    Unauthorized,

    /// The backend cannot accept registrations.
    #[error("location backend unavailable: {0}")]
    Unavailable(String),
}
