//! Listener configuration.
//!
//! [`ListenerSettings`] carries the power/accuracy hints a caller can attach
//! to a continuous session. Backends that do not support a given hint ignore
//! it; the engine itself never interprets these beyond passing them through.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Activity the provider should optimize its power/accuracy tradeoff for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActivityType {
    /// Location is used for an unknown activity.
    #[default]
    Other,
    /// Vehicular navigation; updates may pause when the vehicle is parked.
    AutomotiveNavigation,
    /// Pedestrian activity; updates may pause when the user is stationary.
    Fitness,
    /// Non-automotive vehicular navigation (boat, train, plane).
    OtherNavigation,
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other => write!(f, "Other"),
            Self::AutomotiveNavigation => write!(f, "AutomotiveNavigation"),
            Self::Fitness => write!(f, "Fitness"),
            Self::OtherNavigation => write!(f, "OtherNavigation"),
        }
    }
}

/// Hints for a continuous listening session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerSettings {
    /// Allow updates while the application is in the background.
    pub allow_background_updates: bool,

    /// Let the provider pause updates when the position is unlikely to
    /// change.
    pub pause_automatically: bool,

    /// Activity hint used to decide when pausing is appropriate.
    pub activity_type: ActivityType,

    /// Coarse low-power mode: report only materially different positions.
    pub listen_for_significant_changes_only: bool,

    /// Buffer fixes on the provider and deliver them in batches once a
    /// distance or time threshold is met.
    pub defer_updates: bool,

    /// Minimum travel distance before deferred updates are delivered.
    /// `None` waits indefinitely.
    pub deferral_distance_meters: Option<f64>,

    /// Minimum elapsed time before deferred updates are delivered.
    /// `None` waits indefinitely.
    pub deferral_time: Option<Duration>,
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self {
            allow_background_updates: false,
            pause_automatically: true,
            activity_type: ActivityType::Other,
            listen_for_significant_changes_only: false,
            defer_updates: false,
            deferral_distance_meters: Some(500.0),
            deferral_time: Some(Duration::from_secs(5 * 60)),
        }
    }
}
