//! Geolocation error taxonomy.
//!
//! Every failure the engine can report to a caller maps to one of the
//! variants here. Backend-level failures are converted at the registration
//! boundary and never cross the public API as raw backend errors.

use thiserror::Error;

/// Errors reported by location requests and listening sessions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeolocationError {
    /// No enabled provider can supply a position, or every active provider
    /// was disabled mid-session.
    #[error("no enabled location provider can supply a position")]
    PositionUnavailable,

    /// Location access was denied or revoked. Terminal for the current
    /// session: an active continuous session auto-stops before this is
    /// surfaced.
    #[error("location access is not authorized")]
    Unauthorized,

    /// The caller's cancellation token fired, or a bounded wait expired
    /// with nothing observed.
    #[error("the location request was canceled")]
    Canceled,

    /// Invalid argument or conflicting session state.
    #[error("invalid location request: {0}")]
    Usage(String),
}

impl GeolocationError {
    /// Shorthand for a [`GeolocationError::Usage`] error.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_position_unavailable() {
        let err = GeolocationError::PositionUnavailable;
        assert!(err.to_string().contains("no enabled location provider"));
    }

    #[test]
    fn test_display_usage_includes_message() {
        let err = GeolocationError::usage("timeout must be positive");
        assert!(err.to_string().contains("timeout must be positive"));
    }

    #[test]
    fn test_error_trait_object() {
        let err = GeolocationError::Unauthorized;
        let _: &dyn std::error::Error = &err;
    }

    #[test]
    fn test_variants_compare() {
        assert_eq!(GeolocationError::Canceled, GeolocationError::Canceled);
        assert_ne!(
            GeolocationError::Canceled,
            GeolocationError::PositionUnavailable
        );
    }
}
