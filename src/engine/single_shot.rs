//! One-shot location acquisition.
//!
//! A [`SingleShotAcquirer`] coordinates one bounded-time request across all
//! enabled providers: it registers a transient listener, races provider
//! events against the deadline and the caller's cancellation token in a
//! single `select!`, and releases the registration on every exit path via an
//! RAII guard. Exactly one arm resolves the call; signals that lose the race
//! are dropped with the guard.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::backend::{
    BackendEvent, Fix, LocationBackend, ProviderId, RegistrationId, RegistrationRequest,
};
use crate::error::GeolocationError;
use crate::position::Position;
use crate::selector::is_better_fix;

use super::registration_error;

/// Accuracy threshold that satisfies a one-shot request early, in meters.
///
/// Tuned value; a fix at least this accurate completes the request without
/// waiting out the deadline.
pub const DESIRED_ACCURACY_METERS: f64 = 100.0;

/// Coordinator for one bounded-time acquisition.
pub(crate) struct SingleShotAcquirer {
    backend: Arc<dyn LocationBackend>,
    desired_accuracy: f64,
}

impl SingleShotAcquirer {
    pub(crate) fn new(backend: Arc<dyn LocationBackend>) -> Self {
        Self {
            backend,
            desired_accuracy: DESIRED_ACCURACY_METERS,
        }
    }

    /// Acquire one position within the optional deadline.
    ///
    /// The caller (the facade) has already validated the timeout.
    pub(crate) async fn acquire(
        &self,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<Position, GeolocationError> {
        let enabled = self.backend.list_enabled_providers();
        if enabled.is_empty() {
            debug!("one-shot request failed: no enabled providers");
            return Err(GeolocationError::PositionUnavailable);
        }

        // Seed from whatever the platform still retains, so a deadline can
        // resolve to a cached reading when no live fix arrives in time.
        let mut best: Option<Fix> = None;
        for provider in &enabled {
            if let Some(fix) = self.backend.last_known_fix(provider) {
                if is_better_fix(&fix, best.as_ref()) {
                    best = Some(fix);
                }
            }
        }

        let (events_tx, mut events) = mpsc::unbounded_channel();
        let request = RegistrationRequest::one_shot(enabled.clone());
        let registration = self
            .backend
            .register_listener(request, events_tx)
            .map_err(registration_error)?;
        let _guard = RegistrationGuard {
            backend: Arc::clone(&self.backend),
            registration,
        };

        let mut active: HashSet<ProviderId> = enabled.into_iter().collect();
        let deadline = timeout.map(|timeout| tokio::time::Instant::now() + timeout);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("one-shot request canceled");
                    return Err(GeolocationError::Canceled);
                }
                _ = deadline_expired(deadline) => {
                    return match best.take() {
                        Some(fix) => {
                            debug!(provider = ?fix.provider, "deadline reached, returning best fix");
                            Ok(Position::from(fix))
                        }
                        // No fix observed within the deadline: the wait is
                        // canceled, never an empty success.
                        None => Err(GeolocationError::Canceled),
                    };
                }
                event = events.recv() => match event {
                    Some(BackendEvent::FixReceived(fix)) => {
                        if fix.accuracy_meters() <= self.desired_accuracy {
                            debug!(
                                provider = ?fix.provider,
                                accuracy = fix.accuracy_meters(),
                                "fix satisfies desired accuracy"
                            );
                            return Ok(Position::from(fix));
                        }
                        if is_better_fix(&fix, best.as_ref()) {
                            best = Some(fix);
                        }
                    }
                    Some(BackendEvent::ProviderDisabled(provider)) => {
                        if active.remove(&provider) && active.is_empty() {
                            debug!("one-shot request stranded: all providers disabled");
                            return Err(GeolocationError::PositionUnavailable);
                        }
                    }
                    Some(BackendEvent::ProviderEnabled(provider)) => {
                        active.insert(provider);
                    }
                    Some(BackendEvent::AuthorizationFailed) => {
                        return Err(GeolocationError::Unauthorized);
                    }
                    None => return Err(GeolocationError::PositionUnavailable),
                },
            }
        }
    }
}

/// Pending forever when no deadline was requested.
async fn deadline_expired(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Releases the transient registration on every exit path, including
/// cancellation by drop.
struct RegistrationGuard {
    backend: Arc<dyn LocationBackend>,
    registration: RegistrationId,
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.backend.unregister(self.registration);
    }
}
