//! Location acquisition engine.
//!
//! [`Geolocator`] is the single entry point for callers: it answers
//! availability queries, serves one-shot requests, manages the (at most one)
//! continuous listening session, and owns the shared last-known fix.
//!
//! # Architecture
//!
//! The engine fans a request out across every enabled provider of its
//! [`LocationBackend`] and funnels the raw readings through the
//! [selection heuristic](crate::selector) so that conflicting providers
//! converge on one authoritative position. One-shot requests are bounded by
//! an optional deadline; continuous sessions stream until stopped, a
//! provider transition strands them, or authorization is revoked.
//!
//! All shared state - the last accepted fix and the active session - lives
//! behind one mutex per engine instance. Events are broadcast only after the
//! state they describe has been committed, so a subscriber that reads shared
//! state observes a value at least as fresh as the event payload.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use geofix::backend::SimulatedBackend;
//! use geofix::engine::{Geolocator, GeolocationEvent};
//! use tokio_util::sync::CancellationToken;
//!
//! let backend = Arc::new(SimulatedBackend::with_providers(&[("gps", true)]));
//! let engine = Geolocator::new(backend);
//!
//! // One-shot fix, bounded to five seconds.
//! let cancel = CancellationToken::new();
//! let position = engine
//!     .get_location(Some(Duration::from_secs(5)), &cancel)
//!     .await?;
//!
//! // Continuous updates.
//! let mut events = engine.subscribe();
//! engine.start_listening(Duration::from_secs(1), 10.0, Default::default()).await?;
//! while let Ok(GeolocationEvent::PositionChanged(position)) = events.recv().await {
//!     // handle position
//! }
//! ```

mod continuous;
mod single_shot;

pub use continuous::PROVIDER_SWITCH_DAMPENING_FACTOR;
pub use single_shot::DESIRED_ACCURACY_METERS;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backend::{
    BackendError, Fix, LocationBackend, ProviderId, RegistrationId, RegistrationRequest,
};
use crate::error::GeolocationError;
use crate::position::Position;
use crate::settings::ListenerSettings;

use continuous::ContinuousListener;
use single_shot::SingleShotAcquirer;

/// Events published by the engine to subscribers.
#[derive(Debug, Clone)]
pub enum GeolocationEvent {
    /// The shared position changed; the payload is the accepted fix.
    PositionChanged(Position),
    /// The active continuous session failed and has already stopped.
    PositionError(GeolocationError),
}

/// Pseudo-providers excluded from enablement checks and session tracking.
const IGNORED_PROVIDERS: &[&str] = &["passive", "local_database"];

/// Capacity of the event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 16;

pub(crate) fn is_ignored_provider(provider: &ProviderId) -> bool {
    IGNORED_PROVIDERS.contains(&provider.as_str())
}

/// Shared engine state, guarded by one mutex per engine instance.
struct EngineState {
    /// Last fix accepted by the selector. Exposed as a [`Position`].
    last_fix: Option<Fix>,
    /// The active continuous session, if any.
    session: Option<SessionHandle>,
}

/// Handle to an active continuous session.
struct SessionHandle {
    registration: RegistrationId,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

/// Location acquisition engine facade.
///
/// Construct with [`Geolocator::new`], passing the backend explicitly;
/// nothing in the crate reaches for process-wide state.
pub struct Geolocator {
    backend: Arc<dyn LocationBackend>,
    state: Arc<Mutex<EngineState>>,
    events_tx: broadcast::Sender<GeolocationEvent>,
}

impl Geolocator {
    /// Create an engine over the given backend.
    pub fn new(backend: Arc<dyn LocationBackend>) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            backend,
            state: Arc::new(Mutex::new(EngineState {
                last_fix: None,
                session: None,
            })),
            events_tx,
        }
    }

    /// Whether the platform exposes any location provider at all.
    pub fn is_geolocation_available(&self) -> bool {
        !self.backend.list_providers().is_empty()
    }

    /// Whether at least one non-ignored provider is currently enabled.
    pub fn is_geolocation_enabled(&self) -> bool {
        self.backend
            .list_enabled_providers()
            .iter()
            .any(|provider| !is_ignored_provider(provider))
    }

    /// Whether a continuous listening session is active.
    pub fn is_listening(&self) -> bool {
        self.state.lock().unwrap().session.is_some()
    }

    /// The last position accepted by the engine, if any.
    pub fn last_known_position(&self) -> Option<Position> {
        self.state
            .lock()
            .unwrap()
            .last_fix
            .as_ref()
            .map(Position::from)
    }

    /// Subscribe to [`GeolocationEvent`]s.
    ///
    /// Dropping the receiver unsubscribes; subscriptions never outlive the
    /// receiver, including across session restarts.
    pub fn subscribe(&self) -> broadcast::Receiver<GeolocationEvent> {
        self.events_tx.subscribe()
    }

    /// Acquire a single position.
    ///
    /// With a continuous session active, resolves from the shared position
    /// slot (immediately if cached, otherwise on the next change event).
    /// Without one, registers a transient listener with every enabled
    /// provider and returns the first sufficiently accurate fix, or the best
    /// fix observed when the deadline expires.
    ///
    /// # Errors
    ///
    /// - [`GeolocationError::Usage`] for a zero `timeout` (pass `None` for
    ///   "no timeout").
    /// - [`GeolocationError::PositionUnavailable`] when no provider is
    ///   enabled, or every registered provider disables mid-request.
    /// - [`GeolocationError::Unauthorized`] when the platform denies access.
    /// - [`GeolocationError::Canceled`] when `cancel` fires, or the deadline
    ///   expires with no fix observed.
    pub async fn get_location(
        &self,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<Position, GeolocationError> {
        if let Some(timeout) = timeout {
            if timeout.is_zero() {
                return Err(GeolocationError::usage(
                    "timeout must be a positive duration; pass None for no timeout",
                ));
            }
        }

        // While listening, the active session is the producer: serve from
        // the shared slot instead of a second registration. Subscribing
        // under the state lock closes the gap between the cache check and
        // the first event.
        let wait_rx = {
            let state = self.state.lock().unwrap();
            if state.session.is_some() {
                if let Some(fix) = &state.last_fix {
                    debug!("one-shot request served from cached position");
                    return Ok(Position::from(fix));
                }
                Some(self.events_tx.subscribe())
            } else {
                None
            }
        };

        if let Some(events) = wait_rx {
            return self.wait_for_listener_position(events, cancel).await;
        }

        SingleShotAcquirer::new(Arc::clone(&self.backend))
            .acquire(timeout, cancel)
            .await
    }

    /// Wait for the active session to produce its first position.
    ///
    /// Resolves on the first change event and drops the subscription; an
    /// error event while waiting fails the call with that error.
    async fn wait_for_listener_position(
        &self,
        mut events: broadcast::Receiver<GeolocationEvent>,
        cancel: &CancellationToken,
    ) -> Result<Position, GeolocationError> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(GeolocationError::Canceled),
                event = events.recv() => match event {
                    Ok(GeolocationEvent::PositionChanged(position)) => return Ok(position),
                    Ok(GeolocationEvent::PositionError(error)) => return Err(error),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(GeolocationError::PositionUnavailable)
                    }
                },
            }
        }
    }

    /// Start the continuous listening session.
    ///
    /// Registers with every provider at the given cadence and streams
    /// accepted positions through [`GeolocationEvent::PositionChanged`].
    ///
    /// # Errors
    ///
    /// - [`GeolocationError::Usage`] for a negative `min_distance` or when a
    ///   session is already active (the first session is unaffected).
    /// - [`GeolocationError::Unauthorized`] when the platform denies access
    ///   at registration.
    pub async fn start_listening(
        &self,
        min_interval: Duration,
        min_distance: f64,
        settings: ListenerSettings,
    ) -> Result<(), GeolocationError> {
        if min_distance < 0.0 {
            return Err(GeolocationError::usage("min_distance must be non-negative"));
        }

        let mut state = self.state.lock().unwrap();
        if state.session.is_some() {
            return Err(GeolocationError::usage(
                "a continuous listening session is already active",
            ));
        }

        let providers = self.backend.list_providers();
        let (backend_tx, backend_rx) = mpsc::unbounded_channel();
        let request =
            RegistrationRequest::continuous(providers, min_interval, min_distance, settings);
        let registration = self
            .backend
            .register_listener(request, backend_tx)
            .map_err(registration_error)?;

        let listener = ContinuousListener::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.state),
            self.events_tx.clone(),
            registration,
            min_interval,
        );
        let cancel = CancellationToken::new();
        let task = tokio::spawn(listener.run(backend_rx, cancel.clone()));

        // The session slot is filled while still holding the lock, so the
        // spawned task can never observe a started-but-unregistered session.
        state.session = Some(SessionHandle {
            registration,
            cancel,
            task,
        });

        info!(
            min_interval_ms = min_interval.as_millis() as u64,
            min_distance, "continuous listening started"
        );
        Ok(())
    }

    /// Stop the continuous listening session.
    ///
    /// Idempotent: stopping while not listening is a no-op with no
    /// observable side effect. On return no further events will be
    /// delivered for the stopped session.
    pub async fn stop_listening(&self) {
        let session = self.state.lock().unwrap().session.take();
        let Some(session) = session else {
            return;
        };

        session.cancel.cancel();
        self.backend.unregister(session.registration);
        let _ = session.task.await;
        info!("continuous listening stopped");
    }
}

/// Convert a registration-boundary backend error to the public taxonomy.
fn registration_error(error: BackendError) -> GeolocationError {
    match error {
        BackendError::Unauthorized => GeolocationError::Unauthorized,
        BackendError::Unavailable(_) => GeolocationError::PositionUnavailable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;

    #[test]
    fn test_availability_queries() {
        let engine = Geolocator::new(Arc::new(SimulatedBackend::new()));
        assert!(!engine.is_geolocation_available());
        assert!(!engine.is_geolocation_enabled());

        let backend = Arc::new(SimulatedBackend::with_providers(&[
            ("passive", true),
            ("gps", false),
        ]));
        let engine = Geolocator::new(backend.clone());
        assert!(engine.is_geolocation_available());
        // Only the ignored pseudo-provider is enabled.
        assert!(!engine.is_geolocation_enabled());

        backend.set_provider_enabled(&ProviderId::gps(), true);
        assert!(engine.is_geolocation_enabled());
    }

    #[test]
    fn test_ignored_provider_names() {
        assert!(is_ignored_provider(&ProviderId::passive()));
        assert!(is_ignored_provider(&ProviderId::new("local_database")));
        assert!(!is_ignored_provider(&ProviderId::gps()));
    }

    #[test]
    fn test_initial_state() {
        let engine = Geolocator::new(Arc::new(SimulatedBackend::new()));
        assert!(!engine.is_listening());
        assert!(engine.last_known_position().is_none());
    }

    #[test]
    fn test_registration_error_mapping() {
        assert_eq!(
            registration_error(BackendError::Unauthorized),
            GeolocationError::Unauthorized
        );
        assert_eq!(
            registration_error(BackendError::Unavailable("gone".into())),
            GeolocationError::PositionUnavailable
        );
    }
}
