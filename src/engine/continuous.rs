//! Continuous listening session.
//!
//! A [`ContinuousListener`] is spawned per session and owns the event stream
//! from the backend registration. Each raw fix passes a provider-switch
//! dampening check, then competes through the
//! [selection heuristic](crate::selector) against the shared last fix;
//! accepted fixes commit to shared state before the change event fires.
//!
//! The session tracks provider enablement in a small set. When the last
//! enabled provider disables, or the platform revokes authorization, the
//! session auto-stops - clears the engine's session slot and releases the
//! registration - and only then surfaces a single error event.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::{BackendEvent, Fix, LocationBackend, ProviderId, RegistrationId};
use crate::error::GeolocationError;
use crate::position::Position;
use crate::selector::is_better_fix;

use super::{is_ignored_provider, EngineState, GeolocationEvent};

/// Multiple of the session's minimum interval within which a switch to a
/// less accurate provider is suppressed.
///
/// Tuned value; the intent is to damp oscillation between a coarse and a
/// fine provider, nothing more precise is evidenced.
pub const PROVIDER_SWITCH_DAMPENING_FACTOR: u32 = 2;

/// Session worker consuming backend events until stopped or stranded.
pub(crate) struct ContinuousListener {
    backend: Arc<dyn LocationBackend>,
    state: Arc<Mutex<EngineState>>,
    events_tx: broadcast::Sender<GeolocationEvent>,
    registration: RegistrationId,
    min_interval: Duration,

    /// Providers currently enabled, minus ignored pseudo-providers.
    active_providers: HashSet<ProviderId>,
    /// Provider of the most recent forwarded fix, when it had one.
    active_provider: Option<ProviderId>,
    /// Most recent forwarded fix; reference point for switch dampening.
    last_fix: Option<Fix>,
}

impl ContinuousListener {
    pub(crate) fn new(
        backend: Arc<dyn LocationBackend>,
        state: Arc<Mutex<EngineState>>,
        events_tx: broadcast::Sender<GeolocationEvent>,
        registration: RegistrationId,
        min_interval: Duration,
    ) -> Self {
        let active_providers = backend
            .list_enabled_providers()
            .into_iter()
            .filter(|provider| !is_ignored_provider(provider))
            .collect();

        Self {
            backend,
            state,
            events_tx,
            registration,
            min_interval,
            active_providers,
            active_provider: None,
            last_fix: None,
        }
    }

    /// Drive the session until cancellation or a terminal failure.
    pub(crate) async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<BackendEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("continuous session canceled");
                    return;
                }
                event = events.recv() => match event {
                    Some(BackendEvent::FixReceived(fix)) => self.on_fix(fix),
                    Some(BackendEvent::ProviderEnabled(provider)) => {
                        self.on_provider_enabled(provider);
                    }
                    Some(BackendEvent::ProviderDisabled(provider)) => {
                        if self.on_provider_disabled(provider) {
                            self.auto_stop(GeolocationError::PositionUnavailable);
                            return;
                        }
                    }
                    Some(BackendEvent::AuthorizationFailed) => {
                        self.auto_stop(GeolocationError::Unauthorized);
                        return;
                    }
                    // Backend dropped the channel out from under the
                    // registration; nothing more will arrive.
                    None => {
                        self.auto_stop(GeolocationError::PositionUnavailable);
                        return;
                    }
                },
            }
        }
    }

    /// Handle one raw fix: dampening, then selection, then broadcast.
    fn on_fix(&mut self, fix: Fix) {
        if self.should_drop_for_switch(&fix) {
            debug!(provider = ?fix.provider, "fix dropped by provider-switch dampening");
            return;
        }
        self.active_provider = fix.provider.clone();
        self.last_fix = Some(fix.clone());

        // Commit under the lock, release it, then broadcast: subscribers
        // reading shared state must observe at least the event's payload.
        let accepted = {
            let mut state = self.state.lock().unwrap();
            if is_better_fix(&fix, state.last_fix.as_ref()) {
                state.last_fix = Some(fix.clone());
                true
            } else {
                false
            }
        };

        if accepted {
            let _ = self
                .events_tx
                .send(GeolocationEvent::PositionChanged(Position::from(&fix)));
        } else {
            debug!(provider = ?fix.provider, "fix rejected by selector");
        }
    }

    /// Whether a fix from a non-active provider should be suppressed.
    ///
    /// A switch is suppressed only while the active provider is still
    /// enabled, the session's last fix is strictly more accurate than the
    /// candidate, and the candidate follows it within the dampening window.
    /// Anonymous fixes never oscillate and bypass dampening.
    fn should_drop_for_switch(&self, fix: &Fix) -> bool {
        let Some(candidate_provider) = &fix.provider else {
            return false;
        };
        if Some(candidate_provider) == self.active_provider.as_ref() {
            return false;
        }
        let Some(active) = &self.active_provider else {
            return false;
        };
        if !self.backend.is_provider_enabled(active) {
            return false;
        }
        let Some(last) = &self.last_fix else {
            return false;
        };

        let less_accurate = fix.accuracy_meters() > last.accuracy_meters();
        let elapsed = fix.timestamp.signed_duration_since(last.timestamp);
        let window = chrono::Duration::from_std(
            self.min_interval * PROVIDER_SWITCH_DAMPENING_FACTOR,
        )
        .unwrap_or(chrono::Duration::MAX);

        less_accurate && elapsed < window
    }

    fn on_provider_enabled(&mut self, provider: ProviderId) {
        if is_ignored_provider(&provider) {
            return;
        }
        debug!(provider = %provider, "provider re-enabled, rejoining session");
        self.active_providers.insert(provider);
    }

    /// Returns true when the session lost its last enabled provider.
    fn on_provider_disabled(&mut self, provider: ProviderId) -> bool {
        if is_ignored_provider(&provider) {
            return false;
        }
        self.active_providers.remove(&provider) && self.active_providers.is_empty()
    }

    /// Tear the session down, then surface the error.
    ///
    /// The session slot clears and the registration releases before the
    /// event fires, so no change event can follow the error. When the slot
    /// is already empty an external stop owns the cleanup and nothing is
    /// surfaced.
    fn auto_stop(&mut self, error: GeolocationError) {
        let session = self.state.lock().unwrap().session.take();
        if session.is_none() {
            return;
        }

        self.backend.unregister(self.registration);
        warn!(%error, "continuous session stopped");
        let _ = self
            .events_tx
            .send(GeolocationEvent::PositionError(error));
    }
}
