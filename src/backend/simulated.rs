//! Provider-list backend with an in-process control surface.
//!
//! [`SimulatedBackend`] multiplexes several named providers, each with its
//! own enable state and retained last fix. It is the composition-time choice
//! for tests and for embedders that feed fixes from their own sources (replay
//! files, network feeds, simulators).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::debug;

use super::types::{
    BackendError, BackendEvent, Fix, ProviderId, RegistrationId, RegistrationRequest,
};
use super::LocationBackend;

struct ProviderState {
    enabled: bool,
    last_fix: Option<Fix>,
}

struct Registration {
    providers: HashSet<ProviderId>,
    events: mpsc::UnboundedSender<BackendEvent>,
}

#[derive(Default)]
struct Inner {
    providers: BTreeMap<ProviderId, ProviderState>,
    registrations: HashMap<u64, Registration>,
    next_registration: u64,
    unauthorized: bool,
}

/// Provider-list location backend driven by explicit pushes.
#[derive(Default)]
pub struct SimulatedBackend {
    inner: Mutex<Inner>,
}

impl SimulatedBackend {
    /// Create a backend with no providers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend with the given providers and enable states.
    pub fn with_providers(providers: &[(&str, bool)]) -> Self {
        let backend = Self::new();
        for (name, enabled) in providers {
            backend.add_provider(ProviderId::new(*name), *enabled);
        }
        backend
    }

    /// Add a provider. Replaces any existing provider with the same id.
    pub fn add_provider(&self, provider: ProviderId, enabled: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.providers.insert(
            provider,
            ProviderState {
                enabled,
                last_fix: None,
            },
        );
    }

    /// Flip a provider's enable state, notifying active registrations that
    /// cover it. No-op when the state does not change.
    pub fn set_provider_enabled(&self, provider: &ProviderId, enabled: bool) {
        let mut inner = self.inner.lock().unwrap();
        let Some(state) = inner.providers.get_mut(provider) else {
            return;
        };
        if state.enabled == enabled {
            return;
        }
        state.enabled = enabled;

        let event = if enabled {
            BackendEvent::ProviderEnabled(provider.clone())
        } else {
            BackendEvent::ProviderDisabled(provider.clone())
        };
        for registration in inner.registrations.values() {
            if registration.providers.contains(provider) {
                let _ = registration.events.send(event.clone());
            }
        }
    }

    /// Deliver a fix from its provider to every covering registration and
    /// retain it as the provider's last known fix.
    ///
    /// Fixes from unknown or disabled providers are dropped, as the platform
    /// would not deliver them.
    pub fn push_fix(&self, fix: Fix) {
        let Some(provider) = fix.provider.clone() else {
            debug!("dropping fix without provider identity");
            return;
        };

        let mut inner = self.inner.lock().unwrap();
        match inner.providers.get_mut(&provider) {
            Some(state) if state.enabled => {
                state.last_fix = Some(fix.clone());
            }
            _ => {
                debug!(provider = %provider, "dropping fix from unknown or disabled provider");
                return;
            }
        }

        for registration in inner.registrations.values() {
            if registration.providers.contains(&provider) {
                let _ = registration
                    .events
                    .send(BackendEvent::FixReceived(fix.clone()));
            }
        }
    }

    /// Revoke location authorization: future registrations fail and every
    /// active registration receives [`BackendEvent::AuthorizationFailed`].
    pub fn revoke_authorization(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.unauthorized = true;
        for registration in inner.registrations.values() {
            let _ = registration.events.send(BackendEvent::AuthorizationFailed);
        }
    }

    /// Restore location authorization.
    pub fn grant_authorization(&self) {
        self.inner.lock().unwrap().unauthorized = false;
    }

    /// Number of currently active registrations.
    pub fn registration_count(&self) -> usize {
        self.inner.lock().unwrap().registrations.len()
    }
}

impl LocationBackend for SimulatedBackend {
    fn list_providers(&self) -> Vec<ProviderId> {
        self.inner.lock().unwrap().providers.keys().cloned().collect()
    }

    fn list_enabled_providers(&self) -> Vec<ProviderId> {
        self.inner
            .lock()
            .unwrap()
            .providers
            .iter()
            .filter(|(_, state)| state.enabled)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn is_provider_enabled(&self, provider: &ProviderId) -> bool {
        self.inner
            .lock()
            .unwrap()
            .providers
            .get(provider)
            .is_some_and(|state| state.enabled)
    }

    fn last_known_fix(&self, provider: &ProviderId) -> Option<Fix> {
        self.inner
            .lock()
            .unwrap()
            .providers
            .get(provider)
            .and_then(|state| state.last_fix.clone())
    }

    fn register_listener(
        &self,
        request: RegistrationRequest,
        events: mpsc::UnboundedSender<BackendEvent>,
    ) -> Result<RegistrationId, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.unauthorized {
            return Err(BackendError::Unauthorized);
        }

        let id = inner.next_registration;
        inner.next_registration += 1;
        inner.registrations.insert(
            id,
            Registration {
                providers: request.providers.into_iter().collect(),
                events,
            },
        );
        Ok(RegistrationId(id))
    }

    fn unregister(&self, registration: RegistrationId) {
        self.inner.lock().unwrap().registrations.remove(&registration.0);
    }
}
