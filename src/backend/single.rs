//! Single-manager backend with heading support.
//!
//! [`SingleManagerBackend`] models platforms that expose one logical
//! location manager instead of a provider list: a global service switch, an
//! authorization flag, and a separate heading stream. Fixes it emits carry
//! no provider identity.
//!
//! Heading updates are merged into the retained fix by copy-then-patch with
//! a refreshed timestamp, so downstream selection treats the merged reading
//! as newer at unchanged accuracy. A heading with no prior fix is dropped; a
//! fix is never fabricated from a heading alone.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::debug;

use super::types::{
    BackendError, BackendEvent, Fix, ProviderId, RegistrationId, RegistrationRequest,
};
use super::LocationBackend;

#[derive(Default)]
struct Inner {
    services_enabled: bool,
    unauthorized: bool,
    last_fix: Option<Fix>,
    registrations: HashMap<u64, mpsc::UnboundedSender<BackendEvent>>,
    next_registration: u64,
}

/// Single-manager location backend driven by explicit pushes.
pub struct SingleManagerBackend {
    inner: Mutex<Inner>,
}

impl Default for SingleManagerBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SingleManagerBackend {
    /// Create a backend with location services enabled.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                services_enabled: true,
                ..Default::default()
            }),
        }
    }

    /// Identity of the logical manager, used for provider listings.
    ///
    /// Fixes themselves carry no provider identity on this backend.
    pub fn provider_id() -> ProviderId {
        ProviderId::new("location-manager")
    }

    /// Flip the platform-wide location services switch, notifying active
    /// registrations. No-op when the state does not change.
    pub fn set_services_enabled(&self, enabled: bool) {
        let mut inner = self.inner.lock().unwrap();
        if inner.services_enabled == enabled {
            return;
        }
        inner.services_enabled = enabled;

        let event = if enabled {
            BackendEvent::ProviderEnabled(Self::provider_id())
        } else {
            BackendEvent::ProviderDisabled(Self::provider_id())
        };
        for events in inner.registrations.values() {
            let _ = events.send(event.clone());
        }
    }

    /// Revoke location authorization: future registrations fail and every
    /// active registration receives [`BackendEvent::AuthorizationFailed`].
    pub fn revoke_authorization(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.unauthorized = true;
        for events in inner.registrations.values() {
            let _ = events.send(BackendEvent::AuthorizationFailed);
        }
    }

    /// Restore location authorization.
    pub fn grant_authorization(&self) {
        self.inner.lock().unwrap().unauthorized = false;
    }

    /// Deliver a fix to every active registration and retain it.
    ///
    /// The provider identity is stripped; readings from this backend are
    /// anonymous. Dropped while services are disabled.
    pub fn push_fix(&self, mut fix: Fix) {
        fix.provider = None;

        let mut inner = self.inner.lock().unwrap();
        if !inner.services_enabled {
            debug!("dropping fix while location services are disabled");
            return;
        }
        inner.last_fix = Some(fix.clone());

        for events in inner.registrations.values() {
            let _ = events.send(BackendEvent::FixReceived(fix.clone()));
        }
    }

    /// Merge a heading into the retained fix and re-deliver it.
    ///
    /// Copy-then-patch: every other field of the retained fix is preserved;
    /// the timestamp is refreshed so the merged reading counts as newer.
    /// Ignored when no fix has been retained yet.
    pub fn push_heading(&self, degrees: f64) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.services_enabled {
            return;
        }
        let Some(previous) = inner.last_fix.clone() else {
            debug!("ignoring heading update before any fix");
            return;
        };

        let merged = Fix {
            heading: Some(degrees),
            timestamp: Utc::now(),
            ..previous
        };
        inner.last_fix = Some(merged.clone());

        for events in inner.registrations.values() {
            let _ = events.send(BackendEvent::FixReceived(merged.clone()));
        }
    }

    /// Number of currently active registrations.
    pub fn registration_count(&self) -> usize {
        self.inner.lock().unwrap().registrations.len()
    }
}

impl LocationBackend for SingleManagerBackend {
    fn list_providers(&self) -> Vec<ProviderId> {
        vec![Self::provider_id()]
    }

    fn list_enabled_providers(&self) -> Vec<ProviderId> {
        let inner = self.inner.lock().unwrap();
        if inner.services_enabled && !inner.unauthorized {
            vec![Self::provider_id()]
        } else {
            Vec::new()
        }
    }

    fn is_provider_enabled(&self, provider: &ProviderId) -> bool {
        if *provider != Self::provider_id() {
            return false;
        }
        let inner = self.inner.lock().unwrap();
        inner.services_enabled && !inner.unauthorized
    }

    fn last_known_fix(&self, provider: &ProviderId) -> Option<Fix> {
        if *provider != Self::provider_id() {
            return None;
        }
        self.inner.lock().unwrap().last_fix.clone()
    }

    fn register_listener(
        &self,
        _request: RegistrationRequest,
        events: mpsc::UnboundedSender<BackendEvent>,
    ) -> Result<RegistrationId, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.unauthorized {
            return Err(BackendError::Unauthorized);
        }

        let id = inner.next_registration;
        inner.next_registration += 1;
        inner.registrations.insert(id, events);
        Ok(RegistrationId(id))
    }

    fn unregister(&self, registration: RegistrationId) {
        self.inner.lock().unwrap().registrations.remove(&registration.0);
    }
}
