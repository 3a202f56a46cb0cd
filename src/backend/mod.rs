//! Provider backend capability interface.
//!
//! The engine is written against [`LocationBackend`], not against any
//! concrete platform API. Two interchangeable implementations ship with the
//! crate, mirroring the two shapes native platforms come in:
//!
//! - [`SimulatedBackend`] - provider-list variant: multiplexes several named
//!   providers with independent enable state and retained last fixes.
//! - [`SingleManagerBackend`] - single-manager variant: one logical manager
//!   with a service switch, an authorization flag, and a heading stream.
//!
//! Backends deliver events over a channel handed to them at registration;
//! they never call back into the engine directly. Registration and
//! unregistration may be interleaved freely across concurrent sessions, and
//! unregistering an unknown id is a no-op.
//!
//! # Usage
//!
//! ```ignore
//! let (events_tx, mut events_rx) = mpsc::unbounded_channel();
//! let request = RegistrationRequest::one_shot(backend.list_enabled_providers());
//! let registration = backend.register_listener(request, events_tx)?;
//!
//! while let Some(event) = events_rx.recv().await {
//!     // BackendEvent::FixReceived, ProviderEnabled, ...
//! }
//!
//! backend.unregister(registration);
//! ```

mod simulated;
mod single;
mod types;

pub use simulated::SimulatedBackend;
pub use single::SingleManagerBackend;
pub use types::{
    BackendError, BackendEvent, Fix, ProviderId, RegistrationId, RegistrationRequest,
};

use tokio::sync::mpsc;

/// Capability interface over a platform's location providers.
pub trait LocationBackend: Send + Sync {
    /// Every provider the platform knows about, enabled or not.
    fn list_providers(&self) -> Vec<ProviderId>;

    /// Providers currently reporting enabled.
    fn list_enabled_providers(&self) -> Vec<ProviderId>;

    /// Whether a specific provider is currently enabled.
    fn is_provider_enabled(&self, provider: &ProviderId) -> bool;

    /// The most recent fix the platform retains for a provider, if any.
    ///
    /// Used to seed one-shot requests so a deadline can resolve to a cached
    /// reading when no live fix arrives in time.
    fn last_known_fix(&self, provider: &ProviderId) -> Option<Fix> {
        let _ = provider;
        None
    }

    /// Register a listener for the providers named in `request`.
    ///
    /// Events are delivered on `events` until [`unregister`] is called.
    /// Fails with [`BackendError::Unauthorized`] when the platform denies
    /// location access.
    ///
    /// [`unregister`]: LocationBackend::unregister
    fn register_listener(
        &self,
        request: RegistrationRequest,
        events: mpsc::UnboundedSender<BackendEvent>,
    ) -> Result<RegistrationId, BackendError>;

    /// Release a registration. Idempotent: unknown ids are ignored.
    fn unregister(&self, registration: RegistrationId);
}
