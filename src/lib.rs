//! GeoFix - unified location acquisition over pluggable provider backends
//!
//! This library hides two facts from the application: that a device may
//! expose multiple, independently-enabled location providers with different
//! accuracy/latency/power tradeoffs, and that host platforms expose
//! incompatible native location APIs. Callers see one engine that produces
//! geodetic fixes with metadata; everything else (maps, persistence, UI) is
//! an external consumer of those fixes.
//!
//! # High-Level API
//!
//! The [`engine`] module provides the facade most callers want:
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use geofix::backend::SimulatedBackend;
//! use geofix::engine::Geolocator;
//! use tokio_util::sync::CancellationToken;
//!
//! let backend = Arc::new(SimulatedBackend::with_providers(&[("gps", true)]));
//! let engine = Geolocator::new(backend);
//!
//! let cancel = CancellationToken::new();
//! let position = engine
//!     .get_location(Some(Duration::from_secs(5)), &cancel)
//!     .await?;
//! println!("at {}, {}", position.latitude, position.longitude);
//! ```
//!
//! # Components
//!
//! - [`position`] - the [`Position`](position::Position) value type
//! - [`selector`] - the best-fix selection heuristic
//! - [`backend`] - the provider capability interface and its two variants
//! - [`engine`] - the acquisition facade, one-shot and continuous modes
//! - [`settings`] - continuous-session configuration hints
//! - [`error`] - the public error taxonomy
//! - [`logging`] - tracing initialization for embedding binaries

pub mod backend;
pub mod engine;
pub mod error;
pub mod logging;
pub mod position;
pub mod selector;
pub mod settings;

/// Version of the GeoFix library.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
