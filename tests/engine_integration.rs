//! Integration tests for the location acquisition engine.
//!
//! These tests drive the complete flows through the public API:
//! - One-shot acquisition (deadline, cancellation, cleanup)
//! - One-shot acquisition while a continuous session is active
//! - Continuous listening (events, provider transitions, auto-stop)
//! - The single-manager backend variant with heading merging
//!
//! Run with: `cargo test --test engine_integration`

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use geofix::backend::{Fix, ProviderId, SimulatedBackend, SingleManagerBackend};
use geofix::engine::{GeolocationEvent, Geolocator};
use geofix::error::GeolocationError;
use geofix::position::Position;
use geofix::settings::ListenerSettings;

// ============================================================================
// Test Helpers
// ============================================================================

/// Hamburg airport coordinates.
const HAMBURG_LAT: f64 = 53.630278;
const HAMBURG_LON: f64 = 9.988333;

/// Toulouse airport coordinates.
const TOULOUSE_LAT: f64 = 43.629444;
const TOULOUSE_LON: f64 = 1.363889;

/// Engine over a provider-list backend with satellite + network providers.
fn create_engine() -> (Arc<SimulatedBackend>, Arc<Geolocator>) {
    let backend = Arc::new(SimulatedBackend::with_providers(&[
        ("gps", true),
        ("network", true),
    ]));
    let engine = Arc::new(Geolocator::new(backend.clone()));
    (backend, engine)
}

fn gps_fix(latitude: f64, longitude: f64, accuracy: f64) -> Fix {
    Fix::new(Some(ProviderId::gps()), latitude, longitude, Utc::now()).with_accuracy(accuracy)
}

fn network_fix(latitude: f64, longitude: f64, accuracy: f64) -> Fix {
    Fix::new(Some(ProviderId::network()), latitude, longitude, Utc::now()).with_accuracy(accuracy)
}

async fn expect_position_changed(
    events: &mut broadcast::Receiver<GeolocationEvent>,
) -> Position {
    match timeout(Duration::from_millis(500), events.recv()).await {
        Ok(Ok(GeolocationEvent::PositionChanged(position))) => position,
        other => panic!("expected PositionChanged, got {other:?}"),
    }
}

async fn expect_position_error(
    events: &mut broadcast::Receiver<GeolocationEvent>,
) -> GeolocationError {
    match timeout(Duration::from_millis(500), events.recv()).await {
        Ok(Ok(GeolocationEvent::PositionError(error))) => error,
        other => panic!("expected PositionError, got {other:?}"),
    }
}

async fn expect_no_event(events: &mut broadcast::Receiver<GeolocationEvent>) {
    if let Ok(event) = timeout(Duration::from_millis(150), events.recv()).await {
        panic!("expected no event, got {event:?}");
    }
}

// ============================================================================
// One-Shot Acquisition
// ============================================================================

/// With no enabled provider the request fails immediately, it never sits out
/// the timeout.
#[tokio::test]
async fn test_one_shot_no_enabled_providers_fails_immediately() {
    let backend = Arc::new(SimulatedBackend::with_providers(&[
        ("gps", false),
        ("network", false),
    ]));
    let engine = Geolocator::new(backend.clone());

    let started = Instant::now();
    let result = engine
        .get_location(Some(Duration::from_secs(5)), &CancellationToken::new())
        .await;

    assert_eq!(result, Err(GeolocationError::PositionUnavailable));
    assert!(
        started.elapsed() < Duration::from_millis(100),
        "must not block until the timeout"
    );
    assert_eq!(backend.registration_count(), 0);
}

/// An explicit zero timeout is a usage error, distinct from "no timeout",
/// and is rejected before any provider registration.
#[tokio::test]
async fn test_one_shot_zero_timeout_is_usage_error() {
    let (backend, engine) = create_engine();

    let result = engine
        .get_location(Some(Duration::ZERO), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(GeolocationError::Usage(_))));
    assert_eq!(backend.registration_count(), 0);
}

/// A fix under the desired accuracy completes the request early.
#[tokio::test]
async fn test_one_shot_returns_accurate_fix() {
    let (backend, engine) = create_engine();

    let feeder = tokio::spawn({
        let backend = backend.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            backend.push_fix(gps_fix(HAMBURG_LAT, HAMBURG_LON, 25.0));
        }
    });

    let position = engine
        .get_location(Some(Duration::from_secs(5)), &CancellationToken::new())
        .await
        .expect("position");
    feeder.await.unwrap();

    assert!((position.latitude - HAMBURG_LAT).abs() < 1e-9);
    assert!((position.longitude - HAMBURG_LON).abs() < 1e-9);
    assert_eq!(position.accuracy, Some(25.0));
    assert_eq!(backend.registration_count(), 0);
}

/// The deadline resolves to the best fix observed so far, chosen by the
/// selection heuristic across providers.
#[tokio::test]
async fn test_one_shot_deadline_picks_best_across_providers() {
    let (backend, engine) = create_engine();

    let feeder = tokio::spawn({
        let backend = backend.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            backend.push_fix(network_fix(HAMBURG_LAT, HAMBURG_LON, 900.0));
            backend.push_fix(gps_fix(TOULOUSE_LAT, TOULOUSE_LON, 150.0));
        }
    });

    let position = engine
        .get_location(Some(Duration::from_millis(200)), &CancellationToken::new())
        .await
        .expect("position");
    feeder.await.unwrap();

    assert_eq!(position.accuracy, Some(150.0));
    assert!((position.latitude - TOULOUSE_LAT).abs() < 1e-9);
}

/// Cancelling a pending request resolves it as canceled and releases every
/// transient registration.
#[tokio::test]
async fn test_one_shot_cancellation_releases_registration() {
    let (backend, engine) = create_engine();
    let cancel = CancellationToken::new();

    let request = tokio::spawn({
        let engine = engine.clone();
        let cancel = cancel.clone();
        async move { engine.get_location(None, &cancel).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(backend.registration_count(), 1);

    cancel.cancel();
    let result = request.await.unwrap();

    assert_eq!(result, Err(GeolocationError::Canceled));
    assert_eq!(backend.registration_count(), 0);
}

/// A platform authorization failure surfaces as Unauthorized with the same
/// cleanup as any other exit.
#[tokio::test]
async fn test_one_shot_unauthorized() {
    let (backend, engine) = create_engine();
    backend.revoke_authorization();

    let result = engine
        .get_location(Some(Duration::from_secs(5)), &CancellationToken::new())
        .await;

    assert_eq!(result, Err(GeolocationError::Unauthorized));
    assert_eq!(backend.registration_count(), 0);
}

// ============================================================================
// One-Shot While Listening
// ============================================================================

/// With a session active and a position cached, the request resolves
/// immediately from the shared slot without a second registration.
#[tokio::test]
async fn test_one_shot_while_listening_uses_cached_position() {
    let (backend, engine) = create_engine();
    let mut events = engine.subscribe();

    engine
        .start_listening(Duration::from_millis(100), 0.0, ListenerSettings::default())
        .await
        .expect("start");
    backend.push_fix(gps_fix(HAMBURG_LAT, HAMBURG_LON, 10.0));
    expect_position_changed(&mut events).await;

    assert_eq!(backend.registration_count(), 1);
    let position = engine
        .get_location(None, &CancellationToken::new())
        .await
        .expect("cached position");

    assert!((position.latitude - HAMBURG_LAT).abs() < 1e-9);
    // Still only the session's registration.
    assert_eq!(backend.registration_count(), 1);

    engine.stop_listening().await;
}

/// With a session active but nothing cached yet, the request resolves on the
/// session's first accepted fix.
#[tokio::test]
async fn test_one_shot_while_listening_waits_for_first_fix() {
    let (backend, engine) = create_engine();

    engine
        .start_listening(Duration::from_millis(100), 0.0, ListenerSettings::default())
        .await
        .expect("start");

    let request = tokio::spawn({
        let engine = engine.clone();
        async move { engine.get_location(None, &CancellationToken::new()).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(backend.registration_count(), 1);
    backend.push_fix(gps_fix(TOULOUSE_LAT, TOULOUSE_LON, 10.0));

    let position = request.await.unwrap().expect("position");
    assert!((position.latitude - TOULOUSE_LAT).abs() < 1e-9);

    engine.stop_listening().await;
}

/// A session failure while waiting fails the one-shot request with the
/// session's error instead of hanging.
#[tokio::test]
async fn test_one_shot_while_listening_propagates_session_error() {
    let backend = Arc::new(SimulatedBackend::with_providers(&[("gps", true)]));
    let engine = Arc::new(Geolocator::new(backend.clone()));

    engine
        .start_listening(Duration::from_millis(100), 0.0, ListenerSettings::default())
        .await
        .expect("start");

    let request = tokio::spawn({
        let engine = engine.clone();
        async move { engine.get_location(None, &CancellationToken::new()).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    backend.set_provider_enabled(&ProviderId::gps(), false);

    let result = request.await.unwrap();
    assert_eq!(result, Err(GeolocationError::PositionUnavailable));
}

/// Cancellation on the waiting path reports canceled, not a stale value.
#[tokio::test]
async fn test_one_shot_while_listening_cancellation() {
    let (_backend, engine) = create_engine();
    let cancel = CancellationToken::new();

    engine
        .start_listening(Duration::from_millis(100), 0.0, ListenerSettings::default())
        .await
        .expect("start");

    let request = tokio::spawn({
        let engine = engine.clone();
        let cancel = cancel.clone();
        async move { engine.get_location(None, &cancel).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    assert_eq!(request.await.unwrap(), Err(GeolocationError::Canceled));
    engine.stop_listening().await;
}

// ============================================================================
// Continuous Listening
// ============================================================================

/// Accepted fixes update the shared position and fire change events.
#[tokio::test]
async fn test_listening_streams_positions() {
    let (backend, engine) = create_engine();
    let mut events = engine.subscribe();

    engine
        .start_listening(Duration::from_millis(100), 0.0, ListenerSettings::default())
        .await
        .expect("start");
    assert!(engine.is_listening());

    backend.push_fix(gps_fix(HAMBURG_LAT, HAMBURG_LON, 10.0));
    let first = expect_position_changed(&mut events).await;
    assert!((first.latitude - HAMBURG_LAT).abs() < 1e-9);

    backend.push_fix(gps_fix(TOULOUSE_LAT, TOULOUSE_LON, 8.0));
    let second = expect_position_changed(&mut events).await;
    assert!((second.latitude - TOULOUSE_LAT).abs() < 1e-9);

    let cached = engine.last_known_position().expect("cached");
    assert_eq!(cached, second);

    engine.stop_listening().await;
    assert!(!engine.is_listening());
}

/// Starting a second session while one is active is a usage error; the
/// first session keeps delivering.
#[tokio::test]
async fn test_listening_twice_is_usage_error() {
    let (backend, engine) = create_engine();
    let mut events = engine.subscribe();

    engine
        .start_listening(Duration::from_millis(100), 0.0, ListenerSettings::default())
        .await
        .expect("start");

    let second = engine
        .start_listening(Duration::from_millis(100), 0.0, ListenerSettings::default())
        .await;
    assert!(matches!(second, Err(GeolocationError::Usage(_))));

    // First session unaffected.
    assert!(engine.is_listening());
    backend.push_fix(gps_fix(HAMBURG_LAT, HAMBURG_LON, 10.0));
    expect_position_changed(&mut events).await;

    engine.stop_listening().await;
}

/// A negative minimum distance is rejected up front.
#[tokio::test]
async fn test_listening_negative_min_distance_is_usage_error() {
    let (backend, engine) = create_engine();

    let result = engine
        .start_listening(Duration::from_millis(100), -1.0, ListenerSettings::default())
        .await;

    assert!(matches!(result, Err(GeolocationError::Usage(_))));
    assert!(!engine.is_listening());
    assert_eq!(backend.registration_count(), 0);
}

/// Stopping while not listening is a no-op: no error, no events, no state
/// change.
#[tokio::test]
async fn test_stop_listening_is_idempotent() {
    let (_backend, engine) = create_engine();
    let mut events = engine.subscribe();

    engine.stop_listening().await;
    assert!(!engine.is_listening());
    expect_no_event(&mut events).await;

    engine
        .start_listening(Duration::from_millis(100), 0.0, ListenerSettings::default())
        .await
        .expect("start");
    engine.stop_listening().await;
    engine.stop_listening().await;
    assert!(!engine.is_listening());
}

/// When the last enabled provider disables, the session auto-stops and
/// emits exactly one error; no change events follow until restarted.
#[tokio::test]
async fn test_listening_auto_stops_when_last_provider_disables() {
    let backend = Arc::new(SimulatedBackend::with_providers(&[("gps", true)]));
    let engine = Geolocator::new(backend.clone());
    let mut events = engine.subscribe();

    engine
        .start_listening(Duration::from_millis(100), 0.0, ListenerSettings::default())
        .await
        .expect("start");
    backend.push_fix(gps_fix(HAMBURG_LAT, HAMBURG_LON, 10.0));
    expect_position_changed(&mut events).await;

    backend.set_provider_enabled(&ProviderId::gps(), false);

    let error = expect_position_error(&mut events).await;
    assert_eq!(error, GeolocationError::PositionUnavailable);
    assert!(!engine.is_listening());
    assert_eq!(backend.registration_count(), 0);

    // Fixes after the auto-stop reach no one.
    backend.set_provider_enabled(&ProviderId::gps(), true);
    backend.push_fix(gps_fix(TOULOUSE_LAT, TOULOUSE_LON, 10.0));
    expect_no_event(&mut events).await;
}

/// Disabling one of two providers keeps the session alive; re-enabling
/// rejoins it without a restart.
#[tokio::test]
async fn test_listening_survives_partial_provider_loss() {
    let (backend, engine) = create_engine();
    let mut events = engine.subscribe();

    engine
        .start_listening(Duration::from_millis(100), 0.0, ListenerSettings::default())
        .await
        .expect("start");

    backend.set_provider_enabled(&ProviderId::network(), false);
    backend.push_fix(gps_fix(HAMBURG_LAT, HAMBURG_LON, 10.0));
    expect_position_changed(&mut events).await;
    assert!(engine.is_listening());

    backend.set_provider_enabled(&ProviderId::network(), true);
    backend.set_provider_enabled(&ProviderId::gps(), false);
    // Network carries the session alone now; still no failure.
    assert!(engine.is_listening());
    backend.push_fix(network_fix(TOULOUSE_LAT, TOULOUSE_LON, 5.0));
    expect_position_changed(&mut events).await;

    engine.stop_listening().await;
}

/// A rapid switch to a less accurate provider is suppressed by dampening.
#[tokio::test]
async fn test_listening_dampens_rapid_provider_oscillation() {
    let (backend, engine) = create_engine();
    let mut events = engine.subscribe();

    engine
        .start_listening(Duration::from_secs(10), 0.0, ListenerSettings::default())
        .await
        .expect("start");

    backend.push_fix(network_fix(HAMBURG_LAT, HAMBURG_LON, 50.0));
    expect_position_changed(&mut events).await;

    // Less accurate reading from the other provider, far inside the
    // 2x-interval window: dropped before selection.
    backend.push_fix(gps_fix(TOULOUSE_LAT, TOULOUSE_LON, 200.0));
    expect_no_event(&mut events).await;

    // A more accurate reading switches immediately.
    backend.push_fix(gps_fix(TOULOUSE_LAT, TOULOUSE_LON, 5.0));
    expect_position_changed(&mut events).await;

    engine.stop_listening().await;
}

/// Registration refused by the platform surfaces as Unauthorized and no
/// session starts.
#[tokio::test]
async fn test_listening_unauthorized_at_registration() {
    let (backend, engine) = create_engine();
    backend.revoke_authorization();

    let result = engine
        .start_listening(Duration::from_millis(100), 0.0, ListenerSettings::default())
        .await;

    assert_eq!(result, Err(GeolocationError::Unauthorized));
    assert!(!engine.is_listening());
}

/// Authorization revoked mid-session is terminal: auto-stop, then a single
/// Unauthorized error event.
#[tokio::test]
async fn test_listening_auto_stops_on_revoked_authorization() {
    let (backend, engine) = create_engine();
    let mut events = engine.subscribe();

    engine
        .start_listening(Duration::from_millis(100), 0.0, ListenerSettings::default())
        .await
        .expect("start");

    backend.revoke_authorization();

    let error = expect_position_error(&mut events).await;
    assert_eq!(error, GeolocationError::Unauthorized);
    assert!(!engine.is_listening());
    assert_eq!(backend.registration_count(), 0);
}

// ============================================================================
// Single-Manager Backend
// ============================================================================

/// The single-manager variant drives the same engine: anonymous fixes flow
/// through, and heading updates merge into the retained reading.
#[tokio::test]
async fn test_single_manager_heading_merge() {
    let backend = Arc::new(SingleManagerBackend::new());
    let engine = Geolocator::new(backend.clone());
    let mut events = engine.subscribe();

    assert!(engine.is_geolocation_available());
    assert!(engine.is_geolocation_enabled());

    engine
        .start_listening(Duration::from_millis(100), 0.0, ListenerSettings::default())
        .await
        .expect("start");

    backend.push_fix(
        Fix::new(None, 48.856614, 2.352222, Utc::now())
            .with_accuracy(5.0)
            .with_altitude(35.0)
            .with_speed(1.5),
    );
    let first = expect_position_changed(&mut events).await;
    assert!(first.heading.is_none());

    backend.push_heading(270.0);
    let merged = expect_position_changed(&mut events).await;

    assert_eq!(merged.heading, Some(270.0));
    assert_eq!(merged.latitude, first.latitude);
    assert_eq!(merged.longitude, first.longitude);
    assert_eq!(merged.altitude, first.altitude);
    assert_eq!(merged.speed, first.speed);

    engine.stop_listening().await;
}

/// Disabling location services strands the single-manager session like any
/// other provider loss.
#[tokio::test]
async fn test_single_manager_service_switch_auto_stops() {
    let backend = Arc::new(SingleManagerBackend::new());
    let engine = Geolocator::new(backend.clone());
    let mut events = engine.subscribe();

    engine
        .start_listening(Duration::from_millis(100), 0.0, ListenerSettings::default())
        .await
        .expect("start");

    backend.set_services_enabled(false);

    let error = expect_position_error(&mut events).await;
    assert_eq!(error, GeolocationError::PositionUnavailable);
    assert!(!engine.is_listening());
}

// ============================================================================
// Position Round Trip
// ============================================================================

/// A position produced by the engine survives copy-then-patch with every
/// non-overwritten field intact.
#[tokio::test]
async fn test_engine_position_copy_then_patch() {
    let (backend, engine) = create_engine();
    let mut events = engine.subscribe();

    engine
        .start_listening(Duration::from_millis(100), 0.0, ListenerSettings::default())
        .await
        .expect("start");
    backend.push_fix(
        gps_fix(HAMBURG_LAT, HAMBURG_LON, 10.0)
            .with_altitude(16.0)
            .with_speed(2.0)
            .with_heading(45.0),
    );
    let position = expect_position_changed(&mut events).await;

    let mut patched = Position::from_previous(&position);
    patched.heading = Some(90.0);

    assert_eq!(patched.timestamp, position.timestamp);
    assert_eq!(patched.latitude, position.latitude);
    assert_eq!(patched.longitude, position.longitude);
    assert_eq!(patched.altitude, position.altitude);
    assert_eq!(patched.accuracy, position.accuracy);
    assert_eq!(patched.speed, position.speed);
    assert_eq!(patched.heading, Some(90.0));

    engine.stop_listening().await;
}
