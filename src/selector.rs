//! Best-fix selection heuristic.
//!
//! [`is_better_fix`] decides whether a candidate reading should replace the
//! current best one. The decision combines recency, accuracy, and provider
//! continuity, in that order:
//!
//! 1. Anything beats no reading at all.
//! 2. A reading more than two minutes newer always wins; more than two
//!    minutes older always loses.
//! 3. Within that window, better accuracy wins.
//! 4. A newer reading wins if it is not less accurate, or if it is only
//!    somewhat less accurate (within 200 m) and comes from the same
//!    provider.
//!
//! The ordering of the rules is policy: recency overrides accuracy only
//! beyond the significance window, and provider continuity only rescues a
//! moderate accuracy loss. The two-minute and 200-meter constants are tuned
//! values; treat them as configuration, not as derived quantities.

use crate::backend::{Fix, ProviderId};

/// Time delta beyond which recency alone decides, in milliseconds.
pub const SIGNIFICANT_TIME_DELTA_MS: i64 = 2 * 60 * 1000;

/// Accuracy loss beyond which provider continuity no longer rescues a newer
/// fix, in meters.
pub const SIGNIFICANT_ACCURACY_DELTA_METERS: f64 = 200.0;

/// Returns true if `candidate` should replace `current`.
///
/// Pure and deterministic: the same pair of fixes always yields the same
/// answer.
pub fn is_better_fix(candidate: &Fix, current: Option<&Fix>) -> bool {
    let Some(current) = current else {
        return true;
    };

    let time_delta_ms = candidate
        .timestamp
        .signed_duration_since(current.timestamp)
        .num_milliseconds();
    let significantly_newer = time_delta_ms > SIGNIFICANT_TIME_DELTA_MS;
    let significantly_older = time_delta_ms < -SIGNIFICANT_TIME_DELTA_MS;
    let newer = time_delta_ms > 0;

    if significantly_newer {
        return true;
    }
    if significantly_older {
        return false;
    }

    let accuracy_delta = candidate.accuracy_meters() - current.accuracy_meters();
    let more_accurate = accuracy_delta < 0.0;
    let less_accurate = accuracy_delta > 0.0;
    let much_less_accurate = accuracy_delta > SIGNIFICANT_ACCURACY_DELTA_METERS;

    let same_provider = is_same_provider(candidate.provider.as_ref(), current.provider.as_ref());

    if more_accurate {
        return true;
    }
    if newer && !less_accurate {
        return true;
    }
    if newer && !much_less_accurate && same_provider {
        return true;
    }

    false
}

/// Provider equality with an absent id equal only to another absent id.
fn is_same_provider(a: Option<&ProviderId>, b: Option<&ProviderId>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
