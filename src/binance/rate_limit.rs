// =============================================================================
// Rate-Limit Tracker — monitors Binance request weight to avoid 429s
// =============================================================================
//
// Binance allows 6000 request weight per minute per IP on the spot REST API;
// we hard-cap ourselves well below that so a long audit never trips an IP ban.
//
// The tracker reads the `X-MBX-USED-WEIGHT-1M` response header after every
// request and keeps an atomic counter that any task may query lock-free.
// A reading older than one minute belongs to an expired window and counts
// as zero.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use tracing::{debug, warn};

/// Hard ceiling at which we refuse to send additional requests.
const WEIGHT_HARD_LIMIT: u32 = 5000;
/// Soft warning threshold.
const WEIGHT_WARN_THRESHOLD: u32 = 4000;
/// Length of the Binance weight window.
const WINDOW_MS: i64 = 60_000;

/// Thread-safe request-weight tracker backed by an atomic counter.
pub struct RateLimitTracker {
    used_weight_1m: AtomicU32,
    updated_at_ms: AtomicI64,
}

/// Immutable snapshot of the current rate-limit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub used_weight_1m: u32,
    pub hard_limit: u32,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self {
            used_weight_1m: AtomicU32::new(0),
            updated_at_ms: AtomicI64::new(0),
        }
    }

    /// Update the weight counter from Binance response headers.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        self.update_from_headers_at(headers, chrono::Utc::now().timestamp_millis());
    }

    fn update_from_headers_at(&self, headers: &reqwest::header::HeaderMap, now_ms: i64) {
        let Some(w) = headers
            .get("X-MBX-USED-WEIGHT-1M")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok())
        else {
            return;
        };

        let prev = self.used_weight_1m.swap(w, Ordering::Relaxed);
        self.updated_at_ms.store(now_ms, Ordering::Relaxed);
        if w >= WEIGHT_WARN_THRESHOLD && prev < WEIGHT_WARN_THRESHOLD {
            warn!(
                used_weight = w,
                hard_limit = WEIGHT_HARD_LIMIT,
                "rate-limit weight crossed warning threshold"
            );
        }
        debug!(used_weight_1m = w, "rate-limit weight updated from header");
    }

    /// `true` if `weight` more request weight stays under the hard limit.
    pub fn can_send_request(&self, weight: u32) -> bool {
        self.can_send_request_at(weight, chrono::Utc::now().timestamp_millis())
    }

    fn can_send_request_at(&self, weight: u32, now_ms: i64) -> bool {
        let current = self.used_weight_at(now_ms);
        let allowed = current.saturating_add(weight) <= WEIGHT_HARD_LIMIT;
        if !allowed {
            warn!(
                current_weight = current,
                requested_weight = weight,
                hard_limit = WEIGHT_HARD_LIMIT,
                "request blocked — would exceed rate-limit"
            );
        }
        allowed
    }

    /// Last reported weight, or 0 once its window has expired.
    fn used_weight_at(&self, now_ms: i64) -> u32 {
        if now_ms - self.updated_at_ms.load(Ordering::Relaxed) >= WINDOW_MS {
            0
        } else {
            self.used_weight_1m.load(Ordering::Relaxed)
        }
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        RateLimitSnapshot {
            used_weight_1m: self.used_weight_at(chrono::Utc::now().timestamp_millis()),
            hard_limit: WEIGHT_HARD_LIMIT,
        }
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitTracker")
            .field("used_weight_1m", &self.used_weight_1m.load(Ordering::Relaxed))
            .finish()
    }
}
