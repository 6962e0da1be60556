//! # Token Refresh Policy
//!
//! Decides when a stored access token must be refreshed before use.
//!
//! ```text
//!   now                                   expires_at
//!    │◄──────────────── remaining ──────────────►│
//!    │                             │◄─ buffer ──►│
//!
//!   RemainingFraction:  buffer = fraction × remaining   (recomputed per call)
//!   FixedMargin:        buffer = margin_secs
//!
//!   refresh  ⇔  remaining < buffer  ∨  expires_at < now
//! ```
//!
//! With `RemainingFraction` the buffer shrinks together with the remaining
//! lifetime, so in practice only an expired token is refreshed. The default
//! keeps that behavior; `FixedMargin` refreshes ahead of expiry.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default share of the remaining lifetime used as the refresh buffer.
pub const DEFAULT_REFRESH_FRACTION: f64 = 0.2;

/// Largest accepted fixed margin: one year.
pub const MAX_REFRESH_MARGIN_SECS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Buffer is a fraction of the lifetime remaining at call time.
    RemainingFraction {
        #[serde(default = "default_fraction")]
        fraction: f64,
    },
    /// Buffer is a constant number of seconds.
    FixedMargin { margin_secs: i64 },
}

fn default_fraction() -> f64 {
    DEFAULT_REFRESH_FRACTION
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        RefreshPolicy::RemainingFraction {
            fraction: DEFAULT_REFRESH_FRACTION,
        }
    }
}

impl RefreshPolicy {
    /// Buffer applied when `remaining` lifetime is left.
    pub fn buffer(&self, remaining: Duration) -> Duration {
        match self {
            RefreshPolicy::RemainingFraction { fraction } => {
                let millis = remaining.num_milliseconds() as f64 * fraction;
                Duration::milliseconds(millis as i64)
            }
            RefreshPolicy::FixedMargin { margin_secs } => {
                Duration::seconds((*margin_secs).clamp(0, MAX_REFRESH_MARGIN_SECS))
            }
        }
    }

    /// Returns true when a token expiring at `expires_at` must be refreshed
    /// before use at `now`.
    pub fn needs_refresh(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let remaining = expires_at - now;
        remaining < self.buffer(remaining) || expires_at < now
    }

    /// Rejects fractions outside [0, 1] and margins outside
    /// [0, `MAX_REFRESH_MARGIN_SECS`].
    pub fn is_valid(&self) -> bool {
        match self {
            RefreshPolicy::RemainingFraction { fraction } => (0.0..=1.0).contains(fraction),
            RefreshPolicy::FixedMargin { margin_secs } => {
                (0..=MAX_REFRESH_MARGIN_SECS).contains(margin_secs)
            }
        }
    }
}
