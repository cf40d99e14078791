// ── Synchronization tuning ──
//
// The numeric parameters of the fetch loops live here rather than at
// their use sites. The invalidated-retry ceiling is observable UI
// behavior (how long a voucher redemption keeps polling before giving
// up) and must not be changed casually.

use std::time::Duration;

use veil_sync::BackoffConfig;

/// Tuning for the service-side caches.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Backoff for account-expiry fetches: unbounded steps, capped at
    /// two hours.
    pub expiry_backoff: BackoffConfig,

    /// Backoff for location fetches: 50 ms scale, 30 minute cap, 17
    /// steps (the sequence plateaus exactly at the cap).
    pub location_backoff: BackoffConfig,

    /// How many fetch attempts an invalidated expiry is retried before
    /// the fetched value is accepted even if unchanged. Bounds the
    /// wait on an eventually-consistent backend.
    pub invalidated_retry_ceiling: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            expiry_backoff: BackoffConfig {
                scale: Duration::from_secs(1),
                cap: Duration::from_secs(2 * 60 * 60),
                steps: None,
            },
            location_backoff: BackoffConfig {
                scale: Duration::from_millis(50),
                cap: Duration::from_secs(30 * 60),
                steps: Some(17),
            },
            invalidated_retry_ceiling: 7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_backoff_plateaus_at_the_cap() {
        let config = SyncConfig::default();
        let backoff = veil_sync::ExponentialBackoff::new(config.location_backoff);

        assert_eq!(backoff.delay_at(0), Duration::from_millis(50));
        assert_eq!(backoff.delay_at(16), Duration::from_secs(30 * 60));
    }
}
