// ── Exponential backoff schedule ──
//
// Deterministic, capped delay sequence shared by every fetch loop:
// `delay(i) = min(scale * 2^i, cap)`. The iteration counter advances
// once per unanswered attempt and resets on success or supersession.

use std::time::Duration;

/// Parameters of one backoff schedule.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the second attempt (`delay(0)`).
    pub scale: Duration,

    /// Upper bound on any single delay.
    pub cap: Duration,

    /// Number of distinct exponent steps; beyond this the sequence
    /// stays flat. `None` leaves the exponent unbounded (the cap still
    /// clamps the delay).
    pub steps: Option<u32>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            scale: Duration::from_secs(1),
            cap: Duration::from_secs(30),
            steps: None,
        }
    }
}

/// A capped exponential retry-delay schedule with an attempt counter.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
    iteration: u32,
}

impl ExponentialBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            iteration: 0,
        }
    }

    /// The delay the schedule assigns to attempt `iteration`.
    pub fn delay_at(&self, iteration: u32) -> Duration {
        let last_step = self
            .config
            .steps
            .map_or(u32::MAX, |steps| steps.saturating_sub(1));
        // 2^63 ms already dwarfs any sane cap; clamping the exponent
        // keeps the shift defined.
        let exponent = iteration.min(last_step).min(62);

        let scale_ms = u64::try_from(self.config.scale.as_millis()).unwrap_or(u64::MAX);
        let cap_ms = u64::try_from(self.config.cap.as_millis()).unwrap_or(u64::MAX);
        let raw = scale_ms.saturating_mul(1_u64 << exponent);

        Duration::from_millis(raw.min(cap_ms))
    }

    /// The delay for the current attempt; advances the counter.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay_at(self.iteration);
        self.iteration = self.iteration.saturating_add(1);
        delay
    }

    /// Attempts made since the last reset.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Zero the attempt counter (on success or explicit supersession).
    pub fn reset(&mut self) {
        self.iteration = 0;
    }
}
