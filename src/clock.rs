//! Monotonic time source and per-sensor output-rate limiting

/// Monotonic microsecond clock
///
/// On the RP2040 this is the 64-bit system timer; tests drive it by hand.
pub trait Clock {
    /// Microseconds since an arbitrary fixed origin; never decreases
    fn now_us(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}

/// Minimum-interval gate for sensor updates
///
/// A sensor configured for `rate_hz` must not be read more often than once per
/// `1_000_000 / rate_hz` microseconds. The gate only advances when the caller
/// reports a successful update, so a failed bus read is retried on the next
/// poll instead of waiting out a full period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleTimer {
    period_us: u64,
    last_update_us: Option<u64>,
}

impl SampleTimer {
    /// Create a gate for the given output data rate
    ///
    /// A rate of zero disables the gate (every poll is due).
    #[must_use]
    pub const fn from_rate_hz(rate_hz: u32) -> Self {
        let period_us = if rate_hz == 0 {
            0
        } else {
            1_000_000 / rate_hz as u64
        };
        Self {
            period_us,
            last_update_us: None,
        }
    }

    /// Minimum interval between updates in microseconds
    #[must_use]
    pub const fn period_us(&self) -> u64 {
        self.period_us
    }

    /// Whether a new update may be performed at `now_us`
    #[must_use]
    pub const fn is_due(&self, now_us: u64) -> bool {
        match self.last_update_us {
            None => true,
            Some(last) => now_us.saturating_sub(last) >= self.period_us,
        }
    }

    /// Record a successful update at `now_us`
    pub fn mark(&mut self, now_us: u64) {
        self.last_update_us = Some(now_us);
    }

    /// Forget the last update so the next poll is due immediately
    pub fn reset(&mut self) {
        self.last_update_us = None;
    }
}
