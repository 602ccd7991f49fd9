//! Sliding-window rate limiting.

use std::collections::{HashMap, VecDeque};

/// Sliding one-second window over event timestamps.
///
/// Timestamps are injected (seconds on the local clock) so limits are
/// deterministic under test.
pub struct RateLimiter {
    limit: u32,
    window_secs: f64,
    events: VecDeque<f64>,
}

impl RateLimiter {
    /// Limit to `limit` events per `window_secs`.
    #[must_use]
    pub fn new(limit: u32, window_secs: f64) -> Self {
        Self {
            limit,
            window_secs,
            events: VecDeque::new(),
        }
    }

    /// Limit to `limit` events per second.
    #[must_use]
    pub fn per_second(limit: u32) -> Self {
        Self::new(limit, 1.0)
    }

    /// Try to record an event at `t`; `false` means the limit is exceeded
    /// and the event must be refused.
    pub fn try_acquire(&mut self, t: f64) -> bool {
        while let Some(&oldest) = self.events.front() {
            if t - oldest >= self.window_secs {
                self.events.pop_front();
            } else {
                break;
            }
        }

        if self.events.len() >= self.limit as usize {
            return false;
        }
        self.events.push_back(t);
        true
    }

    /// The configured limit.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }
}

/// Caps concurrent sessions per source address.
pub struct AddressLimiter {
    per_address: u32,
    active: HashMap<String, u32>,
}

impl AddressLimiter {
    /// Allow up to `per_address` live sessions per source.
    #[must_use]
    pub fn new(per_address: u32) -> Self {
        Self {
            per_address,
            active: HashMap::new(),
        }
    }

    /// Register a new session from `address`; `false` refuses it.
    pub fn try_register(&mut self, address: &str) -> bool {
        let count = self.active.entry(address.to_string()).or_insert(0);
        if *count >= self.per_address {
            return false;
        }
        *count += 1;
        true
    }

    /// Release a session slot for `address`.
    pub fn release(&mut self, address: &str) {
        if let Some(count) = self.active.get_mut(address) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.active.remove(address);
            }
        }
    }

    /// Live sessions currently registered for `address`.
    #[must_use]
    pub fn active_for(&self, address: &str) -> u32 {
        self.active.get(address).copied().unwrap_or(0)
    }
}
