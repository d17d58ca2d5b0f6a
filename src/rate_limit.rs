use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

// Outcome of a rate limit lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Denied { retry_after: DateTime<Utc> },
}

/// One dispense per address per window.
///
/// `check` never writes. The caller records an address only after its
/// transfer succeeded, so a failed transfer does not burn the window.
/// Callers that may race on the same address hold `lock` across
/// check, transfer and record.
pub struct RateLimiter {
    last_dispense: DashMap<String, DateTime<Utc>>, // address -> last successful dispense
    in_flight: DashMap<String, Arc<Mutex<()>>>,    // address -> serialization lock
    window: Duration,
    window_delta: TimeDelta,
}

impl RateLimiter {
    pub fn new(window: Duration) -> Self {
        let window_delta = TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX);
        Self {
            last_dispense: DashMap::new(),
            in_flight: DashMap::new(),
            window,
            window_delta,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn check(&self, address: &str, now: DateTime<Utc>) -> RateLimitDecision {
        match self.last_dispense.get(address) {
            Some(last) if now.signed_duration_since(*last) < self.window_delta => {
                RateLimitDecision::Denied {
                    retry_after: last
                        .checked_add_signed(self.window_delta)
                        .unwrap_or(DateTime::<Utc>::MAX_UTC),
                }
            }
            _ => RateLimitDecision::Allowed,
        }
    }

    pub fn record(&self, address: &str, at: DateTime<Utc>) {
        self.last_dispense.insert(address.to_string(), at);
    }

    pub fn last_dispense(&self, address: &str) -> Option<DateTime<Utc>> {
        self.last_dispense.get(address).map(|entry| *entry)
    }

    // Serialize all work for one address
    pub async fn lock(&self, address: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .in_flight
            .entry(address.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Drop records whose window has elapsed and locks nobody is holding.
    /// Returns the number of records removed.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let before = self.last_dispense.len();
        self.last_dispense
            .retain(|_, last| now.signed_duration_since(*last) < self.window_delta);
        self.in_flight.retain(|_, lock| Arc::strong_count(lock) > 1);

        let removed = before.saturating_sub(self.last_dispense.len());
        if removed > 0 {
            debug!(removed, remaining = self.last_dispense.len(), "Pruned rate limit records");
        }
        removed
    }

    pub fn tracked(&self) -> usize {
        self.last_dispense.len()
    }
}
