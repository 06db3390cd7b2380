//! Dispatch rate limiting for geocoding requests.
//!
//! Public geocoders (Nominatim) allow one request per second. The limiter spaces out
//! when requests START. A waiting caller holds no reservation: it claims a slot only
//! when it wakes and the slot is free, so a caller that gives up leaves no gap behind.

use log::debug;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default spacing between geocoding dispatches
pub const DEFAULT_DISPATCH_INTERVAL: Duration = Duration::from_millis(1100);

/// Dispatch rate limiter - spaces out when requests START.
///
/// Shared by every search of a planner, so back-to-back searches respect the provider
/// limit as well as the two calls inside one search.
#[derive(Debug)]
pub struct DispatchRateLimiter {
    interval: Duration,
    /// `None` until the first dispatch
    last_dispatch: Mutex<Option<Instant>>,
    dispatched_count: AtomicU32,
}

impl DispatchRateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_dispatch: Mutex::new(None),
            dispatched_count: AtomicU32::new(0),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of slots handed out so far.
    pub fn dispatched(&self) -> u32 {
        self.dispatched_count.load(Ordering::Relaxed)
    }

    /// Wait for our dispatch slot, at least `interval` after the previous one.
    /// Returns the dispatch number (1-based).
    pub async fn wait_for_dispatch_slot(&self) -> u32 {
        loop {
            if let Some(num) = self.wait_for_dispatch_slot_while(|| true).await {
                return num;
            }
        }
    }

    /// Like [`wait_for_dispatch_slot`](Self::wait_for_dispatch_slot), but `proceed` is
    /// checked right before a slot is claimed. Returns `None` without claiming once it
    /// says no.
    pub async fn wait_for_dispatch_slot_while<F>(&self, mut proceed: F) -> Option<u32>
    where
        F: FnMut() -> bool,
    {
        loop {
            let wait_duration = {
                let mut last = self.last_dispatch.lock().await;
                if !proceed() {
                    debug!("[RateLimiter] Caller withdrew before dispatch");
                    return None;
                }

                let now = Instant::now();
                match *last {
                    Some(prev) if prev + self.interval > now => prev + self.interval - now,
                    _ => {
                        *last = Some(now);
                        return Some(self.dispatched_count.fetch_add(1, Ordering::Relaxed) + 1);
                    }
                }
            };

            // Wait outside the lock, then compete for the slot again
            debug!("[RateLimiter] Waiting {:?} for slot", wait_duration);
            tokio::time::sleep(wait_duration).await;
        }
    }
}

impl Default for DispatchRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_DISPATCH_INTERVAL)
    }
}
