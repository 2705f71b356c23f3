//! Per-client fixed-window rate limiting.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Above this many tracked clients, expired records are pruned on the next check.
const PRUNE_THRESHOLD: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug, Clone, Copy)]
struct RateRecord {
    count: u32,
    window_reset_at: Instant,
}

/// A fixed budget of requests per client per window. The whole window resets
/// at once rather than sliding.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    records: Mutex<HashMap<IpAddr, RateRecord>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, client: IpAddr) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: IpAddr, now: Instant) -> RateDecision {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if records.len() > PRUNE_THRESHOLD {
            records.retain(|_, r| now < r.window_reset_at);
        }

        let record = records.entry(client).or_insert(RateRecord {
            count: 0,
            window_reset_at: now + self.window,
        });
        if now >= record.window_reset_at {
            record.count = 0;
            record.window_reset_at = now + self.window;
        }

        if record.count >= self.max_requests {
            RateDecision::Limited {
                retry_after: record.window_reset_at.saturating_duration_since(now),
            }
        } else {
            record.count += 1;
            RateDecision::Allowed {
                remaining: self.max_requests - record.count,
            }
        }
    }

    pub fn tracked_clients(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
