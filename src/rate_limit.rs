//! Per-identity token buckets for abuse-prone endpoints.
//!
//! One map holds a bucket per (policy, identity) pair behind a single lock.
//! Buckets idle for longer than the sweep threshold are evicted by a
//! background task, which also resets their burst allowance.

use crate::periodic::{self, PeriodicHandle};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

pub type SweeperHandle = PeriodicHandle;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
pub const IDLE_EVICTION: Duration = Duration::from_secs(3 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub name: &'static str,
    pub burst: u32,
    /// One token is added back per interval.
    pub refill_every: Duration,
}

impl RateLimitPolicy {
    pub const LOGIN_FINISH: Self = Self {
        name: "webauthn_login",
        burst: 5,
        refill_every: Duration::from_secs(10),
    };
    pub const TOKEN: Self = Self {
        name: "oidc_token",
        burst: 10,
        refill_every: Duration::from_secs(6),
    };
    pub const ONE_TIME_TOKEN: Self = Self {
        name: "one_time_token",
        burst: 5,
        refill_every: Duration::from_secs(10),
    };

    fn tokens_per_second(self) -> f64 {
        1.0 / self.refill_every.as_secs_f64()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl Bucket {
    fn new(policy: RateLimitPolicy, now: Instant) -> Self {
        Self {
            tokens: f64::from(policy.burst),
            last_refill: now,
            last_seen: now,
        }
    }

    fn take(&mut self, policy: RateLimitPolicy, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens =
            (self.tokens + elapsed * policy.tokens_per_second()).min(f64::from(policy.burst));
        self.last_refill = now;
        self.last_seen = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<(&'static str, String), Bucket>>,
    disabled: bool,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A limiter that admits everything, for test deployments.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    /// Admission check for a client address. Loopback callers are never limited.
    pub fn check_ip(&self, ip: IpAddr, policy: RateLimitPolicy) -> RateLimitDecision {
        if ip.is_loopback() || ip.to_canonical().is_loopback() {
            return RateLimitDecision::Allowed;
        }
        self.check(&ip.to_canonical().to_string(), policy)
    }

    pub fn check(&self, identity: &str, policy: RateLimitPolicy) -> RateLimitDecision {
        self.check_at(identity, policy, Instant::now())
    }

    fn check_at(&self, identity: &str, policy: RateLimitPolicy, now: Instant) -> RateLimitDecision {
        if self.disabled {
            return RateLimitDecision::Allowed;
        }
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let bucket = buckets
            .entry((policy.name, identity.to_string()))
            .or_insert_with(|| Bucket::new(policy, now));
        if bucket.take(policy, now) {
            RateLimitDecision::Allowed
        } else {
            debug!(policy = policy.name, "Rate limit exceeded");
            RateLimitDecision::Limited
        }
    }

    /// Drop buckets not seen for longer than `idle`. Returns how many were removed.
    pub fn sweep(&self, idle: Duration) -> usize {
        self.sweep_at(idle, Instant::now())
    }

    fn sweep_at(&self, idle: Duration, now: Instant) -> usize {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let before = buckets.len();
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) <= idle);
        before - buckets.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run [`RateLimiter::sweep`] every `interval` until the handle is shut
    /// down or dropped.
    #[must_use]
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration, idle: Duration) -> SweeperHandle {
        let limiter = Arc::clone(self);
        periodic::spawn(interval, move || {
            let evicted = limiter.sweep(idle);
            if evicted > 0 {
                debug!(evicted, "Evicted idle rate limit buckets");
            }
            std::future::ready(())
        })
    }
}
