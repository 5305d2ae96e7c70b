//! Per-user admission control via token buckets.
//!
//! Each user gets a bucket of `max_tokens`. A request costs one token;
//! tokens trickle back at `refill_rate` per second (whole tokens only —
//! the refill is floored). An empty bucket rejects the request without
//! touching any other engine state.


use std::collections::HashMap;
use std::time::Instant;

use thiserror::Error;
use tracing::trace;

/// Admission rejection.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("user {user:?} is out of tokens")]
pub struct AdmissionDenied {
    /// The throttled user.
    pub user: String,
}

/// One user's bucket state.
#[derive(Debug)]
struct TokenBucket {
    current_tokens: u64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(max_tokens: u64) -> Self {
        Self {
            current_tokens: max_tokens,
            last_refill: Instant::now(),
        }
    }

    /// Refill from elapsed time, then try to take one token.
    fn try_take(&mut self, max_tokens: u64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        let refill = (elapsed * refill_rate).floor() as u64;
        if refill > 0 {
            self.current_tokens = (self.current_tokens + refill).min(max_tokens);
            self.last_refill = now;
        }

        if self.current_tokens < 1 {
            return false;
        }
        self.current_tokens -= 1;
        true
    }
}

/// Token buckets keyed by user name.
#[derive(Debug)]
pub struct UserLimiter {
    buckets: HashMap<String, TokenBucket>,
    max_tokens: u64,
    refill_rate: f64,
}

impl UserLimiter {
    /// Create a limiter with the configured bucket parameters.
    pub fn new(max_tokens: u64, refill_rate: f64) -> Self {
        Self {
            buckets: HashMap::new(),
            max_tokens,
            refill_rate,
        }
    }

    /// Charge one token to `user`, creating a full bucket on first
    /// sight.
    pub fn check(&mut self, user: &str) -> Result<(), AdmissionDenied> {
        let bucket = self
            .buckets
            .entry(user.to_string())
            .or_insert_with(|| TokenBucket::new(self.max_tokens));

        if bucket.try_take(self.max_tokens, self.refill_rate) {
            trace!(user, remaining = bucket.current_tokens, "admission granted");
            Ok(())
        } else {
            trace!(user, "admission denied");
            Err(AdmissionDenied {
                user: user.to_string(),
            })
        }
    }

    /// Number of users with a bucket.
    pub fn tracked_users(&self) -> usize {
        self.buckets.len()
    }
}
