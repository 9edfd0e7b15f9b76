use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::au::Au;

use super::{Rate, RateLimiter};

static GLOBAL_POOL: OnceLock<RateLimiterPool> = OnceLock::new();

/// Registry of shared rate limiters keyed by pacing source
#[derive(Debug, Default)]
pub struct RateLimiterPool {
    limiters: Mutex<HashMap<String, RateLimiter>>,
}

impl RateLimiterPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide pool
    pub fn global() -> &'static RateLimiterPool {
        GLOBAL_POOL.get_or_init(RateLimiterPool::new)
    }

    /// The limiter `au` should pace under, created with the AU's rate
    ///  if nobody holds its key yet
    pub fn acquire(&self, au: &Au) -> RateLimiter {
        let key = au.rate_limiter_source().key_for(au);
        self.acquire_key(&key, au.fetch_rate())
    }

    pub fn acquire_key(&self, key: &str, rate: Rate) -> RateLimiter {
        let mut limiters = self.limiters.lock();
        limiters
            .entry(key.to_string())
            .or_insert_with(|| {
                tracing::debug!("Creating rate limiter {} at {}", key, rate);
                RateLimiter::new(key, rate)
            })
            .clone()
    }

    /// Apply the AU's current rate to its shared limiter, visible to
    ///  every holder of the key
    pub fn reconfigure(&self, au: &Au) -> RateLimiter {
        let limiter = self.acquire(au);
        limiter.set_rate(au.fetch_rate());
        limiter
    }

    pub fn get(&self, key: &str) -> Option<RateLimiter> {
        self.limiters.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.limiters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.lock().is_empty()
    }
}
