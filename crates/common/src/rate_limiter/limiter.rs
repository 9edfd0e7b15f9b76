use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::Rate;

struct LimiterState {
    rate: Rate,
    // timestamps of the most recent events, oldest first,
    //  never more than the rate's event count
    events: VecDeque<Instant>,
}

impl LimiterState {
    fn time_until_ok(&self, now: Instant) -> Duration {
        match self.rate {
            Rate::Unlimited => Duration::ZERO,
            Rate::Limited { events, interval } => {
                if self.events.len() < events as usize {
                    return Duration::ZERO;
                }
                match self.events.front() {
                    Some(oldest) => (*oldest + interval).saturating_duration_since(now),
                    None => Duration::ZERO,
                }
            }
        }
    }

    fn trim(&mut self) {
        let keep = match self.rate {
            Rate::Unlimited => 0,
            Rate::Limited { events, .. } => events as usize,
        };
        while self.events.len() > keep {
            self.events.pop_front();
        }
    }
}

struct RateLimiterInner {
    name: String,
    state: Mutex<LimiterState>,
    // fair async mutex: waiters in pace() are admitted in arrival order
    gate: tokio::sync::Mutex<()>,
}

/// A named sliding-window gate, cheap to clone and shared by
///  every holder of the same pool key
#[derive(Clone)]
pub struct RateLimiter(Arc<RateLimiterInner>);

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.0.name)
            .field("rate", &self.rate())
            .finish()
    }
}

impl RateLimiter {
    pub fn new(name: impl Into<String>, rate: Rate) -> Self {
        Self(Arc::new(RateLimiterInner {
            name: name.into(),
            state: Mutex::new(LimiterState {
                rate,
                events: VecDeque::new(),
            }),
            gate: tokio::sync::Mutex::new(()),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn rate(&self) -> Rate {
        self.0.state.lock().rate
    }

    /// Change the rate in place; the recorded history is kept,
    ///  truncated to the new event count
    pub fn set_rate(&self, rate: Rate) {
        let mut state = self.0.state.lock();
        if state.rate != rate {
            tracing::debug!("Rate limiter {} changed from {} to {}", self.0.name, state.rate, rate);
            state.rate = rate;
            state.trim();
        }
    }

    /// Whether both handles point at the same shared limiter
    pub fn ptr_eq(&self, other: &RateLimiter) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_event_ok(&self) -> bool {
        self.time_until_event_ok().is_zero()
    }

    pub fn time_until_event_ok(&self) -> Duration {
        self.0.state.lock().time_until_ok(Instant::now())
    }

    /// Record that an event happened now
    pub fn event(&self) {
        let mut state = self.0.state.lock();
        if state.rate.is_unlimited() {
            return;
        }
        state.events.push_back(Instant::now());
        state.trim();
    }

    /// Forget the most recent event
    pub fn unevent(&self) {
        self.0.state.lock().events.pop_back();
    }

    /// Wait until an event is allowed, then record it
    pub async fn pace(&self) {
        let _turn = self.0.gate.lock().await;
        loop {
            let wait = {
                let mut state = self.0.state.lock();
                let now = Instant::now();
                let wait = state.time_until_ok(now);
                if wait.is_zero() && !state.rate.is_unlimited() {
                    state.events.push_back(now);
                    state.trim();
                }
                wait
            };
            if wait.is_zero() {
                return;
            }
            tracing::trace!("Rate limiter {} pausing for {:?}", self.0.name, wait);
            tokio::time::sleep(wait).await;
        }
    }
}
