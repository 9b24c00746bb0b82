//! Per-provider rate budgets with rolling windows.
//!
//! Tracks consumption against three ceilings per provider: requests in
//! the trailing 60 seconds, tokens in the trailing 60 seconds, and
//! tokens in the trailing 24 hours. Windows are rolling event logs,
//! not fixed buckets.
//!
//! The check-and-reserve sequence is serialized per provider so that
//! two concurrent callers can never both be admitted under a ceiling
//! that only fits one of them. A granted [`Permit`] reserves the
//! estimated token cost; the caller reports actual consumption via
//! [`Permit::commit`] to correct the reservation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::{LlmProvider, RateLimitConfig};
use crate::error::{GraftError, GraftResult};

const MINUTE: Duration = Duration::from_secs(60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy)]
struct Event {
    id: u64,
    at: Instant,
    tokens: u64,
}

#[derive(Debug)]
struct BudgetState {
    limits: RateLimitConfig,
    next_id: u64,
    /// Events in the trailing minute (requests + minute tokens).
    minute: VecDeque<Event>,
    /// Events in the trailing day (day tokens).
    day: VecDeque<Event>,
}

impl BudgetState {
    fn new(limits: RateLimitConfig) -> Self {
        Self {
            limits,
            next_id: 0,
            minute: VecDeque::new(),
            day: VecDeque::new(),
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(event) = self.minute.front() {
            if now.duration_since(event.at) >= MINUTE {
                self.minute.pop_front();
            } else {
                break;
            }
        }
        while let Some(event) = self.day.front() {
            if now.duration_since(event.at) >= DAY {
                self.day.pop_front();
            } else {
                break;
            }
        }
    }

    fn minute_tokens(&self) -> u64 {
        self.minute.iter().map(|e| e.tokens).sum()
    }

    fn day_tokens(&self) -> u64 {
        self.day.iter().map(|e| e.tokens).sum()
    }

    /// Wait until enough events expire from `events` (window `len`)
    /// that `deficit` units of headroom free up. `weight` maps an
    /// event to its unit count (1 for requests, token count for tokens).
    fn wait_for_headroom(
        events: &VecDeque<Event>,
        len: Duration,
        now: Instant,
        deficit: u64,
        weight: impl Fn(&Event) -> u64,
    ) -> Duration {
        let mut freed = 0u64;
        for event in events {
            freed += weight(event);
            if freed >= deficit {
                let age = now.duration_since(event.at);
                return len.saturating_sub(age);
            }
        }
        // Deficit exceeds everything in the window; the estimate alone
        // is over the ceiling. Waiting a full window is the best hint.
        len
    }

    fn check(&mut self, now: Instant, estimated_tokens: u64) -> Option<Duration> {
        self.prune(now);

        let mut wait = Duration::ZERO;

        if self.minute.len() as u32 >= self.limits.requests_per_minute {
            let deficit = self.minute.len() as u64 + 1 - self.limits.requests_per_minute as u64;
            wait = wait.max(Self::wait_for_headroom(
                &self.minute,
                MINUTE,
                now,
                deficit,
                |_| 1,
            ));
        }

        let minute_tokens = self.minute_tokens();
        if minute_tokens + estimated_tokens > self.limits.tokens_per_minute {
            let deficit = minute_tokens + estimated_tokens - self.limits.tokens_per_minute;
            wait = wait.max(Self::wait_for_headroom(
                &self.minute,
                MINUTE,
                now,
                deficit,
                |e| e.tokens,
            ));
        }

        let day_tokens = self.day_tokens();
        if day_tokens + estimated_tokens > self.limits.tokens_per_day {
            let deficit = day_tokens + estimated_tokens - self.limits.tokens_per_day;
            wait = wait.max(Self::wait_for_headroom(&self.day, DAY, now, deficit, |e| {
                e.tokens
            }));
        }

        if wait.is_zero() {
            None
        } else {
            Some(wait)
        }
    }

    fn reserve(&mut self, now: Instant, tokens: u64) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let event = Event { id, at: now, tokens };
        self.minute.push_back(event);
        self.day.push_back(event);
        id
    }

    fn correct(&mut self, id: u64, actual_tokens: u64) {
        for event in self.minute.iter_mut() {
            if event.id == id {
                event.tokens = actual_tokens;
            }
        }
        for event in self.day.iter_mut() {
            if event.id == id {
                event.tokens = actual_tokens;
            }
        }
    }
}

/// Outcome of a permit request.
#[derive(Debug)]
pub enum Acquire {
    /// The call may proceed; consumption has been reserved.
    Granted(Permit),
    /// A ceiling would be exceeded; wait at least this long.
    WouldExceed {
        /// Minimum wait until the most-constraining window frees
        /// enough headroom.
        wait: Duration,
    },
}

/// A reservation against a provider budget.
///
/// Call [`commit`](Permit::commit) with the actual token consumption
/// once known; an uncommitted permit keeps its estimate.
#[derive(Debug)]
pub struct Permit {
    state: Arc<Mutex<BudgetState>>,
    event_id: u64,
}

impl Permit {
    /// Replace the reserved estimate with actual consumption.
    pub fn commit(self, actual_tokens: u64) {
        if let Ok(mut state) = self.state.lock() {
            state.correct(self.event_id, actual_tokens);
        }
    }
}

/// Process-wide rate limiter over per-provider budgets.
///
/// Owned explicitly and passed by handle into the components that need
/// it, so tests can inject isolated instances.
pub struct RateLimiter {
    budgets: Mutex<HashMap<LlmProvider, Arc<Mutex<BudgetState>>>>,
    default_limits: RateLimitConfig,
}

impl RateLimiter {
    /// Create a limiter applying the given ceilings to every provider.
    pub fn new(default_limits: RateLimitConfig) -> Self {
        Self {
            budgets: Mutex::new(HashMap::new()),
            default_limits,
        }
    }

    /// Override the ceilings for one provider.
    pub fn set_limits(&self, provider: LlmProvider, limits: RateLimitConfig) {
        let state = self.budget(provider);
        let mut state = state.lock().expect("budget state poisoned");
        state.limits = limits;
    }

    fn budget(&self, provider: LlmProvider) -> Arc<Mutex<BudgetState>> {
        let mut budgets = self.budgets.lock().expect("budget map poisoned");
        budgets
            .entry(provider)
            .or_insert_with(|| Arc::new(Mutex::new(BudgetState::new(self.default_limits))))
            .clone()
    }

    /// Request a permit for a call estimated to consume
    /// `estimated_tokens`. Check-and-reserve is atomic per provider.
    pub fn acquire(&self, provider: LlmProvider, estimated_tokens: u64) -> Acquire {
        let state = self.budget(provider);
        let now = Instant::now();

        let mut guard = state.lock().expect("budget state poisoned");
        if let Some(wait) = guard.check(now, estimated_tokens) {
            tracing::debug!(
                provider = provider.as_str(),
                wait_ms = wait.as_millis() as u64,
                "rate budget exhausted"
            );
            return Acquire::WouldExceed { wait };
        }
        let event_id = guard.reserve(now, estimated_tokens);
        drop(guard);

        Acquire::Granted(Permit {
            state,
            event_id,
        })
    }

    /// Acquire a permit, sleeping on the wait hint when a ceiling is
    /// hit. Gives up after `max_waits` sleeps.
    pub async fn acquire_or_wait(
        &self,
        provider: LlmProvider,
        estimated_tokens: u64,
        max_waits: u32,
    ) -> GraftResult<Permit> {
        let mut waits = 0;
        loop {
            match self.acquire(provider, estimated_tokens) {
                Acquire::Granted(permit) => return Ok(permit),
                Acquire::WouldExceed { wait } => {
                    if waits >= max_waits {
                        return Err(GraftError::rate_limit(
                            format!("rate budget for {} exhausted", provider.as_str()),
                            Some(wait.as_millis() as u64),
                        ));
                    }
                    waits += 1;
                    tracing::info!(
                        provider = provider.as_str(),
                        wait_ms = wait.as_millis() as u64,
                        "waiting for rate budget headroom"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}
