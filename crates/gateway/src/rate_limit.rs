use std::collections::VecDeque;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

use screening_core::config::ProviderLimits;

/// Outcome of a non-blocking admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Denied; earliest time a token could be available
    Denied { retry_in: Duration },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
    hour_window: VecDeque<Instant>,
    day_window: VecDeque<Instant>,
}

/// Per-provider rate limiter: a token bucket for the minute scale plus
/// rolling hour/day windows.
///
/// Bucket capacity is `rpm + burst`; tokens refill at `rpm / 60` per second.
/// `try_acquire` never blocks; `wait_for_token` suspends until admission.
pub struct ProviderLimiter {
    limits: ProviderLimits,
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

const HOUR: Duration = Duration::from_secs(3600);
const DAY: Duration = Duration::from_secs(86_400);

impl ProviderLimiter {
    pub fn new(limits: ProviderLimits) -> Self {
        let capacity = (limits.rpm + limits.burst) as f64;
        Self {
            limits,
            capacity,
            refill_per_sec: limits.rpm as f64 / 60.0,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
                hour_window: VecDeque::new(),
                day_window: VecDeque::new(),
            }),
        }
    }

    pub fn limits(&self) -> &ProviderLimits {
        &self.limits
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill);
        if elapsed > Duration::ZERO {
            state.tokens =
                (state.tokens + elapsed.as_secs_f64() * self.refill_per_sec).min(self.capacity);
            state.last_refill = now;
        }
    }

    fn prune_windows(state: &mut BucketState, now: Instant) {
        while let Some(&front) = state.hour_window.front() {
            if now.saturating_duration_since(front) >= HOUR {
                state.hour_window.pop_front();
            } else {
                break;
            }
        }
        while let Some(&front) = state.day_window.front() {
            if now.saturating_duration_since(front) >= DAY {
                state.day_window.pop_front();
            } else {
                break;
            }
        }
    }

    fn admit_locked(&self, state: &mut BucketState, now: Instant) -> Admission {
        self.refill(state, now);
        Self::prune_windows(state, now);

        if state.hour_window.len() as u32 >= self.limits.rph {
            let oldest = *state.hour_window.front().expect("non-empty hour window");
            let retry_in = HOUR.saturating_sub(now.saturating_duration_since(oldest));
            return Admission::Denied { retry_in };
        }
        if state.day_window.len() as u32 >= self.limits.rpd {
            let oldest = *state.day_window.front().expect("non-empty day window");
            let retry_in = DAY.saturating_sub(now.saturating_duration_since(oldest));
            return Admission::Denied { retry_in };
        }

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            state.hour_window.push_back(now);
            state.day_window.push_back(now);
            Admission::Admitted
        } else {
            let deficit = 1.0 - state.tokens;
            let retry_in = Duration::from_secs_f64(deficit / self.refill_per_sec.max(f64::MIN_POSITIVE));
            Admission::Denied { retry_in }
        }
    }

    /// Non-blocking admission check.
    pub async fn try_acquire(&self) -> Admission {
        let mut state = self.state.lock().await;
        self.admit_locked(&mut state, Instant::now())
    }

    /// Suspend until a token is available, then consume it.
    pub async fn wait_for_token(&self) {
        loop {
            let admission = {
                let mut state = self.state.lock().await;
                self.admit_locked(&mut state, Instant::now())
            };
            match admission {
                Admission::Admitted => return,
                Admission::Denied { retry_in } => {
                    // Wake slightly after the projected refill to avoid a
                    // tight re-check loop under clock granularity.
                    sleep(retry_in.max(Duration::from_millis(5))).await;
                }
            }
        }
    }

    /// Currently available tokens (after refill), for instrumentation.
    pub async fn available_tokens(&self) -> f64 {
        let mut state = self.state.lock().await;
        self.refill(&mut state, Instant::now());
        state.tokens
    }
}
