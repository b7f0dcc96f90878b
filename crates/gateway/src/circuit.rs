use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::warn;

use screening_core::config::CircuitConfig;
use screening_core::types::ProviderId;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// A state transition observed while interacting with the breaker, reported
/// so the gateway can audit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitTransition {
    pub from: CircuitState,
    pub to: CircuitState,
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_in_flight: u32,
}

/// Per-provider circuit breaker.
///
/// Closed -> Open after `failure_threshold` consecutive failures;
/// Open -> HalfOpen once `recovery_timeout` has elapsed; a half-open probe
/// success closes the circuit and resets counters, a probe failure reopens
/// it. At most `half_open_max_calls` probes run concurrently.
pub struct CircuitBreaker {
    config: CircuitConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                half_open_in_flight: 0,
            }),
        }
    }

    /// Ask permission to dispatch a call. `Err(())`-like denial is expressed
    /// as `None`; `Some(transition)` reports an open->half_open move that
    /// the caller should audit.
    pub async fn acquire(&self) -> Result<Option<CircuitTransition>, CircuitDenied> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => Ok(None),
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= Duration::from_secs(self.config.recovery_timeout_secs) {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_in_flight = 1;
                    Ok(Some(CircuitTransition {
                        from: CircuitState::Open,
                        to: CircuitState::HalfOpen,
                    }))
                } else {
                    Err(CircuitDenied {
                        retry_in: Duration::from_secs(self.config.recovery_timeout_secs)
                            .saturating_sub(elapsed),
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_in_flight < self.config.half_open_max_calls {
                    inner.half_open_in_flight += 1;
                    Ok(None)
                } else {
                    Err(CircuitDenied {
                        retry_in: Duration::from_secs(1),
                    })
                }
            }
        }
    }

    /// Record a successful call. Returns a transition when the breaker
    /// closes from half-open.
    pub async fn record_success(&self) -> Option<CircuitTransition> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.consecutive_failures = 0;
                inner.opened_at = None;
                inner.half_open_in_flight = 0;
                Some(CircuitTransition {
                    from: CircuitState::HalfOpen,
                    to: CircuitState::Closed,
                })
            }
            _ => {
                inner.consecutive_failures = 0;
                None
            }
        }
    }

    /// Record a failed call. Returns a transition when the breaker opens.
    pub async fn record_failure(&self) -> Option<CircuitTransition> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.half_open_in_flight = 0;
                Some(CircuitTransition {
                    from: CircuitState::HalfOpen,
                    to: CircuitState::Open,
                })
            }
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    warn!(
                        failures = inner.consecutive_failures,
                        "Circuit opened after consecutive failures"
                    );
                    Some(CircuitTransition {
                        from: CircuitState::Closed,
                        to: CircuitState::Open,
                    })
                } else {
                    None
                }
            }
            CircuitState::Open => None,
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }
}

/// Denial returned when the circuit short-circuits a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitDenied {
    pub retry_in: Duration,
}

/// Registry of breakers, one per provider.
pub struct CircuitBreakerRegistry {
    config: CircuitConfig,
    breakers: DashMap<ProviderId, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    pub fn breaker_for(&self, provider_id: &ProviderId) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(provider_id.clone())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.config)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitConfig {
        CircuitConfig {
            failure_threshold: 5,
            recovery_timeout_secs: 60,
            half_open_max_calls: 1,
        }
    }

    #[tokio::test]
    async fn opens_after_consecutive_failures() {
        let breaker = CircuitBreaker::new(config());
        for i in 0..5 {
            let transition = breaker.record_failure().await;
            if i < 4 {
                assert!(transition.is_none());
            } else {
                assert_eq!(
                    transition,
                    Some(CircuitTransition {
                        from: CircuitState::Closed,
                        to: CircuitState::Open,
                    })
                );
            }
        }
        assert_eq!(breaker.state().await, CircuitState::Open);
        assert!(breaker.acquire().await.is_err());
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..4 {
            breaker.record_failure().await;
        }
        breaker.record_success().await;
        for _ in 0..4 {
            assert!(breaker.record_failure().await.is_none());
        }
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_through_half_open_probe() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..5 {
            breaker.record_failure().await;
        }
        assert!(breaker.acquire().await.is_err());

        tokio::time::advance(Duration::from_secs(61)).await;

        // First caller becomes the probe.
        let transition = breaker.acquire().await.unwrap();
        assert_eq!(
            transition,
            Some(CircuitTransition {
                from: CircuitState::Open,
                to: CircuitState::HalfOpen,
            })
        );
        // Probe budget of one: a second caller is denied.
        assert!(breaker.acquire().await.is_err());

        let closed = breaker.record_success().await;
        assert_eq!(
            closed,
            Some(CircuitTransition {
                from: CircuitState::HalfOpen,
                to: CircuitState::Closed,
            })
        );
        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert!(breaker.acquire().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..5 {
            breaker.record_failure().await;
        }
        tokio::time::advance(Duration::from_secs(61)).await;
        breaker.acquire().await.unwrap();

        let reopened = breaker.record_failure().await;
        assert_eq!(
            reopened,
            Some(CircuitTransition {
                from: CircuitState::HalfOpen,
                to: CircuitState::Open,
            })
        );
        assert!(breaker.acquire().await.is_err());
    }

    #[tokio::test]
    async fn registry_hands_out_one_breaker_per_provider() {
        let registry = CircuitBreakerRegistry::new(config());
        let a1 = registry.breaker_for(&ProviderId::new("p-a"));
        let a2 = registry.breaker_for(&ProviderId::new("p-a"));
        let b = registry.breaker_for(&ProviderId::new("p-b"));

        a1.record_failure().await;
        // Same provider id resolves to the same breaker instance.
        assert!(Arc::ptr_eq(&a1, &a2));
        assert_eq!(b.state().await, CircuitState::Closed);
    }
}
