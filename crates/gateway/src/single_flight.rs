use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use crate::cache::Fingerprint;
use crate::provider::{ProviderFailure, ProviderResponse};

type FlightResult = Arc<Result<ProviderResponse, ProviderFailure>>;

/// Coalesces concurrent fetches for the same fingerprint: one caller (the
/// leader) performs the provider fetch, every other caller awaits the
/// leader's result. At most one in-flight fetch exists per fingerprint.
pub struct SingleFlight {
    inflight: DashMap<Fingerprint, broadcast::Sender<FlightResult>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self {
            inflight: DashMap::new(),
        }
    }

    /// Number of fetches currently in flight, for instrumentation.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    /// Run `fetch` under single-flight coalescing for `key`.
    pub async fn run<F, Fut>(&self, key: &Fingerprint, fetch: F) -> FlightResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ProviderResponse, ProviderFailure>>,
    {
        // Subscribe while holding the map entry so the leader cannot remove
        // it and broadcast between our lookup and subscription.
        if let Some(sender) = self.inflight.get(key) {
            let mut receiver = sender.subscribe();
            drop(sender);
            debug!(fingerprint = %key, "Awaiting in-flight fetch");
            if let Ok(result) = receiver.recv().await {
                return result;
            }
            // Leader dropped without broadcasting (cancelled); fall through
            // and fetch ourselves.
        }

        let (tx, _rx) = broadcast::channel(1);
        match self.inflight.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                // Lost the leadership race; follow the winner instead.
                let mut receiver = existing.get().subscribe();
                drop(existing);
                if let Ok(result) = receiver.recv().await {
                    return result;
                }
                // Winner was cancelled; do the fetch without coalescing
                // rather than recursing.
                return Arc::new(fetch().await);
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(tx.clone());
            }
        }

        let result: FlightResult = Arc::new(fetch().await);

        // Remove before broadcasting: late arrivals either subscribed while
        // the entry was held (and will receive this send) or find no entry
        // and lead their own fetch.
        self.inflight.remove(key);
        let _ = tx.send(Arc::clone(&result));
        result
    }
}

impl Default for SingleFlight {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SourceAuthority;
    use chrono::Utc;
    use screening_core::types::{CheckType, ProviderId};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Duration;

    fn response() -> ProviderResponse {
        ProviderResponse {
            provider_id: ProviderId::new("p1"),
            check_type: CheckType::Identity,
            authority: SourceAuthority::Authoritative,
            records: Vec::new(),
            retrieved_at: Utc::now(),
        }
    }

    fn key(name: &str) -> Fingerprint {
        Fingerprint(name.to_string())
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let flight = Arc::new(SingleFlight::new());
        let fetches = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let flight = Arc::clone(&flight);
            let fetches = Arc::clone(&fetches);
            handles.push(tokio::spawn(async move {
                flight
                    .run(&key("shared"), || async move {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(response())
                    })
                    .await
            }));
        }

        for handle in handles {
            let result = handle.await.unwrap();
            assert!(result.is_ok());
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_coalesce() {
        let flight = Arc::new(SingleFlight::new());
        let fetches = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for i in 0..4 {
            let flight = Arc::clone(&flight);
            let fetches = Arc::clone(&fetches);
            handles.push(tokio::spawn(async move {
                flight
                    .run(&key(&format!("k{}", i)), || async move {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        Ok(response())
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn failures_are_shared_with_followers() {
        let flight = Arc::new(SingleFlight::new());

        let leader = {
            let flight = Arc::clone(&flight);
            tokio::spawn(async move {
                flight
                    .run(&key("failing"), || async {
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Err(ProviderFailure::unavailable("down"))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        let follower = {
            let flight = Arc::clone(&flight);
            tokio::spawn(async move {
                flight
                    .run(&key("failing"), || async { Ok(response()) })
                    .await
            })
        };

        assert!(leader.await.unwrap().is_err());
        // Follower observes the leader's failure rather than fetching.
        assert!(follower.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn sequential_runs_fetch_independently() {
        let flight = SingleFlight::new();
        let fetches = AtomicU32::new(0);

        for _ in 0..2 {
            let result = flight
                .run(&key("seq"), || async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(response())
                })
                .await;
            assert!(result.is_ok());
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }
}
