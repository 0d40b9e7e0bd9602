//! Per-provider admission: a concurrency cap, a minimum inter-call spacing,
//! and a circuit breaker, composed into a single `admit` call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

use crate::circuit::CircuitBreaker;
use crate::error::RateLimitError;

struct ProviderLane {
    semaphore: Arc<Semaphore>,
    min_spacing: Duration,
    last_call: Mutex<Option<Instant>>,
    circuit: Mutex<CircuitBreaker>,
}

/// Holds a provider's admission slot for the duration of one call. Dropping
/// it (or calling [`Ticket::complete`] explicitly) releases the concurrency
/// permit; the caller is still responsible for telling the limiter how the
/// call went via [`RateLimiter::record_outcome`].
pub struct Ticket {
    _permit: OwnedSemaphorePermit,
}

/// Tracks one [`ProviderLane`] per provider name, created lazily on first use
/// so callers don't need to pre-register every provider up front.
pub struct RateLimiter {
    lanes: Mutex<HashMap<String, Arc<ProviderLane>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lanes: Mutex::new(HashMap::new()),
        }
    }

    /// Ensure a lane exists for `provider` with the given limits. Calling
    /// this again for the same provider with different limits has no effect
    /// on an already-created lane; reconfiguration takes a fresh
    /// `RateLimiter` (the orchestrator rebuilds its dependency container on
    /// config reload rather than mutating limits in place).
    pub async fn configure(
        &self,
        provider: &str,
        max_concurrent: usize,
        min_spacing: Duration,
        circuit_error_threshold: f64,
        circuit_cooldown: Duration,
    ) {
        let mut lanes = self.lanes.lock().await;
        lanes.entry(provider.to_string()).or_insert_with(|| {
            Arc::new(ProviderLane {
                semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
                min_spacing,
                last_call: Mutex::new(None),
                circuit: Mutex::new(CircuitBreaker::new(circuit_error_threshold, circuit_cooldown)),
            })
        });
    }

    /// Wait for a concurrency slot, enforce minimum call spacing, then check
    /// the circuit breaker. The semaphore's own FIFO waiter queue gives
    /// callers fairness: nobody is starved by later arrivals cutting ahead.
    pub async fn admit(&self, provider: &str) -> Result<Ticket, RateLimitError> {
        let lane = self.lane_for(provider).await;

        let permit = Arc::clone(&lane.semaphore)
            .acquire_owned()
            .await
            .expect("semaphore is never closed");

        {
            let mut last_call = lane.last_call.lock().await;
            if let Some(previous) = *last_call {
                let elapsed = previous.elapsed();
                if elapsed < lane.min_spacing {
                    tokio::time::sleep(lane.min_spacing - elapsed).await;
                }
            }
            *last_call = Some(Instant::now());
        }

        let mut circuit = lane.circuit.lock().await;
        if !circuit.allow_attempt() {
            drop(circuit);
            drop(permit);
            return Err(RateLimitError::ProviderUnavailable {
                provider: provider.to_string(),
            });
        }
        drop(circuit);

        Ok(Ticket { _permit: permit })
    }

    /// Report how the call admitted by a prior [`Self::admit`] turned out, so
    /// the circuit breaker's sliding window reflects reality.
    pub async fn record_outcome(&self, provider: &str, success: bool) {
        let lane = self.lane_for(provider).await;
        lane.circuit.lock().await.record_outcome(success);
    }

    async fn lane_for(&self, provider: &str) -> Arc<ProviderLane> {
        let lanes = self.lanes.lock().await;
        if let Some(lane) = lanes.get(provider) {
            return Arc::clone(lane);
        }
        drop(lanes);
        // No lane configured: fall back to permissive defaults rather than
        // failing closed, so a provider missing from config still works with
        // unlimited concurrency until it is explicitly tuned.
        self.configure(provider, 4, Duration::ZERO, 0.5, Duration::from_secs(30))
            .await;
        Arc::clone(self.lanes.lock().await.get(provider).expect("just inserted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admit_grants_a_ticket_when_circuit_is_closed() {
        let limiter = RateLimiter::new();
        limiter
            .configure("acme-llm", 2, Duration::ZERO, 0.5, Duration::from_secs(30))
            .await;
        let ticket = limiter.admit("acme-llm").await;
        assert!(ticket.is_ok());
    }

    #[tokio::test]
    async fn admit_denies_once_the_circuit_opens() {
        let limiter = RateLimiter::new();
        limiter
            .configure("acme-llm", 4, Duration::ZERO, 0.5, Duration::from_secs(30))
            .await;
        for _ in 0..10 {
            limiter.record_outcome("acme-llm", false).await;
        }
        let result = limiter.admit("acme-llm").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn concurrency_cap_limits_simultaneous_tickets() {
        let limiter = Arc::new(RateLimiter::new());
        limiter
            .configure("acme-llm", 1, Duration::ZERO, 0.5, Duration::from_secs(30))
            .await;

        let first = limiter.admit("acme-llm").await.unwrap();

        let limiter2 = Arc::clone(&limiter);
        let second = tokio::spawn(async move { limiter2.admit("acme-llm").await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!second.is_finished());

        drop(first);
        let second = second.await.unwrap();
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn min_spacing_delays_the_second_admit() {
        let limiter = RateLimiter::new();
        limiter
            .configure("acme-llm", 4, Duration::from_millis(50), 0.5, Duration::from_secs(30))
            .await;
        let start = Instant::now();
        let _first = limiter.admit("acme-llm").await.unwrap();
        let _second = limiter.admit("acme-llm").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn an_unconfigured_provider_gets_permissive_defaults() {
        let limiter = RateLimiter::new();
        let ticket = limiter.admit("unregistered-provider").await;
        assert!(ticket.is_ok());
    }
}
