//! Per-resource circuit breaker registry.
//!
//! # Responsibilities
//! - Lazily create exactly one breaker per resource key
//! - Hand out shared references to callers
//! - Report per-resource phases for inspection
//!
//! # Design Decisions
//! - Owned by a client instance, never global
//! - Sharded map: unrelated resources never contend
//! - Entries are never removed for the life of the registry

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;

use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerPolicy, CircuitState};
use crate::resilience::outcome::Outcome;

/// Concurrency-safe map from resource key to circuit breaker.
#[derive(Debug)]
pub struct BreakerRegistry {
    policy: CircuitBreakerPolicy,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    /// Create an empty registry whose breakers all share `policy`.
    pub fn new(policy: CircuitBreakerPolicy) -> Self {
        Self {
            policy,
            breakers: DashMap::new(),
        }
    }

    pub fn policy(&self) -> &CircuitBreakerPolicy {
        &self.policy
    }

    /// Return the breaker for `resource`, creating it on first use.
    pub fn get_or_create(&self, resource: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.get(resource) {
            return breaker.value().clone();
        }

        self.breakers
            .entry(resource.to_string())
            .or_insert_with(|| {
                tracing::debug!(resource = %resource, "Creating circuit breaker");
                Arc::new(CircuitBreaker::new(resource, self.policy.clone()))
            })
            .value()
            .clone()
    }

    /// Return the breaker for `resource` if one was ever created.
    pub fn get(&self, resource: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(resource).map(|r| r.value().clone())
    }

    /// Run `do_call` through the breaker of `resource`.
    pub async fn attempt<F, Fut>(&self, resource: &str, do_call: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let breaker = self.get_or_create(resource);
        breaker.attempt(do_call).await
    }

    /// Number of resources seen so far.
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Phase of every known resource, sorted by key.
    pub fn snapshot(&self) -> Vec<(String, CircuitState)> {
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.iter().map(|r| r.value().clone()).collect();
        let mut states: Vec<_> = breakers
            .iter()
            .map(|b| (b.resource().to_string(), b.state()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use axum::http::StatusCode;
    use std::time::Duration;

    fn server_error() -> Outcome {
        Outcome::Failure(ClientError::ServerStatus {
            status: StatusCode::BAD_GATEWAY,
        })
    }

    #[test]
    fn test_same_instance_per_key() {
        let registry = BreakerRegistry::default();
        let a = registry.get_or_create("GET_/a");
        let b = registry.get_or_create("GET_/a");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("GET_/b").is_none());
    }

    #[test]
    fn test_concurrent_first_access_creates_once() {
        let registry = Arc::new(BreakerRegistry::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.get_or_create("POST_/orders"))
            })
            .collect();

        let breakers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(breakers.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_resources_are_isolated() {
        let registry = BreakerRegistry::new(CircuitBreakerPolicy {
            max_requests: 1,
            consecutive_failure_threshold: 0,
            open_interval: Duration::ZERO,
            open_timeout: Duration::from_secs(30),
        });

        registry.attempt("GET_/down", || async { server_error() }).await;
        let rejected = registry.attempt("GET_/down", || async { server_error() }).await;
        assert!(matches!(rejected, Outcome::Fatal(ClientError::CircuitOpen { .. })));

        let other = registry
            .attempt("GET_/up", || async { Outcome::Success(crate::transport::mock::response(200)) })
            .await;
        assert!(other.is_success());

        assert_eq!(
            registry.snapshot(),
            vec![
                ("GET_/down".to_string(), CircuitState::Open),
                ("GET_/up".to_string(), CircuitState::Closed),
            ]
        );
    }
}
