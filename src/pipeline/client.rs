//! Resilient client: the composed pipeline and its entry points.
//!
//! # Responsibilities
//! - Assemble the stage list from the configured policies
//! - Own the per-client breaker registry
//! - Derive resource keys from requests when the caller does not supply one

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::http::{Request, Response};
use tracing::Instrument;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::observability::metrics;
use crate::pipeline::stage::{Call, CircuitBreakerStage, Next, RetryStage, Stage};
use crate::resilience::{BreakerRegistry, CallContext, CircuitBreakerPolicy, Outcome, RetryPolicy};
use crate::transport::{HyperTransport, Transport};

/// Derives a resource key from a request.
pub type ResourceNamer = Arc<dyn Fn(&Request<Bytes>) -> String + Send + Sync>;

/// Default resource key: `<METHOD>_<path>`.
pub fn default_resource_name(request: &Request<Bytes>) -> String {
    format!("{}_{}", request.method(), request.uri().path())
}

struct Inner {
    transport: Arc<dyn Transport>,
    stages: Vec<Arc<dyn Stage>>,
    breakers: Option<Arc<BreakerRegistry>>,
    namer: ResourceNamer,
}

/// HTTP client with optional retry and per-resource circuit breaking.
///
/// Cheap to clone; clones share the transport and breaker state.
#[derive(Clone)]
pub struct ResilientClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientClient")
            .field("stages", &self.stage_names())
            .field("breakers", &self.inner.breakers.as_ref().map(|r| r.len()))
            .finish()
    }
}

impl ResilientClient {
    /// Start building a client around `transport`.
    pub fn builder<T: Transport>(transport: T) -> ClientBuilder {
        ClientBuilder::new(Arc::new(transport))
    }

    /// Build a client over the hyper transport from configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        let mut builder = ClientBuilder::new(Arc::new(HyperTransport::new(&config.transport)));
        if let Some(retry) = &config.retry {
            builder = builder.retry(RetryPolicy::from(retry));
        }
        if let Some(cb) = &config.circuit_breaker {
            builder = builder.circuit_breaker(CircuitBreakerPolicy::from(cb));
        }
        builder.build()
    }

    /// Send `request` as `resource`.
    pub async fn call(&self, resource: &str, request: Request<Bytes>) -> Result<Response<Body>, ClientError> {
        self.call_with(resource, request, CallContext::new()).await
    }

    /// Send `request` as `resource`, bounded by the caller's deadline and cancellation.
    pub async fn call_with(
        &self,
        resource: &str,
        request: Request<Bytes>,
        ctx: CallContext,
    ) -> Result<Response<Body>, ClientError> {
        let call = Call::new(resource, request, ctx);
        let span = tracing::info_span!(
            "http_call",
            call_id = %call.id(),
            resource = %call.resource(),
            method = %call.request().method(),
        );

        async {
            let start = Instant::now();
            let outcome = Next::new(&self.inner.stages, self.inner.transport.as_ref())
                .run(&call)
                .await;

            match &outcome {
                Outcome::Success(response) => {
                    tracing::debug!(status = %response.status(), "Call completed");
                }
                Outcome::Failure(err) | Outcome::Fatal(err) => {
                    tracing::debug!(error = %err, kind = err.kind(), "Call failed");
                }
            }
            metrics::record_call(call.resource(), outcome.label(), start.elapsed());
            outcome.into_result()
        }
        .instrument(span)
        .await
    }

    /// Send `request` under its derived resource key.
    pub async fn send(&self, request: Request<Bytes>) -> Result<Response<Body>, ClientError> {
        self.send_with(request, CallContext::new()).await
    }

    /// Send `request` under its derived resource key with a caller context.
    pub async fn send_with(&self, request: Request<Bytes>, ctx: CallContext) -> Result<Response<Body>, ClientError> {
        let resource = self.resource_name(&request);
        self.call_with(&resource, request, ctx).await
    }

    /// Resource key this client would use for `request`.
    pub fn resource_name(&self, request: &Request<Bytes>) -> String {
        (self.inner.namer)(request)
    }

    /// Breaker registry, if circuit breaking is enabled.
    pub fn breakers(&self) -> Option<&BreakerRegistry> {
        self.inner.breakers.as_deref()
    }

    /// Stage names in invocation order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.inner.stages.iter().map(|s| s.name()).collect()
    }
}

/// Builder for [`ResilientClient`].
pub struct ClientBuilder {
    transport: Arc<dyn Transport>,
    retry: Option<RetryPolicy>,
    circuit_breaker: Option<CircuitBreakerPolicy>,
    namer: Option<ResourceNamer>,
}

impl ClientBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            retry: None,
            circuit_breaker: None,
            namer: None,
        }
    }

    /// Retry failed attempts according to `policy`.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Guard each resource with its own breaker configured by `policy`.
    pub fn circuit_breaker(mut self, policy: CircuitBreakerPolicy) -> Self {
        self.circuit_breaker = Some(policy);
        self
    }

    /// Override how resource keys are derived from requests.
    pub fn resource_namer<F>(mut self, namer: F) -> Self
    where
        F: Fn(&Request<Bytes>) -> String + Send + Sync + 'static,
    {
        self.namer = Some(Arc::new(namer));
        self
    }

    pub fn build(self) -> ResilientClient {
        let mut stages: Vec<Arc<dyn Stage>> = Vec::new();

        if let Some(policy) = self.retry {
            stages.push(Arc::new(RetryStage::new(policy)));
        }

        let breakers = self.circuit_breaker.map(|policy| Arc::new(BreakerRegistry::new(policy)));
        if let Some(registry) = &breakers {
            stages.push(Arc::new(CircuitBreakerStage::new(registry.clone())));
        }

        let client = ResilientClient {
            inner: Arc::new(Inner {
                transport: self.transport,
                stages,
                breakers,
                namer: self.namer.unwrap_or_else(|| Arc::new(default_resource_name)),
            }),
        };
        tracing::debug!(stages = ?client.stage_names(), "Resilient client built");
        client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::CircuitState;
    use crate::transport::mock::{Reply, ScriptedTransport};
    use axum::http::{Method, StatusCode};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn scripted(replies: Vec<Reply>) -> (Arc<ScriptedTransport>, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new(replies));
        (transport.clone(), transport)
    }

    fn get(path: &str) -> Request<Bytes> {
        Request::get(format!("http://localhost{}", path)).body(Bytes::new()).unwrap()
    }

    fn breaker_policy(threshold: u32, open_timeout: Duration) -> CircuitBreakerPolicy {
        CircuitBreakerPolicy {
            max_requests: 1,
            consecutive_failure_threshold: threshold,
            open_interval: Duration::ZERO,
            open_timeout,
        }
    }

    #[test]
    fn test_composition_order() {
        let bare = ResilientClient::builder(ScriptedTransport::always(Reply::Status(200))).build();
        assert!(bare.stage_names().is_empty());
        assert!(bare.breakers().is_none());

        let both = ResilientClient::builder(ScriptedTransport::always(Reply::Status(200)))
            .circuit_breaker(CircuitBreakerPolicy::default())
            .retry(RetryPolicy::new(2, Duration::from_millis(1)))
            .build();
        assert_eq!(both.stage_names(), vec!["retry", "circuit_breaker"]);
    }

    #[test]
    fn test_default_resource_name() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("http://api.local/v1/orders?draft=true")
            .body(Bytes::new())
            .unwrap();
        assert_eq!(default_resource_name(&request), "POST_/v1/orders");

        let client = ResilientClient::builder(ScriptedTransport::always(Reply::Status(200)))
            .resource_namer(|req| req.uri().host().unwrap_or("unknown").to_string())
            .build();
        assert_eq!(client.resource_name(&request), "api.local");
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success_is_single_call() {
        let (transport, shared) = scripted(vec![Reply::Status(200)]);
        let client = ResilientClient::builder(shared)
            .retry(RetryPolicy::new(3, Duration::from_millis(10)))
            .circuit_breaker(breaker_policy(1, Duration::from_secs(1)))
            .build();

        let response = client.send(get("/ok")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_not_a_failure() {
        let (transport, shared) = scripted(vec![Reply::Status(404)]);
        let client = ResilientClient::builder(shared)
            .retry(RetryPolicy::new(5, Duration::from_millis(10)))
            .circuit_breaker(breaker_policy(0, Duration::from_secs(1)))
            .build();

        for _ in 0..3 {
            let response = client.send(get("/missing")).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
        assert_eq!(transport.calls(), 3);

        let breaker = client.breakers().unwrap().get("GET_/missing").unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.counts().consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_without_breaker_exhausts() {
        let (transport, shared) = scripted(vec![Reply::Status(503)]);
        let client = ResilientClient::builder(shared)
            .retry(RetryPolicy::new(3, Duration::from_millis(10)))
            .build();

        let err = client.send(get("/down")).await.unwrap_err();
        assert!(matches!(err, ClientError::RetriesExhausted { attempts: 4, .. }));
        assert!(err.is_server_status());
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bare_pipeline_reports_server_status() {
        let (transport, shared) = scripted(vec![Reply::Status(500)]);
        let client = ResilientClient::builder(shared).build();

        let err = client.send(get("/down")).await.unwrap_err();
        assert!(matches!(err, ClientError::ServerStatus { .. }));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_ends_retry_loop() {
        let (transport, shared) = scripted(vec![Reply::Status(500)]);
        let client = ResilientClient::builder(shared)
            .retry(RetryPolicy::new(5, Duration::from_millis(10)))
            .circuit_breaker(breaker_policy(1, Duration::from_secs(30)))
            .build();

        // Two failures trip the breaker; the third attempt is rejected without a send.
        let err = client.send(get("/down")).await.unwrap_err();
        assert!(matches!(err, ClientError::CircuitOpen { .. }));
        assert_eq!(transport.calls(), 2);

        let err = client.send(get("/down")).await.unwrap_err();
        assert!(err.is_circuit_broken());
        assert_eq!(transport.calls(), 2);

        // A different resource still reaches the transport, with its own breaker.
        let err = client.send(get("/other")).await.unwrap_err();
        assert!(matches!(err, ClientError::CircuitOpen { .. }));
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_recovers_after_open_timeout() {
        let (transport, shared) = scripted(vec![
            Reply::Status(500),
            Reply::Status(500),
            Reply::Status(500),
            Reply::Status(200),
        ]);
        let client = ResilientClient::builder(shared)
            .circuit_breaker(breaker_policy(2, Duration::from_millis(100)))
            .build();

        for _ in 0..3 {
            assert!(client.send(get("/flaky")).await.unwrap_err().is_server_status());
        }
        assert!(client.send(get("/flaky")).await.unwrap_err().is_circuit_broken());
        assert_eq!(transport.calls(), 3);

        tokio::time::advance(Duration::from_millis(100)).await;
        let response = client.send(get("/flaky")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(transport.calls(), 4);

        let breaker = client.breakers().unwrap().get("GET_/flaky").unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_attempt() {
        let (transport, shared) = scripted(vec![Reply::Status(200)]);
        let client = ResilientClient::builder(shared)
            .retry(RetryPolicy::new(3, Duration::from_secs(1)))
            .circuit_breaker(breaker_policy(1, Duration::from_secs(1)))
            .build();

        let token = CancellationToken::new();
        token.cancel();
        let ctx = CallContext::new().with_cancellation(token);

        let err = client.send_with(get("/x"), ctx).await.unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
        assert_eq!(transport.calls(), 0);

        let breaker = client.breakers().unwrap().get("GET_/x").unwrap();
        assert_eq!(breaker.counts().consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_during_slow_attempt_is_fatal() {
        let (transport, shared) = scripted(vec![Reply::Delayed(Duration::from_secs(5), 200)]);
        let client = ResilientClient::builder(shared)
            .retry(RetryPolicy::new(3, Duration::from_millis(10)))
            .build();

        let ctx = CallContext::new().with_timeout(Duration::from_millis(50));
        let err = client.call_with("slow", get("/slow"), ctx).await.unwrap_err();
        assert!(matches!(err, ClientError::DeadlineExceeded));
        assert_eq!(transport.calls(), 1);
    }
}
