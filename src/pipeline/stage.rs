//! Pipeline stages.
//!
//! A pipeline is an ordered slice of stages that all share one signature:
//! take the call and a [`Next`] handle, return an [`Outcome`]. The end of the
//! slice is the transport itself.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::Request;
use futures_util::future::BoxFuture;
use uuid::Uuid;

use crate::observability::metrics;
use crate::resilience::{classify, send_with_retry, BreakerRegistry, CallContext, Outcome, RetryPolicy};
use crate::transport::Transport;

/// One logical request travelling through the pipeline.
#[derive(Debug)]
pub struct Call {
    id: Uuid,
    resource: String,
    request: Request<Bytes>,
    ctx: CallContext,
}

impl Call {
    pub fn new(resource: impl Into<String>, request: Request<Bytes>, ctx: CallContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            resource: resource.into(),
            request,
            ctx,
        }
    }

    /// Correlation ID for logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn request(&self) -> &Request<Bytes> {
        &self.request
    }

    pub fn ctx(&self) -> &CallContext {
        &self.ctx
    }
}

/// A single step of the pipeline.
pub trait Stage: Send + Sync {
    /// Name used in logs and for inspecting composition order.
    fn name(&self) -> &'static str;

    /// Handle `call`, delegating to `next` zero or more times.
    fn handle<'a>(&'a self, call: &'a Call, next: Next<'a>) -> BoxFuture<'a, Outcome>;
}

/// The remainder of the pipeline after the current stage.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Stage>],
    transport: &'a dyn Transport,
}

impl<'a> Next<'a> {
    pub fn new(stages: &'a [Arc<dyn Stage>], transport: &'a dyn Transport) -> Self {
        Self { stages, transport }
    }

    /// Run the remaining stages, ending with one transport exchange.
    pub fn run(self, call: &'a Call) -> BoxFuture<'a, Outcome> {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.handle(call, Next::new(rest, self.transport)),
            None => Box::pin(send_once(self.transport, call)),
        }
    }
}

/// Terminal step: one transport exchange bounded by the caller's context, classified.
async fn send_once(transport: &dyn Transport, call: &Call) -> Outcome {
    if let Err(abort) = call.ctx().check() {
        return Outcome::Fatal(abort.into());
    }
    let result = call.ctx().run(transport.send(call.request())).await;
    let outcome = classify(result).await;

    tracing::debug!(resource = %call.resource(), outcome = outcome.label(), "Attempt finished");
    metrics::record_attempt(call.resource(), outcome.label());
    outcome
}

/// Re-runs the rest of the pipeline according to a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryStage {
    policy: RetryPolicy,
}

impl RetryStage {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

impl Stage for RetryStage {
    fn name(&self) -> &'static str {
        "retry"
    }

    fn handle<'a>(&'a self, call: &'a Call, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(send_with_retry(&self.policy, call.ctx(), call.resource(), move || next.run(call)))
    }
}

/// Guards the rest of the pipeline with the resource's circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakerStage {
    registry: Arc<BreakerRegistry>,
}

impl CircuitBreakerStage {
    pub fn new(registry: Arc<BreakerRegistry>) -> Self {
        Self { registry }
    }
}

impl Stage for CircuitBreakerStage {
    fn name(&self) -> &'static str {
        "circuit_breaker"
    }

    fn handle<'a>(&'a self, call: &'a Call, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(self.registry.attempt(call.resource(), move || next.run(call)))
    }
}
