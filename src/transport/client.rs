//! Hyper-backed transport.
//!
//! Wraps the pooled `hyper-util` legacy client. Each call sends exactly one
//! request, bounded by the configured per-attempt timeout.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use tokio::time;

use crate::config::TransportConfig;
use crate::transport::{to_body_request, Transport, TransportError};

/// Production transport over a pooled HTTP/1.1 + HTTP/2 client.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Body>,
    request_timeout: Duration,
}

impl HyperTransport {
    /// Create a transport from configuration.
    pub fn new(config: &TransportConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(config.connect_timeout()));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build(connector);

        Self {
            client,
            request_timeout: config.request_timeout(),
        }
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new(&TransportConfig::default())
    }
}

impl Transport for HyperTransport {
    fn send<'a>(
        &'a self,
        request: &'a Request<Bytes>,
    ) -> BoxFuture<'a, Result<Response<Body>, TransportError>> {
        Box::pin(async move {
            let response_future = self.client.request(to_body_request(request));

            match time::timeout(self.request_timeout, response_future).await {
                Ok(Ok(response)) => Ok(into_body_response(response)),
                Ok(Err(e)) if e.is_connect() => Err(TransportError::Connect(Box::new(e))),
                Ok(Err(e)) => Err(TransportError::Other(Box::new(e))),
                Err(_) => Err(TransportError::Timeout(self.request_timeout)),
            }
        })
    }
}

fn into_body_response(response: Response<Incoming>) -> Response<Body> {
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::new(body))
}
