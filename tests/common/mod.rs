//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::Router;
use futures_util::future::BoxFuture;
use tokio::net::TcpListener;

type Handler = Arc<dyn Fn(u32) -> BoxFuture<'static, (u16, String)> + Send + Sync>;

#[derive(Clone)]
struct BackendState {
    hits: Arc<AtomicU32>,
    handler: Handler,
}

/// A running mock backend.
pub struct MockBackend {
    pub addr: SocketAddr,
    hits: Arc<AtomicU32>,
}

#[allow(dead_code)]
impl MockBackend {
    /// Requests received so far.
    pub fn hits(&self) -> u32 {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn get(&self, path: &str) -> Request<Bytes> {
        Request::get(self.url(path)).body(Bytes::new()).unwrap()
    }
}

async fn handle(State(state): State<BackendState>) -> (StatusCode, String) {
    let n = state.hits.fetch_add(1, Ordering::SeqCst);
    let (status, body) = (state.handler)(n).await;
    (StatusCode::from_u16(status).unwrap_or(StatusCode::OK), body)
}

/// Start a programmable backend on an ephemeral port.
///
/// `f` receives the zero-based index of the request and returns status and body.
pub async fn start_programmable_backend<F, Fut>(f: F) -> MockBackend
where
    F: Fn(u32) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicU32::new(0));

    let f = Arc::new(f);
    let state = BackendState {
        hits: hits.clone(),
        handler: Arc::new(move |n| -> BoxFuture<'static, (u16, String)> {
            let f = f.clone();
            Box::pin(async move { f(n).await })
        }),
    };
    let app = Router::new().fallback(handle).with_state(state);

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockBackend { addr, hits }
}

/// Start a backend that always answers with `status`.
#[allow(dead_code)]
pub async fn start_fixed_backend(status: u16) -> MockBackend {
    start_programmable_backend(move |_| async move { (status, format!("status {}", status)) }).await
}

/// An address with nothing listening on it.
#[allow(dead_code)]
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
