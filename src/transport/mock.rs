//! Scripted transport for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{Request, Response, StatusCode};
use futures_util::future::BoxFuture;

use crate::transport::{Transport, TransportError};

/// One scripted reply.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Status(u16),
    Reset,
    Delayed(Duration, u16),
}

/// Plays back replies in order, repeating the last one once the script runs out.
#[derive(Debug)]
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new(replies: Vec<Reply>) -> Self {
        let fallback = replies.last().cloned().unwrap_or(Reply::Status(200));
        Self {
            script: Mutex::new(replies.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn always(reply: Reply) -> Self {
        Self::new(vec![reply])
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> Reply {
        let mut script = self.script.lock().unwrap();
        script.pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

pub(crate) fn response(status: u16) -> Response<Body> {
    let mut response = Response::new(Body::from("scripted"));
    *response.status_mut() = StatusCode::from_u16(status).unwrap();
    response
}

impl Transport for ScriptedTransport {
    fn send<'a>(
        &'a self,
        _request: &'a Request<Bytes>,
    ) -> BoxFuture<'a, Result<Response<Body>, TransportError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.next_reply() {
                Reply::Status(status) => Ok(response(status)),
                Reply::Reset => Err(TransportError::Other("connection reset by peer".into())),
                Reply::Delayed(delay, status) => {
                    tokio::time::sleep(delay).await;
                    Ok(response(status))
                }
            }
        })
    }
}
