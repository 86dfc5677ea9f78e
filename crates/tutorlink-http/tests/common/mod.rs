//! In-process SSE capability server for handshake tests.

#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

/// What the event stream announces on connect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Announce {
    /// `/messages?sessionId=session-N`
    Normal,
    /// Never sends anything
    Silent,
    /// Endpoint without a session id
    MissingSessionId,
}

#[derive(Default)]
struct Inner {
    next_session: usize,
    sessions: HashMap<String, mpsc::UnboundedSender<Event>>,
    received: Vec<Value>,
}

#[derive(Clone)]
pub struct TestServer {
    pub addr: SocketAddr,
    announce: Announce,
    inner: Arc<Mutex<Inner>>,
}

impl TestServer {
    pub async fn start(announce: Announce) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = Self {
            addr: listener.local_addr().unwrap(),
            announce,
            inner: Arc::new(Mutex::new(Inner::default())),
        };

        let app = Router::new()
            .route("/sse", get(handshake))
            .route("/messages", post(command))
            .with_state(server.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        server
    }

    pub fn base_url(&self) -> url::Url {
        url::Url::parse(&format!("http://{}", self.addr)).unwrap()
    }

    /// End a session's event stream from the server side
    pub fn kick(&self, session_id: &str) {
        self.inner.lock().sessions.remove(session_id);
    }

    /// Send a raw event on a session's stream
    pub fn push(&self, session_id: &str, event: Event) {
        if let Some(tx) = self.inner.lock().sessions.get(session_id) {
            let _ = tx.send(event);
        }
    }

    pub fn handshakes(&self) -> usize {
        self.inner.lock().next_session
    }

    pub fn received_methods(&self) -> Vec<String> {
        self.inner
            .lock()
            .received
            .iter()
            .filter_map(|m| m["method"].as_str().map(str::to_string))
            .collect()
    }
}

async fn handshake(
    State(server): State<TestServer>,
) -> Sse<BoxStream<'static, Result<Event, Infallible>>> {
    let mut inner = server.inner.lock();
    inner.next_session += 1;

    let stream = match server.announce {
        Announce::Silent => stream::pending().boxed(),
        Announce::MissingSessionId => {
            stream::once(async {
                Ok::<_, Infallible>(Event::default().event("endpoint").data("/messages"))
            })
                .chain(stream::pending())
                .boxed()
        }
        Announce::Normal => {
            let session_id = format!("session-{}", inner.next_session);
            let (tx, rx) = mpsc::unbounded_channel();
            inner.sessions.insert(session_id.clone(), tx);

            let endpoint = Event::default()
                .event("endpoint")
                .data(format!("/messages?sessionId={session_id}"));
            stream::once(async move { Ok::<_, Infallible>(endpoint) })
                .chain(stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|event| (Ok(event), rx))
                }))
                .boxed()
        }
    };
    Sse::new(stream)
}

async fn command(
    State(server): State<TestServer>,
    Query(query): Query<HashMap<String, String>>,
    Json(message): Json<Value>,
) -> Response {
    let session_id = query.get("sessionId").cloned().unwrap_or_default();
    let mut inner = server.inner.lock();
    let Some(tx) = inner.sessions.get(&session_id).cloned() else {
        return (StatusCode::NOT_FOUND, "Session not found").into_response();
    };
    inner.received.push(message.clone());
    drop(inner);

    let (Some(id), Some(method)) = (message.get("id"), message["method"].as_str()) else {
        return StatusCode::ACCEPTED.into_response();
    };

    let result = match method {
        "initialize" => json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": {"name": "test-server", "version": "1.0.0"},
            "capabilities": {"tools": {}}
        }),
        // Accepted but never answered
        "hold" => return StatusCode::ACCEPTED.into_response(),
        other => json!({"method": other, "params": message.get("params").cloned()}),
    };

    let reply = json!({"jsonrpc": "2.0", "id": id, "result": result});
    let _ = tx.send(Event::default().event("message").data(reply.to_string()));
    StatusCode::ACCEPTED.into_response()
}
