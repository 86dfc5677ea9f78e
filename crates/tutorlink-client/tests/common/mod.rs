//! In-process capability server: SSE handshake plus `tools/list` and
//! `tools/call` answered over the event stream.

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
use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tutorlink_client::ClientConfig;

#[derive(Default)]
struct Inner {
    silent: bool,
    reject_all: bool,
    expire_all: bool,
    end_stream_on_initialized: bool,
    next_session: usize,
    streams: HashMap<String, mpsc::UnboundedSender<Event>>,
    revoked: HashSet<String>,
    expired: HashSet<String>,
    text_replies: HashMap<String, String>,
    json_replies: HashMap<String, Value>,
    received: Vec<Value>,
}

#[derive(Clone)]
pub struct CapabilityServer {
    pub addr: SocketAddr,
    inner: Arc<Mutex<Inner>>,
}

impl CapabilityServer {
    pub async fn start() -> Self {
        Self::launch(false).await
    }

    /// Accepts the handshake but never announces an endpoint
    pub async fn start_silent() -> Self {
        Self::launch(true).await
    }

    async fn launch(silent: bool) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = Self {
            addr: listener.local_addr().unwrap(),
            inner: Arc::new(Mutex::new(Inner {
                silent,
                ..Default::default()
            })),
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

    /// Fast-failing client config pointed at this server
    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            base_url: format!("http://{}", self.addr),
            handshake_timeout_ms: 300,
            request_timeout_ms: 2_000,
            max_connect_attempts: 3,
            retry_delay_ms: 20,
            session_retry_delay_ms: 20,
            ..Default::default()
        }
    }

    /// Answer `tool` with a text content block
    pub fn reply_text(&self, tool: &str, text: &str) {
        self.inner
            .lock()
            .text_replies
            .insert(tool.to_string(), text.to_string());
    }

    /// Advertise `response_format` for `tool` and answer JSON requests with
    /// `value` as structured content
    pub fn reply_json(&self, tool: &str, value: Value) {
        self.inner.lock().json_replies.insert(tool.to_string(), value);
    }

    /// Forget a session without closing its event stream, so the next call
    /// on it gets a 404
    pub fn revoke(&self, session_id: &str) {
        self.inner.lock().revoked.insert(session_id.to_string());
    }

    /// Answer every POST, on any session, with a 404
    pub fn reject_everything(&self) {
        self.inner.lock().reject_all = true;
    }

    /// Keep a session's stream open but answer its calls with a JSON-RPC
    /// "Invalid session" error
    pub fn expire(&self, session_id: &str) {
        self.inner.lock().expired.insert(session_id.to_string());
    }

    /// Answer every call, on any session, with a JSON-RPC "Invalid session"
    /// error
    pub fn expire_everything(&self) {
        self.inner.lock().expire_all = true;
    }

    /// End the next session's event stream when its `initialized`
    /// notification arrives, and answer that notification only after the
    /// stream is gone
    pub fn end_stream_during_handshake(&self) {
        self.inner.lock().end_stream_on_initialized = true;
    }

    /// End a session's event stream
    pub fn kick(&self, session_id: &str) {
        self.inner.lock().streams.remove(session_id);
    }

    pub fn handshakes(&self) -> usize {
        self.inner.lock().next_session
    }

    /// Every request received, in arrival order
    pub fn received(&self) -> Vec<Value> {
        self.inner.lock().received.clone()
    }

    pub fn calls_of(&self, method: &str) -> usize {
        self.received()
            .iter()
            .filter(|m| m["method"] == method)
            .count()
    }

    pub fn tool_calls(&self, tool: &str) -> Vec<Value> {
        self.received()
            .into_iter()
            .filter(|m| m["method"] == "tools/call" && m["params"]["name"] == tool)
            .map(|m| m["params"]["arguments"].clone())
            .collect()
    }
}

async fn handshake(
    State(server): State<CapabilityServer>,
) -> Sse<BoxStream<'static, Result<Event, Infallible>>> {
    let mut inner = server.inner.lock();
    inner.next_session += 1;

    if inner.silent {
        return Sse::new(stream::pending().boxed());
    }

    let session_id = format!("session-{}", inner.next_session);
    let (tx, rx) = mpsc::unbounded_channel();
    inner.streams.insert(session_id.clone(), tx);

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("/messages?sessionId={session_id}"));
    Sse::new(
        stream::once(async move { Ok::<_, Infallible>(endpoint) })
            .chain(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|event| (Ok(event), rx))
            }))
            .boxed(),
    )
}

enum Outcome {
    Respond(Response),
    /// Answer 202 after the session's stream has had time to end
    AcceptLater,
}

async fn command(
    State(server): State<CapabilityServer>,
    Query(query): Query<HashMap<String, String>>,
    Json(message): Json<Value>,
) -> Response {
    let session_id = query.get("sessionId").cloned().unwrap_or_default();
    match server.handle(&session_id, message) {
        Outcome::Respond(response) => response,
        Outcome::AcceptLater => {
            tokio::time::sleep(Duration::from_millis(150)).await;
            StatusCode::ACCEPTED.into_response()
        }
    }
}

impl CapabilityServer {
    fn handle(&self, session_id: &str, message: Value) -> Outcome {
        let mut inner = self.inner.lock();
        if inner.reject_all || inner.revoked.contains(session_id) {
            return Outcome::Respond((StatusCode::NOT_FOUND, "Session not found").into_response());
        }
        let Some(tx) = inner.streams.get(session_id).cloned() else {
            return Outcome::Respond((StatusCode::NOT_FOUND, "Session not found").into_response());
        };
        inner.received.push(message.clone());

        if message["method"] == "notifications/initialized"
            && std::mem::take(&mut inner.end_stream_on_initialized)
        {
            inner.streams.remove(session_id);
            return Outcome::AcceptLater;
        }

        let (Some(id), Some(method)) = (message.get("id").cloned(), message["method"].as_str())
        else {
            return Outcome::Respond(StatusCode::ACCEPTED.into_response());
        };

        let reply = if inner.expire_all || inner.expired.contains(session_id) {
            json!({"jsonrpc": "2.0", "id": id, "error": {
                "code": -32000,
                "message": "Invalid session"
            }})
        } else {
            match method {
                // Never answered
                "stall" => return Outcome::Respond(StatusCode::ACCEPTED.into_response()),
                _ => inner.reply(id, method, session_id, &message),
            }
        };
        drop(inner);

        let _ = tx.send(Event::default().event("message").data(reply.to_string()));
        Outcome::Respond(StatusCode::ACCEPTED.into_response())
    }
}

impl Inner {
    fn reply(&self, id: Value, method: &str, session_id: &str, message: &Value) -> Value {
        match method {
            "initialize" => json!({"jsonrpc": "2.0", "id": id, "result": {
                "protocolVersion": "2024-11-05",
                "serverInfo": {"name": "capability-test", "version": "1.0.0"},
                "capabilities": {"tools": {}}
            }}),
            "tools/list" => {
                let mut names: Vec<&String> = self
                    .text_replies
                    .keys()
                    .chain(self.json_replies.keys())
                    .collect();
                names.sort();
                names.dedup();
                let tools: Vec<Value> = names
                    .into_iter()
                    .map(|name| {
                        let mut properties = json!({"child_id": {"type": "string"}});
                        if self.json_replies.contains_key(name) {
                            properties["response_format"] = json!({"enum": ["text", "json"]});
                        }
                        json!({"name": name, "inputSchema": {"type": "object", "properties": properties}})
                    })
                    .collect();
                json!({"jsonrpc": "2.0", "id": id, "result": {"tools": tools}})
            }
            "tools/call" => {
                let name = message["params"]["name"].as_str().unwrap_or_default();
                let wants_json = message["params"]["arguments"]["response_format"] == "json";
                match (self.json_replies.get(name), self.text_replies.get(name)) {
                    (Some(value), _) if wants_json => json!({"jsonrpc": "2.0", "id": id, "result": {
                        "content": [{"type": "text", "text": value.to_string()}],
                        "structuredContent": value
                    }}),
                    (_, Some(text)) => json!({"jsonrpc": "2.0", "id": id, "result": {
                        "content": [{"type": "text", "text": text}]
                    }}),
                    _ => json!({"jsonrpc": "2.0", "id": id, "error": {
                        "code": -32602,
                        "message": format!("Unknown tool: {name}")
                    }}),
                }
            }
            "echo" => json!({"jsonrpc": "2.0", "id": id, "result": {
                "session": session_id,
                "params": message.get("params").cloned()
            }}),
            other => json!({"jsonrpc": "2.0", "id": id, "error": {
                "code": -32601,
                "message": format!("Method not found: {other}")
            }}),
        }
    }
}
