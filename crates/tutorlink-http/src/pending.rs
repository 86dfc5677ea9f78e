//! Correlation table pairing outgoing requests with their responses.
//!
//! Responses can arrive inline in the POST body or later on the session's
//! event stream, so every call registers a waiter here before it is sent.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};
use tutorlink_protocol::{CorrelationId, JsonRpcMessage, JsonRpcResponse};

struct Waiter {
    session_id: String,
    sender: oneshot::Sender<JsonRpcResponse>,
}

/// Outstanding requests keyed by correlation id.
///
/// Also owns the id counter, so ids are unique for the lifetime of the
/// client and never reused across sessions.
pub struct PendingRequests {
    next_id: AtomicU64,
    waiters: Mutex<HashMap<CorrelationId, Waiter>>,
}

impl std::fmt::Debug for PendingRequests {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequests")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .field("pending", &self.len())
            .finish()
    }
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingRequests {
    /// Empty table; the first id handed out is 1.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            waiters: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate the next correlation id.
    pub fn next_id(&self) -> CorrelationId {
        CorrelationId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a waiter for `id`, issued on `session_id`.
    pub fn register(
        &self,
        id: CorrelationId,
        session_id: &str,
    ) -> oneshot::Receiver<JsonRpcResponse> {
        let (sender, receiver) = oneshot::channel();
        self.waiters.lock().insert(
            id,
            Waiter {
                session_id: session_id.to_string(),
                sender,
            },
        );
        receiver
    }

    /// Hand a response to its waiter.
    ///
    /// Returns `false` when nobody is waiting (unknown, timed out or already
    /// answered); such responses are dropped.
    pub fn complete(&self, response: JsonRpcResponse) -> bool {
        let Some(id) = response.id else {
            warn!("Dropping response without id: {:?}", response.error_object());
            return false;
        };

        let waiter = self.waiters.lock().remove(&id);
        match waiter {
            Some(waiter) => {
                trace!(id = %id, "Routing response to waiter");
                // Receiver may already be gone if the caller was cancelled
                waiter.sender.send(response).is_ok()
            }
            None => {
                warn!(id = %id, "Received response for unknown request id");
                false
            }
        }
    }

    /// Forget a waiter without answering it.
    pub fn cancel(&self, id: CorrelationId) -> bool {
        self.waiters.lock().remove(&id).is_some()
    }

    /// Drop every waiter issued on `session_id`; their receivers observe a
    /// closed channel. Returns how many were failed.
    pub fn fail_session(&self, session_id: &str) -> usize {
        let mut waiters = self.waiters.lock();
        let before = waiters.len();
        waiters.retain(|_, waiter| waiter.session_id != session_id);
        before - waiters.len()
    }

    /// Drop every waiter. Returns how many were failed.
    pub fn fail_all(&self) -> usize {
        let mut waiters = self.waiters.lock();
        let count = waiters.len();
        waiters.clear();
        count
    }

    /// Number of outstanding requests
    pub fn len(&self) -> usize {
        self.waiters.lock().len()
    }

    /// Whether nothing is outstanding
    pub fn is_empty(&self) -> bool {
        self.waiters.lock().is_empty()
    }

    /// Route a JSON payload (single message or batch) received from the
    /// server. Returns how many responses reached a waiter.
    pub fn route_text(&self, payload: &str) -> usize {
        let trimmed = payload.trim();
        if trimmed.is_empty() {
            return 0;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Array(items)) => items
                .into_iter()
                .map(|item| usize::from(self.route_value(item)))
                .sum(),
            Ok(value) => usize::from(self.route_value(value)),
            Err(e) => {
                warn!("Ignoring non-JSON message from server: {}", e);
                0
            }
        }
    }

    fn route_value(&self, value: Value) -> bool {
        match serde_json::from_value::<JsonRpcMessage>(value) {
            Ok(JsonRpcMessage::Response(response)) => self.complete(response),
            Ok(JsonRpcMessage::Notification(notification)) => {
                debug!(method = %notification.method, "Ignoring server notification");
                false
            }
            Ok(JsonRpcMessage::Request(request)) => {
                debug!(method = %request.method, id = %request.id, "Ignoring server request");
                false
            }
            Err(e) => {
                warn!("Ignoring malformed JSON-RPC message: {}", e);
                false
            }
        }
    }
}
