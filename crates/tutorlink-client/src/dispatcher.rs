//! Correlated JSON-RPC calls over the supervised session.

use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use tutorlink_http::CommandChannel;
use tutorlink_protocol::{CorrelationId, Error, JsonRpcRequest, Result};

use crate::supervisor::ConnectionSupervisor;

/// Whether a call may be repeated without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Idempotency {
    /// Safe to repeat; retried once on a fresh session if the old one was
    /// rejected
    Read,
    /// Never repeated automatically
    Write,
}

/// Sends requests and hands back their `result`.
///
/// Every failure that means the session is gone is reported to the
/// supervisor. Only [`Idempotency::Read`] calls are retried, exactly once,
/// and only for [`Error::SessionInvalid`]. Transport errors and timeouts are
/// returned as they are.
#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    supervisor: ConnectionSupervisor,
    channel: CommandChannel,
    session_retry_delay: Duration,
}

impl RequestDispatcher {
    /// Dispatcher over `supervisor`, waiting `session_retry_delay` before a
    /// read is retried.
    pub fn new(supervisor: ConnectionSupervisor, session_retry_delay: Duration) -> Self {
        let channel = supervisor.command_channel();
        Self {
            supervisor,
            channel,
            session_retry_delay,
        }
    }

    /// The supervisor this dispatcher reports to
    pub fn supervisor(&self) -> &ConnectionSupervisor {
        &self.supervisor
    }

    /// Next correlation id. Ids never repeat for the life of the client.
    pub fn next_id(&self) -> CorrelationId {
        self.supervisor.pending().next_id()
    }

    /// Call `method` and return its `result`.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionExhausted`] if no session could be negotiated
    /// - [`Error::SessionInvalid`] if the session was rejected (after the
    ///   single retry, for reads)
    /// - [`Error::Rpc`] for any other JSON-RPC error reply
    /// - [`Error::Transport`], [`Error::RequestTimeout`] or [`Error::Closed`]
    ///   for delivery failures
    pub async fn send(
        &self,
        method: &str,
        params: Option<Value>,
        idempotency: Idempotency,
    ) -> Result<Value> {
        match self.send_once(method, params.clone()).await {
            Err(e) if e.is_session_invalid() && idempotency == Idempotency::Read => {
                warn!(
                    method,
                    error = %e,
                    retry_in = ?self.session_retry_delay,
                    "Session rejected, retrying read on a fresh session"
                );
                tokio::time::sleep(self.session_retry_delay).await;
                self.send_once(method, params).await
            }
            outcome => outcome,
        }
    }

    async fn send_once(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let session = self.supervisor.ensure_connected().await?;
        let id = self.next_id();
        let request = JsonRpcRequest::new(id, method, params);
        debug!(method, id = id.0, session_id = %session.id(), "Dispatching call");

        let outcome = self
            .channel
            .call(&session, &request, self.supervisor.pending())
            .await
            .and_then(|response| response.into_result().map_err(|e| Error::from_rpc(&e)));

        if let Err(e) = &outcome {
            if e.is_session_invalid() {
                self.supervisor.invalidate(session.id());
            }
            warn!(
                method,
                id = id.0,
                session_id = %session.id(),
                kind = %e.kind(),
                error = %e,
                "Call failed"
            );
        }
        outcome
    }
}
