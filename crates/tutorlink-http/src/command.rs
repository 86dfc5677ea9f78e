//! JSON-RPC calls over a session's command endpoint.

use futures::StreamExt;
use reqwest::{Client as HttpClient, StatusCode, header};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, trace, warn};
use tutorlink_protocol::{
    CorrelationId, Error, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, Result,
};

use crate::pending::PendingRequests;
use crate::session::Session;
use crate::sse::{SseDecoder, is_event_stream_content_type};

const ACCEPT_COMMAND: &str = "application/json, text/event-stream";

/// POSTs JSON-RPC messages to a session's command endpoint.
#[derive(Debug, Clone)]
pub struct CommandChannel {
    http: HttpClient,
    request_timeout: Duration,
}

impl CommandChannel {
    /// Channel sharing `http` with the negotiator.
    pub fn new(http: HttpClient, request_timeout: Duration) -> Self {
        Self {
            http,
            request_timeout,
        }
    }

    /// Per-call response timeout
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Send a request and wait for its response.
    ///
    /// The waiter is registered before the POST goes out, so a response that
    /// races ahead on the event stream is never lost. The POST and the wait
    /// share one `request_timeout` deadline. The waiter is removed on every
    /// exit path, including the caller dropping this future.
    ///
    /// # Errors
    ///
    /// Returns the POST failure ([`Error::SessionInvalid`],
    /// [`Error::Transport`]), [`Error::RequestTimeout`] when no response
    /// arrives in time, or [`Error::Closed`] when the session ends first.
    /// A JSON-RPC error reply is returned as a normal response.
    pub async fn call(
        &self,
        session: &Session,
        request: &JsonRpcRequest,
        pending: &PendingRequests,
    ) -> Result<JsonRpcResponse> {
        let id = request.id;
        let receiver = pending.register(id, session.id());
        let _guard = WaiterGuard { pending, id };

        let exchange = async {
            self.post(session, request, pending).await?;
            let response = receiver.await.map_err(|_| {
                Error::Closed(format!(
                    "session {} ended before '{}' (id {id}) was answered",
                    session.id(),
                    request.method
                ))
            })?;
            Ok::<_, Error>(response)
        };

        match tokio::time::timeout(self.request_timeout, exchange).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::RequestTimeout {
                method: request.method.clone(),
                id: id.0,
                timeout: self.request_timeout,
            }),
        }
    }

    /// Fire a notification; no response is expected.
    ///
    /// # Errors
    ///
    /// Same POST failures as [`CommandChannel::post`].
    pub async fn notify(
        &self,
        session: &Session,
        notification: &JsonRpcNotification,
        pending: &PendingRequests,
    ) -> Result<()> {
        self.post(session, notification, pending).await
    }

    /// POST one message and route whatever the body carries.
    ///
    /// `202 Accepted` or an empty body means the reply will come over the
    /// event stream. A JSON body or an event-stream body is routed through
    /// `pending` right away.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionInvalid`] for 404, 410, or a 400 whose body
    ///   mentions the session
    /// - [`Error::Transport`] for any other failure
    pub async fn post<T: Serialize>(
        &self,
        session: &Session,
        message: &T,
        pending: &PendingRequests,
    ) -> Result<()> {
        let body = serde_json::to_vec(message)?;
        trace!(session_id = %session.id(), bytes = body.len(), "POST command");

        let response = self
            .http
            .post(session.command_endpoint().clone())
            .header(header::ACCEPT, ACCEPT_COMMAND)
            .header(header::CONTENT_TYPE, "application/json")
            .timeout(self.request_timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::transport(format!("POST failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &text, session.id()));
        }

        if status == StatusCode::ACCEPTED {
            debug!(session_id = %session.id(), "Command accepted, reply follows on the event stream");
            return Ok(());
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if is_event_stream_content_type(&content_type) {
            let mut decoder = SseDecoder::default();
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(chunk) => {
                        for event in decoder.push(&chunk) {
                            pending.route_text(&event.data);
                        }
                    }
                    Err(e) => {
                        warn!("Error reading POST event stream: {}", e);
                        break;
                    }
                }
            }
            if let Some(event) = decoder.finish() {
                pending.route_text(&event.data);
            }
            return Ok(());
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("reading POST body failed: {e}")))?;
        if text.trim().is_empty() {
            return Ok(());
        }
        if !content_type.contains("json") {
            debug!(content_type = %content_type, "Treating POST body as JSON");
        }
        pending.route_text(&text);
        Ok(())
    }
}

/// Removes a call's waiter however the call ends. A no-op once the
/// response has been routed.
struct WaiterGuard<'a> {
    pending: &'a PendingRequests,
    id: CorrelationId,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        if self.pending.cancel(self.id) {
            trace!(id = %self.id, "Removed unanswered waiter");
        }
    }
}

fn classify_failure(status: StatusCode, body: &str, session_id: &str) -> Error {
    let mentions_session = body.to_ascii_lowercase().contains("session");
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => {
            Error::session_invalid(format!("HTTP {status} for session {session_id}"))
        }
        StatusCode::BAD_REQUEST if mentions_session => {
            Error::session_invalid(format!("HTTP {status}: {}", body.trim()))
        }
        _ => Error::transport(format!("POST failed: HTTP {status}: {}", body.trim())),
    }
}
