//! SSE handshake producing a [`Session`].
//!
//! The handshake GET opens a `text/event-stream`; the server's first
//! `endpoint` event names the command endpoint and session id. The same
//! stream then stays open in a listener task that routes `message` events
//! to waiting calls and reports teardown when it ends.

use futures::StreamExt;
use reqwest::{Client as HttpClient, header};
use serde_json::json;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use tutorlink_protocol::{
    CLIENT_NAME, CLIENT_VERSION, Error, JsonRpcNotification, JsonRpcRequest, PROTOCOL_VERSION,
    Result,
};
use url::Url;

use crate::command::CommandChannel;
use crate::endpoint::{EndpointAnnouncement, parse_announcement};
use crate::pending::PendingRequests;
use crate::session::{ListenerGuard, Session, TeardownHandler};
use crate::sse::{SseDecoder, SseEvent, is_event_stream_content_type};

/// Handshake settings
#[derive(Debug, Clone)]
pub struct NegotiatorConfig {
    /// Server base URL
    pub base_url: Url,
    /// Path of the event-stream endpoint, joined onto `base_url`
    pub sse_path: String,
    /// Budget for the whole handshake, from GET to endpoint announcement
    pub handshake_timeout: Duration,
    /// Budget for each JSON-RPC call, `initialize` included
    pub request_timeout: Duration,
    /// User agent; `None` uses `tutorlink/{version}`
    pub user_agent: Option<String>,
    /// Send `initialize` and `notifications/initialized` after discovery
    pub initialize: bool,
}

impl NegotiatorConfig {
    /// Defaults for everything but the server address.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            sse_path: "/sse".to_string(),
            handshake_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: None,
            initialize: true,
        }
    }
}

/// Performs handshakes against one server.
#[derive(Debug, Clone)]
pub struct SessionNegotiator {
    config: NegotiatorConfig,
    http: HttpClient,
}

impl SessionNegotiator {
    /// Build the negotiator and its HTTP client.
    ///
    /// No client-wide timeout is set, since it would cut the long-lived
    /// event stream; handshake and calls carry their own.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the HTTP client cannot be built.
    pub fn new(config: NegotiatorConfig) -> Result<Self> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("{CLIENT_NAME}/{CLIENT_VERSION}"));

        let http = HttpClient::builder()
            .connect_timeout(config.handshake_timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, http })
    }

    /// Handshake settings
    pub fn config(&self) -> &NegotiatorConfig {
        &self.config
    }

    /// Command channel sharing this negotiator's HTTP client
    pub fn command_channel(&self) -> CommandChannel {
        CommandChannel::new(self.http.clone(), self.config.request_timeout)
    }

    /// Absolute URL of the event-stream endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `sse_path` cannot be joined.
    pub fn handshake_url(&self) -> Result<Url> {
        self.config
            .base_url
            .join(&self.config.sse_path)
            .map_err(|e| Error::Configuration(format!("invalid SSE path: {e}")))
    }

    /// Run one handshake.
    ///
    /// `on_teardown` fires once, with the session id, if the event stream
    /// later ends or the server sends an `error` event. It does not fire
    /// when the session is closed or dropped locally.
    ///
    /// # Errors
    ///
    /// - [`Error::HandshakeTimeout`] if no announcement arrives in time
    /// - [`Error::HandshakeRejected`] for a non-2xx status, a non-stream
    ///   content type, an unusable announcement, or a failed `initialize`
    /// - [`Error::Transport`] if the server cannot be reached
    pub async fn negotiate(
        &self,
        pending: Arc<PendingRequests>,
        on_teardown: TeardownHandler,
    ) -> Result<Session> {
        let url = self.handshake_url()?;
        let timeout = self.config.handshake_timeout;
        info!(url = %url, "Starting session handshake");

        let (announcement, guard) =
            tokio::time::timeout(timeout, self.open_stream(url, Arc::clone(&pending), on_teardown))
                .await
                .map_err(|_| Error::HandshakeTimeout { timeout })??;

        let listener = guard
            .into_inner()
            .ok_or_else(|| Error::rejected("listener task missing after announcement"))?;
        let mut session = Session::with_listener(
            announcement.session_id,
            announcement.command_endpoint,
            listener,
        );

        if self.config.initialize {
            self.initialize(&mut session, &pending).await?;
        }

        info!(
            session_id = %session.id(),
            endpoint = %session.command_endpoint(),
            "Session ready"
        );
        Ok(session)
    }

    async fn open_stream(
        &self,
        url: Url,
        pending: Arc<PendingRequests>,
        on_teardown: TeardownHandler,
    ) -> Result<(EndpointAnnouncement, ListenerGuard)> {
        let response = self
            .http
            .get(url.clone())
            .header(header::ACCEPT, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| Error::transport(format!("handshake request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::rejected(format!("handshake returned HTTP {status}")));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !is_event_stream_content_type(content_type) {
            return Err(Error::rejected(format!(
                "handshake returned '{content_type}' instead of an event stream"
            )));
        }

        let (announce_tx, announce_rx) = oneshot::channel();
        let listener = StreamListener {
            base: url,
            announce: Some(announce_tx),
            session_id: None,
            pending,
        };
        let guard = ListenerGuard::new(tokio::spawn(listener.run(response, on_teardown)));

        match announce_rx.await {
            Ok(Ok(announcement)) => {
                debug!(session_id = %announcement.session_id, "Endpoint announced");
                Ok((announcement, guard))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::rejected(
                "event stream closed before the endpoint announcement",
            )),
        }
    }

    async fn initialize(&self, session: &mut Session, pending: &PendingRequests) -> Result<()> {
        let channel = self.command_channel();
        let request = JsonRpcRequest::new(
            pending.next_id(),
            "initialize",
            Some(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {"name": CLIENT_NAME, "version": CLIENT_VERSION},
            })),
        );

        let response = channel
            .call(session, &request, pending)
            .await
            .map_err(|e| Error::rejected(format!("initialize failed: {e}")))?;
        let result = response
            .into_result()
            .map_err(|e| Error::rejected(format!("initialize refused: {e}")))?;
        session.set_server_info(result);

        channel
            .notify(
                session,
                &JsonRpcNotification::new("notifications/initialized", None),
                pending,
            )
            .await
            .map_err(|e| Error::rejected(format!("initialized notification failed: {e}")))
    }
}

struct StreamListener {
    base: Url,
    announce: Option<oneshot::Sender<Result<EndpointAnnouncement>>>,
    session_id: Option<String>,
    pending: Arc<PendingRequests>,
}

impl StreamListener {
    async fn run(mut self, response: reqwest::Response, on_teardown: TeardownHandler) {
        let mut decoder = SseDecoder::default();
        let mut stream = response.bytes_stream();

        let reason = loop {
            let events = match stream.next().await {
                Some(Ok(chunk)) => decoder.push(&chunk),
                Some(Err(e)) => break format!("event stream read failed: {e}"),
                None => {
                    if let Some(event) = decoder.finish()
                        && let ControlFlow::Break(reason) = self.on_event(event)
                    {
                        break reason;
                    }
                    break "event stream ended".to_string();
                }
            };
            if let ControlFlow::Break(reason) = self.drain(events) {
                break reason;
            }
        };

        if let Some(announce) = self.announce.take() {
            let _ = announce.send(Err(Error::rejected(reason)));
            return;
        }
        if let Some(session_id) = self.session_id.take() {
            let failed = self.pending.fail_session(&session_id);
            warn!(session_id = %session_id, failed, reason = %reason, "Session event stream closed");
            on_teardown(&session_id);
        }
    }

    fn drain(&mut self, events: Vec<SseEvent>) -> ControlFlow<String> {
        for event in events {
            self.on_event(event)?;
        }
        ControlFlow::Continue(())
    }

    fn on_event(&mut self, event: SseEvent) -> ControlFlow<String> {
        match event.event_type() {
            "endpoint" => {
                if self.session_id.is_some() {
                    debug!("Ignoring repeated endpoint announcement");
                    return ControlFlow::Continue(());
                }
                match parse_announcement(&event.data, &self.base) {
                    Ok(announcement) => {
                        self.session_id = Some(announcement.session_id.clone());
                        if let Some(announce) = self.announce.take() {
                            let _ = announce.send(Ok(announcement));
                        }
                        ControlFlow::Continue(())
                    }
                    Err(e) => {
                        let reason = e.to_string();
                        if let Some(announce) = self.announce.take() {
                            let _ = announce.send(Err(e));
                        }
                        ControlFlow::Break(reason)
                    }
                }
            }
            "message" => {
                if !event.data.trim().is_empty() {
                    self.pending.route_text(&event.data);
                }
                ControlFlow::Continue(())
            }
            "error" => ControlFlow::Break(format!("server error event: {}", event.data.trim())),
            other => {
                debug!(event = %other, "Ignoring unknown event type");
                ControlFlow::Continue(())
            }
        }
    }
}
