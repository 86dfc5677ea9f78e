//! A negotiated session: the id and command endpoint every call uses until
//! the server or the client tears it down.

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

/// Callback fired with the session id when the event stream ends on its own.
pub type TeardownHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Live session state.
///
/// Owns the event-stream listener task; closing or dropping the session
/// aborts it, and an aborted listener never fires its teardown handler.
pub struct Session {
    session_id: String,
    command_endpoint: Url,
    server_info: Option<Value>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id)
            .field("command_endpoint", &self.command_endpoint.as_str())
            .field("listening", &self.is_listening())
            .finish()
    }
}

impl Session {
    /// Session without an event-stream listener.
    ///
    /// Responses must then arrive inline in POST bodies.
    pub fn detached(session_id: impl Into<String>, command_endpoint: Url) -> Self {
        Self {
            session_id: session_id.into(),
            command_endpoint,
            server_info: None,
            listener: Mutex::new(None),
        }
    }

    pub(crate) fn with_listener(
        session_id: String,
        command_endpoint: Url,
        listener: JoinHandle<()>,
    ) -> Self {
        Self {
            session_id,
            command_endpoint,
            server_info: None,
            listener: Mutex::new(Some(listener)),
        }
    }

    pub(crate) fn set_server_info(&mut self, info: Value) {
        self.server_info = Some(info);
    }

    /// Server-assigned session id
    pub fn id(&self) -> &str {
        &self.session_id
    }

    /// Absolute URL calls are POSTed to
    pub fn command_endpoint(&self) -> &Url {
        &self.command_endpoint
    }

    /// `initialize` result (server info and capabilities), when negotiated
    pub fn server_info(&self) -> Option<&Value> {
        self.server_info.as_ref()
    }

    /// Whether the event-stream listener is still running
    pub fn is_listening(&self) -> bool {
        self.listener
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the listener. Idempotent.
    pub fn close(&self) {
        if let Some(handle) = self.listener.lock().take() {
            debug!(session_id = %self.session_id, "Closing session listener");
            handle.abort();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.get_mut().take() {
            handle.abort();
        }
    }
}

/// Aborts a listener task unless ownership is taken first.
pub(crate) struct ListenerGuard(Option<JoinHandle<()>>);

impl ListenerGuard {
    pub(crate) fn new(handle: JoinHandle<()>) -> Self {
        Self(Some(handle))
    }

    pub(crate) fn into_inner(mut self) -> Option<JoinHandle<()>> {
        self.0.take()
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_close_aborts_listener() {
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        let session = Session::with_listener(
            "s1".to_string(),
            Url::parse("http://localhost/messages?sessionId=s1").unwrap(),
            handle,
        );
        assert!(session.is_listening());

        session.close();
        assert!(!session.is_listening());
        session.close();
    }

    #[tokio::test]
    async fn test_guard_aborts_on_drop() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _tx = tx;
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        drop(ListenerGuard::new(handle));
        // Sender is dropped with the aborted task
        assert!(rx.await.is_err());
    }

    #[test]
    fn test_detached_session() {
        let session = Session::detached(
            "abc",
            Url::parse("http://localhost/messages?sessionId=abc").unwrap(),
        );
        assert_eq!(session.id(), "abc");
        assert!(!session.is_listening());
        assert!(session.server_info().is_none());
    }
}
