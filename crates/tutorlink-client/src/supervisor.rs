//! Connection lifecycle for one capability server.
//!
//! ```text
//! Disconnected --ensure_connected--> Negotiating --ok--> Ready
//!                                     |   ^                |
//!                           failure,  |   | retry delay    | invalidate /
//!                           retries   v   |                | stream teardown
//!                           left     (attempt n+1)         v
//!                                     |                 Disconnected
//!                        exhausted    v
//!                                   Failed --ensure_connected--> Negotiating
//! ```
//!
//! Only one handshake sequence runs at a time. It is spawned as its own task
//! and published as a shared future, so every concurrent caller of
//! [`ConnectionSupervisor::ensure_connected`] awaits the same outcome, and
//! the outcome is recorded even if all of them give up waiting.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};
use tutorlink_http::{
    CommandChannel, PendingRequests, RetryPolicy, Session, SessionNegotiator, TeardownHandler,
};
use tutorlink_protocol::{Error, Result};

use crate::config::ClientConfig;

type HandshakeFlight = Shared<BoxFuture<'static, Result<Arc<Session>>>>;

/// Observable connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No session; the next call starts a handshake
    Disconnected,
    /// A handshake sequence is running
    Negotiating,
    /// A session is live
    Ready,
    /// The last handshake sequence ran out of attempts
    Failed,
}

enum Slot {
    Disconnected,
    Negotiating {
        epoch: u64,
        flight: HandshakeFlight,
        // Sessions whose stream ended before the flight settled
        torn_down: Vec<String>,
    },
    Ready(Arc<Session>),
    Failed,
}

impl Slot {
    fn state(&self) -> ConnectionState {
        match self {
            Self::Disconnected => ConnectionState::Disconnected,
            Self::Negotiating { .. } => ConnectionState::Negotiating,
            Self::Ready(_) => ConnectionState::Ready,
            Self::Failed => ConnectionState::Failed,
        }
    }
}

struct SupervisorInner {
    negotiator: SessionNegotiator,
    policy: RetryPolicy,
    pending: Arc<PendingRequests>,
    slot: Mutex<Slot>,
    next_epoch: AtomicU64,
    handshake_attempts: AtomicU32,
}

/// Owns the session and every transition of its state.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct ConnectionSupervisor {
    inner: Arc<SupervisorInner>,
}

impl std::fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("state", &self.state())
            .field("policy", &self.inner.policy)
            .field("handshake_attempts", &self.handshake_attempts())
            .finish()
    }
}

impl ConnectionSupervisor {
    /// Supervisor over `negotiator`, retrying handshakes per `policy`.
    pub fn new(negotiator: SessionNegotiator, policy: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(SupervisorInner {
                negotiator,
                policy,
                pending: Arc::new(PendingRequests::new()),
                slot: Mutex::new(Slot::Disconnected),
                next_epoch: AtomicU64::new(1),
                handshake_attempts: AtomicU32::new(0),
            }),
        }
    }

    /// Build the negotiator and retry policy from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the config is invalid or the HTTP
    /// client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::Configuration(e.to_string()))?;
        let negotiator_config = config
            .negotiator_config()
            .map_err(|e| Error::Configuration(e.to_string()))?;
        let negotiator = SessionNegotiator::new(negotiator_config)?;
        Ok(Self::new(negotiator, config.retry_policy()))
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.inner.slot.lock().state()
    }

    /// Handshakes attempted over this supervisor's lifetime
    pub fn handshake_attempts(&self) -> u32 {
        self.inner.handshake_attempts.load(Ordering::Relaxed)
    }

    /// Correlation table shared with every session this supervisor opens
    pub fn pending(&self) -> &Arc<PendingRequests> {
        &self.inner.pending
    }

    /// Command channel sharing the negotiator's HTTP client
    pub fn command_channel(&self) -> CommandChannel {
        self.inner.negotiator.command_channel()
    }

    /// The live session, negotiating one if needed.
    ///
    /// Concurrent callers share a single handshake sequence. After a
    /// `Failed` sequence the next call starts a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionExhausted`] when every attempt failed,
    /// [`Error::Configuration`] for an unusable handshake URL, or
    /// [`Error::Closed`] if [`ConnectionSupervisor::disconnect`] ran while
    /// the handshake was in flight.
    pub async fn ensure_connected(&self) -> Result<Arc<Session>> {
        let flight = {
            let mut slot = self.inner.slot.lock();
            match &*slot {
                Slot::Ready(session) => return Ok(Arc::clone(session)),
                Slot::Negotiating { flight, .. } => flight.clone(),
                Slot::Disconnected | Slot::Failed => {
                    let epoch = self.inner.next_epoch.fetch_add(1, Ordering::Relaxed);
                    let flight = self.launch(epoch);
                    *slot = Slot::Negotiating {
                        epoch,
                        flight: flight.clone(),
                        torn_down: Vec::new(),
                    };
                    flight
                }
            }
        };
        flight.await
    }

    /// Drop the session if `session_id` is still the current one.
    ///
    /// Reports about an older session are ignored. Returns whether the
    /// current session was torn down.
    pub fn invalidate(&self, session_id: &str) -> bool {
        SupervisorInner::invalidate(&self.inner, session_id)
    }

    /// Tear down the current session, or abandon a handshake in flight.
    ///
    /// Every call still waiting for a response fails with
    /// [`Error::Closed`].
    pub fn disconnect(&self) {
        let previous = std::mem::replace(&mut *self.inner.slot.lock(), Slot::Disconnected);
        match previous {
            Slot::Ready(session) => {
                session.close();
                let failed = self.inner.pending.fail_all();
                info!(session_id = %session.id(), failed, "Disconnected");
            }
            Slot::Negotiating { epoch, .. } => {
                debug!(epoch, "Disconnected during handshake");
            }
            Slot::Disconnected | Slot::Failed => {}
        }
    }

    // Held under the slot lock by the caller; the spawned task cannot record
    // its outcome before the slot points at this flight.
    fn launch(&self, epoch: u64) -> HandshakeFlight {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let outcome = SupervisorInner::run_handshakes(&inner).await;
            SupervisorInner::settle(&inner, epoch, outcome)
        });

        async move {
            task.await
                .unwrap_or_else(|e| Err(Error::Closed(format!("handshake task ended: {e}"))))
        }
        .boxed()
        .shared()
    }
}

impl SupervisorInner {
    async fn run_handshakes(inner: &Arc<Self>) -> Result<Arc<Session>> {
        let max_attempts = inner.policy.max_attempts();
        let mut attempt = 0u32;

        loop {
            inner.handshake_attempts.fetch_add(1, Ordering::Relaxed);
            let on_teardown = Self::teardown_handler(Arc::downgrade(inner));

            match inner
                .negotiator
                .negotiate(Arc::clone(&inner.pending), on_teardown)
                .await
            {
                Ok(session) => return Ok(Arc::new(session)),
                Err(e) if !e.is_handshake_failure() => return Err(e),
                Err(e) => match inner.policy.delay_after(attempt) {
                    Some(delay) => {
                        warn!(
                            attempt = attempt + 1,
                            max_attempts,
                            error = %e,
                            retry_in = ?delay,
                            "Handshake failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        error!(attempts = attempt + 1, error = %e, "Handshake attempts exhausted");
                        return Err(Error::ConnectionExhausted {
                            attempts: attempt + 1,
                            last_error: e.to_string(),
                        });
                    }
                },
            }
        }
    }

    /// Record a finished sequence unless it was abandoned meanwhile.
    ///
    /// A session whose event stream already ended is not published; the
    /// slot goes back to `Disconnected` and waiters see
    /// [`Error::SessionInvalid`].
    fn settle(inner: &Self, epoch: u64, outcome: Result<Arc<Session>>) -> Result<Arc<Session>> {
        let mut slot = inner.slot.lock();
        let torn_down = match &mut *slot {
            Slot::Negotiating {
                epoch: current,
                torn_down,
                ..
            } if *current == epoch => std::mem::take(torn_down),
            _ => {
                if let Ok(session) = &outcome {
                    session.close();
                }
                return Err(Error::Closed(
                    "disconnected while the handshake was in flight".to_string(),
                ));
            }
        };

        let outcome = match outcome {
            Ok(session)
                if !session.is_listening() || torn_down.iter().any(|id| id == session.id()) =>
            {
                session.close();
                warn!(session_id = %session.id(), "Event stream ended before the session was ready");
                Err(Error::session_invalid(format!(
                    "event stream for session {} ended during the handshake",
                    session.id()
                )))
            }
            other => other,
        };

        *slot = match &outcome {
            Ok(session) => Slot::Ready(Arc::clone(session)),
            Err(e) if e.is_session_invalid() => Slot::Disconnected,
            Err(_) => Slot::Failed,
        };
        outcome
    }

    fn teardown_handler(inner: Weak<Self>) -> TeardownHandler {
        Arc::new(move |session_id: &str| {
            if let Some(inner) = inner.upgrade() {
                Self::invalidate(&inner, session_id);
            }
        })
    }

    fn invalidate(inner: &Self, session_id: &str) -> bool {
        let mut slot = inner.slot.lock();
        let session = match &mut *slot {
            Slot::Ready(session) if session.id() == session_id => Arc::clone(session),
            Slot::Negotiating { torn_down, .. } => {
                debug!(session_id, "Teardown reported while negotiating");
                torn_down.push(session_id.to_string());
                return false;
            }
            _ => {
                debug!(session_id, "Ignoring invalidation of a stale session");
                return false;
            }
        };
        *slot = Slot::Disconnected;
        drop(slot);

        session.close();
        let failed = inner.pending.fail_session(session_id);
        warn!(session_id, failed, "Session invalidated");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tutorlink_http::NegotiatorConfig;
    use url::Url;

    fn unreachable_supervisor(policy: RetryPolicy) -> ConnectionSupervisor {
        // Port 9 (discard) is closed on test machines
        let mut config = NegotiatorConfig::new(Url::parse("http://127.0.0.1:9").unwrap());
        config.handshake_timeout = Duration::from_millis(500);
        ConnectionSupervisor::new(SessionNegotiator::new(config).unwrap(), policy)
    }

    #[test]
    fn test_starts_disconnected() {
        let supervisor = unreachable_supervisor(RetryPolicy::Never);
        assert_eq!(supervisor.state(), ConnectionState::Disconnected);
        assert_eq!(supervisor.handshake_attempts(), 0);
        assert!(supervisor.pending().is_empty());
    }

    #[test]
    fn test_stale_invalidation_is_ignored() {
        let supervisor = unreachable_supervisor(RetryPolicy::Never);
        assert!(!supervisor.invalidate("session-that-never-was"));
        assert_eq!(supervisor.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_unreachable_server_exhausts_attempts() {
        let supervisor = unreachable_supervisor(RetryPolicy::Fixed {
            interval: Duration::from_millis(10),
            max_attempts: 2,
        });

        let err = supervisor.ensure_connected().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionExhausted { attempts: 2, .. }));
        assert_eq!(supervisor.state(), ConnectionState::Failed);
        assert_eq!(supervisor.handshake_attempts(), 2);

        // A failed sequence does not stick
        let err = supervisor.ensure_connected().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionExhausted { .. }));
        assert_eq!(supervisor.handshake_attempts(), 4);
    }

    #[test]
    fn test_from_config_rejects_invalid_config() {
        let config = ClientConfig {
            max_connect_attempts: 0,
            ..Default::default()
        };
        assert!(matches!(
            ConnectionSupervisor::from_config(&config),
            Err(Error::Configuration(_))
        ));
    }
}
