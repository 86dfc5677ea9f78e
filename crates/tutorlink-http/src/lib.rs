//! # Tutorlink HTTP
//!
//! Session plumbing between the Tutorlink client and a capability server:
//!
//! - [`SessionNegotiator`] opens the `text/event-stream` handshake, waits for
//!   the endpoint announcement and yields a [`Session`].
//! - [`CommandChannel`] POSTs JSON-RPC messages to the session's command
//!   endpoint.
//! - [`PendingRequests`] pairs responses, inline or streamed, with the calls
//!   waiting on them.
//! - [`RetryPolicy`] describes how often a handshake is attempted.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tutorlink_http::{NegotiatorConfig, PendingRequests, SessionNegotiator};
//!
//! # async fn run() -> tutorlink_protocol::Result<()> {
//! let config = NegotiatorConfig::new("http://localhost:3001".parse().unwrap());
//! let negotiator = SessionNegotiator::new(config)?;
//! let pending = Arc::new(PendingRequests::new());
//! let session = negotiator
//!     .negotiate(Arc::clone(&pending), Arc::new(|id: &str| eprintln!("{id} ended")))
//!     .await?;
//! println!("session {}", session.id());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod command;
pub mod endpoint;
pub mod negotiator;
pub mod pending;
pub mod retry;
pub mod session;
pub mod sse;

pub use command::CommandChannel;
pub use endpoint::{EndpointAnnouncement, parse_announcement};
pub use negotiator::{NegotiatorConfig, SessionNegotiator};
pub use pending::PendingRequests;
pub use retry::RetryPolicy;
pub use session::{Session, TeardownHandler};
pub use sse::{SseDecoder, SseEvent};
