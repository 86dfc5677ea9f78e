//! # Tutorlink Client
//!
//! Typed client for a remote capability server reached over an SSE
//! handshake and JSON-RPC calls.
//!
//! ## Layers
//!
//! - [`ConnectionSupervisor`]: owns the session. One handshake sequence at a
//!   time, shared by every caller, with fixed-delay retries.
//! - [`RequestDispatcher`]: correlated calls; reports rejected sessions and
//!   retries reads once on a fresh session.
//! - [`ToolClient`]: one method per remote tool, turning text replies into
//!   records and every failure into a safe default.
//! - [`LearnerRegistry`]: one client per learner id.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tutorlink_client::{ClientConfig, SearchCategory, ToolClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! tutorlink_client::init_tracing(&config.logging)?;
//!
//! let client = ToolClient::new(&config)?;
//! let outcome = client.search("learner-42", "fractions", SearchCategory::Assignments).await;
//! if let Some(envelope) = outcome.envelope() {
//!     println!("{}", envelope.summary);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod dispatcher;
pub mod invoker;
pub mod logging;
pub mod registry;
pub mod supervisor;
pub mod tools;

pub use config::{ClientConfig, ConfigError, ENV_PREFIX, LoggingConfig};
pub use dispatcher::{Idempotency, RequestDispatcher};
pub use invoker::{LearningContext, SearchOutcome, ToolClient};
pub use logging::init_tracing;
pub use registry::LearnerRegistry;
pub use supervisor::{ConnectionState, ConnectionSupervisor};
pub use tools::ToolDescriptor;

pub use tutorlink_protocol::{Error, ErrorKind, Result, ToolCallResult};
pub use tutorlink_records::{
    MaterialAccess, MaterialContent, SearchCategory, SearchEnvelope, SpecificQuestion,
};
