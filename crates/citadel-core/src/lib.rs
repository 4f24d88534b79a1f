//! # citadel-core
//!
//! Client library for the citadel container orchestration API.
//!
//! The interesting part is the streamed operations (build, deploy, remove,
//! upgrade, log): the server answers with one JSON object per line, flushed as the
//! job progresses, and the client turns that into a lazy, cancelable
//! sequence of typed events.
//!
//! ## Key Concepts
//!
//! - **Operation**: a request type that knows its path and its event type
//! - **OperationStream**: the pull-based event sequence of one operation
//! - **Severity**: whether an event is progress, a soft per-item failure, or
//!   a fatal error that ends the stream
//!
//! ```ignore
//! use citadel_core::{Client, ClientConfig, RemoveRequest};
//!
//! let client = Client::new(ClientConfig::new("http://citadel.local").auth_token("..."));
//! for item in client.remove(&RemoveRequest::new(["id1", "id2"])?)? {
//!     let result = item?.event;
//!     println!("{} {}", result.id, result.success);
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod git;
pub mod logging;
pub mod operations;
pub mod paths;
pub mod stream;
pub mod transport;

// Re-export commonly used types
pub use client::Client;
pub use config::CliConfig;
pub use error::{ApiError, ConfigError, TransportErrorKind};
pub use git::{GitCli, VcsMetadata};
pub use operations::{
    BatchOutcome, BatchTally, BuildRequest, DeployEvent, DeployRequest, DeployResult, EntityIds,
    FatalPolicy, LogLine, LogRequest, NarrationEvent, Operation, RemoveRequest, RemoveResult,
    Revision, Severity, StreamEvent, UpgradeRequest, UpgradeResult,
};
pub use stream::{Classified, OperationStream, Termination};
pub use transport::ClientConfig;
