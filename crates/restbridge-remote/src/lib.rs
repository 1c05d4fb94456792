//! HTTP plumbing for restbridge.
//!
//! This crate provides the outbound request/response types exchanged with
//! hooks (`PreparedRequest`, `HttpResponse`), a per-call cancellation and
//! deadline carrier (`CallContext`), the shared client configuration
//! (`HttpConfig`), and a blocking transport over `ureq` that never follows
//! redirects.

pub mod config;
pub mod context;
pub mod http;
pub mod message;

pub use config::HttpConfig;
pub use context::CallContext;
pub use http::HttpTransport;
pub use message::{HttpResponse, PreparedRequest};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("call cancelled")]
    Cancelled,
    #[error("call deadline exceeded")]
    DeadlineExceeded,
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("http config error: {0}")]
    Config(String),
}

/// Sends prepared requests. Implementations must be usable from many threads.
pub trait Transport: Send + Sync {
    /// Perform one exchange. Any received status is returned as a response;
    /// only transport failures, cancellation and deadlines are errors.
    fn send(&self, request: &PreparedRequest, ctx: &CallContext)
        -> Result<HttpResponse, RemoteError>;
}
