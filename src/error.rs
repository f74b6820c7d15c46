//! Fatal startup errors.
//!
//! Everything here aborts startup with a non-zero exit. Runtime faults
//! (transport, protocol, persistence) are handled where they occur and
//! never bubble into the accept loop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid listen address '{0}' (expected host:port or :port)")]
    InvalidAddr(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load TLS materials from {path}: {reason}")]
    TlsMaterials { path: String, reason: String },
}
