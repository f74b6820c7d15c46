//! Networking: line codec, accept loop, and per-connection sessions.

pub mod codec;
pub mod gateway;
pub mod session;

pub use gateway::Gateway;
