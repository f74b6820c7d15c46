//! MortalNet - chat and matchmaking server for a small fighting-game
//! community.
//!
//! Clients hold a long-lived TCP connection speaking a one-byte-prefix line
//! protocol; the server keeps a shared in-memory registry of players,
//! fans out broadcasts, pairs queued players, and exposes a read-only HTTP
//! observation surface.

pub mod config;
pub mod error;
pub mod handlers;
pub mod http;
pub mod metrics;
pub mod network;
pub mod proto;
pub mod security;
pub mod state;
pub mod stats;
