//! The read-model served by the observation surface.
//!
//! Rebuilt by the hub after every membership change and published by
//! swapping an `Arc` under a short critical section, so HTTP handlers never
//! touch the hub's primary lock.

use crate::proto::Status;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct PlayerEntry {
    pub nick: String,
    pub ip: String,
    pub status: Status,
    /// Whole seconds since server start at the time the session connected.
    pub joined_at: u64,
    pub idle_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CounterSnapshot {
    pub connections: u64,
    pub messages: u64,
    pub challenges: u64,
    pub kicks: u64,
    pub bans: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSnapshot {
    pub uptime_seconds: u64,
    pub player_count: usize,
    pub players: Vec<PlayerEntry>,
    pub counters: CounterSnapshot,
}
