//! Nickname allocation.
//!
//! Resolves a requested nickname to a unique valid one: sanitize, then walk
//! `base`, `base_1`, `base_2`, ... past live holders and reservations held
//! for other addresses. Expired or own-address reservations are dropped
//! lazily on lookup.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::time::Instant;

/// Longest allowed nickname.
pub const MAX_NICK_LEN: usize = 20;
/// Fallback when sanitation leaves nothing.
const FALLBACK_NICK: &str = "Player";
/// Room kept for a `_NN` suffix when de-colliding.
const SUFFIX_BASE_LEN: usize = 17;

lazy_static! {
    static ref DISALLOWED: Regex = Regex::new(r"[^A-Za-z0-9_-]").unwrap();
}

/// A grace-period claim on a freshly departed nickname.
#[derive(Debug, Clone)]
pub struct Reservation {
    /// Address of the last owner; only it may reclaim early.
    pub ip: String,
    pub expires: Instant,
}

/// Strip disallowed characters and truncate; empty input becomes the
/// fallback. The result is pure ASCII.
fn sanitize(requested: &str) -> String {
    let mut clean = DISALLOWED.replace_all(requested, "").into_owned();
    clean.truncate(MAX_NICK_LEN);
    if clean.is_empty() {
        FALLBACK_NICK.to_string()
    } else {
        clean
    }
}

/// Resolve `requested` against the live and reserved nickname maps.
///
/// `exclude_id` is the caller's own session id, so renaming to the current
/// nickname is idempotent. An empty `client_ip` never matches a reservation.
/// Deterministic in its inputs; terminates because the suffix space is
/// unbounded and the set of live nicknames finite.
pub fn resolve(
    nicks: &HashMap<String, u64>,
    reserved: &mut HashMap<String, Reservation>,
    requested: &str,
    exclude_id: u64,
    client_ip: &str,
    now: Instant,
) -> String {
    let base = sanitize(requested);
    let stem = &base[..base.len().min(SUFFIX_BASE_LEN)];
    let mut candidate = base.clone();
    let mut suffix = 1u64;
    loop {
        let held_by_other = nicks.get(&candidate).is_some_and(|&id| id != exclude_id);
        if !held_by_other {
            if let Some(reservation) = reserved.get(&candidate) {
                let honored = now < reservation.expires
                    && (client_ip.is_empty() || client_ip != reservation.ip);
                if !honored {
                    reserved.remove(&candidate);
                    return candidate;
                }
            } else {
                return candidate;
            }
        }
        candidate = format!("{stem}_{suffix}");
        suffix += 1;
    }
}
