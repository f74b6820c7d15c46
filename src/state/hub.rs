//! The hub - central shared state for the chat server.
//!
//! Holds the session registry (id -> peer, nickname -> id, reservations),
//! the bounded broadcast history, the in-process counters, and the published
//! status snapshot. All mutation happens from the networking execution
//! context through the methods here and in `handlers`.
//!
//! # Locking discipline
//!
//! The primary `RwLock` is never held across the write path: every operation
//! collects `(Outbound, String)` deliveries under the lock, drops it, then
//! enqueues. Enqueueing is `try_send` on each session's bounded outbound
//! queue; overflow closes the offending session instead of blocking the
//! broadcaster.

use crate::metrics;
use crate::proto::{Status, server};
use crate::security::BanList;
use crate::state::motd::Motd;
use crate::state::nick::Reservation;
use crate::state::snapshot::{CounterSnapshot, PlayerEntry, StatusSnapshot};
use crate::stats::StatsStore;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Registry-visible state of one session.
#[derive(Debug)]
pub struct Peer {
    pub id: u64,
    pub ip: String,
    /// Empty until the first `N` handshake confirms a nickname.
    pub nick: String,
    pub confirmed: bool,
    pub status: Status,
    pub joined_at: Instant,
    pub last_activity: Instant,
    pub(crate) tx: mpsc::Sender<String>,
    pub(crate) closer: Arc<Notify>,
}

/// A cloned handle to a session's write side, safe to use after the
/// registry lock is dropped.
#[derive(Debug, Clone)]
pub(crate) struct Outbound {
    id: u64,
    tx: mpsc::Sender<String>,
    closer: Arc<Notify>,
}

impl Peer {
    pub(crate) fn outbound(&self) -> Outbound {
        Outbound {
            id: self.id,
            tx: self.tx.clone(),
            closer: self.closer.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct HubInner {
    pub peers: HashMap<u64, Peer>,
    /// Confirmed nickname -> session id. Disjoint from `reserved`.
    pub nicks: HashMap<String, u64>,
    pub reserved: HashMap<String, Reservation>,
    /// Last N broadcast chat lines, oldest first.
    pub history: VecDeque<String>,
}

#[derive(Debug, Default)]
pub struct Counters {
    pub connections: AtomicU64,
    pub messages: AtomicU64,
    pub challenges: AtomicU64,
    pub kicks: AtomicU64,
    pub bans: AtomicU64,
}

impl Counters {
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            connections: self.connections.load(Ordering::Relaxed),
            messages: self.messages.load(Ordering::Relaxed),
            challenges: self.challenges.load(Ordering::Relaxed),
            kicks: self.kicks.load(Ordering::Relaxed),
            bans: self.bans.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub history_size: usize,
    /// Grace period for nickname reservations; zero disables them.
    pub nick_reserve: Duration,
    pub admin_password: Option<String>,
}

pub struct Hub {
    pub(crate) inner: RwLock<HubInner>,
    published: RwLock<Arc<StatusSnapshot>>,
    next_id: AtomicU64,
    pub counters: Counters,
    pub started_at: Instant,
    pub cfg: HubConfig,
    pub bans: BanList,
    pub motd: Motd,
    pub stats: StatsStore,
}

impl Hub {
    pub fn new(cfg: HubConfig, bans: BanList, motd: Motd, stats: StatsStore) -> Self {
        Self {
            inner: RwLock::new(HubInner::default()),
            published: RwLock::new(Arc::new(StatusSnapshot::default())),
            next_id: AtomicU64::new(0),
            counters: Counters::default(),
            started_at: Instant::now(),
            cfg,
            bans,
            motd,
            stats,
        }
    }

    /// Number of live sessions, confirmed or not. Used by the capacity check.
    pub fn session_count(&self) -> usize {
        self.inner.read().peers.len()
    }

    /// Admit a new connection into the registry and assign its session id.
    pub fn register(&self, ip: String, tx: mpsc::Sender<String>, closer: Arc<Notify>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let now = Instant::now();
        let peer = Peer {
            id,
            ip,
            nick: String::new(),
            confirmed: false,
            status: Status::Chat,
            joined_at: now,
            last_activity: now,
            tx,
            closer,
        };
        self.inner.write().peers.insert(id, peer);
        self.counters.connections.fetch_add(1, Ordering::Relaxed);
        metrics::CONNECTIONS_TOTAL.inc();
        self.stats.record_connection();
        self.rebuild_snapshot();
        id
    }

    /// Refresh a session's activity clock. Called for every complete line.
    pub fn touch(&self, id: u64) {
        if let Some(peer) = self.inner.write().peers.get_mut(&id) {
            peer.last_activity = Instant::now();
        }
    }

    /// Queue one line to one session.
    pub fn send_to(&self, id: u64, msg: String) {
        let outbound = self.inner.read().peers.get(&id).map(Peer::outbound);
        if let Some(out) = outbound {
            self.deliver(&out, msg);
        }
    }

    /// Queue one line to every confirmed session, optionally excluding one.
    pub fn broadcast(&self, msg: &str, exclude: Option<u64>) {
        let targets: Vec<Outbound> = {
            let inner = self.inner.read();
            inner
                .peers
                .values()
                .filter(|p| p.confirmed && Some(p.id) != exclude)
                .map(Peer::outbound)
                .collect()
        };
        for out in &targets {
            self.deliver(out, msg.to_string());
        }
    }

    /// Enqueue without blocking. A full or closed queue means the session
    /// cannot keep up; it is closed and its read loop runs normal cleanup.
    pub(crate) fn deliver(&self, out: &Outbound, msg: String) {
        match out.tx.try_send(msg) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(id = out.id, "outbound queue overflow, closing session");
                out.closer.notify_one();
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                out.closer.notify_one();
            }
        }
    }

    /// Remove a departing session, reserving its nickname for the grace
    /// period and announcing the departure.
    pub fn leave(&self, id: u64) {
        let mut deliveries: Vec<(Outbound, String)> = Vec::new();
        let mut departed_nick: Option<String> = None;
        {
            let mut inner = self.inner.write();
            let Some(peer) = inner.peers.remove(&id) else {
                return;
            };
            if peer.confirmed {
                inner.nicks.remove(&peer.nick);
                if !self.cfg.nick_reserve.is_zero() {
                    inner.reserved.insert(
                        peer.nick.clone(),
                        Reservation {
                            ip: peer.ip.clone(),
                            expires: Instant::now() + self.cfg.nick_reserve,
                        },
                    );
                }
                let line = server::left(&peer.nick);
                for other in inner.peers.values().filter(|p| p.confirmed) {
                    deliveries.push((other.outbound(), line.clone()));
                }
                departed_nick = Some(peer.nick);
            }
        }
        for (out, msg) in deliveries {
            self.deliver(&out, msg);
        }
        if let Some(nick) = departed_nick {
            info!(id, nick = %nick, "player left");
            self.stats.record_departure(&nick);
        } else {
            debug!(id, "unregistered session closed");
        }
        self.rebuild_snapshot();
    }

    /// Pair the queued session `id` with the first other queued peer.
    /// One-shot per scan; remaining queued players keep waiting.
    pub fn matchmake(&self, id: u64) {
        let mut deliveries: Vec<(Outbound, String)> = Vec::new();
        let mut paired: Option<(String, String)> = None;
        {
            let mut inner = self.inner.write();
            let me = match inner.peers.get(&id) {
                Some(p) if p.confirmed && p.status == Status::Queue => p,
                _ => return,
            };
            let my_nick = me.nick.clone();
            let partner_id = inner
                .peers
                .values()
                .filter(|p| p.id != id && p.confirmed && p.status == Status::Queue)
                .map(|p| p.id)
                .min();
            let Some(partner_id) = partner_id else { return };

            let partner_nick = inner.peers[&partner_id].nick.clone();
            for pid in [id, partner_id] {
                if let Some(p) = inner.peers.get_mut(&pid) {
                    p.status = Status::Chat;
                }
            }

            let me_out = inner.peers[&id].outbound();
            let partner_out = inner.peers[&partner_id].outbound();
            deliveries.push((me_out.clone(), server::challenge(&partner_nick)));
            deliveries.push((partner_out.clone(), server::challenge(&my_nick)));
            for line in [
                server::status(&partner_nick, Status::Chat),
                server::status(&my_nick, Status::Chat),
            ] {
                for peer in inner.peers.values().filter(|p| p.confirmed) {
                    deliveries.push((peer.outbound(), line.clone()));
                }
            }
            deliveries.push((
                me_out,
                server::info(&format!("Matchmaking: paired with {partner_nick}!")),
            ));
            deliveries.push((
                partner_out,
                server::info(&format!("Matchmaking: paired with {my_nick}!")),
            ));
            paired = Some((my_nick, partner_nick));
        }
        for (out, msg) in deliveries {
            self.deliver(&out, msg);
        }
        if let Some((a, b)) = paired {
            info!(a = %a, b = %b, "matchmade");
            self.counters.challenges.fetch_add(1, Ordering::Relaxed);
            metrics::CHALLENGES_TOTAL.inc();
            self.stats.record_matchmade(&a, &b);
            self.rebuild_snapshot();
        }
    }

    /// Rebuild and publish the status snapshot.
    pub fn rebuild_snapshot(&self) {
        let now = Instant::now();
        let snapshot = {
            let inner = self.inner.read();
            let mut players: Vec<PlayerEntry> = inner
                .peers
                .values()
                .filter(|p| p.confirmed)
                .map(|p| PlayerEntry {
                    nick: p.nick.clone(),
                    ip: p.ip.clone(),
                    status: p.status,
                    joined_at: p
                        .joined_at
                        .saturating_duration_since(self.started_at)
                        .as_secs(),
                    idle_seconds: now.saturating_duration_since(p.last_activity).as_secs(),
                })
                .collect();
            players.sort_by(|a, b| a.nick.cmp(&b.nick));
            StatusSnapshot {
                uptime_seconds: now.saturating_duration_since(self.started_at).as_secs(),
                player_count: players.len(),
                players,
                counters: self.counters.snapshot(),
            }
        };
        metrics::ACTIVE_PLAYERS.set(snapshot.player_count as i64);
        *self.published.write() = Arc::new(snapshot);
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> Arc<StatusSnapshot> {
        self.published.read().clone()
    }

    /// Reload the ban file and the MOTD source (admin `reload` / SIGHUP).
    pub fn reload(&self) {
        self.bans.reload();
        self.motd.reload();
        info!("ban list and MOTD reloaded");
    }

    /// Signal every live session to close. Used during shutdown.
    pub fn close_all(&self) {
        let closers: Vec<Arc<Notify>> = {
            let inner = self.inner.read();
            inner.peers.values().map(|p| p.closer.clone()).collect()
        };
        for closer in closers {
            closer.notify_one();
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let inner = self.inner.read();
        for (nick, id) in &inner.nicks {
            let peer = inner.peers.get(id).expect("nick maps to a live session");
            assert!(peer.confirmed, "nick {nick} maps to unconfirmed session");
            assert_eq!(&peer.nick, nick, "nick map key matches session nick");
        }
        for nick in inner.reserved.keys() {
            assert!(
                !inner.nicks.contains_key(nick),
                "nick {nick} is both active and reserved"
            );
        }
        assert!(inner.history.len() <= self.cfg.history_size);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for hub and handler tests.

    use super::*;
    use crate::state::motd::Motd;

    pub(crate) struct TestPeer {
        pub id: u64,
        pub rx: mpsc::Receiver<String>,
        pub closer: Arc<Notify>,
    }

    pub(crate) fn hub() -> Hub {
        hub_with(HubConfig {
            history_size: 20,
            nick_reserve: Duration::from_secs(60),
            admin_password: None,
        })
    }

    pub(crate) fn hub_with(cfg: HubConfig) -> Hub {
        Hub::new(
            cfg,
            BanList::new(None),
            Motd::new(None, None),
            StatsStore::load(None),
        )
    }

    pub(crate) fn connect(hub: &Hub, ip: &str) -> TestPeer {
        let (tx, rx) = mpsc::channel(512);
        let closer = Arc::new(Notify::new());
        let id = hub.register(ip.to_string(), tx, closer.clone());
        TestPeer { id, rx, closer }
    }

    /// Connect and confirm a nickname, draining the join burst.
    pub(crate) fn join(hub: &Hub, ip: &str, nick: &str) -> TestPeer {
        let mut peer = connect(hub, ip);
        hub.handle_nick(peer.id, nick);
        drain(&mut peer.rx);
        peer
    }

    pub(crate) fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }
}
