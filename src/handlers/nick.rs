//! The `N` command: first registration and renames.

use crate::proto::server;
use crate::state::Hub;
use crate::state::hub::{Outbound, Peer};
use crate::state::nick;
use std::time::Instant;
use tracing::info;

impl Hub {
    /// Resolve and install a nickname for session `id`.
    ///
    /// First registration emits the fixed-order burst to the new client
    /// (confirmation, one `J` per existing peer, history replay, MOTD) and
    /// announces the join to everyone else. A rename rekeys the registry and
    /// broadcasts `N<old> <new>`; renaming to the current nickname is a
    /// complete no-op.
    ///
    /// Returns whether the session is confirmed afterwards.
    pub fn handle_nick(&self, id: u64, requested: &str) -> bool {
        let mut deliveries: Vec<(Outbound, String)> = Vec::new();
        let mut registered: Option<String> = None;
        let mut renamed: Option<(String, String)> = None;
        {
            let mut guard = self.inner.write();
            let inner = &mut *guard;
            let Some(peer) = inner.peers.get(&id) else {
                return false;
            };
            let ip = peer.ip.clone();
            let was_confirmed = peer.confirmed;
            let old_nick = peer.nick.clone();
            let resolved = nick::resolve(
                &inner.nicks,
                &mut inner.reserved,
                requested,
                id,
                &ip,
                Instant::now(),
            );

            if was_confirmed {
                if resolved == old_nick {
                    return true;
                }
                inner.nicks.remove(&old_nick);
                inner.nicks.insert(resolved.clone(), id);
                if let Some(p) = inner.peers.get_mut(&id) {
                    p.nick = resolved.clone();
                }
                deliveries.push((inner.peers[&id].outbound(), server::confirm(&resolved)));
                let line = server::renamed(&old_nick, &resolved);
                for p in inner.peers.values().filter(|p| p.confirmed) {
                    deliveries.push((p.outbound(), line.clone()));
                }
                renamed = Some((old_nick, resolved));
            } else {
                inner.nicks.insert(resolved.clone(), id);
                // resolve() drops a reservation it honored; make sure no
                // stale claim survives the activation either way.
                inner.reserved.remove(&resolved);
                if let Some(p) = inner.peers.get_mut(&id) {
                    p.nick = resolved.clone();
                    p.confirmed = true;
                }

                let me = inner.peers[&id].outbound();
                deliveries.push((me.clone(), server::confirm(&resolved)));

                let mut others: Vec<&Peer> = inner
                    .peers
                    .values()
                    .filter(|p| p.confirmed && p.id != id)
                    .collect();
                others.sort_by_key(|p| p.id);
                for other in &others {
                    deliveries.push((me.clone(), server::joined(&other.nick, &other.ip)));
                }
                for line in &inner.history {
                    deliveries.push((me.clone(), line.clone()));
                }
                for line in self.motd.lines() {
                    if !line.is_empty() {
                        deliveries.push((me.clone(), server::info(&line)));
                    }
                }
                let announce = server::joined(&resolved, &ip);
                for other in &others {
                    deliveries.push((other.outbound(), announce.clone()));
                }
                registered = Some(resolved);
            }
        }
        for (out, msg) in deliveries {
            self.deliver(&out, msg);
        }
        if let Some(nick) = &registered {
            info!(id, nick = %nick, "player registered");
            self.stats.record_registration(nick);
        }
        if let Some((old, new)) = &renamed {
            info!(id, old = %old, new = %new, "player renamed");
        }
        self.rebuild_snapshot();
        true
    }
}
