//! The `M`, `C` and `W` commands.

use crate::metrics;
use crate::proto::server;
use crate::state::Hub;
use crate::state::hub::Outbound;
use std::sync::atomic::Ordering;
use tracing::debug;

impl Hub {
    /// Broadcast a chat line and record it in the bounded history.
    pub fn handle_message(&self, id: u64, text: &str) {
        // Control characters below 0x20 are stripped outright.
        let text: String = text.chars().filter(|&c| c as u32 >= 0x20).collect();
        if text.is_empty() {
            return;
        }
        let mut deliveries: Vec<(Outbound, String)> = Vec::new();
        let sender_nick;
        {
            let mut guard = self.inner.write();
            let inner = &mut *guard;
            let Some(peer) = inner.peers.get(&id) else {
                return;
            };
            if !peer.confirmed {
                return;
            }
            let nick = peer.nick.clone();
            let line = server::chat(&nick, &text);
            if self.cfg.history_size > 0 {
                inner.history.push_back(line.clone());
                while inner.history.len() > self.cfg.history_size {
                    inner.history.pop_front();
                }
            }
            for p in inner.peers.values().filter(|p| p.confirmed) {
                deliveries.push((p.outbound(), line.clone()));
            }
            sender_nick = nick;
        }
        for (out, msg) in deliveries {
            self.deliver(&out, msg);
        }
        self.counters.messages.fetch_add(1, Ordering::Relaxed);
        metrics::MESSAGES_TOTAL.inc();
        self.stats.record_message(&sender_nick);
    }

    /// Deliver a challenge to a named player.
    pub fn handle_challenge(&self, id: u64, content: &str) {
        let target = content.trim();
        let mut deliveries: Vec<(Outbound, String)> = Vec::new();
        let mut challenged: Option<(String, String)> = None;
        {
            let inner = self.inner.read();
            let Some(me) = inner.peers.get(&id) else {
                return;
            };
            if target == me.nick {
                deliveries.push((me.outbound(), server::info("You cannot challenge yourself.")));
            } else {
                match inner.nicks.get(target).and_then(|tid| inner.peers.get(tid)) {
                    Some(other) => {
                        deliveries.push((other.outbound(), server::challenge(&me.nick)));
                        challenged = Some((me.nick.clone(), other.nick.clone()));
                    }
                    None => deliveries.push((
                        me.outbound(),
                        server::info(&format!("No such user: {target}")),
                    )),
                }
            }
        }
        for (out, msg) in deliveries {
            self.deliver(&out, msg);
        }
        if let Some((from, to)) = challenged {
            debug!(from = %from, to = %to, "challenge delivered");
            self.counters.challenges.fetch_add(1, Ordering::Relaxed);
            metrics::CHALLENGES_TOTAL.inc();
            self.stats.record_challenge(&from, &to);
        }
    }

    /// Answer a whois query to the requester only.
    pub fn handle_whois(&self, id: u64, content: &str) {
        let target = content.trim();
        let reply = {
            let inner = self.inner.read();
            let Some(me) = inner.peers.get(&id) else {
                return;
            };
            let msg = match inner.nicks.get(target).and_then(|tid| inner.peers.get(tid)) {
                Some(other) => server::whois(&other.nick, &other.ip),
                None => server::info(&format!("No such user: {target}")),
            };
            (me.outbound(), msg)
        };
        self.deliver(&reply.0, reply.1);
    }
}
