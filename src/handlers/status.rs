//! The `T` command: presence status and the matchmaking trigger.

use crate::proto::{Status, server};
use crate::state::Hub;
use crate::state::hub::Outbound;

impl Hub {
    /// Validate and apply a status change, then broadcast it. Entering the
    /// queue attempts matchmaking.
    pub fn handle_status(&self, id: u64, content: &str) {
        let value = content.trim().to_lowercase();
        let Ok(status) = value.parse::<Status>() else {
            self.send_to(
                id,
                server::info("Invalid status. Choose: away, chat, game, queue"),
            );
            return;
        };
        let mut deliveries: Vec<(Outbound, String)> = Vec::new();
        {
            let mut guard = self.inner.write();
            let inner = &mut *guard;
            let Some(peer) = inner.peers.get_mut(&id) else {
                return;
            };
            if !peer.confirmed {
                return;
            }
            peer.status = status;
            let line = server::status(&peer.nick, status);
            for p in inner.peers.values().filter(|p| p.confirmed) {
                deliveries.push((p.outbound(), line.clone()));
            }
        }
        for (out, msg) in deliveries {
            self.deliver(&out, msg);
        }
        self.rebuild_snapshot();
        if status == Status::Queue {
            self.matchmake(id);
        }
    }
}
