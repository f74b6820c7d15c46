//! The `A` command: password-gated administration.
//!
//! Disabled entirely when no admin password is configured. Content is
//! `<password> <cmd> [args]`; the password is compared in constant time.

use crate::metrics;
use crate::proto::server;
use crate::security::password;
use crate::state::Hub;
use std::sync::atomic::Ordering;
use tracing::{info, warn};

impl Hub {
    pub fn handle_admin(&self, id: u64, content: &str) {
        let Some(configured) = self.cfg.admin_password.as_deref() else {
            self.send_to(
                id,
                server::info("Admin commands are disabled on this server."),
            );
            return;
        };
        let mut parts = content.splitn(3, ' ');
        let submitted = parts.next().unwrap_or_default();
        let command = parts.next().unwrap_or_default();
        let args = parts.next().unwrap_or_default();

        if !password::verify(submitted, configured) {
            warn!(id, "invalid admin password");
            self.send_to(id, server::info("Invalid admin password."));
            return;
        }

        match command {
            "kick" => self.admin_kick(id, args.trim()),
            "ban" => self.admin_ban(id, args.trim()),
            "reload" => {
                self.reload();
                self.send_to(id, server::info("Reloaded ban list and MOTD."));
            }
            "motd" => {
                self.motd.set(args);
                info!(id, "MOTD updated by admin");
                self.send_to(id, server::info("MOTD updated."));
            }
            other => self.send_to(id, server::info(&format!("Unknown command: {other}"))),
        }
    }

    fn admin_kick(&self, admin_id: u64, nick: &str) {
        match self.kick(nick) {
            Some(_) => self.send_to(admin_id, server::info(&format!("Kicked {nick}."))),
            None => self.send_to(admin_id, server::info("No such user")),
        }
    }

    /// Notify and close a live player's session. Returns its address.
    pub(crate) fn kick(&self, nick: &str) -> Option<String> {
        let found = {
            let inner = self.inner.read();
            inner
                .nicks
                .get(nick)
                .and_then(|id| inner.peers.get(id))
                .map(|p| (p.outbound(), p.ip.clone(), p.closer.clone()))
        };
        let (out, ip, closer) = found?;
        self.deliver(
            &out,
            server::info("You have been kicked by an administrator."),
        );
        closer.notify_one();
        self.counters.kicks.fetch_add(1, Ordering::Relaxed);
        metrics::KICKS_TOTAL.inc();
        info!(nick = %nick, ip = %ip, "player kicked");
        Some(ip)
    }

    fn admin_ban(&self, admin_id: u64, target: &str) {
        let ip = match self.kick(target) {
            // A live nick is kicked first and its address banned.
            Some(ip) => ip,
            // Otherwise the argument is taken as a raw address.
            None => target.to_string(),
        };
        self.bans.insert(&ip);
        self.counters.bans.fetch_add(1, Ordering::Relaxed);
        metrics::BANS_TOTAL.inc();
        warn!(ip = %ip, "address banned");
        self.send_to(admin_id, server::info(&format!("Banned {ip}.")));
    }
}
