//! Command dispatch.
//!
//! Decodes a framed line into a [`ClientCommand`] and routes it to the hub,
//! enforcing the pre-nick gate and per-session flood control. Protocol
//! violations (unknown prefix, gated command) are dropped silently per the
//! error taxonomy; only validation failures produce an inline `S` reply.

mod admin;
mod chat;
mod nick;
mod status;

use crate::proto::{ClientCommand, server};
use crate::security::TokenBucket;
use crate::state::Hub;
use tracing::{debug, trace, warn};

/// Connection-local dispatch state, owned by the session's read loop.
pub struct SessionCtx {
    pub id: u64,
    /// Mirror of the registry's `nick_confirmed` flag, kept here so the
    /// gate does not take the hub lock for every line.
    pub confirmed: bool,
    pub bucket: TokenBucket,
    pub strikes: u32,
    pub strikes_limit: u32,
}

impl SessionCtx {
    pub fn new(id: u64, rate: f64, burst: f64, strikes_limit: u32) -> Self {
        Self {
            id,
            confirmed: false,
            bucket: TokenBucket::new(rate, burst),
            strikes: 0,
            strikes_limit,
        }
    }
}

/// What the read loop should do after a line was handled.
#[derive(Debug, PartialEq, Eq)]
pub enum Dispatch {
    Continue,
    /// Client sent `L`; terminate the read loop, cleanup runs as on EOF.
    Logout,
    /// Third flood strike; the farewell line is already queued.
    FloodDisconnect,
}

pub fn dispatch(hub: &Hub, ctx: &mut SessionCtx, line: &str) -> Dispatch {
    let Some(cmd) = ClientCommand::parse(line) else {
        return Dispatch::Continue;
    };
    hub.touch(ctx.id);

    if !ctx.confirmed && !cmd.allowed_before_nick() {
        trace!(id = ctx.id, "command dropped before nick handshake");
        return Dispatch::Continue;
    }

    if cmd.is_rate_limited() {
        if ctx.bucket.consume() {
            ctx.strikes = 0;
        } else {
            ctx.strikes += 1;
            debug!(id = ctx.id, strikes = ctx.strikes, "rate limited");
            if ctx.strikes >= ctx.strikes_limit {
                warn!(id = ctx.id, "flood limit reached, disconnecting");
                hub.send_to(
                    ctx.id,
                    server::info("You have been disconnected for flooding."),
                );
                return Dispatch::FloodDisconnect;
            }
            return Dispatch::Continue;
        }
    }

    match cmd {
        ClientCommand::Nick(requested) => {
            ctx.confirmed = hub.handle_nick(ctx.id, &requested);
        }
        ClientCommand::Message(text) => hub.handle_message(ctx.id, &text),
        ClientCommand::Challenge(target) => hub.handle_challenge(ctx.id, &target),
        ClientCommand::Whois(target) => hub.handle_whois(ctx.id, &target),
        ClientCommand::Status(value) => hub.handle_status(ctx.id, &value),
        ClientCommand::Admin(content) => hub.handle_admin(ctx.id, &content),
        ClientCommand::Logout => return Dispatch::Logout,
        ClientCommand::Unknown(prefix) => {
            trace!(id = ctx.id, %prefix, "unknown prefix ignored");
        }
    }
    Dispatch::Continue
}
