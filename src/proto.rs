//! MortalNet wire protocol.
//!
//! Every message is a single line: one ASCII prefix byte followed by UTF-8
//! content, terminated by `\n` (a CR before the LF is tolerated). Parsing
//! and serialization live here so the prefix bytes appear in exactly one
//! place.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Hard cap on a framed line, in bytes and including the trailing LF.
/// Exceeding it disconnects the sender without a response.
pub const MAX_LINE_BYTES: usize = 1024;

/// A command decoded from a client line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// `N<nick>` - register or change nickname.
    Nick(String),
    /// `M<text>` - public chat message.
    Message(String),
    /// `C<target>` - challenge a player.
    Challenge(String),
    /// `W<target>` - whois query.
    Whois(String),
    /// `T<status>` - set presence status.
    Status(String),
    /// `A<password> <cmd> [args]` - admin command.
    Admin(String),
    /// `L` - logout.
    Logout,
    /// Any other prefix. Silently ignored by the dispatcher.
    Unknown(char),
}

impl ClientCommand {
    /// Decode one framed line. Returns `None` for an empty line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut chars = line.chars();
        let prefix = chars.next()?;
        let content = chars.as_str();
        Some(match prefix {
            'N' => Self::Nick(content.to_string()),
            'M' => Self::Message(content.to_string()),
            'C' => Self::Challenge(content.to_string()),
            'W' => Self::Whois(content.to_string()),
            'T' => Self::Status(content.to_string()),
            'A' => Self::Admin(content.to_string()),
            'L' => Self::Logout,
            other => Self::Unknown(other),
        })
    }

    /// Commands that must pass the session's token bucket.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            Self::Message(_) | Self::Challenge(_) | Self::Whois(_) | Self::Status(_)
        )
    }

    /// Commands accepted before the nickname handshake completes.
    pub fn allowed_before_nick(&self) -> bool {
        matches!(self, Self::Nick(_) | Self::Logout)
    }
}

/// A player's presence status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Chat,
    Away,
    Game,
    Queue,
}

impl FromStr for Status {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Self::Chat),
            "away" => Ok(Self::Away),
            "game" => Ok(Self::Game),
            "queue" => Ok(Self::Queue),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Chat => "chat",
            Self::Away => "away",
            Self::Game => "game",
            Self::Queue => "queue",
        })
    }
}

/// Server-to-client line builders. The trailing LF is added by the codec.
pub mod server {
    use super::Status;

    /// `Y<nick>` - your nickname was confirmed (possibly adjusted).
    pub fn confirm(nick: &str) -> String {
        format!("Y{nick}")
    }

    /// `J<nick> <ip>` - a player joined.
    pub fn joined(nick: &str, ip: &str) -> String {
        format!("J{nick} {ip}")
    }

    /// `L<nick>` - a player left.
    pub fn left(nick: &str) -> String {
        format!("L{nick}")
    }

    /// `N<old> <new>` - a player was renamed.
    pub fn renamed(old: &str, new: &str) -> String {
        format!("N{old} {new}")
    }

    /// `M<nick> <text>` - chat line with the sender prepended.
    pub fn chat(nick: &str, text: &str) -> String {
        format!("M{nick} {text}")
    }

    /// `S<text>` - server info or inline error.
    pub fn info(text: &str) -> String {
        format!("S{text}")
    }

    /// `W<nick> <ip>` - whois reply.
    pub fn whois(nick: &str, ip: &str) -> String {
        format!("W{nick} {ip}")
    }

    /// `C<challenger>` - you have been challenged.
    pub fn challenge(from: &str) -> String {
        format!("C{from}")
    }

    /// `T<nick> <status>` - a player changed status.
    pub fn status(nick: &str, status: Status) -> String {
        format!("T{nick} {status}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_prefixes() {
        assert_eq!(
            ClientCommand::parse("NAlice"),
            Some(ClientCommand::Nick("Alice".into()))
        );
        assert_eq!(
            ClientCommand::parse("MHello there"),
            Some(ClientCommand::Message("Hello there".into()))
        );
        assert_eq!(
            ClientCommand::parse("CBob"),
            Some(ClientCommand::Challenge("Bob".into()))
        );
        assert_eq!(
            ClientCommand::parse("WBob"),
            Some(ClientCommand::Whois("Bob".into()))
        );
        assert_eq!(
            ClientCommand::parse("Tqueue"),
            Some(ClientCommand::Status("queue".into()))
        );
        assert_eq!(
            ClientCommand::parse("Asecret kick Bob"),
            Some(ClientCommand::Admin("secret kick Bob".into()))
        );
        assert_eq!(ClientCommand::parse("L"), Some(ClientCommand::Logout));
    }

    #[test]
    fn empty_line_is_none() {
        assert_eq!(ClientCommand::parse(""), None);
    }

    #[test]
    fn unknown_prefix_is_preserved() {
        assert_eq!(
            ClientCommand::parse("Zwhatever"),
            Some(ClientCommand::Unknown('Z'))
        );
        // A multi-byte first character is not a valid ASCII prefix.
        assert_eq!(
            ClientCommand::parse("\u{fffd}rest"),
            Some(ClientCommand::Unknown('\u{fffd}'))
        );
    }

    #[test]
    fn rate_limited_set_is_mcwt() {
        assert!(ClientCommand::Message(String::new()).is_rate_limited());
        assert!(ClientCommand::Challenge(String::new()).is_rate_limited());
        assert!(ClientCommand::Whois(String::new()).is_rate_limited());
        assert!(ClientCommand::Status(String::new()).is_rate_limited());
        assert!(!ClientCommand::Nick(String::new()).is_rate_limited());
        assert!(!ClientCommand::Admin(String::new()).is_rate_limited());
        assert!(!ClientCommand::Logout.is_rate_limited());
    }

    #[test]
    fn status_round_trip() {
        for s in ["chat", "away", "game", "queue"] {
            assert_eq!(s.parse::<Status>().unwrap().to_string(), s);
        }
        assert!("CHAT".parse::<Status>().is_err());
        assert!("idle".parse::<Status>().is_err());
    }

    #[test]
    fn server_lines() {
        assert_eq!(server::confirm("Alice"), "YAlice");
        assert_eq!(server::joined("Alice", "10.0.0.1"), "JAlice 10.0.0.1");
        assert_eq!(server::renamed("Alice", "Eve"), "NAlice Eve");
        assert_eq!(server::chat("Alice", "hi"), "MAlice hi");
        assert_eq!(server::status("Alice", Status::Queue), "TAlice queue");
    }
}
