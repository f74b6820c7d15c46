//! Runtime configuration.
//!
//! All knobs are CLI flags. Listener addresses accept `host:port` or
//! `:port`; validation runs before any socket is opened so a bad flag fails
//! fast with a clear message.

use crate::error::ServerError;
use clap::{Parser, ValueEnum};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "mortalnetd",
    version,
    about = "MortalNet chat and matchmaking server"
)]
pub struct Config {
    /// TCP listen address for chat (e.g. ':14883').
    #[arg(long, default_value = ":14883")]
    pub chat_addr: String,

    /// HTTP listen address for the status dashboard and metrics.
    #[arg(long, default_value = ":8080")]
    pub web_addr: String,

    /// Maximum concurrent sessions; excess connections are turned away.
    #[arg(long, default_value_t = 100)]
    pub max_clients: usize,

    /// Token bucket refill rate, commands per second.
    #[arg(long, default_value_t = 5.0)]
    pub rate: f64,

    /// Token bucket burst size.
    #[arg(long, default_value_t = 10.0)]
    pub burst: f64,

    /// Flood strikes before disconnect.
    #[arg(long, default_value_t = 3)]
    pub strikes: u32,

    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    #[arg(long, value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Inline message of the day. Overridden by --motd-file.
    #[arg(long)]
    pub motd: Option<String>,

    /// Path to a MOTD file, one line per message.
    #[arg(long)]
    pub motd_file: Option<PathBuf>,

    /// Number of chat lines replayed to new joiners.
    #[arg(long, default_value_t = 20)]
    pub history_size: usize,

    /// Grace period (seconds) a departed nickname stays reserved for its
    /// last owner's address. Zero disables reservations.
    #[arg(long, default_value_t = 60)]
    pub nick_reserve_secs: u64,

    /// Path to the persistent stats document (JSON). Unset disables
    /// persistence.
    #[arg(long)]
    pub stats_file: Option<PathBuf>,

    /// Admin password. Unset disables admin commands entirely.
    #[arg(long)]
    pub admin_password: Option<String>,

    /// Path to the IP ban file, one address per line, '#' comments.
    #[arg(long)]
    pub ban_file: Option<PathBuf>,

    /// TLS certificate chain (PEM). Requires --tls-key.
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// TLS private key (PEM). Requires --tls-cert.
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// The default tracing filter directive for this level.
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Resolve `host:port` or `:port` to a socket address.
pub fn parse_listen_addr(addr: &str) -> Result<SocketAddr, ServerError> {
    let full = if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    };
    full.to_socket_addrs()
        .map_err(|_| ServerError::InvalidAddr(addr.to_string()))?
        .next()
        .ok_or_else(|| ServerError::InvalidAddr(addr.to_string()))
}

/// Reject configurations the server cannot run with.
pub fn validate(cfg: &Config) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    if let Err(e) = parse_listen_addr(&cfg.chat_addr) {
        errors.push(e.to_string());
    }
    if let Err(e) = parse_listen_addr(&cfg.web_addr) {
        errors.push(e.to_string());
    }
    if cfg.max_clients == 0 {
        errors.push("--max-clients must be at least 1".to_string());
    }
    if !(cfg.rate > 0.0) {
        errors.push("--rate must be positive".to_string());
    }
    if !(cfg.burst >= 1.0) {
        errors.push("--burst must be at least 1".to_string());
    }
    if cfg.strikes == 0 {
        errors.push("--strikes must be at least 1".to_string());
    }
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("mortalnetd").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let cfg = parse(&[]);
        assert_eq!(cfg.chat_addr, ":14883");
        assert_eq!(cfg.web_addr, ":8080");
        assert_eq!(cfg.max_clients, 100);
        assert_eq!(cfg.rate, 5.0);
        assert_eq!(cfg.burst, 10.0);
        assert_eq!(cfg.strikes, 3);
        assert_eq!(cfg.history_size, 20);
        assert_eq!(cfg.nick_reserve_secs, 60);
        assert!(cfg.admin_password.is_none());
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn port_only_address_binds_all_interfaces() {
        let addr = parse_listen_addr(":14883").unwrap();
        assert_eq!(addr.port(), 14883);
        assert!(addr.ip().is_unspecified());
    }

    #[test]
    fn host_and_port_address() {
        let addr = parse_listen_addr("127.0.0.1:9000").unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn bad_addresses_are_rejected() {
        assert!(parse_listen_addr("not-an-address").is_err());
        assert!(parse_listen_addr(":notaport").is_err());
        assert!(parse_listen_addr("").is_err());
    }

    #[test]
    fn validation_collects_every_problem() {
        let mut cfg = parse(&[]);
        cfg.chat_addr = "bogus".to_string();
        cfg.rate = 0.0;
        cfg.strikes = 0;
        let errors = validate(&cfg).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn flags_override_defaults() {
        let cfg = parse(&[
            "--chat-addr",
            "127.0.0.1:15000",
            "--rate",
            "2.5",
            "--admin-password",
            "secret",
            "--log-format",
            "json",
        ]);
        assert_eq!(cfg.chat_addr, "127.0.0.1:15000");
        assert_eq!(cfg.rate, 2.5);
        assert_eq!(cfg.admin_password.as_deref(), Some("secret"));
        assert_eq!(cfg.log_format, LogFormat::Json);
    }
}
