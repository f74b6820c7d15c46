//! IP denylist.
//!
//! Loaded from an optional text file (one IP per line, `#` comments), tested
//! on every accept, and appended to when an admin bans an address. File I/O
//! failures are logged and the in-memory set stays authoritative.

use dashmap::DashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct BanList {
    ips: DashSet<String>,
    path: Option<PathBuf>,
}

impl BanList {
    /// Create the denylist, loading the ban file when one is configured.
    /// A missing file is not an error; it is created on the first ban.
    pub fn new(path: Option<PathBuf>) -> Self {
        let list = Self {
            ips: DashSet::new(),
            path,
        };
        list.reload();
        list
    }

    pub fn contains(&self, ip: &str) -> bool {
        self.ips.contains(ip)
    }

    pub fn len(&self) -> usize {
        self.ips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ips.is_empty()
    }

    /// Add an IP to the set and append it to the ban file (best effort).
    /// Returns `false` when the IP was already banned.
    pub fn insert(&self, ip: &str) -> bool {
        let inserted = self.ips.insert(ip.to_string());
        if inserted {
            if let Some(path) = &self.path {
                if let Err(e) = append_line(path, ip) {
                    warn!(path = %path.display(), error = %e, "failed to append to ban file");
                }
            }
        }
        inserted
    }

    /// Re-read the ban file, replacing the in-memory set. Parse failures of
    /// the whole file leave the current set untouched.
    pub fn reload(&self) {
        let Some(path) = &self.path else { return };
        match std::fs::read_to_string(path) {
            Ok(content) => {
                self.ips.clear();
                for line in content.lines() {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    self.ips.insert(line.to_string());
                }
                info!(path = %path.display(), count = self.ips.len(), "ban list loaded");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read ban file");
            }
        }
    }
}

fn append_line(path: &Path, ip: &str) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{ip}")
}
