//! Message-of-the-day source.
//!
//! The MOTD comes from a file when one is configured, otherwise from the
//! inline flag. Admins can replace the in-memory text at runtime; `reload`
//! re-derives it from the configured source.

use parking_lot::RwLock;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Default)]
pub struct Motd {
    inline: Option<String>,
    file: Option<PathBuf>,
    lines: RwLock<Vec<String>>,
}

impl Motd {
    pub fn new(inline: Option<String>, file: Option<PathBuf>) -> Self {
        let motd = Self {
            inline,
            file,
            lines: RwLock::new(Vec::new()),
        };
        motd.reload();
        motd
    }

    /// Current MOTD lines. Empty lines are kept here and skipped at send
    /// time, so line numbering in the file stays meaningful for operators.
    pub fn lines(&self) -> Vec<String> {
        self.lines.read().clone()
    }

    /// Replace the in-memory MOTD (admin `motd` command).
    pub fn set(&self, text: &str) {
        *self.lines.write() = text.lines().map(str::to_string).collect();
    }

    /// Re-derive the MOTD from its configured source.
    pub fn reload(&self) {
        let lines = if let Some(path) = &self.file {
            match std::fs::read_to_string(path) {
                Ok(content) => content.lines().map(str::to_string).collect(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read MOTD file");
                    self.inline_lines()
                }
            }
        } else {
            self.inline_lines()
        };
        *self.lines.write() = lines;
    }

    fn inline_lines(&self) -> Vec<String> {
        self.inline
            .as_deref()
            .map(|text| text.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
