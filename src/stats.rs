//! Persistent server statistics.
//!
//! A single JSON document: aggregate counters plus a per-player history map.
//! Saved with write-temp-then-rename so a crash mid-write never corrupts the
//! previous document. Persistence failures are logged and ignored; the
//! in-memory document is authoritative.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// How many global chat messages between automatic saves.
const SAVE_EVERY_MESSAGES: u64 = 20;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub first_seen: i64,
    pub last_seen: i64,
    pub connect_count: u64,
    pub message_count: u64,
    pub challenge_sent_count: u64,
    pub challenge_received_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StatsDocument {
    /// Wall-clock start of the current server process, unix seconds.
    pub started_at: i64,
    pub total_connections: u64,
    pub total_messages: u64,
    pub total_challenges: u64,
    pub players: HashMap<String, PlayerRecord>,
}

#[derive(Debug)]
pub struct StatsStore {
    path: Option<PathBuf>,
    doc: Mutex<StatsDocument>,
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

impl StatsStore {
    /// Load the document from `path` when it exists; totals and player
    /// history carry over across restarts, `started_at` does not.
    pub fn load(path: Option<PathBuf>) -> Self {
        let mut doc = match &path {
            Some(p) => match File::open(p) {
                Ok(file) => match serde_json::from_reader(BufReader::new(file)) {
                    Ok(doc) => {
                        info!(path = %p.display(), "stats loaded");
                        doc
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "stats file unreadable, starting fresh");
                        StatsDocument::default()
                    }
                },
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => StatsDocument::default(),
                Err(e) => {
                    warn!(path = %p.display(), error = %e, "stats file unreadable, starting fresh");
                    StatsDocument::default()
                }
            },
            None => StatsDocument::default(),
        };
        doc.started_at = now_unix();
        Self {
            path,
            doc: Mutex::new(doc),
        }
    }

    /// A connection was admitted past the ban and capacity checks.
    pub fn record_connection(&self) {
        self.doc.lock().total_connections += 1;
    }

    /// A session completed its first nickname handshake.
    pub fn record_registration(&self, nick: &str) {
        {
            let mut doc = self.doc.lock();
            let now = now_unix();
            let record = doc.players.entry(nick.to_string()).or_insert_with(|| {
                PlayerRecord {
                    first_seen: now,
                    ..Default::default()
                }
            });
            record.last_seen = now;
            record.connect_count += 1;
        }
        self.save();
    }

    pub fn record_message(&self, nick: &str) {
        let due = {
            let mut doc = self.doc.lock();
            doc.total_messages += 1;
            let now = now_unix();
            let record = doc.players.entry(nick.to_string()).or_insert_with(|| {
                PlayerRecord {
                    first_seen: now,
                    ..Default::default()
                }
            });
            record.last_seen = now;
            record.message_count += 1;
            doc.total_messages % SAVE_EVERY_MESSAGES == 0
        };
        if due {
            self.save();
        }
    }

    pub fn record_challenge(&self, challenger: &str, target: &str) {
        let mut doc = self.doc.lock();
        doc.total_challenges += 1;
        let now = now_unix();
        let sent = doc.players.entry(challenger.to_string()).or_insert_with(|| {
            PlayerRecord {
                first_seen: now,
                ..Default::default()
            }
        });
        sent.challenge_sent_count += 1;
        let received = doc.players.entry(target.to_string()).or_insert_with(|| {
            PlayerRecord {
                first_seen: now,
                ..Default::default()
            }
        });
        received.challenge_received_count += 1;
    }

    /// A matchmade pair counts once toward the aggregate and as a mutual
    /// challenge for both players.
    pub fn record_matchmade(&self, a: &str, b: &str) {
        let mut doc = self.doc.lock();
        doc.total_challenges += 1;
        let now = now_unix();
        for nick in [a, b] {
            let record = doc.players.entry(nick.to_string()).or_insert_with(|| {
                PlayerRecord {
                    first_seen: now,
                    ..Default::default()
                }
            });
            record.challenge_sent_count += 1;
            record.challenge_received_count += 1;
        }
    }

    /// A confirmed player disconnected.
    pub fn record_departure(&self, nick: &str) {
        {
            let mut doc = self.doc.lock();
            if let Some(record) = doc.players.get_mut(nick) {
                record.last_seen = now_unix();
            }
        }
        self.save();
    }

    /// Write the document atomically. No-op without a configured path.
    pub fn save(&self) {
        let Some(path) = &self.path else { return };
        let doc = self.doc.lock().clone();
        let temp = path.with_extension("json.tmp");
        let result = (|| -> std::io::Result<()> {
            let mut writer = BufWriter::new(File::create(&temp)?);
            serde_json::to_writer_pretty(&mut writer, &doc).map_err(std::io::Error::other)?;
            writer.into_inner().map_err(|e| e.into_error())?;
            std::fs::rename(&temp, path)
        })();
        match result {
            Ok(()) => debug!(path = %path.display(), "stats saved"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to save stats"),
        }
    }

    /// The document as a JSON value, for the observation surface.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&*self.doc.lock()).unwrap_or_default()
    }
}
