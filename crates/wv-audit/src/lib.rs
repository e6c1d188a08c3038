//! wv-audit
//!
//! Append-only station audit trail. One JSON object per line, keys sorted.
//! With the hash chain enabled every event carries `hash_prev` (the previous
//! event's `hash_self`) and `hash_self` (SHA-256 over the canonical event
//! without `hash_self`), so an edited or deleted line is detectable.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Topic used for every event the station controller writes.
pub const TOPIC_STATION: &str = "STATION";

pub const EV_SESSION_SELECTED: &str = "SESSION_SELECTED";
pub const EV_LINE_COMMITTED: &str = "LINE_COMMITTED";
pub const EV_LINE_CORRECTED: &str = "LINE_CORRECTED";
pub const EV_PRINT_FINISHED: &str = "PRINT_FINISHED";
pub const EV_SCALE_OFFLINE: &str = "SCALE_OFFLINE";

/// Append-only audit writer.
pub struct AuditWriter {
    path: PathBuf,
    hash_chain: bool,
    last_hash: Option<String>,
    /// Number of events appended so far; feeds `event_id` derivation.
    seq: u64,
}

impl AuditWriter {
    /// Creates the audit writer and ensures parent dirs exist.
    pub fn new(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {:?}", parent))?;
        }

        Ok(Self {
            path,
            hash_chain,
            last_hash: None,
            seq: 0,
        })
    }

    /// Open an existing log and continue its chain.
    ///
    /// Restores `seq` from the number of events present and `last_hash` from
    /// the final event. A missing file starts a fresh log.
    pub fn resume(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let mut w = Self::new(path, hash_chain)?;
        if !w.path.exists() {
            return Ok(w);
        }

        let content =
            fs::read_to_string(&w.path).with_context(|| format!("read audit log {:?}", w.path))?;
        let mut last: Option<AuditEvent> = None;
        let mut seq = 0u64;
        for (i, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let ev: AuditEvent = serde_json::from_str(trimmed)
                .with_context(|| format!("parse audit event at line {}", i + 1))?;
            seq += 1;
            last = Some(ev);
        }
        w.seq = seq;
        w.last_hash = last.and_then(|ev| ev.hash_self);
        Ok(w)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_last_hash(&mut self, last_hash: Option<String>) {
        self.last_hash = last_hash;
    }

    pub fn last_hash(&self) -> Option<String> {
        self.last_hash.clone()
    }

    pub fn set_seq(&mut self, seq: u64) {
        self.seq = seq;
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Append one event.
    pub fn append(
        &mut self,
        session_id: Uuid,
        topic: &str,
        event_type: &str,
        payload: Value,
    ) -> Result<AuditEvent> {
        let ts_utc = Utc::now();
        let event_id = derive_event_id(self.last_hash.as_deref(), &payload, self.seq)?;

        let mut ev = AuditEvent {
            event_id,
            session_id,
            ts_utc,
            topic: topic.to_string(),
            event_type: event_type.to_string(),
            payload,
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            ev.hash_prev = self.last_hash.clone();
            let self_hash = compute_event_hash(&ev)?;
            ev.hash_self = Some(self_hash);
        }

        let line = canonical_json_line(&ev)?;
        append_line(&self.path, &line)?;

        // Chain state only advances once the line is on disk.
        self.seq += 1;
        if self.hash_chain {
            self.last_hash = ev.hash_self.clone();
        }
        Ok(ev)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub session_id: Uuid,
    pub ts_utc: DateTime<Utc>,
    pub topic: String,
    pub event_type: String,
    pub payload: Value,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

/// Deterministic event id: UUIDv5 over chain position and canonical payload.
///
/// No RNG and no clock. Two writers replaying the same events into empty logs
/// produce the same ids.
pub fn derive_event_id(last_hash: Option<&str>, payload: &Value, seq: u64) -> Result<Uuid> {
    let canonical = serde_json::to_string(&sort_keys(payload)).context("serialize payload failed")?;
    let data = format!(
        "wv-audit.event.v1|{}|{}|{}",
        last_hash.unwrap_or("-"),
        seq,
        canonical
    );
    Ok(Uuid::new_v5(&Uuid::NAMESPACE_OID, data.as_bytes()))
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open audit log {:?}", path))?;
    f.write_all(line.as_bytes())
        .context("write audit line failed")?;
    f.write_all(b"\n").context("write newline failed")?;
    Ok(())
}

/// Sort keys recursively and emit compact JSON.
fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize audit event failed")?;
    serde_json::to_string(&sort_keys(&raw)).context("json stringify failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for k in keys {
                out.insert(k.clone(), sort_keys(&map[k]));
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// Hash over the canonical event with `hash_self` cleared.
pub fn compute_event_hash(ev: &AuditEvent) -> Result<String> {
    let mut clone = ev.clone();
    clone.hash_self = None;

    let canonical = canonical_json_line(&clone)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Verify the hash chain of an audit log file.
pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read audit log {:?}", path.as_ref()))?;
    verify_hash_chain_str(&content)
}

/// Same as [`verify_hash_chain`] over in-memory JSONL.
pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut line_count = 0usize;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let ev: AuditEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("parse audit event at line {}", i + 1))?;
        line_count += 1;

        if ev.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!(
                    "hash_prev mismatch: expected {:?}, got {:?}",
                    prev_hash, ev.hash_prev
                ),
            });
        }

        if let Some(ref claimed) = ev.hash_self {
            let recomputed = compute_event_hash(&ev)?;
            if *claimed != recomputed {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: format!("hash_self mismatch: claimed {claimed}, recomputed {recomputed}"),
                });
            }
        }

        prev_hash = ev.hash_self.clone();
    }

    Ok(VerifyResult::Valid { lines: line_count })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { lines: usize },
    Broken { line: usize, reason: String },
}
