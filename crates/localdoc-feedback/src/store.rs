//! Durable feedback store: an append-only JSON-lines log plus a derived
//! aggregate snapshot.
//!
//! Layout of the store directory:
//! - `feedback.log.jsonl`: one [`FeedbackRecord`] per line, fsync'd on every
//!   append. A record exists once its line is durable; this is the audit
//!   trail and the source of truth.
//! - `feedback.json`: `{query_signature: {chunk_id: score}}`, pretty-printed
//!   for inspection. Rewritten atomically every [`SNAPSHOT_INTERVAL`]
//!   records, on `flush`, `replay`, `clear` and when the store is dropped.
//!
//! Opening replays the log and refreshes the snapshot from it. A torn final
//! line (crash mid-append) is cut off with a warning; any other unreadable
//! line is reported as corrupt. Only when the log file does not exist at all
//! (older installs) is a snapshot imported as seed records; an existing empty
//! log means the feedback was cleared.
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use localdoc_core::traits::FeedbackScores;
use localdoc_core::types::FeedbackRecord;
use localdoc_core::{InputError, Result, StorageError};

pub const LOG_FILE: &str = "feedback.log.jsonl";
pub const SNAPSHOT_FILE: &str = "feedback.json";
/// Appends between snapshot rewrites.
pub const SNAPSHOT_INTERVAL: usize = 16;

type Aggregate = BTreeMap<String, BTreeMap<String, i64>>;

/// Write side of a feedback store. Implementations serialize updates to the
/// same pair and apply each record completely or not at all.
pub trait FeedbackStore: FeedbackScores {
    /// Appends one rating and returns the pair's new aggregate score.
    fn record_feedback(&self, query_signature: &str, chunk_id: &str, relevant: bool) -> Result<f32>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedbackStats {
    pub signatures: usize,
    pub pairs: usize,
    pub records: usize,
}

struct State {
    log: File,
    log_len: u64,
    aggregate: Aggregate,
    records: usize,
    /// Records not yet reflected in the snapshot.
    pending: usize,
}

pub struct JsonFeedbackStore {
    log_path: PathBuf,
    snapshot_path: PathBuf,
    snapshot_interval: usize,
    state: Mutex<State>,
}

impl JsonFeedbackStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
        let log_path = dir.join(LOG_FILE);
        let snapshot_path = dir.join(SNAPSHOT_FILE);

        if !log_path.exists() && snapshot_path.exists() {
            seed_log_from_snapshot(&snapshot_path, &log_path)?;
        }
        let mut log = OpenOptions::new().create(true).append(true).open(&log_path).map_err(|e| StorageError::io(&log_path, e))?;
        let bytes = fs::read(&log_path).map_err(|e| StorageError::io(&log_path, e))?;
        let parsed = parse_log(&log_path, &bytes)?;
        let mut log_len = bytes.len() as u64;
        if parsed.valid_len < log_len {
            warn!(path = %log_path.display(), dropped_bytes = log_len - parsed.valid_len, "truncating torn trailing feedback record");
            log.set_len(parsed.valid_len).map_err(|e| StorageError::io(&log_path, e))?;
            log.sync_all().map_err(|e| StorageError::io(&log_path, e))?;
            log_len = parsed.valid_len;
        } else if parsed.missing_newline {
            log.write_all(b"\n").map_err(|e| StorageError::io(&log_path, e))?;
            log_len += 1;
        }

        let mut aggregate = Aggregate::new();
        for record in &parsed.records {
            apply(&mut aggregate, record);
        }
        let store = Self {
            log_path,
            snapshot_path,
            snapshot_interval: SNAPSHOT_INTERVAL,
            state: Mutex::new(State { log, log_len, aggregate, records: parsed.records.len(), pending: 0 }),
        };

        // A snapshot left behind by an interrupted clear is stale too.
        if !parsed.records.is_empty() || store.snapshot_path.exists() {
            let state = store.state.lock();
            if let Err(e) = write_snapshot(&store.snapshot_path, &state.aggregate) {
                warn!(error = %e, "could not refresh feedback snapshot; the log remains authoritative");
            }
        }
        let stats = store.stats();
        debug!(path = %store.log_path.display(), records = stats.records, pairs = stats.pairs, "feedback store opened");
        Ok(store)
    }

    /// Rewrites the snapshot after every `interval` appends (at least 1).
    #[must_use]
    pub fn with_snapshot_interval(mut self, interval: usize) -> Self {
        self.snapshot_interval = interval.max(1);
        self
    }

    pub fn log_path(&self) -> &Path { &self.log_path }
    pub fn snapshot_path(&self) -> &Path { &self.snapshot_path }

    /// Appends a record and folds it into the aggregate. Returns the pair's
    /// new score. A failed append leaves both log and aggregate unchanged.
    pub fn append(&self, record: &FeedbackRecord) -> Result<i64> {
        if record.query_signature.is_empty() {
            return Err(InputError::EmptyQuery.into());
        }
        if record.chunk_id.is_empty() {
            return Err(InputError::UnknownChunk(String::new()).into());
        }
        let mut state = self.state.lock();
        self.append_locked(&mut state, record)?;
        state.records += 1;
        state.pending += 1;
        let score = apply(&mut state.aggregate, record);
        if state.pending >= self.snapshot_interval {
            match write_snapshot(&self.snapshot_path, &state.aggregate) {
                Ok(()) => state.pending = 0,
                Err(e) => warn!(error = %e, "feedback snapshot not updated; record is committed in the log"),
            }
        }
        Ok(score)
    }

    /// Writes the snapshot if any record is not yet reflected in it.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.pending > 0 {
            write_snapshot(&self.snapshot_path, &state.aggregate)?;
            state.pending = 0;
        }
        Ok(())
    }

    /// Every record for the pair, oldest first, read back from the log.
    pub fn history(&self, query_signature: &str, chunk_id: &str) -> Result<Vec<FeedbackRecord>> {
        let _guard = self.state.lock();
        let bytes = fs::read(&self.log_path).map_err(|e| StorageError::io(&self.log_path, e))?;
        let parsed = parse_log(&self.log_path, &bytes)?;
        Ok(parsed
            .records
            .into_iter()
            .filter(|r| r.query_signature == query_signature && r.chunk_id == chunk_id)
            .collect())
    }

    /// Rebuilds the aggregate from the log and rewrites the snapshot.
    pub fn replay(&self) -> Result<FeedbackStats> {
        let mut state = self.state.lock();
        let bytes = fs::read(&self.log_path).map_err(|e| StorageError::io(&self.log_path, e))?;
        let parsed = parse_log(&self.log_path, &bytes)?;
        let mut aggregate = Aggregate::new();
        for record in &parsed.records {
            apply(&mut aggregate, record);
        }
        write_snapshot(&self.snapshot_path, &aggregate)?;
        state.aggregate = aggregate;
        state.records = parsed.records.len();
        state.pending = 0;
        let stats = stats_of(&state);
        info!(records = stats.records, pairs = stats.pairs, "feedback aggregate rebuilt from log");
        Ok(stats)
    }

    pub fn stats(&self) -> FeedbackStats {
        stats_of(&self.state.lock())
    }

    /// Drops all feedback: truncates the log and empties the snapshot.
    ///
    /// The truncated log is the commit point. The log file is kept, so a
    /// crash before the snapshot is emptied cannot bring the old snapshot
    /// back as seed records.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.log.set_len(0).map_err(|e| StorageError::io(&self.log_path, e))?;
        state.log.sync_all().map_err(|e| StorageError::io(&self.log_path, e))?;
        state.log_len = 0;
        state.aggregate.clear();
        state.records = 0;
        state.pending = 0;
        write_snapshot(&self.snapshot_path, &state.aggregate)?;
        info!(path = %self.log_path.display(), "feedback cleared");
        Ok(())
    }

    fn append_locked(&self, state: &mut State, record: &FeedbackRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record).map_err(StorageError::from)?;
        line.push(b'\n');
        let written = state.log.write_all(&line).and_then(|()| state.log.sync_data());
        if let Err(e) = written {
            // Cut a partial line so later appends stay readable.
            if let Err(undo) = state.log.set_len(state.log_len) {
                error!(path = %self.log_path.display(), error = %undo, "could not roll back partial feedback append");
            }
            return Err(StorageError::io(&self.log_path, e).into());
        }
        state.log_len += line.len() as u64;
        Ok(())
    }
}

impl Drop for JsonFeedbackStore {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.pending > 0 {
            if let Err(e) = write_snapshot(&self.snapshot_path, &state.aggregate) {
                warn!(error = %e, "feedback snapshot not updated on close; the log remains authoritative");
            }
        }
    }
}

impl FeedbackScores for JsonFeedbackStore {
    #[allow(clippy::cast_precision_loss)]
    fn feedback_score(&self, query_signature: &str, chunk_id: &str) -> Result<f32> {
        let state = self.state.lock();
        let score = state.aggregate.get(query_signature).and_then(|m| m.get(chunk_id)).copied().unwrap_or(0);
        Ok(score as f32)
    }
}

impl FeedbackStore for JsonFeedbackStore {
    #[allow(clippy::cast_precision_loss)]
    fn record_feedback(&self, query_signature: &str, chunk_id: &str, relevant: bool) -> Result<f32> {
        let record = FeedbackRecord::new(query_signature, chunk_id, relevant);
        self.append(&record).map(|s| s as f32)
    }
}

fn apply(aggregate: &mut Aggregate, record: &FeedbackRecord) -> i64 {
    let slot = aggregate.entry(record.query_signature.clone()).or_default().entry(record.chunk_id.clone()).or_insert(0);
    *slot = slot.saturating_add(i64::from(record.adjustment));
    *slot
}

/// Turns an aggregate-only snapshot into seed records and writes them as a
/// new log in one atomic step.
fn seed_log_from_snapshot(snapshot_path: &Path, log_path: &Path) -> Result<()> {
    let bytes = fs::read(snapshot_path).map_err(|e| StorageError::io(snapshot_path, e))?;
    let seed: Aggregate = serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt {
        path: snapshot_path.to_path_buf(),
        line: e.line(),
        message: e.to_string(),
    })?;
    let now = Utc::now();
    let mut content = Vec::new();
    let mut records = 0usize;
    for (signature, chunks) in &seed {
        for (chunk_id, &score) in chunks {
            let adjustment = i32::try_from(score).unwrap_or(if score < 0 { i32::MIN } else { i32::MAX });
            if adjustment == 0 { continue; }
            let record = FeedbackRecord { query_signature: signature.clone(), chunk_id: chunk_id.clone(), adjustment, timestamp: now };
            serde_json::to_writer(&mut content, &record).map_err(StorageError::from)?;
            content.push(b'\n');
            records += 1;
        }
    }
    write_atomic(log_path, &content)?;
    info!(path = %snapshot_path.display(), records, "seeded feedback log from snapshot");
    Ok(())
}

fn write_snapshot(path: &Path, aggregate: &Aggregate) -> Result<()> {
    let content = serde_json::to_string_pretty(aggregate).map_err(StorageError::from)?;
    write_atomic(path, content.as_bytes())
}

// Atomic write: write to temp file, sync, then rename
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);
    let mut file = File::create(&temp_path).map_err(|e| StorageError::io(&temp_path, e))?;
    file.write_all(bytes).map_err(|e| StorageError::io(&temp_path, e))?;
    file.sync_all().map_err(|e| StorageError::io(&temp_path, e))?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        StorageError::io(path, e)
    })?;
    Ok(())
}

fn stats_of(state: &State) -> FeedbackStats {
    FeedbackStats {
        signatures: state.aggregate.len(),
        pairs: state.aggregate.values().map(BTreeMap::len).sum(),
        records: state.records,
    }
}

#[derive(Debug)]
struct ParsedLog {
    records: Vec<FeedbackRecord>,
    /// Bytes up to the end of the last complete record.
    valid_len: u64,
    /// The final record is complete but lacks its newline.
    missing_newline: bool,
}

fn parse_log(path: &Path, bytes: &[u8]) -> Result<ParsedLog> {
    let mut records = Vec::new();
    let mut offset = 0usize;
    let mut line_no = 0usize;
    let mut missing_newline = false;
    let mut valid_len = bytes.len();

    while offset < bytes.len() {
        line_no += 1;
        let rest = &bytes[offset..];
        match rest.iter().position(|&b| b == b'\n') {
            Some(end) => {
                let line = &rest[..end];
                if !line.iter().all(u8::is_ascii_whitespace) {
                    let record = serde_json::from_slice::<FeedbackRecord>(line).map_err(|e| StorageError::Corrupt {
                        path: path.to_path_buf(),
                        line: line_no,
                        message: e.to_string(),
                    })?;
                    records.push(record);
                }
                offset += end + 1;
            }
            None => {
                if rest.iter().all(u8::is_ascii_whitespace) {
                    valid_len = offset;
                } else if let Ok(record) = serde_json::from_slice::<FeedbackRecord>(rest) {
                    records.push(record);
                    missing_newline = true;
                } else {
                    valid_len = offset;
                }
                break;
            }
        }
    }
    Ok(ParsedLog { records, valid_len: valid_len as u64, missing_newline })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_log_reports_torn_tail_and_corrupt_interior() {
        let path = Path::new("feedback.log.jsonl");
        let good = serde_json::to_string(&FeedbackRecord::new("q", "c", true)).unwrap();

        let torn = format!("{good}\n{{\"query_signature\":\"q\",\"chu");
        let parsed = parse_log(path, torn.as_bytes()).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.valid_len, good.len() as u64 + 1);

        let corrupt = format!("garbage\n{good}\n");
        let err = parse_log(path, corrupt.as_bytes()).unwrap_err();
        assert!(matches!(err, localdoc_core::Error::Storage(StorageError::Corrupt { line: 1, .. })));

        let parsed = parse_log(path, good.as_bytes()).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert!(parsed.missing_newline);
    }
}
