//! Atomic JSON persistence: write-then-rename with fsync.
//!
//! Every write goes to a temporary file in the target's directory, is synced
//! to disk, then renamed over the target. Either the old file or the new file
//! exists, never partial data. Corrupt files read back as empty with an error
//! logged; partial writes are impossible by construction.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::DeserializeOwned;
use serde::Serialize;
use signal_core::SignalError;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_path_for(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store".to_string());
    let nonce = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    target.with_file_name(format!(".{}.{}.{}.tmp", name, process::id(), nonce))
}

/// Serialize `value` and atomically replace `target` with it.
pub fn write_json<T: Serialize>(target: &Path, value: &T) -> Result<(), SignalError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let payload = serde_json::to_vec_pretty(value)?;
    let temp = temp_path_for(target);

    let result = (|| -> Result<(), SignalError> {
        let mut file = File::create(&temp)?;
        file.write_all(&payload)?;
        file.sync_all()?;
        fs::rename(&temp, target)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

/// Atomically replace `target` with raw bytes (same tmp/fsync/rename
/// sequence; used by non-JSON sinks).
pub fn write_bytes(target: &Path, payload: &[u8]) -> Result<(), SignalError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp = temp_path_for(target);
    let result = (|| -> Result<(), SignalError> {
        let mut file = File::create(&temp)?;
        file.write_all(payload)?;
        file.sync_all()?;
        fs::rename(&temp, target)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

/// Read `target` as JSON. A missing or corrupt file yields the default.
pub fn read_json_or_default<T: DeserializeOwned + Default>(target: &Path) -> T {
    if !target.exists() {
        tracing::debug!("No existing file: {}", target.display());
        return T::default();
    }

    match fs::read(target) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(
                    "Corrupted JSON in {}: {}. Using default value.",
                    target.display(),
                    e
                );
                T::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read {}: {}", target.display(), e);
            T::default()
        }
    }
}

/// A single JSON-backed store file with atomic replace semantics.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load<T: DeserializeOwned + Default>(&self) -> T {
        read_json_or_default(&self.path)
    }

    pub fn save<T: Serialize>(&self, value: &T) -> Result<(), SignalError> {
        write_json(&self.path, value)?;
        tracing::debug!("Atomically wrote {}", self.path.display());
        Ok(())
    }
}

/// Commit a set of serialized payloads, one atomic rename per file, in order.
/// Per-file atomicity is guaranteed; a crash between renames leaves a prefix
/// of the writes applied, which callers tolerate via idempotent reconstruction.
pub fn commit(writes: &[(&Path, serde_json::Value)]) -> Result<(), SignalError> {
    for (path, payload) in writes {
        write_json(path, payload)?;
    }
    Ok(())
}

/// Two-file tracking store: an active file and an archive file, with atomic
/// movement of entries between them.
#[derive(Debug, Clone)]
pub struct TwoFileStore {
    active: JsonStore,
    archive: JsonStore,
}

impl TwoFileStore {
    pub fn new(active_path: impl Into<PathBuf>, archive_path: impl Into<PathBuf>) -> Self {
        Self {
            active: JsonStore::new(active_path),
            archive: JsonStore::new(archive_path),
        }
    }

    pub fn load<T: DeserializeOwned + Default>(&self) -> (T, T) {
        (self.active.load(), self.archive.load())
    }

    /// Save both sides. Each write is atomic; the pair is written active-first
    /// so an interrupted archival never loses an entry (it can only appear in
    /// both files until the next save reconciles).
    pub fn save<T: Serialize>(&self, active: &T, archive: &T) -> Result<(), SignalError> {
        self.archive.save(archive)?;
        self.active.save(active)?;
        Ok(())
    }

    pub fn active_path(&self) -> &Path {
        self.active.path()
    }

    pub fn archive_path(&self) -> &Path {
        self.archive.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let mut data = BTreeMap::new();
        data.insert("0xabc".to_string(), 1.5f64);
        data.insert("0xdef".to_string(), 0.25f64);

        write_json(&path, &data).unwrap();
        let back: BTreeMap<String, f64> = read_json_or_default(&path);
        assert_eq!(back, data);
    }

    #[test]
    fn missing_file_reads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let back: BTreeMap<String, f64> = read_json_or_default(&path);
        assert!(back.is_empty());
    }

    #[test]
    fn corrupt_file_reads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.json");
        fs::write(&path, b"{not json").unwrap();
        let back: BTreeMap<String, f64> = read_json_or_default(&path);
        assert!(back.is_empty());
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        write_json(&path, &vec![1, 2, 3]).unwrap();
        write_json(&path, &vec![4, 5, 6]).unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn two_file_store_saves_both_sides() {
        let dir = tempfile::tempdir().unwrap();
        let store = TwoFileStore::new(
            dir.path().join("active.json"),
            dir.path().join("completed.json"),
        );

        let mut active = BTreeMap::new();
        active.insert("0xabc".to_string(), "tracking".to_string());
        let mut archive = BTreeMap::new();
        archive.insert("0xdef".to_string(), "done".to_string());

        store.save(&active, &archive).unwrap();
        let (a, c): (BTreeMap<String, String>, BTreeMap<String, String>) = store.load();
        assert_eq!(a, active);
        assert_eq!(c, archive);
    }

    #[test]
    fn commit_writes_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let p1 = dir.path().join("one.json");
        let p2 = dir.path().join("two.json");
        commit(&[
            (p1.as_path(), serde_json::json!({"a": 1})),
            (p2.as_path(), serde_json::json!({"b": 2})),
        ])
        .unwrap();

        let one: serde_json::Value = read_json_or_default(&p1);
        let two: serde_json::Value = read_json_or_default(&p2);
        assert_eq!(one["a"], 1);
        assert_eq!(two["b"], 2);
    }
}
