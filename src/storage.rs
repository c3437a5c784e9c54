//! Storage layout for hive
//!
//! All state lives under one data directory (`.hive/` by default):
//!
//! ```text
//! .hive.toml                    # Optional configuration (data root)
//! .hive/
//!   actor                       # Persisted actor identity
//!   projects.jsonl              # One collection file per entity kind
//!   tasks.jsonl
//!   comments.jsonl
//!   time_entries.jsonl
//!   activity.jsonl
//!   notifications.jsonl
//!   <collection>.lock           # Advisory lock per collection file
//! ```

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::config::CONFIG_FILE;
use crate::error::Result;
use crate::repository::EntityKind;

/// Default name of the data directory
pub const DATA_DIR: &str = ".hive";

/// Path layout for a hive data root
#[derive(Debug, Clone)]
pub struct Storage {
    /// Directory holding `.hive.toml`
    root: PathBuf,
    /// Directory holding the collection files
    data_dir: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf, data_dir: PathBuf) -> Self {
        Self { root, data_dir }
    }

    /// Storage with the default `.hive/` directory under `root`
    pub fn for_root(root: PathBuf) -> Self {
        let data_dir = root.join(DATA_DIR);
        Self::new(root, data_dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn actor_file(&self) -> PathBuf {
        self.data_dir.join("actor")
    }

    /// JSONL file backing one entity collection
    pub fn collection_file(&self, kind: EntityKind) -> PathBuf {
        self.data_dir.join(format!("{}.jsonl", kind.collection()))
    }

    /// Lock file guarding one entity collection
    pub fn collection_lock(&self, kind: EntityKind) -> PathBuf {
        self.data_dir.join(format!("{}.lock", kind.collection()))
    }

    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    // =========================================================================
    // JSONL helpers
    // =========================================================================

    /// Append a line to a JSONL file
    ///
    /// Not atomic on its own; callers hold the collection lock.
    pub fn append_jsonl<T: Serialize>(&self, path: &Path, record: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(record)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        writeln!(file, "{}", json)?;
        file.sync_all()?;

        Ok(())
    }

    /// Read all records from a JSONL file
    pub fn read_jsonl<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: T = serde_json::from_str(&line)?;
            records.push(record);
        }

        Ok(records)
    }

    /// Replace a JSONL file with the given records (atomic)
    pub fn write_jsonl<T: Serialize>(&self, path: &Path, records: &[T]) -> Result<()> {
        let mut buffer = Vec::new();
        for record in records {
            let json = serde_json::to_string(record)?;
            buffer.extend_from_slice(json.as_bytes());
            buffer.push(b'\n');
        }
        crate::lock::write_atomic(path, &buffer)
    }

    // =========================================================================
    // Actor persistence
    // =========================================================================

    /// Read the persisted actor file (`<user id>\t<display name>`)
    pub fn read_actor(&self) -> Option<String> {
        fs::read_to_string(self.actor_file())
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn write_actor(&self, line: &str) -> Result<()> {
        self.init()?;
        crate::lock::write_atomic(self.actor_file(), format!("{line}\n").as_bytes())
    }
}
