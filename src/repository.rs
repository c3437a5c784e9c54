//! Persistence collaborator
//!
//! Every store writes through a [`Repository`]. Records travel as JSON values
//! keyed by entity kind and id, so one implementation serves every collection.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ulid::Ulid;

use crate::error::{Error, Result};
use crate::lock::FileLock;
use crate::storage::Storage;

/// Entity collections known to the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    Task,
    Comment,
    TimeEntry,
    Activity,
    Notification,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Project,
        EntityKind::Task,
        EntityKind::Comment,
        EntityKind::TimeEntry,
        EntityKind::Activity,
        EntityKind::Notification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::Task => "task",
            EntityKind::Comment => "comment",
            EntityKind::TimeEntry => "time entry",
            EntityKind::Activity => "activity",
            EntityKind::Notification => "notification",
        }
    }

    /// Fresh record id, e.g. `task-01hz...`
    pub fn new_id(&self) -> String {
        let prefix = match self {
            EntityKind::Project => "project",
            EntityKind::Task => "task",
            EntityKind::Comment => "comment",
            EntityKind::TimeEntry => "time",
            EntityKind::Activity => "log",
            EntityKind::Notification => "notification",
        };
        format!("{}-{}", prefix, Ulid::new().to_string().to_ascii_lowercase())
    }

    /// File stem of the on-disk collection
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Project => "projects",
            EntityKind::Task => "tasks",
            EntityKind::Comment => "comments",
            EntityKind::TimeEntry => "time_entries",
            EntityKind::Activity => "activity",
            EntityKind::Notification => "notifications",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// System of record behind every store.
///
/// `load_all` returns records in the order they were first saved.
pub trait Repository: Send + Sync {
    fn load_all(&self, kind: EntityKind) -> Result<Vec<Value>>;

    fn save(&self, kind: EntityKind, id: &str, record: &Value) -> Result<()>;

    fn delete(&self, kind: EntityKind, id: &str) -> Result<()>;

    /// Hold `kind` exclusively until the guard drops.
    ///
    /// Loads and saves of `kind` by the holding thread proceed while the
    /// guard lives. Backends private to one process hold nothing.
    fn lock_collection(&self, _kind: EntityKind) -> Result<CollectionLock> {
        Ok(CollectionLock::unlocked())
    }
}

thread_local! {
    static HELD_LOCKS: RefCell<HashSet<PathBuf>> = RefCell::new(HashSet::new());
}

/// Exclusive hold on one collection; released on drop.
///
/// Re-acquiring a lock this thread already holds returns an empty guard, so
/// a store can reload and save under its own read-modify-write lock.
pub struct CollectionLock {
    held: Option<FileLock>,
}

impl CollectionLock {
    pub fn unlocked() -> Self {
        Self { held: None }
    }

    fn acquire(path: PathBuf, timeout_ms: u64) -> Result<Self> {
        if HELD_LOCKS.with(|held| held.borrow().contains(&path)) {
            return Ok(Self::unlocked());
        }
        let lock = FileLock::acquire(&path, timeout_ms)?;
        HELD_LOCKS.with(|held| held.borrow_mut().insert(path));
        Ok(Self { held: Some(lock) })
    }

    /// Whether this guard owns the lock (false for nested or no-op guards)
    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }
}

impl Drop for CollectionLock {
    fn drop(&mut self) {
        if let Some(lock) = &self.held {
            HELD_LOCKS.with(|held| held.borrow_mut().remove(lock.path()));
        }
    }
}

/// A store's records, reloaded from the repository, with the collection
/// held for the lifetime of the value
pub struct Locked<'a, T> {
    records: MutexGuard<'a, Vec<T>>,
    _lock: CollectionLock,
}

impl<T> Deref for Locked<'_, T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.records
    }
}

impl<T> DerefMut for Locked<'_, T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.records
    }
}

/// Lock `kind` and refresh `records` from the repository.
///
/// Checks made on the result see every write another process finished
/// before the lock was taken, and no write lands until it is dropped.
pub fn lock_fresh<'a, T: DeserializeOwned>(
    repo: &dyn Repository,
    kind: EntityKind,
    records: &'a Mutex<Vec<T>>,
) -> Result<Locked<'a, T>> {
    let mut guard = records.lock();
    let lock = repo.lock_collection(kind)?;
    *guard = load_records(repo, kind)?;
    Ok(Locked {
        records: guard,
        _lock: lock,
    })
}

/// Serialize a record and save it
pub fn save_record<T: Serialize>(
    repo: &dyn Repository,
    kind: EntityKind,
    id: &str,
    record: &T,
) -> Result<()> {
    let value = serde_json::to_value(record)?;
    repo.save(kind, id, &value)
}

/// Load and deserialize every record of a collection
pub fn load_records<T: DeserializeOwned>(repo: &dyn Repository, kind: EntityKind) -> Result<Vec<T>> {
    repo.load_all(kind)?
        .into_iter()
        .map(|value| {
            serde_json::from_value(value).map_err(|err| {
                Error::Persistence(format!("corrupt {} record: {err}", kind.as_str()))
            })
        })
        .collect()
}

/// Resolve user input to a single id of `kind`.
///
/// Accepts the full id, the id without its kind prefix, or a unique prefix
/// of either, case-insensitively.
pub fn resolve_id(kind: EntityKind, input: &str, ids: &[String]) -> Result<String> {
    let needle = input.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return Err(Error::InvalidArgument(format!("{kind} id cannot be empty")));
    }

    let mut prefix = Vec::new();
    for id in ids {
        let full = id.to_ascii_lowercase();
        let bare = full.split_once('-').map(|(_, rest)| rest).unwrap_or(full.as_str());
        if full == needle || bare == needle {
            return Ok(id.clone());
        }
        if full.starts_with(&needle) || bare.starts_with(&needle) {
            prefix.push(id.clone());
        }
    }

    prefix.sort();
    prefix.dedup();
    match prefix.len() {
        0 => Err(Error::not_found(kind, input.trim())),
        1 => Ok(prefix.remove(0)),
        _ => Err(Error::InvalidArgument(format!(
            "ambiguous {kind} id '{}': {}",
            input.trim(),
            prefix.join(", ")
        ))),
    }
}

/// Save a record, then run `after` (usually the activity append).
///
/// When `after` fails the save is undone: `previous` is written back, or the
/// record is deleted if it did not exist before.
pub fn save_then<T: Serialize, R>(
    repo: &dyn Repository,
    kind: EntityKind,
    id: &str,
    record: &T,
    previous: Option<&T>,
    after: impl FnOnce() -> Result<R>,
) -> Result<R> {
    save_record(repo, kind, id, record)?;
    after().map_err(|err| {
        let undo = match previous {
            Some(previous) => save_record(repo, kind, id, previous),
            None => repo.delete(kind, id),
        };
        compensated(kind, id, err, undo)
    })
}

/// Delete a record, then run `after`; the record is restored if `after` fails.
pub fn delete_then<T: Serialize, R>(
    repo: &dyn Repository,
    kind: EntityKind,
    id: &str,
    previous: &T,
    after: impl FnOnce() -> Result<R>,
) -> Result<R> {
    repo.delete(kind, id)?;
    after().map_err(|err| {
        let undo = save_record(repo, kind, id, previous);
        compensated(kind, id, err, undo)
    })
}

fn compensated(kind: EntityKind, id: &str, err: Error, undo: Result<()>) -> Error {
    match undo {
        Ok(()) => tracing::warn!(kind = kind.as_str(), id, error = %err, "write rolled back"),
        Err(undo_err) => tracing::warn!(
            kind = kind.as_str(),
            id,
            error = %err,
            undo_error = %undo_err,
            "rollback failed; repository may hold an unlogged change"
        ),
    }
    match err {
        Error::Persistence(_) => err,
        other => Error::Persistence(other.to_string()),
    }
}

// =============================================================================
// In-memory repository
// =============================================================================

/// Process-local repository; state is gone when the value is dropped
#[derive(Debug, Default)]
pub struct MemoryRepository {
    collections: Mutex<HashMap<EntityKind, Vec<(String, Value)>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Repository for MemoryRepository {
    fn load_all(&self, kind: EntityKind) -> Result<Vec<Value>> {
        let collections = self.collections.lock();
        Ok(collections
            .get(&kind)
            .map(|records| records.iter().map(|(_, value)| value.clone()).collect())
            .unwrap_or_default())
    }

    fn save(&self, kind: EntityKind, id: &str, record: &Value) -> Result<()> {
        let mut collections = self.collections.lock();
        let records = collections.entry(kind).or_default();
        upsert(records, id, record.clone());
        Ok(())
    }

    fn delete(&self, kind: EntityKind, id: &str) -> Result<()> {
        let mut collections = self.collections.lock();
        if let Some(records) = collections.get_mut(&kind) {
            records.retain(|(existing, _)| existing != id);
        }
        Ok(())
    }
}

fn upsert(records: &mut Vec<(String, Value)>, id: &str, value: Value) {
    match records.iter_mut().find(|(existing, _)| existing == id) {
        Some(slot) => slot.1 = value,
        None => records.push((id.to_string(), value)),
    }
}

// =============================================================================
// JSONL repository
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RecordOp {
    Put,
    Delete,
}

/// One line of a collection file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordLine {
    op: RecordOp,
    id: String,
    at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    record: Option<Value>,
}

/// Outcome of rewriting a collection file
#[derive(Debug, Clone, Serialize)]
pub struct CompactReport {
    pub kind: EntityKind,
    pub before_lines: usize,
    pub after_lines: usize,
}

/// Append-only JSONL collections under the data directory.
///
/// Writes append `put`/`delete` lines under the collection lock; loading
/// replays them last-write-wins.
#[derive(Debug, Clone)]
pub struct JsonlRepository {
    storage: Storage,
    lock_timeout_ms: u64,
}

impl JsonlRepository {
    pub fn new(storage: Storage, lock_timeout_ms: u64) -> Self {
        Self {
            storage,
            lock_timeout_ms,
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Rewrite a collection file so it holds one `put` line per live record
    pub fn compact(&self, kind: EntityKind) -> Result<CompactReport> {
        let _lock = self.lock(kind)?;
        let path = self.storage.collection_file(kind);
        let lines: Vec<RecordLine> = self.storage.read_jsonl(&path).map_err(persistence)?;
        let before_lines = lines.len();
        let live = replay(lines);
        let now = Utc::now();
        let rewritten: Vec<RecordLine> = live
            .into_iter()
            .map(|(id, record)| RecordLine {
                op: RecordOp::Put,
                id,
                at: now,
                record: Some(record),
            })
            .collect();
        self.storage
            .write_jsonl(&path, &rewritten)
            .map_err(persistence)?;
        tracing::debug!(kind = kind.as_str(), before_lines, after_lines = rewritten.len(), "compacted collection");
        Ok(CompactReport {
            kind,
            before_lines,
            after_lines: rewritten.len(),
        })
    }

    fn lock(&self, kind: EntityKind) -> Result<CollectionLock> {
        CollectionLock::acquire(self.storage.collection_lock(kind), self.lock_timeout_ms)
    }

    fn append(&self, kind: EntityKind, line: RecordLine) -> Result<()> {
        let _lock = self.lock(kind)?;
        self.storage
            .append_jsonl(&self.storage.collection_file(kind), &line)
            .map_err(persistence)
    }
}

impl Repository for JsonlRepository {
    fn load_all(&self, kind: EntityKind) -> Result<Vec<Value>> {
        let _lock = self.lock(kind)?;
        let lines: Vec<RecordLine> = self
            .storage
            .read_jsonl(&self.storage.collection_file(kind))
            .map_err(persistence)?;
        Ok(replay(lines).into_iter().map(|(_, value)| value).collect())
    }

    fn save(&self, kind: EntityKind, id: &str, record: &Value) -> Result<()> {
        self.append(
            kind,
            RecordLine {
                op: RecordOp::Put,
                id: id.to_string(),
                at: Utc::now(),
                record: Some(record.clone()),
            },
        )
    }

    fn delete(&self, kind: EntityKind, id: &str) -> Result<()> {
        self.append(
            kind,
            RecordLine {
                op: RecordOp::Delete,
                id: id.to_string(),
                at: Utc::now(),
                record: None,
            },
        )
    }

    fn lock_collection(&self, kind: EntityKind) -> Result<CollectionLock> {
        self.lock(kind)
    }
}

fn replay(lines: Vec<RecordLine>) -> Vec<(String, Value)> {
    let mut records: Vec<(String, Value)> = Vec::new();
    for line in lines {
        match (line.op, line.record) {
            (RecordOp::Put, Some(record)) => upsert(&mut records, &line.id, record),
            (RecordOp::Put, None) => {}
            (RecordOp::Delete, _) => records.retain(|(existing, _)| existing != &line.id),
        }
    }
    records
}

fn persistence(err: Error) -> Error {
    match err {
        Error::Io(err) => Error::Persistence(err.to_string()),
        Error::Json(err) => Error::Persistence(err.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn jsonl_repo(dir: &std::path::Path) -> JsonlRepository {
        JsonlRepository::new(Storage::for_root(dir.to_path_buf()), 1000)
    }

    #[test]
    fn new_ids_carry_kind_prefix() {
        let id = EntityKind::TimeEntry.new_id();
        assert!(id.starts_with("time-"));
        assert_eq!(id.len(), "time-".len() + 26);
        assert_ne!(EntityKind::Task.new_id(), EntityKind::Task.new_id());
    }

    #[test]
    fn resolve_id_accepts_full_bare_and_prefix() {
        let ids = vec![
            "task-01hzaaaa".to_string(),
            "task-01hzbbbb".to_string(),
        ];
        assert_eq!(resolve_id(EntityKind::Task, "task-01hzaaaa", &ids).expect("full"), ids[0]);
        assert_eq!(resolve_id(EntityKind::Task, "01HZBBBB", &ids).expect("bare"), ids[1]);
        assert_eq!(resolve_id(EntityKind::Task, "01hzb", &ids).expect("prefix"), ids[1]);
        assert!(matches!(
            resolve_id(EntityKind::Task, "01hz", &ids),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            resolve_id(EntityKind::Task, "zzz", &ids),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn memory_repository_upserts_in_place() {
        let repo = MemoryRepository::new();
        repo.save(EntityKind::Task, "a", &json!({"id": "a", "v": 1}))
            .expect("save a");
        repo.save(EntityKind::Task, "b", &json!({"id": "b"}))
            .expect("save b");
        repo.save(EntityKind::Task, "a", &json!({"id": "a", "v": 2}))
            .expect("save a again");

        let all = repo.load_all(EntityKind::Task).expect("load");
        assert_eq!(all, vec![json!({"id": "a", "v": 2}), json!({"id": "b"})]);
        assert!(repo.load_all(EntityKind::Comment).expect("load").is_empty());
    }

    #[test]
    fn memory_repository_delete_is_idempotent() {
        let repo = MemoryRepository::new();
        repo.save(EntityKind::Comment, "c", &json!({"id": "c"}))
            .expect("save");
        repo.delete(EntityKind::Comment, "c").expect("delete");
        repo.delete(EntityKind::Comment, "c").expect("delete again");
        assert!(repo.load_all(EntityKind::Comment).expect("load").is_empty());
    }

    #[test]
    fn jsonl_repository_replays_puts_and_deletes() {
        let dir = tempdir().expect("tempdir");
        let repo = jsonl_repo(dir.path());

        repo.save(EntityKind::Task, "t1", &json!({"id": "t1", "title": "one"}))
            .expect("save t1");
        repo.save(EntityKind::Task, "t2", &json!({"id": "t2"}))
            .expect("save t2");
        repo.save(EntityKind::Task, "t1", &json!({"id": "t1", "title": "uno"}))
            .expect("update t1");
        repo.delete(EntityKind::Task, "t2").expect("delete t2");

        let reopened = jsonl_repo(dir.path());
        let all = reopened.load_all(EntityKind::Task).expect("load");
        assert_eq!(all, vec![json!({"id": "t1", "title": "uno"})]);
    }

    #[test]
    fn compact_keeps_live_records_only() {
        let dir = tempdir().expect("tempdir");
        let repo = jsonl_repo(dir.path());
        for round in 0..3 {
            repo.save(EntityKind::Comment, "c1", &json!({"id": "c1", "round": round}))
                .expect("save");
        }
        repo.save(EntityKind::Comment, "c2", &json!({"id": "c2"}))
            .expect("save");
        repo.delete(EntityKind::Comment, "c2").expect("delete");

        let report = repo.compact(EntityKind::Comment).expect("compact");
        assert_eq!(report.before_lines, 5);
        assert_eq!(report.after_lines, 1);
        assert_eq!(
            repo.load_all(EntityKind::Comment).expect("load"),
            vec![json!({"id": "c1", "round": 2})]
        );
    }

    #[test]
    fn collection_lock_is_reentrant_on_the_holding_thread() {
        let dir = tempdir().expect("tempdir");
        let repo = jsonl_repo(dir.path());

        let outer = repo.lock_collection(EntityKind::Task).expect("lock");
        assert!(outer.is_held());
        let nested = repo.lock_collection(EntityKind::Task).expect("nested");
        assert!(!nested.is_held());
        repo.save(EntityKind::Task, "t1", &json!({"id": "t1"}))
            .expect("save under lock");
        assert_eq!(repo.load_all(EntityKind::Task).expect("load").len(), 1);
        drop(nested);

        let other = JsonlRepository::new(Storage::for_root(dir.path().to_path_buf()), 50);
        let blocked = std::thread::spawn(move || other.lock_collection(EntityKind::Task).map(|_| ()))
            .join()
            .expect("join");
        assert!(matches!(blocked, Err(Error::LockFailed(_))));

        drop(outer);
        let again = repo.lock_collection(EntityKind::Task).expect("relock");
        assert!(again.is_held());
    }

    #[test]
    fn lock_fresh_reloads_the_snapshot() {
        let repo = MemoryRepository::new();
        repo.save(EntityKind::Comment, "c1", &json!({"id": "c1"}))
            .expect("save");
        let records: Mutex<Vec<Value>> = Mutex::new(Vec::new());

        let locked = lock_fresh(&repo, EntityKind::Comment, &records).expect("lock");
        assert_eq!(locked.len(), 1);
        drop(locked);
        assert_eq!(records.lock().len(), 1);
    }

    #[test]
    fn corrupt_line_surfaces_as_persistence_error() {
        let dir = tempdir().expect("tempdir");
        let repo = jsonl_repo(dir.path());
        let path = repo.storage().collection_file(EntityKind::Activity);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, "not json\n").expect("write");

        let err = repo.load_all(EntityKind::Activity).expect_err("corrupt");
        assert!(matches!(err, Error::Persistence(_)));
    }
}
