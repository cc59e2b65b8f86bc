//! Durable task storage behind the [`TaskStore`] trait.
//!
//! [`JsonTaskStore`] keeps every task in one pretty-printed JSON document
//! (temp file + rename on every write). [`MemoryTaskStore`] backs tests and
//! embedders that bring their own persistence.
//!
//! Every write is a single read-modify-write inside the store, so history
//! appends from concurrent callers (threads or separate processes) never
//! overwrite each other.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::core::types::{Task, TaskExecution};

/// Store collaborator consumed by the service. The store is the sole owner of
/// durable task state.
pub trait TaskStore: Send + Sync {
    fn find_by_id(&self, id: &str) -> Result<Option<Task>>;
    /// Insert or replace by id. Returns the persisted representation.
    fn save(&self, task: Task) -> Result<Task>;
    /// Insert or replace the definition (name, owner, command) of `task`.
    /// An existing task keeps its stored history; a new task starts empty.
    fn save_definition(&self, task: Task) -> Result<Task>;
    /// Append one record to a task's history. `None` when the id is unknown.
    fn append_execution(&self, id: &str, execution: TaskExecution) -> Result<Option<Task>>;
    fn exists_by_id(&self, id: &str) -> Result<bool>;
    /// All tasks ordered by id.
    fn find_all(&self) -> Result<Vec<Task>>;
    /// Tasks whose name contains `query`, ignoring case, ordered by id.
    fn find_by_name_containing(&self, query: &str) -> Result<Vec<Task>>;
    /// Remove a task. Removing an unknown id is a no-op.
    fn delete_by_id(&self, id: &str) -> Result<()>;
}

impl<T: TaskStore + ?Sized> TaskStore for Arc<T> {
    fn find_by_id(&self, id: &str) -> Result<Option<Task>> {
        (**self).find_by_id(id)
    }
    fn save(&self, task: Task) -> Result<Task> {
        (**self).save(task)
    }
    fn save_definition(&self, task: Task) -> Result<Task> {
        (**self).save_definition(task)
    }
    fn append_execution(&self, id: &str, execution: TaskExecution) -> Result<Option<Task>> {
        (**self).append_execution(id, execution)
    }
    fn exists_by_id(&self, id: &str) -> Result<bool> {
        (**self).exists_by_id(id)
    }
    fn find_all(&self) -> Result<Vec<Task>> {
        (**self).find_all()
    }
    fn find_by_name_containing(&self, query: &str) -> Result<Vec<Task>> {
        (**self).find_by_name_containing(query)
    }
    fn delete_by_id(&self, id: &str) -> Result<()> {
        (**self).delete_by_id(id)
    }
}

fn name_matches(task: &Task, needle_lower: &str) -> bool {
    task.name.to_lowercase().contains(needle_lower)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Apply a definition update to the task map, keeping any stored history.
fn merge_definition(tasks: &mut BTreeMap<String, Task>, task: Task) -> Task {
    let history = tasks
        .remove(&task.id)
        .map(|existing| existing.task_executions)
        .unwrap_or_default();
    let merged = task.with_history(history);
    tasks.insert(merged.id.clone(), merged.clone());
    merged
}

fn push_execution(
    tasks: &mut BTreeMap<String, Task>,
    id: &str,
    execution: TaskExecution,
) -> Option<Task> {
    let task = tasks.remove(id)?.with_execution(execution);
    tasks.insert(task.id.clone(), task.clone());
    Some(task)
}

/// In-process store keyed by id.
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<BTreeMap<String, Task>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let tasks = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
        Self {
            tasks: Mutex::new(tasks),
        }
    }
}

impl TaskStore for MemoryTaskStore {
    fn find_by_id(&self, id: &str) -> Result<Option<Task>> {
        Ok(lock(&self.tasks).get(id).cloned())
    }

    fn save(&self, task: Task) -> Result<Task> {
        lock(&self.tasks).insert(task.id.clone(), task.clone());
        Ok(task)
    }

    fn save_definition(&self, task: Task) -> Result<Task> {
        Ok(merge_definition(&mut lock(&self.tasks), task))
    }

    fn append_execution(&self, id: &str, execution: TaskExecution) -> Result<Option<Task>> {
        Ok(push_execution(&mut lock(&self.tasks), id, execution))
    }

    fn exists_by_id(&self, id: &str) -> Result<bool> {
        Ok(lock(&self.tasks).contains_key(id))
    }

    fn find_all(&self) -> Result<Vec<Task>> {
        Ok(lock(&self.tasks).values().cloned().collect())
    }

    fn find_by_name_containing(&self, query: &str) -> Result<Vec<Task>> {
        let needle = query.to_lowercase();
        Ok(lock(&self.tasks)
            .values()
            .filter(|task| name_matches(task, &needle))
            .cloned()
            .collect())
    }

    fn delete_by_id(&self, id: &str) -> Result<()> {
        lock(&self.tasks).remove(id);
        Ok(())
    }
}

/// On-disk document layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct TaskDocument {
    tasks: Vec<Task>,
}

/// File-backed store. Every operation re-reads the file, so external edits
/// between calls are picked up.
///
/// Writes hold an exclusive lock on `<file>.lock` from load to rename, which
/// serializes writers in this process and in every other process sharing the
/// file. Readers take no lock; the rename makes each write visible at once.
#[derive(Debug)]
pub struct JsonTaskStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonTaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Run `apply` over the current tasks under the store lock and persist
    /// the result when `apply` reports a change.
    fn update<T>(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, Task>) -> (T, bool),
    ) -> Result<T> {
        let _guard = lock(&self.write_lock);
        let _file_lock = FileLock::acquire(&sibling(&self.path, ".lock"))?;
        let mut tasks = self.load()?;
        let (value, changed) = apply(&mut tasks);
        if changed {
            self.write(tasks)?;
        }
        Ok(value)
    }

    /// Load all tasks keyed by id. A missing file is an empty store.
    fn load(&self) -> Result<BTreeMap<String, Task>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read task store {}", self.path.display()))?;
        let doc: TaskDocument = serde_json::from_str(&contents)
            .with_context(|| format!("parse task store {}", self.path.display()))?;
        Ok(doc.tasks.into_iter().map(|t| (t.id.clone(), t)).collect())
    }

    fn write(&self, tasks: BTreeMap<String, Task>) -> Result<()> {
        debug!(path = %self.path.display(), count = tasks.len(), "writing task store");
        let doc = TaskDocument {
            tasks: tasks.into_values().collect(),
        };
        let mut buf = serde_json::to_string_pretty(&doc).context("serialize task store")?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
    }
}

impl TaskStore for JsonTaskStore {
    fn find_by_id(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.load()?.remove(id))
    }

    fn save(&self, task: Task) -> Result<Task> {
        self.update(|tasks| {
            tasks.insert(task.id.clone(), task.clone());
            (task, true)
        })
    }

    fn save_definition(&self, task: Task) -> Result<Task> {
        self.update(|tasks| (merge_definition(tasks, task), true))
    }

    fn append_execution(&self, id: &str, execution: TaskExecution) -> Result<Option<Task>> {
        self.update(|tasks| {
            let updated = push_execution(tasks, id, execution);
            let changed = updated.is_some();
            (updated, changed)
        })
    }

    fn exists_by_id(&self, id: &str) -> Result<bool> {
        Ok(self.load()?.contains_key(id))
    }

    fn find_all(&self) -> Result<Vec<Task>> {
        Ok(self.load()?.into_values().collect())
    }

    fn find_by_name_containing(&self, query: &str) -> Result<Vec<Task>> {
        let needle = query.to_lowercase();
        Ok(self
            .load()?
            .into_values()
            .filter(|task| name_matches(task, &needle))
            .collect())
    }

    fn delete_by_id(&self, id: &str) -> Result<()> {
        self.update(|tasks| ((), tasks.remove(id).is_some()))
    }
}

/// Exclusive advisory lock on a file, released when dropped.
///
/// The lock file is left in place: unlinking it would let a later writer lock
/// a fresh inode while an earlier one still holds the old one.
struct FileLock {
    _file: File,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        create_parent(path)?;
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("open lock file {}", path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("lock {}", path.display()))?;
        Ok(Self { _file: file })
    }
}

/// `tasks.json` -> `tasks.json<suffix>` in the same directory.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Directory holding `path`; `.` for a bare file name.
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn create_parent(path: &Path) -> Result<()> {
    let parent = parent_dir(path);
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))
}

/// Write through a uniquely named temp file in the target directory, then
/// rename it over `path`.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    create_parent(path)?;
    let parent = parent_dir(path);
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp task store in {}", parent.display()))?;
    tmp.write_all(contents.as_bytes())
        .with_context(|| format!("write temp task store {}", tmp.path().display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("sync temp task store {}", tmp.path().display()))?;
    tmp.persist(path)
        .with_context(|| format!("replace task store {}", path.display()))?;
    Ok(())
}
