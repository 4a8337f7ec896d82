//! Entity ↔ redb persistence.
//!
//! One redb file holds every table. redb serializes writers, so
//! get-or-create and the uniqueness checks run race-free inside a
//! single write transaction. Reads see a snapshot.

use crate::models::{Category, Status, SubTask, Task};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use uuid::Uuid;

const STATUSES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("statuses");
// Enforces name uniqueness at the store level: name → status id.
const STATUS_NAMES: TableDefinition<&str, &[u8]> = TableDefinition::new("status_name_index");
const TASKS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("tasks");
const SUBTASKS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("subtasks");
const CATEGORIES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("categories");
// Keyed by the lowercased name: uniqueness here is case-insensitive.
const CATEGORY_NAMES: TableDefinition<&str, &[u8]> = TableDefinition::new("category_name_index");

// ── Errors ─────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb: {0}")]
    Redb(String),
    #[error("decode: {0}")]
    Decode(String),
    #[error("encode: {0}")]
    Encode(String),
}

// redb 2.x has many error types. Blanket them all into StoreError::Redb.
macro_rules! from_redb {
    ($($t:ty),*) => {
        $(impl From<$t> for StoreError {
            fn from(e: $t) -> Self { StoreError::Redb(e.to_string()) }
        })*
    };
}

from_redb!(
    redb::Error,
    redb::DatabaseError,
    redb::TableError,
    redb::TransactionError,
    redb::StorageError,
    redb::CommitError
);

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    postcard::to_allocvec(value).map_err(|e| StoreError::Encode(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    postcard::from_bytes(bytes).map_err(|e| StoreError::Decode(e.to_string()))
}

/// Everything the stats aggregator needs, read in one transaction so
/// the sub-counts cannot skew against each other.
pub struct Snapshot {
    pub statuses: Vec<Status>,
    pub tasks: Vec<Task>,
    pub subtasks: Vec<SubTask>,
}

/// Thin handle to the redb file. Cloneable (Arc inside).
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
}

impl Store {
    /// Open (or create) the store at the given path.
    /// Creates tables if they don't exist.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(STATUSES)?;
            let _ = txn.open_table(STATUS_NAMES)?;
            let _ = txn.open_table(TASKS)?;
            let _ = txn.open_table(SUBTASKS)?;
            let _ = txn.open_table(CATEGORIES)?;
            let _ = txn.open_table(CATEGORY_NAMES)?;
        }
        txn.commit()?;

        Ok(Store { db: Arc::new(db) })
    }

    // ── Statuses ──────────────────────────────────────────────

    /// Return the status with this name, inserting it first if absent.
    /// Check and insert happen in one write transaction, so concurrent
    /// callers converge on a single row per name.
    pub fn get_or_create_status(&self, name: &str) -> Result<Status, StoreError> {
        let txn = self.db.begin_write()?;
        let status = {
            let mut names = txn.open_table(STATUS_NAMES)?;
            let mut statuses = txn.open_table(STATUSES)?;

            let existing = match names.get(name)? {
                Some(id_bytes) => {
                    let bytes = statuses
                        .get(id_bytes.value())?
                        .ok_or_else(|| StoreError::Decode("dangling status index".into()))?;
                    Some(decode::<Status>(bytes.value())?)
                }
                None => None,
            };

            match existing {
                Some(s) => s,
                None => {
                    let status = Status { id: Uuid::new_v4(), name: name.to_string() };
                    statuses.insert(status.id.as_bytes().as_slice(), encode(&status)?.as_slice())?;
                    names.insert(status.name.as_str(), status.id.as_bytes().as_slice())?;
                    status
                }
            }
        };
        txn.commit()?;
        Ok(status)
    }

    pub fn get_status(&self, id: Uuid) -> Result<Option<Status>, StoreError> {
        let txn = self.db.begin_read()?;
        let statuses = txn.open_table(STATUSES)?;
        match statuses.get(id.as_bytes().as_slice())? {
            Some(bytes) => Ok(Some(decode(bytes.value())?)),
            None => Ok(None),
        }
    }

    pub fn list_statuses(&self) -> Result<Vec<Status>, StoreError> {
        let txn = self.db.begin_read()?;
        let statuses = txn.open_table(STATUSES)?;
        let mut out = Vec::new();
        for entry in statuses.iter()? {
            let (_, bytes) = entry?;
            out.push(decode::<Status>(bytes.value())?);
        }
        Ok(out)
    }

    // ── Tasks ─────────────────────────────────────────────────

    /// Insert or overwrite a task (updates write the whole record).
    pub fn put_task(&self, task: &Task) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut tasks = txn.open_table(TASKS)?;
            tasks.insert(task.id.as_bytes().as_slice(), encode(task)?.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        let txn = self.db.begin_read()?;
        let tasks = txn.open_table(TASKS)?;
        match tasks.get(id.as_bytes().as_slice())? {
            Some(bytes) => Ok(Some(decode(bytes.value())?)),
            None => Ok(None),
        }
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let txn = self.db.begin_read()?;
        let tasks = txn.open_table(TASKS)?;
        let mut out = Vec::new();
        for entry in tasks.iter()? {
            let (_, bytes) = entry?;
            out.push(decode::<Task>(bytes.value())?);
        }
        Ok(out)
    }

    /// Delete a task and every subtask that references it, in one
    /// transaction. Returns the number of subtasks removed, or None if
    /// the task did not exist.
    pub fn delete_task(&self, id: Uuid) -> Result<Option<usize>, StoreError> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut tasks = txn.open_table(TASKS)?;
            if tasks.remove(id.as_bytes().as_slice())?.is_none() {
                None
            } else {
                let mut subtasks = txn.open_table(SUBTASKS)?;
                let mut orphaned = Vec::new();
                for entry in subtasks.iter()? {
                    let (key, bytes) = entry?;
                    let sub: SubTask = decode(bytes.value())?;
                    if sub.task_id == id {
                        orphaned.push(key.value().to_vec());
                    }
                }
                for key in &orphaned {
                    subtasks.remove(key.as_slice())?;
                }
                Some(orphaned.len())
            }
        };
        txn.commit()?;
        Ok(removed)
    }

    // ── SubTasks ──────────────────────────────────────────────

    pub fn put_subtask(&self, sub: &SubTask) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut subtasks = txn.open_table(SUBTASKS)?;
            subtasks.insert(sub.id.as_bytes().as_slice(), encode(sub)?.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_subtask(&self, id: Uuid) -> Result<Option<SubTask>, StoreError> {
        let txn = self.db.begin_read()?;
        let subtasks = txn.open_table(SUBTASKS)?;
        match subtasks.get(id.as_bytes().as_slice())? {
            Some(bytes) => Ok(Some(decode(bytes.value())?)),
            None => Ok(None),
        }
    }

    pub fn list_subtasks(&self) -> Result<Vec<SubTask>, StoreError> {
        let txn = self.db.begin_read()?;
        let subtasks = txn.open_table(SUBTASKS)?;
        let mut out = Vec::new();
        for entry in subtasks.iter()? {
            let (_, bytes) = entry?;
            out.push(decode::<SubTask>(bytes.value())?);
        }
        Ok(out)
    }

    pub fn subtasks_of(&self, task_id: Uuid) -> Result<Vec<SubTask>, StoreError> {
        let all = self.list_subtasks()?;
        Ok(all.into_iter().filter(|s| s.task_id == task_id).collect())
    }

    /// Returns false if there was nothing to delete.
    pub fn delete_subtask(&self, id: Uuid) -> Result<bool, StoreError> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut subtasks = txn.open_table(SUBTASKS)?;
            let removed = subtasks.remove(id.as_bytes().as_slice())?.is_some();
            removed
        };
        txn.commit()?;
        Ok(removed)
    }

    // ── Categories ────────────────────────────────────────────

    /// Insert a category unless its name (case-insensitively) is taken.
    /// Returns false on a name collision; the check runs inside the
    /// write transaction, so a conflict can never insert.
    pub fn create_category(&self, category: &Category) -> Result<bool, StoreError> {
        let key = category.name.to_lowercase();
        let txn = self.db.begin_write()?;
        let inserted = {
            let mut names = txn.open_table(CATEGORY_NAMES)?;
            if names.get(key.as_str())?.is_some() {
                false
            } else {
                let mut categories = txn.open_table(CATEGORIES)?;
                categories
                    .insert(category.id.as_bytes().as_slice(), encode(category)?.as_slice())?;
                names.insert(key.as_str(), category.id.as_bytes().as_slice())?;
                true
            }
        };
        txn.commit()?;
        Ok(inserted)
    }

    /// Rename a category, keeping the case-insensitive uniqueness
    /// invariant. Returns false if the new name belongs to another row.
    pub fn rename_category(&self, id: Uuid, new_name: &str) -> Result<bool, StoreError> {
        let new_key = new_name.to_lowercase();
        let txn = self.db.begin_write()?;
        let renamed = {
            let mut names = txn.open_table(CATEGORY_NAMES)?;
            let mut categories = txn.open_table(CATEGORIES)?;

            let taken_by_other = match names.get(new_key.as_str())? {
                Some(owner) => owner.value() != id.as_bytes().as_slice(),
                None => false,
            };
            if taken_by_other {
                false
            } else {
                let current: Category = match categories.get(id.as_bytes().as_slice())? {
                    Some(bytes) => decode(bytes.value())?,
                    None => return Err(StoreError::Decode("rename of unknown category".into())),
                };
                names.remove(current.name.to_lowercase().as_str())?;
                let updated = Category { id, name: new_name.to_string() };
                categories.insert(id.as_bytes().as_slice(), encode(&updated)?.as_slice())?;
                names.insert(new_key.as_str(), id.as_bytes().as_slice())?;
                true
            }
        };
        txn.commit()?;
        Ok(renamed)
    }

    pub fn get_category(&self, id: Uuid) -> Result<Option<Category>, StoreError> {
        let txn = self.db.begin_read()?;
        let categories = txn.open_table(CATEGORIES)?;
        match categories.get(id.as_bytes().as_slice())? {
            Some(bytes) => Ok(Some(decode(bytes.value())?)),
            None => Ok(None),
        }
    }

    pub fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let txn = self.db.begin_read()?;
        let categories = txn.open_table(CATEGORIES)?;
        let mut out = Vec::new();
        for entry in categories.iter()? {
            let (_, bytes) = entry?;
            out.push(decode::<Category>(bytes.value())?);
        }
        Ok(out)
    }

    pub fn delete_category(&self, id: Uuid) -> Result<bool, StoreError> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut categories = txn.open_table(CATEGORIES)?;
            let removed = match categories.remove(id.as_bytes().as_slice())? {
                Some(bytes) => {
                    let category: Category = decode(bytes.value())?;
                    let mut names = txn.open_table(CATEGORY_NAMES)?;
                    names.remove(category.name.to_lowercase().as_str())?;
                    true
                }
                None => false,
            };
            removed
        };
        txn.commit()?;
        Ok(removed)
    }

    // ── Stats snapshot ────────────────────────────────────────

    /// Read every table in a single read transaction.
    pub fn snapshot(&self) -> Result<Snapshot, StoreError> {
        let txn = self.db.begin_read()?;

        let mut statuses = Vec::new();
        for entry in txn.open_table(STATUSES)?.iter()? {
            let (_, bytes) = entry?;
            statuses.push(decode::<Status>(bytes.value())?);
        }

        let mut tasks = Vec::new();
        for entry in txn.open_table(TASKS)?.iter()? {
            let (_, bytes) = entry?;
            tasks.push(decode::<Task>(bytes.value())?);
        }

        let mut subtasks = Vec::new();
        for entry in txn.open_table(SUBTASKS)?.iter()? {
            let (_, bytes) = entry?;
            subtasks.push(decode::<SubTask>(bytes.value())?);
        }

        Ok(Snapshot { statuses, tasks, subtasks })
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::fs;

    /// Create a temp store file that auto-cleans.
    fn temp_store(name: &str) -> (Store, String) {
        let path = format!("/tmp/taskdesk_test_{name}_{}.redb", std::process::id());
        let _ = fs::remove_file(&path); // clean up any leftover
        let store = Store::open(&path).unwrap();
        (store, path)
    }

    fn cleanup(path: &str) {
        let _ = fs::remove_file(path);
    }

    fn task(store: &Store, title: &str) -> Task {
        let status = store.get_or_create_status("To Do").unwrap();
        let task = Task {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            status_id: status.id,
            deadline: None,
        };
        store.put_task(&task).unwrap();
        task
    }

    #[test]
    fn status_get_or_create_is_idempotent() {
        let (store, path) = temp_store("status_idem");

        let a = store.get_or_create_status("To Do").unwrap();
        let b = store.get_or_create_status("To Do").unwrap();
        assert_eq!(a, b);
        assert_eq!(store.list_statuses().unwrap().len(), 1);

        let c = store.get_or_create_status("Done").unwrap();
        assert_ne!(a.id, c.id);
        assert_eq!(store.list_statuses().unwrap().len(), 2);

        cleanup(&path);
    }

    #[test]
    fn task_round_trip() {
        let (store, path) = temp_store("task_rt");

        let task = task(&store, "Write report");
        let loaded = store.get_task(task.id).unwrap().unwrap();
        assert_eq!(loaded, task);
        assert!(store.get_task(Uuid::new_v4()).unwrap().is_none());

        cleanup(&path);
    }

    #[test]
    fn delete_task_cascades_to_subtasks() {
        let (store, path) = temp_store("cascade");

        let parent = task(&store, "Parent");
        let other = task(&store, "Other");
        let status = store.get_or_create_status("To Do").unwrap();

        for i in 0..3 {
            store
                .put_subtask(&SubTask {
                    id: Uuid::new_v4(),
                    title: format!("child {i}"),
                    description: String::new(),
                    status_id: status.id,
                    deadline: None,
                    task_id: parent.id,
                    created_at: Utc::now(),
                })
                .unwrap();
        }
        store
            .put_subtask(&SubTask {
                id: Uuid::new_v4(),
                title: "keep".into(),
                description: String::new(),
                status_id: status.id,
                deadline: None,
                task_id: other.id,
                created_at: Utc::now(),
            })
            .unwrap();

        assert_eq!(store.delete_task(parent.id).unwrap(), Some(3));
        assert!(store.get_task(parent.id).unwrap().is_none());
        assert_eq!(store.list_subtasks().unwrap().len(), 1);

        // already gone
        assert_eq!(store.delete_task(parent.id).unwrap(), None);

        cleanup(&path);
    }

    #[test]
    fn subtask_delete_reports_absence() {
        let (store, path) = temp_store("sub_del");

        let parent = task(&store, "Parent");
        let status = store.get_or_create_status("To Do").unwrap();
        let sub = SubTask {
            id: Uuid::new_v4(),
            title: "child".into(),
            description: String::new(),
            status_id: status.id,
            deadline: None,
            task_id: parent.id,
            created_at: Utc::now(),
        };
        store.put_subtask(&sub).unwrap();

        assert!(store.delete_subtask(sub.id).unwrap());
        assert!(!store.delete_subtask(sub.id).unwrap());

        cleanup(&path);
    }

    #[test]
    fn category_names_unique_case_insensitively() {
        let (store, path) = temp_store("cat_ci");

        let work = Category { id: Uuid::new_v4(), name: "Work".into() };
        assert!(store.create_category(&work).unwrap());

        let dup = Category { id: Uuid::new_v4(), name: "work".into() };
        assert!(!store.create_category(&dup).unwrap());
        assert_eq!(store.list_categories().unwrap().len(), 1);

        // renaming to your own name (case change) is allowed
        assert!(store.rename_category(work.id, "WORK").unwrap());
        assert_eq!(store.get_category(work.id).unwrap().unwrap().name, "WORK");

        // renaming onto another row's name is not
        let home = Category { id: Uuid::new_v4(), name: "Home".into() };
        assert!(store.create_category(&home).unwrap());
        assert!(!store.rename_category(home.id, "work").unwrap());

        // delete frees the name
        assert!(store.delete_category(work.id).unwrap());
        assert!(!store.delete_category(work.id).unwrap());
        assert!(store.create_category(&dup).unwrap());

        cleanup(&path);
    }

    #[test]
    fn snapshot_sees_everything() {
        let (store, path) = temp_store("snapshot");

        let parent = task(&store, "Parent");
        let status = store.get_or_create_status("Done").unwrap();
        store
            .put_subtask(&SubTask {
                id: Uuid::new_v4(),
                title: "child".into(),
                description: String::new(),
                status_id: status.id,
                deadline: None,
                task_id: parent.id,
                created_at: Utc::now(),
            })
            .unwrap();

        let snap = store.snapshot().unwrap();
        assert_eq!(snap.tasks.len(), 1);
        assert_eq!(snap.subtasks.len(), 1);
        assert_eq!(snap.statuses.len(), 2); // "To Do" + "Done"

        cleanup(&path);
    }
}
