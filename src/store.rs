//! SQLite-backed task and note storage.
//!
//! The database lives in memory. After every mutation its full image is
//! serialized, base64 encoded and written to the key-value store under
//! [`DB_KEY`]; [`Store::open`] reverses that. Writes are not incremental, each
//! one costs the size of the whole database.

use crate::error::{Error, Result};
use crate::kv::KeyValueStore;
use crate::note::{self, Note};
use crate::task::{NewTask, Task};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rusqlite::{params, params_from_iter, Connection, DatabaseName, OptionalExtension, Row};
use std::rc::Rc;
use tracing::{debug, info};

pub const DB_KEY: &str = "medsync_db";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    start_time TEXT,
    end_time TEXT,
    description TEXT,
    completed INTEGER DEFAULT 0,
    date TEXT,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS notes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content TEXT NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);";

const TASK_COLUMNS: &str =
    "id, title, start_time, end_time, description, completed, date, created_at";
const SELECT_TASKS: &str = "SELECT id, title, start_time, end_time, description, completed, date, created_at
    FROM tasks ORDER BY start_time ASC, id ASC";
const INSERT_TASK: &str = "INSERT INTO tasks (title, start_time, end_time, description, completed, date)
    VALUES (?1, ?2, ?3, ?4, 0, ?5)";
const SET_COMPLETED: &str = "UPDATE tasks SET completed = ?1 WHERE id = ?2";
const TOGGLE_COMPLETED: &str =
    "UPDATE tasks SET completed = CASE WHEN completed = 1 THEN 0 ELSE 1 END WHERE id = ?1";
const DELETE_TASK: &str = "DELETE FROM tasks WHERE id = ?1";

const SELECT_NOTES: &str =
    "SELECT id, content, created_at, updated_at FROM notes ORDER BY updated_at DESC, id DESC";
const SELECT_NOTE: &str = "SELECT id, content, created_at, updated_at FROM notes WHERE id = ?1";
const INSERT_NOTE: &str = "INSERT INTO notes (content) VALUES (?1)";
const UPDATE_NOTE: &str =
    "UPDATE notes SET content = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2";
const DELETE_NOTE: &str = "DELETE FROM notes WHERE id = ?1";

pub struct Store {
    conn: Connection,
    kv: Rc<dyn KeyValueStore>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Restores the database saved under [`DB_KEY`], or creates an empty one.
    pub fn open(kv: Rc<dyn KeyValueStore>) -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        let restored = match kv.get(DB_KEY)? {
            Some(encoded) => {
                let image = STANDARD.decode(encoded.trim())?;
                conn.deserialize_read_exact(DatabaseName::Main, image.as_slice(), image.len(), false)?;
                info!(bytes = image.len(), "restored database image");
                true
            }
            None => false,
        };
        conn.execute_batch(SCHEMA)?;
        let migrated = migrate(&conn)?;

        let store = Self { conn, kv };
        if !restored || migrated {
            if !restored {
                info!("created fresh database");
            }
            store.persist()?;
        }
        Ok(store)
    }

    /// Serializes the whole database into a base64 string.
    pub fn export_image(&self) -> Result<String> {
        let image = self.conn.serialize(DatabaseName::Main)?;
        Ok(STANDARD.encode(&*image))
    }

    fn persist(&self) -> Result<()> {
        let encoded = self.export_image()?;
        self.kv.set(DB_KEY, &encoded)?;
        debug!(encoded_len = encoded.len(), "persisted database image");
        Ok(())
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(SELECT_TASKS)?;
        let rows = stmt.query_map([], task_from_row)?;
        let mut tasks = Vec::new();
        for task in rows {
            tasks.push(task?);
        }
        Ok(tasks)
    }

    pub fn get_task(&self, id: i64) -> Result<Option<Task>> {
        let task = self
            .conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
                task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    pub fn add_task(&mut self, task: &NewTask) -> Result<Task> {
        self.conn.execute(
            INSERT_TASK,
            params![task.title, task.start, task.end, task.description, task.date],
        )?;
        let id = self.conn.last_insert_rowid();
        self.persist()?;
        info!(id, title = %task.title, "added task");
        self.get_task(id)?.ok_or(Error::UnknownId(id))
    }

    pub fn set_task_completed(&mut self, id: i64, completed: bool) -> Result<()> {
        let changed = self.conn.execute(SET_COMPLETED, params![completed, id])?;
        if changed == 0 {
            return Err(Error::UnknownId(id));
        }
        self.persist()
    }

    /// Flips the completion flag and returns the new value.
    pub fn toggle_task(&mut self, id: i64) -> Result<bool> {
        let changed = self.conn.execute(TOGGLE_COMPLETED, params![id])?;
        if changed == 0 {
            return Err(Error::UnknownId(id));
        }
        self.persist()?;
        let task = self.get_task(id)?.ok_or(Error::UnknownId(id))?;
        debug!(id, completed = task.completed, "toggled task");
        Ok(task.completed)
    }

    pub fn delete_task(&mut self, id: i64) -> Result<()> {
        let changed = self.conn.execute(DELETE_TASK, params![id])?;
        if changed == 0 {
            return Err(Error::UnknownId(id));
        }
        self.persist()?;
        info!(id, "deleted task");
        Ok(())
    }

    /// Deletes every listed task in one statement; unknown ids are skipped.
    pub fn delete_tasks(&mut self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let query = format!("DELETE FROM tasks WHERE id IN ({placeholders})");
        let deleted = self.conn.execute(&query, params_from_iter(ids))?;
        if deleted > 0 {
            self.persist()?;
        }
        info!(deleted, "deleted tasks");
        Ok(deleted)
    }

    pub fn list_notes(&self) -> Result<Vec<Note>> {
        let mut stmt = self.conn.prepare(SELECT_NOTES)?;
        let rows = stmt.query_map([], note_from_row)?;
        let mut notes = Vec::new();
        for note in rows {
            notes.push(note?);
        }
        Ok(notes)
    }

    pub fn get_note(&self, id: i64) -> Result<Option<Note>> {
        let note = self
            .conn
            .query_row(SELECT_NOTE, params![id], note_from_row)
            .optional()?;
        Ok(note)
    }

    pub fn add_note(&mut self, content: &str) -> Result<Note> {
        let content = note::validate_content(content)?;
        self.conn.execute(INSERT_NOTE, params![content])?;
        let id = self.conn.last_insert_rowid();
        self.persist()?;
        info!(id, "added note");
        self.get_note(id)?.ok_or(Error::UnknownId(id))
    }

    pub fn update_note(&mut self, id: i64, content: &str) -> Result<Note> {
        let changed = self.conn.execute(UPDATE_NOTE, params![content, id])?;
        if changed == 0 {
            return Err(Error::UnknownId(id));
        }
        self.persist()?;
        debug!(id, "updated note");
        self.get_note(id)?.ok_or(Error::UnknownId(id))
    }

    pub fn delete_note(&mut self, id: i64) -> Result<()> {
        let changed = self.conn.execute(DELETE_NOTE, params![id])?;
        if changed == 0 {
            return Err(Error::UnknownId(id));
        }
        self.persist()?;
        info!(id, "deleted note");
        Ok(())
    }
}

/// Brings images written before tasks carried a creation date up to the
/// current schema. Returns whether anything changed.
fn migrate(conn: &Connection) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('tasks')")?;
    let has_date = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?
        .iter()
        .any(|name| name == "date");
    if has_date {
        return Ok(false);
    }
    conn.execute_batch("ALTER TABLE tasks ADD COLUMN date TEXT")?;
    info!("added tasks.date column");
    Ok(true)
}

// Older revisions stored NULL for omitted text fields.
fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        start: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        end: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        description: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        completed: row.get::<_, Option<i64>>(5)?.unwrap_or(0) == 1,
        date: row.get(6)?,
        created_at: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
    })
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        content: row.get(1)?,
        created_at: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        updated_at: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{FileStore, MemoryStore};

    fn new_task(title: &str, start: &str, end: &str) -> NewTask {
        NewTask {
            title: title.to_string(),
            start: start.to_string(),
            end: end.to_string(),
            description: format!("{title} details"),
            date: "2026-03-14".to_string(),
        }
    }

    fn open_memory() -> (Rc<MemoryStore>, Store) {
        let kv = Rc::new(MemoryStore::new());
        let store = Store::open(kv.clone()).unwrap();
        (kv, store)
    }

    #[test]
    fn fresh_open_persists_empty_schema() {
        let (kv, store) = open_memory();
        assert!(kv.get(DB_KEY).unwrap().is_some());
        assert!(store.list_tasks().unwrap().is_empty());
        assert!(store.list_notes().unwrap().is_empty());
    }

    #[test]
    fn every_mutation_rewrites_the_image() {
        let (kv, mut store) = open_memory();
        let mut last = kv.get(DB_KEY).unwrap();
        let mut assert_changed = || {
            let now = kv.get(DB_KEY).unwrap();
            assert_ne!(now, last);
            last = now;
        };

        let task = store.add_task(&new_task("a", "08:00", "09:00")).unwrap();
        assert_changed();
        store.toggle_task(task.id).unwrap();
        assert_changed();
        store.set_task_completed(task.id, false).unwrap();
        assert_changed();
        let note = store.add_note("first").unwrap();
        assert_changed();
        store.update_note(note.id, "second").unwrap();
        assert_changed();
        store.delete_note(note.id).unwrap();
        assert_changed();
        store.delete_task(task.id).unwrap();
        assert_changed();
    }

    #[test]
    fn reopen_restores_identical_records() {
        let (kv, mut store) = open_memory();
        store.add_task(&new_task("late", "14:00", "15:00")).unwrap();
        store.add_task(&new_task("early", "07:30", "08:00")).unwrap();
        let t = store.add_task(&new_task("noon", "12:00", "")).unwrap();
        store.toggle_task(t.id).unwrap();
        store.add_note("buy coffee").unwrap();
        let n = store.add_note("call lab").unwrap();
        store.update_note(n.id, "call lab at 3").unwrap();

        let tasks = store.list_tasks().unwrap();
        let notes = store.list_notes().unwrap();
        drop(store);

        let reopened = Store::open(kv).unwrap();
        assert_eq!(reopened.list_tasks().unwrap(), tasks);
        assert_eq!(reopened.list_notes().unwrap(), notes);
        let starts: Vec<_> = tasks.iter().map(|t| t.start.as_str()).collect();
        assert_eq!(starts, ["07:30", "12:00", "14:00"]);
    }

    #[test]
    fn reopen_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let kv: Rc<dyn KeyValueStore> = Rc::new(FileStore::open(dir.path()).unwrap());
        let mut store = Store::open(kv.clone()).unwrap();
        store.add_task(&new_task("persisted", "10:00", "11:00")).unwrap();
        let before = store.list_tasks().unwrap();
        drop(store);

        let kv: Rc<dyn KeyValueStore> = Rc::new(FileStore::open(dir.path()).unwrap());
        assert_eq!(Store::open(kv).unwrap().list_tasks().unwrap(), before);
    }

    #[test]
    fn toggle_twice_restores_row() {
        let (_kv, mut store) = open_memory();
        let original = store.add_task(&new_task("a", "08:00", "09:00")).unwrap();
        assert!(store.toggle_task(original.id).unwrap());
        assert!(!store.toggle_task(original.id).unwrap());
        assert_eq!(store.get_task(original.id).unwrap().unwrap(), original);
    }

    #[test]
    fn mutations_on_unknown_ids_fail() {
        let (_kv, mut store) = open_memory();
        assert!(matches!(store.toggle_task(42), Err(Error::UnknownId(42))));
        assert!(matches!(store.set_task_completed(42, true), Err(Error::UnknownId(42))));
        assert!(matches!(store.delete_task(42), Err(Error::UnknownId(42))));
        assert!(matches!(store.update_note(42, "x"), Err(Error::UnknownId(42))));
        assert!(matches!(store.delete_note(42), Err(Error::UnknownId(42))));
    }

    #[test]
    fn delete_many_skips_unknown() {
        let (_kv, mut store) = open_memory();
        let a = store.add_task(&new_task("a", "08:00", "09:00")).unwrap();
        let b = store.add_task(&new_task("b", "08:00", "09:00")).unwrap();
        let c = store.add_task(&new_task("c", "08:00", "09:00")).unwrap();
        assert_eq!(store.delete_tasks(&[a.id, c.id, 999]).unwrap(), 2);
        assert_eq!(store.delete_tasks(&[]).unwrap(), 0);
        let left: Vec<_> = store.list_tasks().unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(left, vec![b.id]);
    }

    #[test]
    fn blank_note_rejected_without_write() {
        let (kv, mut store) = open_memory();
        let before = kv.get(DB_KEY).unwrap();
        assert!(matches!(store.add_note("   "), Err(Error::InvalidInput(_))));
        assert_eq!(kv.get(DB_KEY).unwrap(), before);
    }

    #[test]
    fn corrupt_images_fail_to_open() {
        let kv = Rc::new(MemoryStore::new());
        kv.set(DB_KEY, "%%% not base64 %%%").unwrap();
        assert!(matches!(Store::open(kv.clone()), Err(Error::Encoding(_))));

        kv.set(DB_KEY, &STANDARD.encode(b"definitely not a sqlite file, just some text")).unwrap();
        assert!(Store::open(kv).is_err());
    }

    #[test]
    fn migrates_images_without_date_column() {
        let old = Connection::open_in_memory().unwrap();
        old.execute_batch(
            "CREATE TABLE tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                start_time TEXT,
                end_time TEXT,
                description TEXT,
                completed INTEGER DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            INSERT INTO tasks (title, start_time, end_time, description, completed)
                VALUES ('legacy', '08:00', '09:00', NULL, 1);",
        )
        .unwrap();
        let image = old.serialize(DatabaseName::Main).unwrap();
        let kv = Rc::new(MemoryStore::new());
        kv.set(DB_KEY, &STANDARD.encode(&*image)).unwrap();

        let mut store = Store::open(kv.clone()).unwrap();
        let tasks = store.list_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "legacy");
        assert_eq!(tasks[0].date, None);
        assert_eq!(tasks[0].description, "");
        assert!(tasks[0].completed);

        // Notes table did not exist in that image and is created on open.
        store.add_note("hello").unwrap();
        let reopened = Store::open(kv).unwrap();
        assert_eq!(reopened.list_notes().unwrap().len(), 1);
    }
}
