//! Purpose: Persist the flat key/value table that backs every slot.
//! Exports: `Table`, `SqliteTable`, `MemoryTable`, `DEFAULT_TABLE`.
//! Role: Storage seam under `Store`; swappable with an in-memory fake in tests.
//! Invariants: One row per key; every write is a single upsert keyed by primary key.
//! Invariants: Implementations never decode values; text in, text out.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};

use crate::core::error::{Error, ErrorKind};

pub const DEFAULT_TABLE: &str = "storage";

/// Point operations over a `(key TEXT PRIMARY KEY, value TEXT)` mapping.
pub trait Table {
    fn read(&self, key: &str) -> Result<Option<String>, Error>;
    fn upsert(&self, key: &str, value: &str) -> Result<(), Error>;
    /// Returns whether a row was removed.
    fn remove(&self, key: &str) -> Result<bool, Error>;
    /// Keys in ascending order.
    fn keys(&self) -> Result<Vec<String>, Error>;
    fn describe(&self) -> String;
}

pub struct SqliteTable {
    conn: Connection,
    path: Option<PathBuf>,
    select_sql: String,
    upsert_sql: String,
    delete_sql: String,
    keys_sql: String,
}

impl SqliteTable {
    pub fn open(path: &Path, table: &str) -> Result<Self, Error> {
        validate_table_name(table)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to create store directory")
                    .with_path(parent)
                    .with_source(err)
            })?;
        }
        let conn = Connection::open(path).map_err(|err| Error::from(err).with_path(path))?;
        Self::init(conn, Some(path.to_path_buf()), table)
    }

    pub fn open_in_memory(table: &str) -> Result<Self, Error> {
        validate_table_name(table)?;
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None, table)
    }

    fn init(conn: Connection, path: Option<PathBuf>, table: &str) -> Result<Self, Error> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            );"
        ))
        .map_err(|err| {
            let err = Error::from(err).with_message("failed to create table");
            match &path {
                Some(path) => err.with_path(path),
                None => err,
            }
        })?;
        Ok(Self {
            conn,
            path,
            select_sql: format!("SELECT value FROM \"{table}\" WHERE key = ?1"),
            upsert_sql: format!("INSERT OR REPLACE INTO \"{table}\" (key, value) VALUES (?1, ?2)"),
            delete_sql: format!("DELETE FROM \"{table}\" WHERE key = ?1"),
            keys_sql: format!("SELECT key FROM \"{table}\" ORDER BY key"),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Table for SqliteTable {
    fn read(&self, key: &str) -> Result<Option<String>, Error> {
        let mut stmt = self.conn.prepare_cached(&self.select_sql)?;
        let value = stmt
            .query_row(params![key], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(value)
    }

    fn upsert(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut stmt = self.conn.prepare_cached(&self.upsert_sql)?;
        stmt.execute(params![key, value])?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, Error> {
        let mut stmt = self.conn.prepare_cached(&self.delete_sql)?;
        let removed = stmt.execute(params![key])?;
        Ok(removed > 0)
    }

    fn keys(&self) -> Result<Vec<String>, Error> {
        let mut stmt = self.conn.prepare_cached(&self.keys_sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let keys = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn describe(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => ":memory:".to_string(),
        }
    }
}

/// In-memory table with switchable write failures, for tests and previews.
#[derive(Default)]
pub struct MemoryTable {
    rows: RefCell<BTreeMap<String, String>>,
    fail_writes: Cell<bool>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// While enabled, `upsert` and `remove` fail with `ErrorKind::Io`
    /// and leave the rows untouched.
    pub fn fail_writes(&self, enabled: bool) {
        self.fail_writes.set(enabled);
    }

    fn check_writable(&self) -> Result<(), Error> {
        if self.fail_writes.get() {
            return Err(Error::new(ErrorKind::Io).with_message("memory table is read-only"));
        }
        Ok(())
    }
}

impl Table for MemoryTable {
    fn read(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.rows.borrow().get(key).cloned())
    }

    fn upsert(&self, key: &str, value: &str) -> Result<(), Error> {
        self.check_writable()?;
        self.rows
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, Error> {
        self.check_writable()?;
        Ok(self.rows.borrow_mut().remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.rows.borrow().keys().cloned().collect())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

impl<T: Table + ?Sized> Table for std::rc::Rc<T> {
    fn read(&self, key: &str) -> Result<Option<String>, Error> {
        (**self).read(key)
    }

    fn upsert(&self, key: &str, value: &str) -> Result<(), Error> {
        (**self).upsert(key, value)
    }

    fn remove(&self, key: &str) -> Result<bool, Error> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, Error> {
        (**self).keys()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

fn validate_table_name(table: &str) -> Result<(), Error> {
    let mut chars = table.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Ok(());
    }
    Err(Error::new(ErrorKind::Usage)
        .with_message(format!("invalid table name: {table:?}"))
        .with_hint("Use letters, digits, and underscores, starting with a letter."))
}
