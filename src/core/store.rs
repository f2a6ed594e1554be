//! Purpose: Durable key/value slots with synchronous per-key change fan-out.
//! Exports: `Store`, `StoreOptions`.
//! Role: Single source of truth for bindings; owns the table and the registry.
//! Invariants: `get` never fails; undecodable or unreadable slots read as absent.
//! Invariants: `set`/`delete` fan out only after the table write succeeds.
//! Invariants: A `set` is visible to every `get` issued after it returns, and to
//! re-entrant reads from inside its own fan-out.
//! Invariants: Failed writes are logged and dropped; nothing is half-written.

use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::binding::Binding;
use crate::core::codec;
use crate::core::error::Error;
use crate::core::registry::{ChangeEvent, ChangeKind, Registry, Subscription};
use crate::core::table::{DEFAULT_TABLE, SqliteTable, Table};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoreOptions {
    pub path: PathBuf,
    pub table: String,
}

impl StoreOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: DEFAULT_TABLE.to_string(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }
}

struct StoreInner {
    table: Box<dyn Table>,
    registry: Registry,
}

/// Cheap-to-clone handle to one table and its subscribers.
///
/// The store is single-threaded: handles are `!Send`, every operation runs
/// to completion on the calling thread, and `set`/`delete` drain their
/// fan-out before returning.
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::open_with(StoreOptions::new(path.as_ref()))
    }

    pub fn open_with(options: StoreOptions) -> Result<Self, Error> {
        let table = SqliteTable::open(&options.path, &options.table)?;
        tracing::debug!(path = %options.path.display(), table = %options.table, "opened store");
        Ok(Self::with_table(table))
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        Ok(Self::with_table(SqliteTable::open_in_memory(DEFAULT_TABLE)?))
    }

    pub fn with_table(table: impl Table + 'static) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                table: Box::new(table),
                registry: Registry::new(),
            }),
        }
    }

    /// Decoded value for `key`, or `None` when absent, unreadable, or corrupt.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_get(key) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key, error = %err, "treating slot as absent");
                None
            }
        }
    }

    pub fn try_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        match self.try_get_raw(key)? {
            Some(text) => codec::decode(&text)
                .map(Some)
                .map_err(|err| err.with_key(key)),
            None => Ok(None),
        }
    }

    pub fn get_raw(&self, key: &str) -> Option<String> {
        match self.try_get_raw(key) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to read slot");
                None
            }
        }
    }

    pub fn try_get_raw(&self, key: &str) -> Result<Option<String>, Error> {
        self.inner.table.read(key).map_err(|err| err.with_key(key))
    }

    /// Encode and upsert `value`, then notify every subscriber of `key`.
    /// Failures are logged and the write is dropped.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(err) = self.try_set(key, value) {
            tracing::error!(key, error = %err, "failed to save slot");
        }
    }

    pub fn try_set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), Error> {
        let text = codec::encode(value).map_err(|err| err.with_key(key))?;
        self.inner
            .table
            .upsert(key, &text)
            .map_err(|err| err.with_key(key))?;
        self.fan_out(key, ChangeKind::Set);
        Ok(())
    }

    pub fn delete(&self, key: &str) {
        if let Err(err) = self.try_delete(key) {
            tracing::error!(key, error = %err, "failed to remove slot");
        }
    }

    /// Returns whether a record existed. Subscribers are notified either way.
    pub fn try_delete(&self, key: &str) -> Result<bool, Error> {
        let removed = self
            .inner
            .table
            .remove(key)
            .map_err(|err| err.with_key(key))?;
        self.fan_out(key, ChangeKind::Delete);
        Ok(removed)
    }

    pub fn keys(&self) -> Vec<String> {
        self.try_keys().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to list slots");
            Vec::new()
        })
    }

    pub fn try_keys(&self) -> Result<Vec<String>, Error> {
        self.inner.table.keys()
    }

    pub fn subscribe(&self, key: &str, callback: impl Fn(&ChangeEvent) + 'static) -> Subscription {
        self.inner.registry.subscribe(key, callback)
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner.registry.subscriber_count(key)
    }

    /// Live view of `key` that falls back to `default` while the slot is absent.
    pub fn bind<T>(&self, key: &str, default: T) -> Binding<T>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        Binding::new(self.clone(), key, default)
    }

    pub fn describe(&self) -> String {
        self.inner.table.describe()
    }

    fn fan_out(&self, key: &str, kind: ChangeKind) {
        let delivered = self.inner.registry.notify(&ChangeEvent::new(key, kind));
        tracing::debug!(key, ?kind, delivered, "fan-out");
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("table", &self.describe())
            .field("tracked_keys", &self.inner.registry.tracked_keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::core::table::MemoryTable;
    use serde_json::{Value, json};
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeMap;

    fn memory_store() -> (Store, Rc<MemoryTable>) {
        let table = Rc::new(MemoryTable::new());
        (Store::with_table(table.clone()), table)
    }

    #[test]
    fn set_then_get_round_trips() {
        let store = Store::open_in_memory().expect("open");
        let value = json!({"isAuthenticated": true, "user": {"name": "Demo User"}});
        store.set("auth", &value);
        assert_eq!(store.get::<Value>("auth"), Some(value));
    }

    #[test]
    fn set_overwrites_without_history() {
        let (store, table) = memory_store();
        store.set("count", &1);
        store.set("count", &2);
        assert_eq!(store.get::<i32>("count"), Some(2));
        assert_eq!(table.keys().expect("keys"), vec!["count"]);
    }

    #[test]
    fn corrupt_payload_reads_as_absent() {
        let (store, table) = memory_store();
        table.upsert("auth", "{oops").expect("upsert");
        assert_eq!(store.get::<Value>("auth"), None);
        assert_eq!(store.get_raw("auth").as_deref(), Some("{oops"));
        let err = store.try_get::<Value>("auth").expect_err("corrupt");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
        assert_eq!(err.key(), Some("auth"));
    }

    #[test]
    fn foreign_shape_reads_as_absent() {
        let store = Store::open_in_memory().expect("open");
        store.set("count", "not a number");
        assert_eq!(store.get::<u32>("count"), None);
    }

    #[test]
    fn delete_removes_and_notifies() {
        let (store, _) = memory_store();
        let events = Rc::new(RefCell::new(Vec::new()));
        let seen = events.clone();
        let _sub = store.subscribe("auth", move |event| seen.borrow_mut().push(event.kind()));

        store.set("auth", &true);
        store.delete("auth");
        store.delete("auth");

        assert_eq!(store.get::<bool>("auth"), None);
        assert_eq!(
            *events.borrow(),
            vec![ChangeKind::Set, ChangeKind::Delete, ChangeKind::Delete]
        );
    }

    #[test]
    fn identical_writes_still_fan_out() {
        let (store, _) = memory_store();
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let _sub = store.subscribe("theme", move |_| counter.set(counter.get() + 1));

        store.set("theme", "dark");
        store.set("theme", "dark");
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn failed_write_is_dropped_without_fan_out() {
        let (store, table) = memory_store();
        store.set("theme", "light");

        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let _sub = store.subscribe("theme", move |_| counter.set(counter.get() + 1));

        table.fail_writes(true);
        store.set("theme", "dark");
        store.delete("theme");
        assert_eq!(hits.get(), 0);
        assert_eq!(store.get::<String>("theme").as_deref(), Some("light"));

        let err = store.try_set("theme", "dark").expect_err("io");
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn unencodable_value_is_dropped_without_fan_out() {
        let (store, _) = memory_store();
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let _sub = store.subscribe("bad", move |_| counter.set(counter.get() + 1));

        let mut map = BTreeMap::new();
        map.insert((1, 2), "tuple keys are not JSON");
        store.set("bad", &map);

        assert_eq!(hits.get(), 0);
        assert_eq!(store.get_raw("bad"), None);
        let err = store.try_set("bad", &map).expect_err("encode");
        assert_eq!(err.kind(), ErrorKind::Encode);
    }

    #[test]
    fn reads_inside_fan_out_observe_the_new_value() {
        let (store, _) = memory_store();
        store.set("step", &1);

        let observed = Rc::new(RefCell::new(Vec::new()));
        let seen = observed.clone();
        let reader = store.clone();
        let _sub = store.subscribe("step", move |event| {
            seen.borrow_mut().push(reader.get::<i32>(event.key()));
        });

        store.set("step", &2);
        store.delete("step");
        assert_eq!(*observed.borrow(), vec![Some(2), None]);
    }

    #[test]
    fn writes_inside_fan_out_complete_before_outer_set_returns() {
        let (store, _) = memory_store();
        let writer = store.clone();
        let _sub = store.subscribe("source", move |_| writer.set("mirror", &"copied"));

        store.set("source", &"value");
        assert_eq!(store.get::<String>("mirror").as_deref(), Some("copied"));
    }

    #[test]
    fn keys_are_sorted() {
        let store = Store::open_in_memory().expect("open");
        store.set("theme", "dark");
        store.set("auth", &json!({}));
        assert_eq!(store.keys(), vec!["auth", "theme"]);
    }

    #[test]
    fn open_with_custom_table() {
        let temp = tempfile::tempdir().expect("tempdir");
        let options = StoreOptions::new(temp.path().join("prefs.db")).with_table("prefs");
        let store = Store::open_with(options).expect("open");
        store.set("k", &1);
        assert_eq!(store.get::<i32>("k"), Some(1));
        assert!(store.describe().ends_with("prefs.db"));
    }
}
