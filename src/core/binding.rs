//! Purpose: Give one consumer a live, reference-stable view of one slot.
//! Exports: `Binding`, `Setter`.
//! Role: Reactive layer over `Store`; a UI shim subscribes via `watch` and reads via `get`.
//! Invariants: Every read goes through the store; the cache only preserves identity.
//! Invariants: Reads that observe the same canonical (key-sorted) text return the same `Rc`.
//! Invariants: Setters never touch the cache; the store's fan-out drives re-reads.
//! Invariants: Dropping the binding removes exactly its own store subscription.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::codec;
use crate::core::registry::{ChangeEvent, Listeners, Subscription};
use crate::core::store::Store;

struct Snapshot<T> {
    serialized: String,
    value: Rc<T>,
}

/// A live view of `key` held by one consumer.
///
/// Created by [`Store::bind`]. The value is read once at bind time and
/// again on every [`Binding::get`]; each store change to `key` bumps
/// [`Binding::version`] and is forwarded to [`Binding::watch`] callbacks.
pub struct Binding<T> {
    store: Store,
    key: Rc<str>,
    default: Rc<T>,
    cache: RefCell<Option<Snapshot<T>>>,
    version: Rc<Cell<u64>>,
    changes: Rc<Listeners>,
    _subscription: Subscription,
}

impl<T> Binding<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    pub(crate) fn new(store: Store, key: &str, default: T) -> Self {
        let version = Rc::new(Cell::new(0));
        let changes = Listeners::new();

        let bump = version.clone();
        let forward = changes.clone();
        let subscription = store.subscribe(key, move |event| {
            bump.set(bump.get() + 1);
            forward.emit(event);
        });

        let binding = Self {
            store,
            key: Rc::from(key),
            default: Rc::new(default),
            cache: RefCell::new(None),
            version,
            changes,
            _subscription: subscription,
        };
        binding.get();
        binding
    }

    /// Current value: the stored value if present and decodable, else the default.
    pub fn get(&self) -> Rc<T> {
        let stored = self.store.get::<T>(&self.key).map(Rc::new);
        let current = stored.unwrap_or_else(|| self.default.clone());
        let serialized = match codec::canonical(current.as_ref()) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(key = %self.key, error = %err, "binding value does not encode");
                return current;
            }
        };

        let mut cache = self.cache.borrow_mut();
        match cache.as_ref() {
            Some(snapshot) if snapshot.serialized == serialized => snapshot.value.clone(),
            _ => {
                tracing::debug!(key = %self.key, "binding value changed");
                *cache = Some(Snapshot {
                    serialized,
                    value: current.clone(),
                });
                current
            }
        }
    }

    /// Write through to the store. Does not short-circuit identical values.
    pub fn set(&self, value: &T) {
        self.store.set(&self.key, value);
    }

    pub fn setter(&self) -> Setter<T> {
        Setter {
            store: self.store.clone(),
            key: self.key.clone(),
            _value: PhantomData,
        }
    }

    /// `(value, setter)` pair for consumers that destructure.
    pub fn snapshot(&self) -> (Rc<T>, Setter<T>) {
        (self.get(), self.setter())
    }

    /// The value rendered when the slot is absent.
    pub fn fallback(&self) -> Rc<T> {
        self.default.clone()
    }

    /// Register a change callback for this binding. The callback only signals;
    /// call [`Binding::get`] to observe the new value.
    pub fn watch(&self, callback: impl Fn(&ChangeEvent) + 'static) -> Subscription {
        self.changes.subscribe(callback)
    }

    /// Number of change notifications received since binding.
    pub fn version(&self) -> u64 {
        self.version.get()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn unbind(self) {}
}

impl<T> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("key", &self.key)
            .field("version", &self.version.get())
            .field("watchers", &self.changes.len())
            .finish()
    }
}

/// Detached write handle for one slot; outlives its binding.
pub struct Setter<T> {
    store: Store,
    key: Rc<str>,
    _value: PhantomData<fn(&T)>,
}

impl<T: Serialize> Setter<T> {
    pub fn set(&self, value: &T) {
        self.store.set(&self.key, value);
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            key: self.key.clone(),
            _value: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter").field("key", &self.key).finish()
    }
}
