//! Purpose: Track change callbacks per key and deliver change events to them.
//! Exports: `ChangeEvent`, `ChangeKind`, `Listeners`, `Registry`, `Subscription`.
//! Role: Observer registry behind store fan-out and per-binding change sources.
//! Invariants: Delivery is synchronous and in registration order, once per live callback.
//! Invariants: A callback removed during a pass is not invoked later in that pass.
//! Invariants: Registry borrows are released before any callback runs (re-entrancy safe).

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChangeKind {
    Set,
    Delete,
}

/// "The value stored under `key` may have changed; re-read it."
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChangeEvent {
    key: String,
    kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(key: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            key: key.into(),
            kind,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }
}

type Callback = Rc<dyn Fn(&ChangeEvent)>;

/// An ordered set of callbacks with stable ids.
pub struct Listeners {
    next_id: Cell<u64>,
    entries: RefCell<Vec<(u64, Callback)>>,
}

impl Listeners {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            next_id: Cell::new(0),
            entries: RefCell::new(Vec::new()),
        })
    }

    /// Register `callback`; dropping the returned handle removes it.
    pub fn subscribe(self: &Rc<Self>, callback: impl Fn(&ChangeEvent) + 'static) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.entries.borrow_mut().push((id, Rc::new(callback)));
        let weak: Weak<Self> = Rc::downgrade(self);
        Subscription::new(move || {
            if let Some(listeners) = weak.upgrade() {
                listeners.remove(id);
            }
        })
    }

    fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    fn contains(&self, id: u64) -> bool {
        self.entries.borrow().iter().any(|(entry_id, _)| *entry_id == id)
    }

    /// Deliver `event` to every callback registered when the pass starts.
    /// Returns how many callbacks ran.
    pub fn emit(&self, event: &ChangeEvent) -> usize {
        let pass: Vec<(u64, Callback)> = self.entries.borrow().clone();
        let mut delivered = 0;
        for (id, callback) in pass {
            if !self.contains(id) {
                continue;
            }
            callback(event);
            delivered += 1;
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Key -> listeners map. Emptied listener sets stay in the map; the map is
/// bounded by the number of distinct keys ever subscribed.
#[derive(Default)]
pub struct Registry {
    keys: RefCell<HashMap<String, Rc<Listeners>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, key: &str, callback: impl Fn(&ChangeEvent) + 'static) -> Subscription {
        let listeners = self
            .keys
            .borrow_mut()
            .entry(key.to_string())
            .or_insert_with(Listeners::new)
            .clone();
        tracing::trace!(key, "subscribe");
        listeners.subscribe(callback)
    }

    pub fn notify(&self, event: &ChangeEvent) -> usize {
        let listeners = self.keys.borrow().get(event.key()).cloned();
        match listeners {
            Some(listeners) => listeners.emit(event),
            None => 0,
        }
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.keys.borrow().get(key).map_or(0, |listeners| listeners.len())
    }

    pub fn tracked_keys(&self) -> usize {
        self.keys.borrow().len()
    }
}

/// Disposer for a registered callback. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    dispose: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    fn new(dispose: impl FnOnce() + 'static) -> Self {
        Self {
            dispose: Some(Box::new(dispose)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.dispose_now();
    }

    fn dispose_now(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            tracing::trace!("unsubscribe");
            dispose();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.dispose.is_some())
            .finish()
    }
}
