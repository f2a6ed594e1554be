//! Purpose: Library crate behind the `slotstore` CLI and embedding applications.
//! Exports: `api` (stable surface) and `core` (building blocks and test seams).
//! Role: Persistent key/value slots plus reactive per-key bindings.
//! Invariants: Single-threaded; handles are `Rc`-based and never cross threads.
//! Invariants: The library logs through `tracing` and never installs a subscriber.
pub mod api;
pub mod core;
