//! Purpose: Define the public Rust API boundary for slotstore.
//! Exports: Store, bindings, subscriptions, tables, and error types.
//! Role: Additive-only surface consumed by UI shims and the CLI.
//! Invariants: Embedders depend on this module rather than `core` paths.

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::binding::{Binding, Setter};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::registry::{ChangeEvent, ChangeKind, Subscription};
pub use crate::core::store::{Store, StoreOptions};
pub use crate::core::table::{DEFAULT_TABLE, MemoryTable, SqliteTable, Table};

pub type ApiResult<T> = Result<T, Error>;
