// Core modules implementing slot storage, encoding, change fan-out, and errors.
pub mod binding;
pub mod codec;
pub mod error;
pub mod registry;
pub mod store;
pub mod table;
