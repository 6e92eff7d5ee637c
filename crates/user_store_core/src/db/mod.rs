//! SQLite storage bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the user store.
//! - Apply the `users` schema migrations in deterministic order.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Gateway and repository code must not touch `users` before migrations
//!   succeed.
//! - Bootstrap failures are reported as `StorageError`, the same type the
//!   gateway uses.

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};
