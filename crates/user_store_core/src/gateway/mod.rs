//! Persistence gateway contract.
//!
//! # Responsibility
//! - Define the storage capability `UserService` depends on.
//! - Model bound queries as text plus named parameter bindings.
//!
//! # Invariants
//! - Query values travel only through bindings, never through query text.
//! - A unit of work opened by `in_transaction` is committed only when the
//!   closure returns `Ok`; every other exit path rolls back.

use crate::model::user::{User, UserId};
use rusqlite::types::Value;

pub mod sqlite;

pub use crate::error::{StorageError, StorageResult};

/// Query text together with its named parameter bindings.
///
/// Binding names are stored without the `:` sigil used in the text.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    text: String,
    bindings: Vec<(String, Value)>,
}

impl BoundQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bindings: Vec::new(),
        }
    }

    /// Binds `value` to `:name`, replacing an earlier binding of the same name.
    pub fn bind(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        match self.bindings.iter_mut().find(|(bound, _)| *bound == name) {
            Some(slot) => slot.1 = value,
            None => self.bindings.push((name, value)),
        }
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Bindings in the order they were first added.
    pub fn bindings(&self) -> &[(String, Value)] {
        &self.bindings
    }

    pub fn binding(&self, name: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value)
    }
}

/// Storage capability consumed by `UserService`.
///
/// Implementations own the authoritative state; callers only hold the
/// request-scoped values returned from these methods.
pub trait PersistenceGateway {
    /// Cheap liveness check of the underlying session.
    fn is_alive(&self) -> bool;
    /// Loads one user by id; `None` when no row exists.
    fn get(&self, id: UserId) -> StorageResult<Option<User>>;
    /// Inserts a transient user and writes the assigned id back into it.
    fn insert(&self, user: &mut User) -> StorageResult<()>;
    /// Writes a persisted user and returns the stored state.
    fn merge(&self, user: &User) -> StorageResult<User>;
    /// Deletes a persisted user.
    fn remove(&self, user: &User) -> StorageResult<()>;
    /// Runs a bound query whose rows are full `users` records.
    fn fetch_users(&self, query: &BoundQuery) -> StorageResult<Vec<User>>;
    /// Runs a bound query returning a single integer.
    fn fetch_scalar(&self, query: &BoundQuery) -> StorageResult<i64>;
    /// Runs parameterless SQL and returns its first row.
    fn raw_query(&self, sql: &str) -> StorageResult<Vec<Value>>;
    /// Runs `work` inside one atomic unit of work.
    fn in_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<StorageError>;
}
