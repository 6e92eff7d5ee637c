//! User use-case service.
//!
//! # Responsibility
//! - Expose create/read/update/delete, search, count and bulk transfer.
//! - Own entity lifecycle transitions and error classification.
//!
//! # Invariants
//! - `create`, `update`, `delete` and `transfer` each run in exactly one
//!   unit of work.
//! - A missing id is `None`/`false` for reads and deletes, and
//!   `ServiceError::EntityNotFound` for updates.
//! - Storage failures propagate unchanged; nothing is retried here.
//! - Log lines carry ids and counts only, never user-supplied text.

use crate::gateway::{PersistenceGateway, StorageError};
use crate::model::user::{
    now_epoch_ms, CreateUserRequest, UpdateUserRequest, User, UserId, UserQuery,
};
use crate::query::predicate::{count_active_in_department, PredicateBuilder};
use crate::repo::user_repo::UserRepository;
use log::{debug, error, info, warn};
use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

const PROBE_SQL: &str = "SELECT sqlite_version() AS version, sqlite_source_id() AS source_id;";

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced by `UserService`.
#[derive(Debug)]
pub enum ServiceError {
    /// The persistence session reported itself not alive.
    ConnectionUnavailable,
    /// Update targeted an id with no stored user.
    EntityNotFound(UserId),
    /// Gateway or repository failure, passed through unchanged.
    Storage(StorageError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionUnavailable => write!(f, "persistence context is not available"),
            Self::EntityNotFound(id) => write!(f, "user not found: {id}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ConnectionUnavailable => None,
            Self::EntityNotFound(_) => None,
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

/// Use-case service over a persistence gateway and a full-table repository.
pub struct UserService<G: PersistenceGateway, R: UserRepository> {
    gateway: G,
    repo: R,
}

impl<G: PersistenceGateway, R: UserRepository> UserService<G, R> {
    pub fn new(gateway: G, repo: R) -> Self {
        Self { gateway, repo }
    }

    /// Checks the persistence session and reports the backing store.
    ///
    /// # Errors
    /// - `ConnectionUnavailable` when the gateway is not alive; no query runs.
    pub fn probe(&self) -> ServiceResult<String> {
        if !self.gateway.is_alive() {
            warn!("event=store_probe module=service status=error error_code=connection_unavailable");
            return Err(ServiceError::ConnectionUnavailable);
        }

        let row = self.gateway.raw_query(PROBE_SQL)?;
        let version = match row.first() {
            Some(Value::Text(version)) if !version.is_empty() => version.clone(),
            other => {
                return Err(StorageError::InvalidData(format!(
                    "store reported no version: {other:?}"
                ))
                .into());
            }
        };
        let source_id = row.get(1).map_or_else(String::new, value_text);
        info!("event=store_probe module=service status=ok version={version}");
        Ok(format!(
            "persistence context alive: SQLite {version} ({})",
            source_id.trim()
        ))
    }

    /// Persists a new active user and returns it with its assigned id.
    pub fn create(&self, request: &CreateUserRequest) -> ServiceResult<User> {
        let mut user = User::transient(request, now_epoch_ms());
        let result = self
            .gateway
            .in_transaction(|gateway| gateway.insert(&mut user));

        match result {
            Ok(()) => {
                info!(
                    "event=user_create module=service status=ok user_id={}",
                    user.id.unwrap_or_default()
                );
                Ok(user)
            }
            Err(err) => {
                error!("event=user_create module=service status=error error={err}");
                Err(err.into())
            }
        }
    }

    /// Loads one user; a missing id is `Ok(None)`.
    pub fn find_by_id(&self, id: UserId) -> ServiceResult<Option<User>> {
        let user = self.gateway.get(id)?;
        debug!(
            "event=user_get module=service status=ok user_id={id} found={}",
            user.is_some()
        );
        Ok(user)
    }

    /// Applies a partial update to an existing user.
    ///
    /// # Errors
    /// - `EntityNotFound(id)` when no user has `id`; nothing is merged.
    pub fn update(&self, id: UserId, request: &UpdateUserRequest) -> ServiceResult<User> {
        let result = self.gateway.in_transaction(|gateway| -> ServiceResult<User> {
            let mut user = gateway.get(id)?.ok_or(ServiceError::EntityNotFound(id))?;
            user.apply_update(request, now_epoch_ms());
            Ok(gateway.merge(&user)?)
        });

        match &result {
            Ok(_) => info!("event=user_update module=service status=ok user_id={id}"),
            Err(ServiceError::EntityNotFound(_)) => warn!(
                "event=user_update module=service status=error user_id={id} error_code=not_found"
            ),
            Err(err) => {
                error!("event=user_update module=service status=error user_id={id} error={err}")
            }
        }
        result
    }

    /// Removes a user. Returns `false` without touching storage when absent.
    pub fn delete(&self, id: UserId) -> ServiceResult<bool> {
        let removed = self.gateway.in_transaction(|gateway| -> ServiceResult<bool> {
            let Some(user) = gateway.get(id)? else {
                return Ok(false);
            };
            gateway.remove(&user)?;
            Ok(true)
        });

        match &removed {
            Ok(removed) => info!(
                "event=user_delete module=service status=ok user_id={id} removed={removed}"
            ),
            Err(err) => {
                error!("event=user_delete module=service status=error user_id={id} error={err}")
            }
        }
        removed
    }

    /// Returns every stored user in storage-defined order.
    pub fn find_all(&self) -> ServiceResult<Vec<User>> {
        Ok(self.repo.find_all()?)
    }

    /// Exact-match department lookup. Empty input yields an empty list.
    ///
    /// Whitespace is significant: `" "` matches only users stored with `" "`.
    pub fn find_by_department(&self, department: &str) -> ServiceResult<Vec<User>> {
        if department.is_empty() {
            return Ok(Vec::new());
        }

        let query = PredicateBuilder::new().department(Some(department)).build();
        Ok(self.gateway.fetch_users(&query)?)
    }

    /// Filters users by every present field of `filter`.
    ///
    /// An empty filter returns the same set as `find_all`.
    pub fn search(&self, filter: &UserQuery) -> ServiceResult<Vec<User>> {
        let builder = PredicateBuilder::from_query(filter);
        let users = self.gateway.fetch_users(&builder.build())?;
        debug!(
            "event=user_search module=service status=ok clauses={} hits={}",
            builder.clauses().len(),
            users.len()
        );
        Ok(users)
    }

    /// Counts active users in `department`.
    pub fn count(&self, department: &str) -> ServiceResult<i64> {
        Ok(self
            .gateway
            .fetch_scalar(&count_active_in_department(department))?)
    }

    /// Inserts every user of `users` atomically.
    ///
    /// Any failure rolls back the whole batch and is returned unchanged.
    /// An empty batch succeeds without changing state.
    pub fn transfer(&self, users: Vec<User>) -> ServiceResult<bool> {
        let batch_size = users.len();
        let result = self.gateway.in_transaction(|gateway| {
            for mut user in users {
                gateway.insert(&mut user)?;
            }
            Ok::<(), StorageError>(())
        });

        match result {
            Ok(()) => {
                info!("event=user_transfer module=service status=ok batch_size={batch_size}");
                Ok(true)
            }
            Err(err) => {
                error!(
                    "event=user_transfer module=service status=error batch_size={batch_size} error={err}"
                );
                Err(err.into())
            }
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Text(text) => text.clone(),
        Value::Integer(number) => number.to_string(),
        Value::Real(number) => number.to_string(),
        Value::Null => "null".to_string(),
        Value::Blob(bytes) => format!("<{} bytes>", bytes.len()),
    }
}
