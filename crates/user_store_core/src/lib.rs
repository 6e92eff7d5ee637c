//! Persistence core for the user store.
//! This crate owns user lifecycle transitions, query construction and
//! error classification on top of SQLite.

pub mod db;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod service;

pub use gateway::sqlite::SqliteGateway;
pub use gateway::{BoundQuery, PersistenceGateway, StorageError, StorageResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::user::{
    CreateUserRequest, UpdateUserRequest, User, UserId, UserQuery, UserValidationError,
};
pub use query::predicate::{count_active_in_department, PredicateBuilder, UserField};
pub use repo::user_repo::{SqliteUserRepository, UserRepository};
pub use service::user_service::{ServiceError, ServiceResult, UserService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
