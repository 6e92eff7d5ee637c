//! Storage failure taxonomy shared by bootstrap, gateway and repository.
//!
//! Every failure raised below the service layer is a `StorageError`; the
//! service passes it through unchanged.

use crate::model::user::{UserId, UserValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug)]
pub enum StorageError {
    /// Driver failure: constraint violation, I/O, busy timeout.
    Sqlite(rusqlite::Error),
    /// On-disk schema was written by a newer binary.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted row cannot be converted into a valid `User`.
    InvalidData(String),
    /// Entity violates a model invariant and was not written.
    Validation(UserValidationError),
    /// Insert was attempted on a user that already has an id.
    AlreadyPersisted(UserId),
    /// Merge or remove was attempted on a transient user.
    NotPersisted,
    /// Merge or remove targeted an id with no row.
    MissingRow(UserId),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "user store schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "user store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "user store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "user store requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted user data: {message}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::AlreadyPersisted(id) => write!(f, "user is already persisted with id {id}"),
            Self::NotPersisted => write!(f, "user has not been persisted yet"),
            Self::MissingRow(id) => write!(f, "no stored row for user id {id}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<UserValidationError> for StorageError {
    fn from(value: UserValidationError) -> Self {
        Self::Validation(value)
    }
}
