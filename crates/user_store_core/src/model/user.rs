//! User entity and request models.
//!
//! # Responsibility
//! - Define the flat, single-table `User` record.
//! - Define create/update/query request shapes consumed by `UserService`.
//!
//! # Invariants
//! - `id` is `None` while transient and assigned once by the gateway.
//! - Timestamps are Unix epoch milliseconds and never run backwards.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Surrogate key assigned by storage on first insert.
pub type UserId = i64;

/// Persisted user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// `None` until the first successful insert.
    pub id: Option<UserId>,
    pub name: String,
    pub email: String,
    pub department: String,
    pub role: String,
    pub active: bool,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds. Always >= `created_at`.
    pub updated_at: i64,
}

/// Model-level invariant violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValidationError {
    /// `updated_at` is earlier than `created_at`.
    TimestampsOutOfOrder { created_at: i64, updated_at: i64 },
}

impl Display for UserValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TimestampsOutOfOrder {
                created_at,
                updated_at,
            } => write!(
                f,
                "updated_at ({updated_at}) must not be earlier than created_at ({created_at})"
            ),
        }
    }
}

impl Error for UserValidationError {}

impl User {
    /// Creates a transient, active user stamped with the given time.
    pub fn transient(request: &CreateUserRequest, now_ms: i64) -> Self {
        Self {
            id: None,
            name: request.name.clone(),
            email: request.email.clone(),
            department: request.department.clone(),
            role: request.role.clone(),
            active: true,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// Overwrites the fields supplied by `request` and refreshes `updated_at`.
    ///
    /// `None` and empty strings leave the current value untouched.
    /// `updated_at` never moves before `created_at`, even with a skewed clock.
    pub fn apply_update(&mut self, request: &UpdateUserRequest, now_ms: i64) {
        overwrite_if_supplied(&mut self.name, request.name.as_deref());
        overwrite_if_supplied(&mut self.email, request.email.as_deref());
        overwrite_if_supplied(&mut self.department, request.department.as_deref());
        overwrite_if_supplied(&mut self.role, request.role.as_deref());
        self.updated_at = now_ms.max(self.created_at);
    }

    /// Checks the timestamp ordering invariant.
    pub fn validate(&self) -> Result<(), UserValidationError> {
        if self.updated_at < self.created_at {
            return Err(UserValidationError::TimestampsOutOfOrder {
                created_at: self.created_at,
                updated_at: self.updated_at,
            });
        }
        Ok(())
    }
}

/// Input for `UserService::create`. Every field is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub department: String,
    pub role: String,
}

impl CreateUserRequest {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        department: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            department: department.into(),
            role: role.into(),
        }
    }
}

/// Partial update input for `UserService::update`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Optional search criteria. A `None` field places no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserQuery {
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}

fn overwrite_if_supplied(target: &mut String, value: Option<&str>) {
    if let Some(value) = value.filter(|value| !value.is_empty()) {
        *target = value.to_string();
    }
}
