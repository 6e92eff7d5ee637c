//! User repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide full-table `find_all` and `delete_all` over `users`.
//!
//! # Invariants
//! - `find_all` ordering is by id; callers must not rely on it.

use crate::gateway::sqlite::{ensure_user_connection_ready, parse_user_row};
use crate::gateway::StorageResult;
use crate::model::user::User;
use crate::query::USER_SELECT_SQL;
use rusqlite::Connection;

/// Repository interface for unfiltered user access.
pub trait UserRepository {
    fn find_all(&self) -> StorageResult<Vec<User>>;
    /// Deletes every user and returns the number of removed rows.
    fn delete_all(&self) -> StorageResult<usize>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> StorageResult<Self> {
        ensure_user_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn find_all(&self) -> StorageResult<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn delete_all(&self) -> StorageResult<usize> {
        let removed = self.conn.execute("DELETE FROM users;", [])?;
        Ok(removed)
    }
}
