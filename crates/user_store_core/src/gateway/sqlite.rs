//! SQLite implementation of `PersistenceGateway`.
//!
//! # Responsibility
//! - Map `users` rows to `User` values and back.
//! - Execute bound queries through named parameters.
//! - Scope units of work to one immediate transaction.
//!
//! # Invariants
//! - Write paths call `User::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - The gateway borrows its connection and never outlives it.

use super::{BoundQuery, PersistenceGateway, StorageError, StorageResult};
use crate::db::migrations::{latest_version, schema_version};
use crate::model::user::{User, UserId};
use crate::query::USER_SELECT_SQL;
use rusqlite::types::{ToSql, Value};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};

const USER_COLUMNS: [&str; 8] = [
    "id",
    "name",
    "email",
    "department",
    "role",
    "active",
    "created_at",
    "updated_at",
];

/// SQLite-backed persistence gateway.
pub struct SqliteGateway<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGateway<'conn> {
    /// Constructs a gateway from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> StorageResult<Self> {
        ensure_user_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl PersistenceGateway for SqliteGateway<'_> {
    fn is_alive(&self) -> bool {
        self.conn
            .query_row("SELECT 1;", [], |row| row.get::<_, i64>(0))
            .is_ok()
    }

    fn get(&self, id: UserId) -> StorageResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_user_row(row)?)),
            None => Ok(None),
        }
    }

    fn insert(&self, user: &mut User) -> StorageResult<()> {
        if let Some(id) = user.id {
            return Err(StorageError::AlreadyPersisted(id));
        }
        user.validate()?;

        self.conn.execute(
            "INSERT INTO users (
                name,
                email,
                department,
                role,
                active,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                user.name.as_str(),
                user.email.as_str(),
                user.department.as_str(),
                user.role.as_str(),
                user.active,
                user.created_at,
                user.updated_at,
            ],
        )?;

        user.id = Some(self.conn.last_insert_rowid());
        Ok(())
    }

    fn merge(&self, user: &User) -> StorageResult<User> {
        let id = user.id.ok_or(StorageError::NotPersisted)?;
        user.validate()?;

        let changed = self.conn.execute(
            "UPDATE users
             SET
                name = ?1,
                email = ?2,
                department = ?3,
                role = ?4,
                active = ?5,
                updated_at = ?6
             WHERE id = ?7;",
            params![
                user.name.as_str(),
                user.email.as_str(),
                user.department.as_str(),
                user.role.as_str(),
                user.active,
                user.updated_at,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::MissingRow(id));
        }

        self.get(id)?.ok_or(StorageError::MissingRow(id))
    }

    fn remove(&self, user: &User) -> StorageResult<()> {
        let id = user.id.ok_or(StorageError::NotPersisted)?;
        let changed = self.conn.execute("DELETE FROM users WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(StorageError::MissingRow(id));
        }
        Ok(())
    }

    fn fetch_users(&self, query: &BoundQuery) -> StorageResult<Vec<User>> {
        let names = parameter_names(query);
        let params = named_params(&names, query);

        let mut stmt = self.conn.prepare(query.text())?;
        let mut rows = stmt.query(params.as_slice())?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn fetch_scalar(&self, query: &BoundQuery) -> StorageResult<i64> {
        let names = parameter_names(query);
        let params = named_params(&names, query);

        let mut stmt = self.conn.prepare(query.text())?;
        let value = stmt.query_row(params.as_slice(), |row| row.get::<_, i64>(0))?;
        Ok(value)
    }

    fn raw_query(&self, sql: &str) -> StorageResult<Vec<Value>> {
        let mut stmt = self.conn.prepare(sql)?;
        let column_count = stmt.column_count();
        let values = stmt.query_row([], |row| {
            (0..column_count)
                .map(|index| row.get::<_, Value>(index))
                .collect::<rusqlite::Result<Vec<_>>>()
        })?;
        Ok(values)
    }

    fn in_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<StorageError>,
    {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(StorageError::from)?;
        // Dropping `tx` on the error path rolls back.
        let output = work(self)?;
        tx.commit().map_err(StorageError::from)?;
        Ok(output)
    }
}

fn parameter_names(query: &BoundQuery) -> Vec<String> {
    query
        .bindings()
        .iter()
        .map(|(name, _)| format!(":{name}"))
        .collect()
}

fn named_params<'a>(names: &'a [String], query: &'a BoundQuery) -> Vec<(&'a str, &'a dyn ToSql)> {
    names
        .iter()
        .zip(query.bindings())
        .map(|(name, (_, value))| (name.as_str(), value as &dyn ToSql))
        .collect()
}

pub(crate) fn parse_user_row(row: &Row<'_>) -> StorageResult<User> {
    let active = match row.get::<_, i64>("active")? {
        0 => false,
        1 => true,
        other => {
            return Err(StorageError::InvalidData(format!(
                "invalid active value `{other}` in users.active"
            )));
        }
    };

    let user = User {
        id: Some(row.get("id")?),
        name: row.get("name")?,
        email: row.get("email")?,
        department: row.get("department")?,
        role: row.get("role")?,
        active,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    user.validate()
        .map_err(|err| StorageError::InvalidData(err.to_string()))?;
    Ok(user)
}

/// Verifies that `conn` carries the migrated `users` schema.
pub(crate) fn ensure_user_connection_ready(conn: &Connection) -> StorageResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(StorageError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "users")? {
        return Err(StorageError::MissingRequiredTable("users"));
    }

    for column in USER_COLUMNS {
        if !table_has_column(conn, "users", column)? {
            return Err(StorageError::MissingRequiredColumn {
                table: "users",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StorageResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StorageResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
