//! Query construction for the `users` table.
//!
//! # Responsibility
//! - Assemble filter queries from a fixed vocabulary of clauses.
//! - Keep every filter value in the binding list, never in query text.

pub mod predicate;

pub(crate) const USER_SELECT_SQL: &str = "SELECT
    id,
    name,
    email,
    department,
    role,
    active,
    created_at,
    updated_at
FROM users";
