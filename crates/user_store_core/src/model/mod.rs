//! User domain model.
//!
//! # Responsibility
//! - Define the persisted `User` record and the request shapes that drive it.
//!
//! # Invariants
//! - A `User` carries an id if and only if it has been persisted.
//! - `created_at <= updated_at` for every persisted user.

pub mod user;
