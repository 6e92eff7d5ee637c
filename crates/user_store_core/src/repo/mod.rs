//! Repository layer for full-table access.
//!
//! # Responsibility
//! - Serve unfiltered reads and bulk resets without the predicate builder.
//!
//! # Invariants
//! - Repository reads reject invalid persisted rows, same as the gateway.

pub mod user_repo;
