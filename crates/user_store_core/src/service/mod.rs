//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate gateway and repository calls into the public user contract.
//! - Keep callers decoupled from storage details.

pub mod user_service;
