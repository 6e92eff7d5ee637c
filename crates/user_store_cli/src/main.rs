//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open a user store, probe it and print a deterministic status summary.
//!
//! Environment:
//! - `USER_STORE_DB`: database file path; an in-memory store when unset.
//! - `USER_STORE_LOG_DIR`: absolute log directory; logging stays off when unset.
//! - `USER_STORE_LOG_LEVEL`: defaults to the build-mode level.

use std::error::Error;
use std::process::ExitCode;
use user_store_core::db::{open_db, open_db_in_memory};
use user_store_core::{
    core_version, default_log_level, init_logging, SqliteGateway, SqliteUserRepository,
    UserService,
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("user_store error={err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    if let Ok(log_dir) = std::env::var("USER_STORE_LOG_DIR") {
        let level = std::env::var("USER_STORE_LOG_LEVEL")
            .unwrap_or_else(|_| default_log_level().to_string());
        init_logging(&level, &log_dir)?;
    }

    let conn = match std::env::var("USER_STORE_DB") {
        Ok(path) => open_db(path)?,
        Err(_) => open_db_in_memory()?,
    };
    let service = UserService::new(
        SqliteGateway::try_new(&conn)?,
        SqliteUserRepository::try_new(&conn)?,
    );

    println!("user_store version={}", core_version());
    println!("user_store status={}", service.probe()?);
    println!("user_store users={}", service.find_all()?.len());
    Ok(())
}
