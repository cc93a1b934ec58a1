//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are simple functions (rather than stateful structs) that accept a `&mut SqliteConnection`
//! argument. Callers can obtain a connection from a pool, or open an atomic transaction as the need arises and call
//! through to the functions without any other changes.
//!
//! Functions that perform a guarded transition return `Ok(None)` (or an empty result) when the guard did not match.
//! Deciding *why* it did not match is left to the caller.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod catalog;
pub mod order_events;
pub mod orders;
pub mod visibility;

const SQLITE_DB_URL: &str = "sqlite://data/dispatch.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

pub fn db_url() -> String {
    let result = env::var("DISPATCH_DATABASE_URL").unwrap_or_else(|_| {
        info!("DISPATCH_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

/// Opens a connection pool. Connections enforce foreign keys, use WAL mode and wait up to [`BUSY_TIMEOUT`] for the
/// writer lock.
pub async fn new_pool(url: &str, max_connections: u32, create_if_missing: bool) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(create_if_missing)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
