//! Durable identity and session storage over SQLite.
//!
//! One `Connection` is opened at process start via [`open`] and closed when
//! dropped; there is no ambient global state. Every check-then-create
//! operation is a single conflict-target insert so two concurrent callers
//! cannot produce divergent records for the same key.

pub mod migrations;

mod identity_store;
mod session_store;

pub use identity_store::StoredIdentity;
pub use session_store::{pair_key, StoredSession};

use std::path::Path;

use rusqlite::Connection;

use crate::error::CryptoError;

/// Accessor wrapper over an open connection.
pub struct ChatStore<'conn> {
    pub(crate) conn: &'conn Connection,
}

impl<'conn> ChatStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

/// Open (or create) the database at `path`, apply pragmas, and run
/// migrations. Call once at process start.
pub fn open(path: &Path) -> Result<Connection, CryptoError> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}

/// Open a fresh in-memory database with the full schema applied.
pub fn open_in_memory() -> Result<Connection, CryptoError> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<(), CryptoError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    Ok(())
}

pub(crate) fn unix_now() -> Result<i64, CryptoError> {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .map_err(|_| CryptoError::Storage("system clock before epoch".into()))
}
