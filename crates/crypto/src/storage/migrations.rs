//! Versioned migration runner for the identity and session schema.

use rusqlite::Connection;

use crate::error::CryptoError;

const MIGRATIONS: &[(i32, &str)] = &[(1, MIGRATION_001)];

const MIGRATION_001: &str = "
CREATE TABLE IF NOT EXISTS identities (
    username      TEXT PRIMARY KEY,
    password_hash TEXT NOT NULL,
    public_key    BLOB NOT NULL,
    private_key   BLOB NOT NULL,
    created_at    INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    pair_key    TEXT PRIMARY KEY,
    session_key BLOB NOT NULL,
    initiator   TEXT NOT NULL,
    created_at  INTEGER NOT NULL
);
";

pub fn run_migrations(conn: &Connection) -> Result<(), CryptoError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )?;

    let current_version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |row| row.get(0),
    )?;

    for &(version, sql) in MIGRATIONS {
        if version > current_version {
            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(sql)?;
            tx.execute("INSERT INTO _migrations (version) VALUES (?1)", [version])?;
            tx.commit()?;
        }
    }

    Ok(())
}
