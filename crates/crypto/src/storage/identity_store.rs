//! Identity persistence: username → credential plus RSA keypair material.
//!
//! Records are immutable once created and never deleted in normal operation.
//! Regenerating a private key for an existing username would silently break
//! every session signed under the old key, so the insert is create-only.

use crate::error::CryptoError;
use crate::storage::{unix_now, ChatStore};

/// A registered identity as persisted. Key material is PKCS#8 DER; the
/// password credential is an Argon2id PHC string, opaque to this layer.
#[derive(Debug, Clone)]
pub struct StoredIdentity {
    pub username: String,
    pub password_hash: String,
    pub public_key: Vec<u8>,
    pub private_key: Vec<u8>,
}

impl ChatStore<'_> {
    /// Atomic check-username-absent-then-insert. The primary key constraint
    /// decides the winner under concurrent registration.
    pub fn insert_identity(&self, identity: &StoredIdentity) -> Result<(), CryptoError> {
        let now = unix_now()?;
        let changed = self.conn.execute(
            "INSERT INTO identities (username, password_hash, public_key, private_key, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(username) DO NOTHING",
            rusqlite::params![
                identity.username,
                identity.password_hash,
                identity.public_key,
                identity.private_key,
                now
            ],
        )?;

        if changed == 0 {
            return Err(CryptoError::AlreadyRegistered {
                username: identity.username.clone(),
            });
        }
        Ok(())
    }

    pub fn get_identity(&self, username: &str) -> Result<Option<StoredIdentity>, CryptoError> {
        match self.conn.query_row(
            "SELECT username, password_hash, public_key, private_key
             FROM identities WHERE username = ?1",
            [username],
            |row| {
                Ok(StoredIdentity {
                    username: row.get(0)?,
                    password_hash: row.get(1)?,
                    public_key: row.get(2)?,
                    private_key: row.get(3)?,
                })
            },
        ) {
            Ok(identity) => Ok(Some(identity)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All registered usernames, for the conversation roster.
    pub fn list_usernames(&self) -> Result<Vec<String>, CryptoError> {
        let mut stmt = self
            .conn
            .prepare("SELECT username FROM identities ORDER BY username")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut usernames = Vec::new();
        for row in rows {
            usernames.push(row?);
        }
        Ok(usernames)
    }
}
