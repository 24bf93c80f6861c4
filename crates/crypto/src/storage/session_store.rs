//! Session persistence keyed by the canonical unordered pair identifier.

use crate::error::CryptoError;
use crate::storage::{unix_now, ChatStore};

/// A negotiated session record. Exactly one exists per unordered pair; the
/// session key is never transmitted in the clear, only wrapped per-recipient
/// at exchange time.
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub pair_key: String,
    pub session_key: Vec<u8>,
    pub initiator: String,
}

/// Canonical order-independent key for a two-party conversation: the two
/// usernames sorted and joined. Removes the try-both-orderings lookup class
/// of bugs entirely.
pub fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}:{b}")
    } else {
        format!("{b}:{a}")
    }
}

impl ChatStore<'_> {
    /// Single atomic check-and-create for the pair. Returns `false` when a
    /// record already exists (including when a concurrent initiation won the
    /// race) so the caller reuses the existing key instead of clobbering a
    /// session mid-use.
    pub fn create_session_if_absent(
        &self,
        pair_key: &str,
        session_key: &[u8],
        initiator: &str,
    ) -> Result<bool, CryptoError> {
        let now = unix_now()?;
        let changed = self.conn.execute(
            "INSERT INTO sessions (pair_key, session_key, initiator, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(pair_key) DO NOTHING",
            rusqlite::params![pair_key, session_key, initiator, now],
        )?;
        Ok(changed == 1)
    }

    /// Look up the session for a pair; either argument ordering works.
    pub fn get_session(&self, a: &str, b: &str) -> Result<Option<StoredSession>, CryptoError> {
        self.get_session_by_key(&pair_key(a, b))
    }

    pub fn get_session_by_key(&self, key: &str) -> Result<Option<StoredSession>, CryptoError> {
        match self.conn.query_row(
            "SELECT pair_key, session_key, initiator FROM sessions WHERE pair_key = ?1",
            [key],
            |row| {
                Ok(StoredSession {
                    pair_key: row.get(0)?,
                    session_key: row.get(1)?,
                    initiator: row.get(2)?,
                })
            },
        ) {
            Ok(session) => Ok(Some(session)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
