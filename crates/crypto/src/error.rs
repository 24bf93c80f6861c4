//! Error types for the pairseal-crypto crate.

use thiserror::Error;

/// Errors that can occur during protocol and storage operations.
///
/// The protocol kinds (`PeerNotFound`, `SessionNotEstablished`,
/// `VerificationFailed`, `DecryptionFailed`) are recovered into status
/// results at the conversation boundary and are never process-fatal.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The key exchange target is not a registered identity.
    #[error("peer not found: {username}")]
    PeerNotFound { username: String },

    /// Send or receive was attempted before a key exchange for the pair.
    #[error("session not established for pair: {pair_key}")]
    SessionNotEstablished { pair_key: String },

    /// Signature check failed. Treated as a security event; the message is
    /// discarded and no plaintext is ever released.
    #[error("signature verification failed")]
    VerificationFailed,

    /// Padding was malformed after decryption (wrong key or corrupted
    /// ciphertext). The only local detection of key mismatch.
    #[error("decryption failed: bad padding or wrong key")]
    DecryptionFailed,

    /// Registration attempted for a username that already exists.
    #[error("username already registered: {username}")]
    AlreadyRegistered { username: String },

    /// Login attempted for an unknown username.
    #[error("user not found")]
    UnknownUser,

    /// Login password did not match the stored credential.
    #[error("invalid password")]
    InvalidPassword,

    /// Stored or supplied key material could not be decoded.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Asymmetric keypair generation failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Wrapping or unwrapping a session key failed.
    #[error("key wrap failed: {0}")]
    KeyWrap(String),

    /// Producing a signature failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Password hashing or hash parsing failed.
    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    /// Database storage error.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for CryptoError {
    fn from(err: rusqlite::Error) -> Self {
        CryptoError::Storage(err.to_string())
    }
}
