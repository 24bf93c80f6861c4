//! pairseal-crypto — session key exchange and authenticated message protocol.
//!
//! Establishes one shared AES-256 session key per conversation pair via RSA
//! key wrapping bound by a signed pair-identifier digest, then encrypts
//! (AES-256-CBC) and signs (RSA over SHA-256) every message so the receiver
//! can verify sender identity and payload integrity before accepting
//! plaintext. Identities and session records persist in SQLite via `rusqlite`.

pub mod cipher;
pub mod conversation;
pub mod error;
pub mod exchange;
pub mod identity;
pub mod signing;
pub mod storage;
