//! Identity lifecycle: registration, login, and key material access.
//!
//! Each registration generates a 2048-bit RSA keypair and an Argon2id
//! password hash, inserted atomically. Private keys are retained server-side
//! alongside public keys, faithful to the protocol this implements; key
//! custody never moves client-side here.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::Engine;
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use rusqlite::Connection;

use crate::error::CryptoError;
use crate::storage::{ChatStore, StoredIdentity};

const RSA_KEY_BITS: usize = 2048;

/// Register a new identity: generate its keypair, hash the password, insert.
///
/// Returns `CryptoError::AlreadyRegistered` if the username exists. The
/// keypair is generated before the insert, so a lost registration race
/// discards the fresh keys and never touches the stored ones.
pub fn register(conn: &Connection, username: &str, password: &str) -> Result<(), CryptoError> {
    let private_key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    let public_key = RsaPublicKey::from(&private_key);

    let private_der = private_key
        .to_pkcs8_der()
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    let public_der = public_key
        .to_public_key_der()
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;

    let password_hash = hash_password(password)?;

    let store = ChatStore::new(conn);
    store.insert_identity(&StoredIdentity {
        username: username.to_string(),
        password_hash,
        public_key: public_der.as_bytes().to_vec(),
        private_key: private_der.as_bytes().to_vec(),
    })?;

    tracing::debug!(%username, "identity registered");
    Ok(())
}

/// Verify a login attempt against the stored credential.
///
/// `UnknownUser` and `InvalidPassword` are distinct variants, reproducing
/// the original protocol's login responses.
pub fn login(conn: &Connection, username: &str, password: &str) -> Result<(), CryptoError> {
    let store = ChatStore::new(conn);
    let identity = store
        .get_identity(username)?
        .ok_or(CryptoError::UnknownUser)?;
    verify_password(password, &identity.password_hash)
}

/// A registered user's public key, decoded from stored DER.
pub fn public_key(conn: &Connection, username: &str) -> Result<RsaPublicKey, CryptoError> {
    let identity = fetch(conn, username)?;
    decode_public_key(&identity.public_key)
}

/// A registered user's private key, decoded from stored DER.
pub fn private_key(conn: &Connection, username: &str) -> Result<RsaPrivateKey, CryptoError> {
    let identity = fetch(conn, username)?;
    decode_private_key(&identity.private_key)
}

/// Base64 export of a user's public key DER, for the roster/UI boundary.
pub fn public_key_string(conn: &Connection, username: &str) -> Result<String, CryptoError> {
    let identity = fetch(conn, username)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(&identity.public_key))
}

fn fetch(conn: &Connection, username: &str) -> Result<StoredIdentity, CryptoError> {
    ChatStore::new(conn)
        .get_identity(username)?
        .ok_or_else(|| CryptoError::PeerNotFound {
            username: username.to_string(),
        })
}

pub(crate) fn decode_public_key(der: &[u8]) -> Result<RsaPublicKey, CryptoError> {
    RsaPublicKey::from_public_key_der(der).map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

pub(crate) fn decode_private_key(der: &[u8]) -> Result<RsaPrivateKey, CryptoError> {
    RsaPrivateKey::from_pkcs8_der(der).map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

fn hash_password(password: &str) -> Result<String, CryptoError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CryptoError::PasswordHash(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> Result<(), CryptoError> {
    let parsed = PasswordHash::new(hash).map_err(|e| CryptoError::PasswordHash(e.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(()),
        Err(argon2::password_hash::Error::Password) => Err(CryptoError::InvalidPassword),
        Err(e) => Err(CryptoError::PasswordHash(e.to_string())),
    }
}
