//! Session key exchange: fresh symmetric key, per-recipient RSA key
//! wrapping, and a signed metadata binding over the pair identifiers.
//!
//! The same symmetric key is never sent as a single shared ciphertext; each
//! participant receives their own wrapping under their own public key. The
//! binding signature asserts "this exchange was authorized by the initiator
//! for exactly this pair" and is checked against the initiator's known
//! public key before a wrapped key is trusted.

use rand::rngs::OsRng;
use rsa::Pkcs1v15Encrypt;
use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::cipher::SessionKey;
use crate::error::CryptoError;
use crate::identity;
use crate::signing;
use crate::storage::{pair_key, ChatStore};

/// One participant's share of an established exchange. `peer` names the
/// other end of the conversation (the wire `sender` field).
#[derive(Debug, Clone)]
pub struct KeyDelivery {
    pub peer: String,
    pub wrapped_key: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Result of a key exchange attempt.
#[derive(Debug)]
pub enum ExchangeOutcome {
    /// A fresh session was established; one delivery per participant.
    Established {
        for_initiator: KeyDelivery,
        for_responder: KeyDelivery,
    },
    /// A session already exists for the pair; nothing was regenerated.
    /// Key rotation is impossible via this path.
    Reused,
}

/// SHA-256 digest of the metadata binding string `"{initiator}:{responder}"`.
pub fn binding_digest(initiator: &str, responder: &str) -> [u8; 32] {
    Sha256::digest(format!("{initiator}:{responder}").as_bytes()).into()
}

/// Establish (or reuse) the session for the unordered pair.
///
/// On first establishment: generate 32 random bytes, wrap them once per
/// participant, sign the binding digest with the initiator's private key,
/// and persist the record under the canonical pair key. The persist step is
/// a single atomic check-and-create, so a concurrent initiation that loses
/// the race degrades to `Reused` instead of clobbering the winner's key.
pub fn initiate(
    conn: &Connection,
    initiator: &str,
    responder: &str,
) -> Result<ExchangeOutcome, CryptoError> {
    let store = ChatStore::new(conn);

    let responder_identity =
        store
            .get_identity(responder)?
            .ok_or_else(|| CryptoError::PeerNotFound {
                username: responder.to_string(),
            })?;
    let initiator_identity =
        store
            .get_identity(initiator)?
            .ok_or_else(|| CryptoError::PeerNotFound {
                username: initiator.to_string(),
            })?;

    let key = pair_key(initiator, responder);
    if store.get_session_by_key(&key)?.is_some() {
        return Ok(ExchangeOutcome::Reused);
    }

    let session_key = SessionKey::generate();
    if !store.create_session_if_absent(&key, session_key.as_bytes(), initiator)? {
        // Lost the race to a concurrent initiation
        return Ok(ExchangeOutcome::Reused);
    }

    let initiator_public = identity::decode_public_key(&initiator_identity.public_key)?;
    let responder_public = identity::decode_public_key(&responder_identity.public_key)?;
    let initiator_private = identity::decode_private_key(&initiator_identity.private_key)?;

    let wrapped_for_initiator = wrap_session_key(&initiator_public, &session_key)?;
    let wrapped_for_responder = wrap_session_key(&responder_public, &session_key)?;

    let signature = signing::sign_digest(&initiator_private, &binding_digest(initiator, responder))?;

    tracing::debug!(%initiator, %responder, "session established");

    Ok(ExchangeOutcome::Established {
        for_initiator: KeyDelivery {
            peer: responder.to_string(),
            wrapped_key: wrapped_for_initiator,
            signature: signature.clone(),
        },
        for_responder: KeyDelivery {
            peer: initiator.to_string(),
            wrapped_key: wrapped_for_responder,
            signature,
        },
    })
}

/// Recipient-side unwrap of a delivered session key with the recipient's
/// own private key.
pub fn unwrap_session_key(
    conn: &Connection,
    username: &str,
    wrapped: &[u8],
) -> Result<SessionKey, CryptoError> {
    let private = identity::private_key(conn, username)?;
    let bytes = private
        .decrypt(Pkcs1v15Encrypt, wrapped)
        .map_err(|e| CryptoError::KeyWrap(e.to_string()))?;
    SessionKey::from_bytes(&bytes)
}

/// Check the binding signature against the initiator's known public key
/// before trusting a delivered session key.
pub fn verify_exchange_signature(
    conn: &Connection,
    initiator: &str,
    responder: &str,
    signature: &[u8],
) -> Result<(), CryptoError> {
    let public = identity::public_key(conn, initiator)?;
    signing::verify_digest(&public, &binding_digest(initiator, responder), signature)
}

fn wrap_session_key(
    public_key: &rsa::RsaPublicKey,
    key: &SessionKey,
) -> Result<Vec<u8>, CryptoError> {
    public_key
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, key.as_bytes())
        .map_err(|e| CryptoError::KeyWrap(e.to_string()))
}
