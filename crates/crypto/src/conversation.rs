//! Conversation orchestration: the operations exposed to the transport layer.
//!
//! A pair moves from no session to established exactly once, on the first
//! successful `initiate`; there is no expiry or revocation. `send` and
//! `receive` are stateless per call. `handle_inbound` is the transport
//! boundary where every protocol error kind is recovered into a status
//! result instead of escaping as an unhandled fault.

use rusqlite::Connection;

use pairseal_shared::wire::{
    DeliveryNotice, KeyExchangeDelivery, MessagePackage, VerificationResult,
};

use crate::cipher::{self, SessionKey, IV_SIZE};
use crate::error::CryptoError;
use crate::exchange::{self, ExchangeOutcome};
use crate::identity;
use crate::signing;
use crate::storage::{pair_key, ChatStore};

/// Wire-level outcome of `initiate`.
#[derive(Debug)]
pub enum Handshake {
    /// Fresh establishment: one delivery per participant, each carrying that
    /// participant's own wrapping of the session key.
    Established {
        for_initiator: KeyExchangeDelivery,
        for_responder: KeyExchangeDelivery,
    },
    /// The pair already had a session; only the initiator is notified.
    Reused { for_initiator: KeyExchangeDelivery },
}

/// Outcome of verifying and decrypting an inbound package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    Accepted { plaintext: String },
    Rejected { reason: RejectReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Signature check failed, or a wire field was malformed. No decryption
    /// was attempted.
    Verification,
    /// Signature passed but padding was malformed (wrong session key or
    /// storage corruption).
    Decryption,
}

/// Open (or reuse) the session for the pair and produce the wire deliveries.
pub fn initiate(
    conn: &Connection,
    initiator: &str,
    responder: &str,
) -> Result<Handshake, CryptoError> {
    match exchange::initiate(conn, initiator, responder)? {
        ExchangeOutcome::Established {
            for_initiator,
            for_responder,
        } => Ok(Handshake::Established {
            for_initiator: KeyExchangeDelivery::new(
                &for_initiator.peer,
                &for_initiator.wrapped_key,
                &for_initiator.signature,
            ),
            for_responder: KeyExchangeDelivery::new(
                &for_responder.peer,
                &for_responder.wrapped_key,
                &for_responder.signature,
            ),
        }),
        ExchangeOutcome::Reused => Ok(Handshake::Reused {
            for_initiator: KeyExchangeDelivery::reuse(responder),
        }),
    }
}

/// Encrypt and sign an outgoing message for transport delivery.
pub fn send(
    conn: &Connection,
    sender: &str,
    receiver: &str,
    plaintext: &str,
) -> Result<MessagePackage, CryptoError> {
    let store = ChatStore::new(conn);
    let session =
        store
            .get_session(sender, receiver)?
            .ok_or_else(|| CryptoError::SessionNotEstablished {
                pair_key: pair_key(sender, receiver),
            })?;

    let key = SessionKey::from_bytes(&session.session_key)?;
    let (iv, ciphertext) = cipher::encrypt(&key, plaintext.as_bytes());

    let private = identity::private_key(conn, sender)?;
    let signature = signing::sign(&private, &iv, &ciphertext)?;
    let digest = signing::content_digest(&iv, &ciphertext);

    Ok(MessagePackage::new(
        sender, &iv, &ciphertext, &digest, &signature,
    ))
}

/// Verify and decrypt an inbound package for `local_user`.
///
/// Verification runs strictly before decryption, against the package's
/// declared sender public key; plaintext is never surfaced when either step
/// fails. Malformed wire fields reject the same way a bad signature does.
pub fn receive(
    conn: &Connection,
    local_user: &str,
    package: &MessagePackage,
) -> Result<ReceiveOutcome, CryptoError> {
    let store = ChatStore::new(conn);
    let session = store.get_session(&package.sender, local_user)?.ok_or_else(|| {
        CryptoError::SessionNotEstablished {
            pair_key: pair_key(&package.sender, local_user),
        }
    })?;

    let sender_public = identity::public_key(conn, &package.sender)?;

    let Some((iv, ciphertext, signature)) = decode_package(package) else {
        tracing::warn!(
            sender = %package.sender,
            receiver = %local_user,
            "rejecting message with malformed wire fields"
        );
        return Ok(ReceiveOutcome::Rejected {
            reason: RejectReason::Verification,
        });
    };

    if signing::verify(&sender_public, &iv, &ciphertext, &signature).is_err() {
        tracing::warn!(
            sender = %package.sender,
            receiver = %local_user,
            "message signature verification failed"
        );
        return Ok(ReceiveOutcome::Rejected {
            reason: RejectReason::Verification,
        });
    }

    let key = SessionKey::from_bytes(&session.session_key)?;
    match cipher::decrypt(&key, &iv, &ciphertext) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(plaintext) => Ok(ReceiveOutcome::Accepted { plaintext }),
            Err(_) => Ok(ReceiveOutcome::Rejected {
                reason: RejectReason::Decryption,
            }),
        },
        Err(CryptoError::DecryptionFailed) => {
            tracing::warn!(
                sender = %package.sender,
                receiver = %local_user,
                "decryption failed after signature check passed"
            );
            Ok(ReceiveOutcome::Rejected {
                reason: RejectReason::Decryption,
            })
        }
        Err(e) => Err(e),
    }
}

/// Transport boundary for inbound packages: recover every error kind into a
/// verification result for the receiver and a delivery notice for the
/// original sender.
pub fn handle_inbound(
    conn: &Connection,
    local_user: &str,
    package: &MessagePackage,
) -> (VerificationResult, DeliveryNotice) {
    match receive(conn, local_user, package) {
        Ok(ReceiveOutcome::Accepted { plaintext }) => (
            VerificationResult::accepted(&package.sender, &plaintext),
            DeliveryNotice::delivered(local_user, &plaintext),
        ),
        Ok(ReceiveOutcome::Rejected { .. }) => (
            VerificationResult::rejected(&package.sender, "Message verification failed"),
            DeliveryNotice::failed(local_user, "Verification failed"),
        ),
        Err(e) => (
            VerificationResult::rejected(&package.sender, &e.to_string()),
            DeliveryNotice::failed(local_user, &e.to_string()),
        ),
    }
}

/// Offline message queue stub: history is out of scope, the list is always
/// empty.
pub fn unread_messages(
    _conn: &Connection,
    _local_user: &str,
    _peer: &str,
) -> Vec<MessagePackage> {
    Vec::new()
}

fn decode_package(package: &MessagePackage) -> Option<([u8; IV_SIZE], Vec<u8>, Vec<u8>)> {
    let iv: [u8; IV_SIZE] = package.iv_bytes().ok()?.try_into().ok()?;
    let ciphertext = package.cipher_bytes().ok()?;
    let signature = package.signature_bytes().ok()?;
    Some((iv, ciphertext, signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use pairseal_shared::wire::{DeliveryStatus, VerifyStatus};

    use crate::identity::register;
    use crate::storage::open_in_memory;

    fn established_pair() -> Connection {
        let conn = open_in_memory().unwrap();
        register(&conn, "alice", "alice-pw").unwrap();
        register(&conn, "bob", "bob-pw").unwrap();
        initiate(&conn, "alice", "bob").unwrap();
        conn
    }

    fn flip_bit_in_cipher(package: &MessagePackage) -> MessagePackage {
        let mut bytes = package.cipher_bytes().unwrap();
        bytes[0] ^= 0x01;
        let mut tampered = package.clone();
        tampered.cipher = BASE64.encode(&bytes);
        tampered
    }

    #[test]
    fn send_before_initiate_returns_session_not_established() {
        let conn = open_in_memory().unwrap();
        register(&conn, "alice", "pw").unwrap();
        register(&conn, "bob", "pw").unwrap();

        let result = send(&conn, "alice", "bob", "hello");
        assert!(matches!(
            result,
            Err(CryptoError::SessionNotEstablished { pair_key }) if pair_key == "alice:bob"
        ));
    }

    #[test]
    fn receive_before_initiate_returns_session_not_established() {
        let conn = open_in_memory().unwrap();
        register(&conn, "alice", "pw").unwrap();
        register(&conn, "bob", "pw").unwrap();

        let package = MessagePackage::new("alice", &[0u8; 16], b"ct", &[0u8; 32], b"sig");
        let result = receive(&conn, "bob", &package);
        assert!(matches!(
            result,
            Err(CryptoError::SessionNotEstablished { .. })
        ));
    }

    #[test]
    fn send_then_receive_round_trips_plaintext() {
        let conn = established_pair();

        let package = send(&conn, "alice", "bob", "hello").unwrap();
        assert_eq!(package.sender, "alice");

        let outcome = receive(&conn, "bob", &package).unwrap();
        assert_eq!(
            outcome,
            ReceiveOutcome::Accepted {
                plaintext: "hello".into()
            }
        );
    }

    #[test]
    fn messages_flow_in_both_directions_over_one_session() {
        let conn = established_pair();

        let to_bob = send(&conn, "alice", "bob", "hi bob").unwrap();
        let to_alice = send(&conn, "bob", "alice", "hi alice").unwrap();

        assert_eq!(
            receive(&conn, "bob", &to_bob).unwrap(),
            ReceiveOutcome::Accepted {
                plaintext: "hi bob".into()
            }
        );
        assert_eq!(
            receive(&conn, "alice", &to_alice).unwrap(),
            ReceiveOutcome::Accepted {
                plaintext: "hi alice".into()
            }
        );
    }

    #[test]
    fn flipped_cipher_bit_is_rejected_without_plaintext() {
        let conn = established_pair();

        let package = send(&conn, "alice", "bob", "hello").unwrap();
        let tampered = flip_bit_in_cipher(&package);

        let outcome = receive(&conn, "bob", &tampered).unwrap();
        assert_eq!(
            outcome,
            ReceiveOutcome::Rejected {
                reason: RejectReason::Verification
            }
        );
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let conn = established_pair();

        let package = send(&conn, "alice", "bob", "hello").unwrap();
        let mut sig = package.signature_bytes().unwrap();
        sig[10] ^= 0xFF;
        let mut tampered = package.clone();
        tampered.signature = BASE64.encode(&sig);

        let outcome = receive(&conn, "bob", &tampered).unwrap();
        assert_eq!(
            outcome,
            ReceiveOutcome::Rejected {
                reason: RejectReason::Verification
            }
        );
    }

    #[test]
    fn malformed_wire_fields_are_rejected_not_errored() {
        let conn = established_pair();

        let package = send(&conn, "alice", "bob", "hello").unwrap();
        let mut malformed = package.clone();
        malformed.iv = "***not base64***".into();

        let outcome = receive(&conn, "bob", &malformed).unwrap();
        assert_eq!(
            outcome,
            ReceiveOutcome::Rejected {
                reason: RejectReason::Verification
            }
        );
    }

    #[test]
    fn initiate_twice_reports_reuse_with_sentinel_delivery() {
        let conn = established_pair();

        match initiate(&conn, "alice", "bob").unwrap() {
            Handshake::Reused { for_initiator } => {
                assert!(for_initiator.is_reuse());
                assert_eq!(for_initiator.sender, "bob");
            }
            Handshake::Established { .. } => panic!("expected reuse"),
        }
    }

    #[test]
    fn handle_inbound_reports_success_statuses() {
        let conn = established_pair();
        let package = send(&conn, "alice", "bob", "hello").unwrap();

        let (verification, notice) = handle_inbound(&conn, "bob", &package);
        assert_eq!(verification.status, VerifyStatus::Success);
        assert_eq!(verification.message, "hello");
        assert_eq!(notice.status, DeliveryStatus::Delivered);
        assert_eq!(notice.message.as_deref(), Some("hello"));
    }

    #[test]
    fn handle_inbound_reports_failure_statuses_on_tampering() {
        let conn = established_pair();
        let package = send(&conn, "alice", "bob", "hello").unwrap();
        let tampered = flip_bit_in_cipher(&package);

        let (verification, notice) = handle_inbound(&conn, "bob", &tampered);
        assert_eq!(verification.status, VerifyStatus::Error);
        assert_ne!(verification.message, "hello");
        assert_eq!(notice.status, DeliveryStatus::Failed);
        assert!(notice.message.is_none());
    }

    #[test]
    fn handle_inbound_recovers_missing_session_into_statuses() {
        let conn = open_in_memory().unwrap();
        register(&conn, "alice", "pw").unwrap();
        register(&conn, "bob", "pw").unwrap();

        let package = MessagePackage::new("alice", &[0u8; 16], b"ct", &[0u8; 32], b"sig");
        let (verification, notice) = handle_inbound(&conn, "bob", &package);
        assert_eq!(verification.status, VerifyStatus::Error);
        assert_eq!(notice.status, DeliveryStatus::Failed);
    }

    #[test]
    fn unread_messages_stub_is_always_empty() {
        let conn = established_pair();
        assert!(unread_messages(&conn, "bob", "alice").is_empty());
    }
}
