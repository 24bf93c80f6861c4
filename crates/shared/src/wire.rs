use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Sentinel value carried in both binary fields of a [`KeyExchangeDelivery`]
/// when a session already exists for the pair and nothing was regenerated.
pub const REUSE_EXISTING: &str = "reuse_existing";

/// One participant's share of a completed key exchange.
///
/// `sender` names the peer on the other end of the conversation;
/// `encrypted_session_key` is the session key wrapped under the recipient's
/// public key, so only the recipient can unwrap it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyExchangeDelivery {
    pub sender: String,
    pub encrypted_session_key: String,
    pub signature: String,
}

impl KeyExchangeDelivery {
    pub fn new(sender: &str, wrapped_key: &[u8], signature: &[u8]) -> Self {
        Self {
            sender: sender.to_string(),
            encrypted_session_key: BASE64.encode(wrapped_key),
            signature: BASE64.encode(signature),
        }
    }

    /// Delivery for the initiator of a pair that already has a session.
    pub fn reuse(sender: &str) -> Self {
        Self {
            sender: sender.to_string(),
            encrypted_session_key: REUSE_EXISTING.to_string(),
            signature: REUSE_EXISTING.to_string(),
        }
    }

    pub fn is_reuse(&self) -> bool {
        self.encrypted_session_key == REUSE_EXISTING
    }

    pub fn wrapped_key_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.encrypted_session_key)
    }

    pub fn signature_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.signature)
    }
}

/// An encrypted, signed message in transit. Never persisted.
///
/// `hash` is the hex-encoded SHA-256 digest of `iv ‖ ciphertext`; `signature`
/// is the sender's signature over that digest, binding the sender identity to
/// the exact bytes sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePackage {
    pub sender: String,
    pub iv: String,
    pub cipher: String,
    pub hash: String,
    pub signature: String,
}

impl MessagePackage {
    pub fn new(
        sender: &str,
        iv: &[u8],
        ciphertext: &[u8],
        content_hash: &[u8],
        signature: &[u8],
    ) -> Self {
        Self {
            sender: sender.to_string(),
            iv: BASE64.encode(iv),
            cipher: BASE64.encode(ciphertext),
            hash: hex::encode(content_hash),
            signature: BASE64.encode(signature),
        }
    }

    pub fn iv_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.iv)
    }

    pub fn cipher_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.cipher)
    }

    pub fn signature_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.signature)
    }
}

/// Outcome of the receiver-side verify step, addressed to the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub sender: String,
    pub message: String,
    pub status: VerifyStatus,
}

impl VerificationResult {
    pub fn accepted(sender: &str, plaintext: &str) -> Self {
        Self {
            sender: sender.to_string(),
            message: plaintext.to_string(),
            status: VerifyStatus::Success,
        }
    }

    pub fn rejected(sender: &str, error: &str) -> Self {
        Self {
            sender: sender.to_string(),
            message: error.to_string(),
            status: VerifyStatus::Error,
        }
    }
}

/// Delivery notification addressed back to the original sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Delivered,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryNotice {
    pub receiver: String,
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryNotice {
    pub fn delivered(receiver: &str, message: &str) -> Self {
        Self {
            receiver: receiver.to_string(),
            status: DeliveryStatus::Delivered,
            message: Some(message.to_string()),
            error: None,
        }
    }

    pub fn failed(receiver: &str, error: &str) -> Self {
        Self {
            receiver: receiver.to_string(),
            status: DeliveryStatus::Failed,
            message: None,
            error: Some(error.to_string()),
        }
    }
}

/// Offline-queue stub response: message history is out of scope, so the
/// list is always empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadMessages {
    pub sender: String,
    pub messages: Vec<MessagePackage>,
}
