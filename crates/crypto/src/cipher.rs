//! Symmetric message encryption: AES-256-CBC with PKCS#7 padding.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

pub const SESSION_KEY_SIZE: usize = 32;
pub const IV_SIZE: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// A 32-byte session key, zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey {
    key: [u8; SESSION_KEY_SIZE],
}

impl SessionKey {
    /// Fresh key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut key = [0u8; SESSION_KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; SESSION_KEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "session key must be {SESSION_KEY_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self { key })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }
}

/// Encrypt a plaintext under the session key with a fresh random IV.
///
/// The IV is unique per call and never reused; it travels alongside the
/// ciphertext and is covered by the message signature.
pub fn encrypt(key: &SessionKey, plaintext: &[u8]) -> ([u8; IV_SIZE], Vec<u8>) {
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);

    let ciphertext =
        Aes256CbcEnc::new(&key.key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    (iv, ciphertext)
}

/// Decrypt a ciphertext. Malformed padding after decryption (wrong key or
/// corrupted ciphertext) is the only local detection of key mismatch and
/// maps to `CryptoError::DecryptionFailed`.
pub fn decrypt(
    key: &SessionKey,
    iv: &[u8; IV_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    Aes256CbcDec::new(&key.key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}
