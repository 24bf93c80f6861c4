//! Message authentication: SHA-256 digest binding plus RSA PKCS#1 v1.5
//! signatures.
//!
//! The digest covers the exact byte concatenation `iv ‖ ciphertext`, tying
//! the signature to the encrypted payload rather than the plaintext, so
//! verification happens before decryption. Verification is deterministic and
//! fails closed: every failure mode maps uniformly to
//! `CryptoError::VerificationFailed`.

use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// SHA-256 over `iv ‖ ciphertext`.
pub fn content_digest(iv: &[u8], ciphertext: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(iv);
    hasher.update(ciphertext);
    hasher.finalize().into()
}

/// Sign the content digest of an encrypted payload (digest-then-sign).
pub fn sign(
    private_key: &RsaPrivateKey,
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    sign_digest(private_key, &content_digest(iv, ciphertext))
}

/// Verify a signature over an encrypted payload.
pub fn verify(
    public_key: &RsaPublicKey,
    iv: &[u8],
    ciphertext: &[u8],
    signature: &[u8],
) -> Result<(), CryptoError> {
    verify_digest(public_key, &content_digest(iv, ciphertext), signature)
}

/// Sign a precomputed SHA-256 digest. Also used for the key-exchange
/// metadata binding.
pub fn sign_digest(private_key: &RsaPrivateKey, digest: &[u8]) -> Result<Vec<u8>, CryptoError> {
    private_key
        .sign(Pkcs1v15Sign::new::<Sha256>(), digest)
        .map_err(|e| CryptoError::Signing(e.to_string()))
}

/// Verify a signature over a precomputed SHA-256 digest.
pub fn verify_digest(
    public_key: &RsaPublicKey,
    digest: &[u8],
    signature: &[u8],
) -> Result<(), CryptoError> {
    public_key
        .verify(Pkcs1v15Sign::new::<Sha256>(), digest, signature)
        .map_err(|_| CryptoError::VerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn keypair() -> (RsaPrivateKey, RsaPublicKey) {
        let private = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let public = RsaPublicKey::from(&private);
        (private, public)
    }

    #[test]
    fn content_digest_matches_sha256_of_concatenation() {
        let iv = [1u8; 16];
        let ciphertext = b"ciphertext bytes";

        let mut concat = iv.to_vec();
        concat.extend_from_slice(ciphertext);
        let expected: [u8; 32] = Sha256::digest(&concat).into();

        assert_eq!(content_digest(&iv, ciphertext), expected);
    }

    #[test]
    fn sign_then_verify_succeeds() {
        let (private, public) = keypair();
        let iv = [2u8; 16];

        let signature = sign(&private, &iv, b"payload").unwrap();
        verify(&public, &iv, b"payload", &signature).unwrap();
    }

    #[test]
    fn verify_is_deterministic() {
        let (private, public) = keypair();
        let iv = [3u8; 16];
        let signature = sign(&private, &iv, b"payload").unwrap();

        for _ in 0..3 {
            verify(&public, &iv, b"payload", &signature).unwrap();
        }
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let (private, public) = keypair();
        let iv = [4u8; 16];
        let signature = sign(&private, &iv, b"payload").unwrap();

        let result = verify(&public, &iv, b"payloae", &signature);
        assert!(matches!(result, Err(CryptoError::VerificationFailed)));
    }

    #[test]
    fn tampered_iv_fails_verification() {
        let (private, public) = keypair();
        let iv = [5u8; 16];
        let signature = sign(&private, &iv, b"payload").unwrap();

        let mut flipped = iv;
        flipped[0] ^= 0x01;
        let result = verify(&public, &flipped, b"payload", &signature);
        assert!(matches!(result, Err(CryptoError::VerificationFailed)));
    }

    #[test]
    fn wrong_public_key_fails_verification() {
        let (private, _) = keypair();
        let (_, other_public) = keypair();
        let iv = [6u8; 16];
        let signature = sign(&private, &iv, b"payload").unwrap();

        let result = verify(&other_public, &iv, b"payload", &signature);
        assert!(matches!(result, Err(CryptoError::VerificationFailed)));
    }

    #[test]
    fn malformed_signatures_fail_closed() {
        let (private, public) = keypair();
        let iv = [7u8; 16];
        let signature = sign(&private, &iv, b"payload").unwrap();

        // Truncated, empty, and garbage inputs all map to the same variant
        for bad in [&signature[..signature.len() - 1], &[], &[0xFFu8; 17][..]] {
            let result = verify(&public, &iv, b"payload", bad);
            assert!(matches!(result, Err(CryptoError::VerificationFailed)));
        }
    }
}
