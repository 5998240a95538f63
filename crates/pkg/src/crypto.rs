//! Content addressing and signing primitives.
//!
//! Ed25519 works against raw 32-byte seeds and 32-byte public keys; no
//! PKCS#8 framing anywhere. A key id (`kid`) is the SHA-256 of the raw
//! public key bytes, hex-encoded.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::{PkgError, PkgResult};

pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256_bytes(data))
}

pub fn b64_encode(data: &[u8]) -> String {
    BASE64.encode(data)
}

pub fn b64_decode(text: &str) -> PkgResult<Vec<u8>> {
    BASE64
        .decode(text.trim())
        .map_err(|err| PkgError::Format(format!("invalid base64: {err}")))
}

/// `kid` = SHA-256 hex of the raw 32-byte public key.
pub fn compute_ed25519_kid(pub_raw: &[u8]) -> String {
    sha256_hex(pub_raw)
}

/// Sign `message` with a raw 32-byte Ed25519 seed. Returns the raw
/// signature and the raw public key.
pub fn ed25519_sign_from_seed(seed32: &[u8], message: &[u8]) -> PkgResult<(Vec<u8>, Vec<u8>)> {
    let seed: [u8; 32] = seed32
        .try_into()
        .map_err(|_| PkgError::Format("ed25519 private key seed must be 32 bytes".to_string()))?;
    let signing_key = SigningKey::from_bytes(&seed);
    let signature = signing_key.sign(message);
    Ok((
        signature.to_bytes().to_vec(),
        signing_key.verifying_key().to_bytes().to_vec(),
    ))
}

/// Verify a raw Ed25519 signature against a raw 32-byte public key.
pub fn ed25519_verify(pub_raw: &[u8], message: &[u8], sig_raw: &[u8]) -> bool {
    let Ok(pub_bytes) = <[u8; 32]>::try_from(pub_raw) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&pub_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; 64]>::try_from(sig_raw) else {
        return false;
    };
    key.verify(message, &Signature::from_bytes(&sig_bytes))
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let seed = [7u8; 32];
        let (sig, pubkey) = ed25519_sign_from_seed(&seed, b"package bytes").unwrap();
        assert_eq!(sig.len(), 64);
        assert_eq!(pubkey.len(), 32);
        assert!(ed25519_verify(&pubkey, b"package bytes", &sig));
        assert!(!ed25519_verify(&pubkey, b"tampered bytes", &sig));
    }

    #[test]
    fn kid_is_sha256_of_public_key() {
        let seed = [9u8; 32];
        let (_, pubkey) = ed25519_sign_from_seed(&seed, b"x").unwrap();
        assert_eq!(compute_ed25519_kid(&pubkey), sha256_hex(&pubkey));
        assert_eq!(compute_ed25519_kid(&pubkey).len(), 64);
    }

    #[test]
    fn bad_seed_length_is_rejected() {
        assert!(ed25519_sign_from_seed(&[1u8; 16], b"x").is_err());
    }
}
