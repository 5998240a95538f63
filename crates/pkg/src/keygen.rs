//! Ed25519 seed key generation.

use std::path::PathBuf;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::crypto::{b64_encode, compute_ed25519_kid, ed25519_sign_from_seed};
use crate::fs_util::write_bytes_atomic;
use crate::PkgResult;

#[derive(Debug, Clone)]
pub struct KeygenOptions {
    pub out_path: PathBuf,
    pub print_pubkey: bool,
    pub print_kid: bool,
}

/// Generated key facts for the caller to print.
#[derive(Debug, Clone)]
pub struct GeneratedKey {
    pub pubkey_b64: String,
    pub kid: String,
}

/// Generate a raw 32-byte Ed25519 seed and write it base64-encoded.
pub fn keygen_ed25519_seed(opts: &KeygenOptions) -> PkgResult<GeneratedKey> {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    write_bytes_atomic(&opts.out_path, format!("{}\n", b64_encode(&seed)).as_bytes())?;

    // Derive the public half once so callers can print pubkey/kid.
    let (_, pub_raw) = ed25519_sign_from_seed(&seed, b"")?;
    Ok(GeneratedKey {
        pubkey_b64: b64_encode(&pub_raw),
        kid: compute_ed25519_kid(&pub_raw),
    })
}
