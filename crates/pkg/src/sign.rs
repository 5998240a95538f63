//! # Signature Sidecars
//!
//! A package's signatures live in a companion `<pkg>.sig` JSON document
//! (`dmir-pkg-sig` v0): the package's SHA-256 plus one or more Ed25519
//! signatures over the package bytes, each identified by a `kid`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::canonical_json::to_canonical_bytes;
use crate::crypto::{
    b64_decode, b64_encode, compute_ed25519_kid, ed25519_sign_from_seed, sha256_hex,
};
use crate::fs_util::write_bytes_atomic;
use crate::{PkgError, PkgResult};

pub const SIG_FORMAT: &str = "dmir-pkg-sig";
pub const SIG_VERSION: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigEntry {
    pub algo: String,
    pub kid: String,
    /// Raw signature over the package bytes, base64.
    pub sig: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigSidecar {
    pub format: String,
    pub version: u32,
    /// `sha256:<hex>` of the package bytes the signatures cover.
    pub package_sha256: String,
    pub signatures: Vec<SigEntry>,
}

impl SigSidecar {
    pub fn signer_kids(&self) -> Vec<String> {
        self.signatures.iter().map(|s| s.kid.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct SignOptions {
    pub package_path: PathBuf,
    pub key_seed_path: PathBuf,
    pub out_path: PathBuf,
    /// Append to an existing sidecar instead of replacing it.
    pub add_signature: bool,
    pub include_pubkey: bool,
}

/// Load a private signing key seed: base64 of a raw 32-byte Ed25519 seed
/// (whitespace allowed).
fn load_seed32(path: &Path) -> PkgResult<Vec<u8>> {
    let text = std::fs::read_to_string(path)?;
    let raw = b64_decode(text.trim())
        .map_err(|_| PkgError::Format("invalid base64 in key seed file".to_string()))?;
    if raw.len() != 32 {
        return Err(PkgError::Format(
            "ed25519 private key seed must decode to 32 bytes".to_string(),
        ));
    }
    Ok(raw)
}

pub fn load_sig_sidecar_v0(path: &Path) -> PkgResult<SigSidecar> {
    let text = std::fs::read_to_string(path)?;
    let sidecar: SigSidecar = serde_json::from_str(text.trim_end_matches('\n'))?;
    if sidecar.format != SIG_FORMAT || sidecar.version != SIG_VERSION {
        return Err(PkgError::Format(
            "unsupported signature sidecar format/version".to_string(),
        ));
    }
    Ok(sidecar)
}

pub fn save_sig_sidecar_v0(path: &Path, sidecar: &SigSidecar) -> PkgResult<()> {
    let mut bytes = to_canonical_bytes(sidecar)?;
    bytes.push(b'\n');
    write_bytes_atomic(path, &bytes)
}

/// Sign a package, writing or appending a sidecar entry.
///
/// Appending requires the stored `package_sha256` to match the current
/// package bytes.
pub fn sign_package_v0(opts: &SignOptions) -> PkgResult<()> {
    let pkg_bytes = std::fs::read(&opts.package_path)?;
    let pkg_sha = format!("sha256:{}", sha256_hex(&pkg_bytes));
    let seed32 = load_seed32(&opts.key_seed_path)?;
    let (sig_raw, pub_raw) = ed25519_sign_from_seed(&seed32, &pkg_bytes)?;
    let kid = compute_ed25519_kid(&pub_raw);

    let mut entry = SigEntry {
        algo: "ed25519".to_string(),
        kid,
        sig: b64_encode(&sig_raw),
        pubkey: None,
    };
    if opts.include_pubkey {
        entry.pubkey = Some(b64_encode(&pub_raw));
    }

    let sidecar = if opts.add_signature {
        let mut existing = load_sig_sidecar_v0(&opts.out_path).map_err(|_| {
            PkgError::Invalid(
                "cannot append signature: sidecar is missing or unreadable".to_string(),
            )
        })?;
        if existing.package_sha256 != pkg_sha {
            return Err(PkgError::Invalid(
                "cannot append signature: sidecar package_sha256 does not match package bytes"
                    .to_string(),
            ));
        }
        existing.signatures.push(entry);
        existing
    } else {
        SigSidecar {
            format: SIG_FORMAT.to_string(),
            version: SIG_VERSION,
            package_sha256: pkg_sha,
            signatures: vec![entry],
        }
    };

    save_sig_sidecar_v0(&opts.out_path, &sidecar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ed25519_verify;

    fn write_seed(dir: &Path, seed: &[u8; 32]) -> PathBuf {
        let path = dir.join("key.seed");
        std::fs::write(&path, format!("{}\n", b64_encode(seed))).unwrap();
        path
    }

    #[test]
    fn signing_produces_a_verifiable_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("lib.dmp");
        std::fs::write(&pkg, b"package bytes").unwrap();
        let key = write_seed(dir.path(), &[5u8; 32]);
        let out = dir.path().join("lib.dmp.sig");

        sign_package_v0(&SignOptions {
            package_path: pkg.clone(),
            key_seed_path: key,
            out_path: out.clone(),
            add_signature: false,
            include_pubkey: true,
        })
        .unwrap();

        let sidecar = load_sig_sidecar_v0(&out).unwrap();
        assert_eq!(sidecar.format, SIG_FORMAT);
        assert_eq!(sidecar.signatures.len(), 1);
        let entry = &sidecar.signatures[0];
        assert_eq!(entry.algo, "ed25519");

        let pub_raw = b64_decode(entry.pubkey.as_ref().unwrap()).unwrap();
        let sig_raw = b64_decode(&entry.sig).unwrap();
        assert!(ed25519_verify(&pub_raw, b"package bytes", &sig_raw));
        assert_eq!(entry.kid, compute_ed25519_kid(&pub_raw));
        assert_eq!(
            sidecar.package_sha256,
            format!("sha256:{}", sha256_hex(b"package bytes"))
        );
    }

    #[test]
    fn append_requires_matching_package_sha() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("lib.dmp");
        std::fs::write(&pkg, b"v1").unwrap();
        let key = write_seed(dir.path(), &[6u8; 32]);
        let out = dir.path().join("lib.dmp.sig");

        sign_package_v0(&SignOptions {
            package_path: pkg.clone(),
            key_seed_path: key.clone(),
            out_path: out.clone(),
            add_signature: false,
            include_pubkey: false,
        })
        .unwrap();

        // Change the package, then try to append: must be refused.
        std::fs::write(&pkg, b"v2").unwrap();
        let err = sign_package_v0(&SignOptions {
            package_path: pkg.clone(),
            key_seed_path: key.clone(),
            out_path: out.clone(),
            add_signature: true,
            include_pubkey: false,
        })
        .unwrap_err();
        assert!(err.to_string().contains("does not match"));

        // Appending a second key against unchanged bytes works.
        std::fs::write(&pkg, b"v1").unwrap();
        let key2 = {
            let path = dir.path().join("key2.seed");
            std::fs::write(&path, b64_encode(&[7u8; 32])).unwrap();
            path
        };
        sign_package_v0(&SignOptions {
            package_path: pkg,
            key_seed_path: key2,
            out_path: out.clone(),
            add_signature: true,
            include_pubkey: false,
        })
        .unwrap();
        assert_eq!(load_sig_sidecar_v0(&out).unwrap().signatures.len(), 2);
    }
}
