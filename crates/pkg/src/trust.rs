//! # Trust Store
//!
//! A JSON document (`drift-trust` v0) mapping module namespaces to allowed
//! signer kids, plus the key table and the revocation table:
//!
//! ```json
//! {
//!   "format": "drift-trust",
//!   "version": 0,
//!   "namespaces": {"acme.*": ["<kid>"]},
//!   "keys": {"<kid>": {"algo": "ed25519", "pubkey": "<base64>"}},
//!   "revoked": {"<kid>": {"revoked_at": "...", "reason": "..."}}
//! }
//! ```
//!
//! Verification: every module namespace a package provides must be covered
//! by at least one accepted, non-revoked signer; unsigned packages pass
//! only under an explicitly whitelisted root.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical_json::to_canonical_bytes;
use crate::crypto::{b64_decode, compute_ed25519_kid, ed25519_verify};
use crate::fs_util::write_bytes_atomic;
use crate::sign::SigSidecar;
use crate::{PkgError, PkgResult};

pub const TRUST_FORMAT: &str = "drift-trust";
pub const TRUST_VERSION: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    pub algo: String,
    /// Raw 32-byte public key, base64.
    pub pubkey: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokedEntry {
    pub revoked_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrustStore {
    pub format: String,
    pub version: u32,
    pub namespaces: BTreeMap<String, Vec<String>>,
    pub keys: BTreeMap<String, KeyEntry>,
    pub revoked: BTreeMap<String, RevokedEntry>,
}

impl Default for TrustStore {
    fn default() -> Self {
        Self {
            format: TRUST_FORMAT.to_string(),
            version: TRUST_VERSION,
            namespaces: BTreeMap::new(),
            keys: BTreeMap::new(),
            revoked: BTreeMap::new(),
        }
    }
}

impl TrustStore {
    /// Load a trust store, or return an initialized empty one.
    pub fn load_or_init(path: &Path) -> PkgResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let raw: Value = serde_json::from_str(text.trim_end_matches('\n'))?;
        Self::from_value(raw)
    }

    fn from_value(raw: Value) -> PkgResult<Self> {
        let obj = raw
            .as_object()
            .ok_or_else(|| PkgError::Format("trust store must be a JSON object".to_string()))?;
        if obj.get("format").and_then(Value::as_str) != Some(TRUST_FORMAT)
            || obj.get("version").and_then(Value::as_u64) != Some(u64::from(TRUST_VERSION))
        {
            return Err(PkgError::Format(
                "unsupported trust store format/version".to_string(),
            ));
        }

        let namespaces: BTreeMap<String, Vec<String>> = obj
            .get("namespaces")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();
        let keys: BTreeMap<String, KeyEntry> = obj
            .get("keys")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();

        // Older stores recorded `revoked` as a bare list of kids.
        let revoked = match obj.get("revoked") {
            None => BTreeMap::new(),
            Some(Value::Array(kids)) => kids
                .iter()
                .filter_map(Value::as_str)
                .map(|kid| (kid.to_string(), RevokedEntry::default()))
                .collect(),
            Some(other) => serde_json::from_value(other.clone())?,
        };

        Ok(Self {
            format: TRUST_FORMAT.to_string(),
            version: TRUST_VERSION,
            namespaces,
            keys,
            revoked,
        })
    }

    pub fn save(&self, path: &Path) -> PkgResult<()> {
        let mut bytes = to_canonical_bytes(self)?;
        bytes.push(b'\n');
        write_bytes_atomic(path, &bytes)
    }

    /// Record a key and allow it for a namespace (both idempotent). The kid
    /// is derived from the public key; a provided kid must match.
    pub fn add_key(
        &mut self,
        namespace: &str,
        pubkey_b64: &str,
        kid: Option<&str>,
    ) -> PkgResult<String> {
        let pub_raw = b64_decode(pubkey_b64)?;
        if pub_raw.len() != 32 {
            return Err(PkgError::Format(
                "ed25519 public key must decode to 32 bytes".to_string(),
            ));
        }
        let derived = compute_ed25519_kid(&pub_raw);
        if let Some(kid) = kid {
            if kid != derived {
                return Err(PkgError::Invalid(
                    "provided --kid does not match derived kid from pubkey".to_string(),
                ));
            }
        }

        self.keys.entry(derived.clone()).or_insert_with(|| KeyEntry {
            algo: "ed25519".to_string(),
            pubkey: pubkey_b64.trim().to_string(),
        });
        let allowed = self.namespaces.entry(namespace.to_string()).or_default();
        if !allowed.contains(&derived) {
            allowed.push(derived.clone());
        }
        Ok(derived)
    }

    /// Revoke a kid (idempotent); the first revocation's timestamp and
    /// reason are kept.
    pub fn revoke(&mut self, kid: &str, reason: Option<&str>) {
        let entry = self.revoked.entry(kid.to_string()).or_insert_with(|| {
            RevokedEntry {
                revoked_at: chrono::Utc::now()
                    .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                reason: None,
            }
        });
        if entry.reason.is_none() {
            entry.reason = reason.map(str::to_string);
        }
    }

    pub fn is_revoked(&self, kid: &str) -> bool {
        self.revoked.contains_key(kid)
    }

    /// Kids allowed to sign packages providing `module_id`.
    pub fn allowed_kids_for_module(&self, module_id: &str) -> Vec<&str> {
        let mut out = Vec::new();
        for (namespace, kids) in &self.namespaces {
            if namespace_matches(namespace, module_id) {
                out.extend(kids.iter().map(String::as_str));
            }
        }
        out
    }
}

/// Glob-like namespace matching: `acme.*` covers `acme.http`, `*` covers
/// everything, otherwise exact match.
fn namespace_matches(namespace: &str, module_id: &str) -> bool {
    if namespace == "*" {
        return true;
    }
    if let Some(prefix) = namespace.strip_suffix(".*") {
        return module_id == prefix || module_id.starts_with(&format!("{prefix}."));
    }
    if let Some(prefix) = namespace.strip_suffix('*') {
        return module_id.starts_with(prefix);
    }
    namespace == module_id
}

/// Trust policy applied when loading packages.
#[derive(Debug)]
pub struct TrustPolicy<'a> {
    pub trust_store: &'a TrustStore,
    pub require_signatures: bool,
    pub allow_unsigned_roots: Vec<PathBuf>,
}

/// Enforce the signature/trust policy for one package.
///
/// At least one signature must verify, be allowed for every module
/// namespace the package provides, and not be revoked.
pub fn verify_package_signatures(
    pkg_path: &Path,
    pkg_bytes: &[u8],
    module_ids: &[String],
    sidecar: Option<&SigSidecar>,
    policy: &TrustPolicy<'_>,
) -> PkgResult<()> {
    let trust = policy.trust_store;

    let Some(sidecar) = sidecar else {
        if !policy.require_signatures {
            return Ok(());
        }
        let whitelisted = policy
            .allow_unsigned_roots
            .iter()
            .any(|root| pkg_path.starts_with(root));
        if whitelisted {
            return Ok(());
        }
        return Err(PkgError::Trust(format!(
            "package '{}' is unsigned and its root is not whitelisted",
            pkg_path.display()
        )));
    };

    let expected_sha = format!("sha256:{}", crate::crypto::sha256_hex(pkg_bytes));
    if sidecar.package_sha256 != expected_sha {
        return Err(PkgError::Trust(format!(
            "sidecar sha256 mismatch for package '{}'",
            pkg_path.display()
        )));
    }

    // Verify each signature against the trust-store key table.
    let mut accepted: Vec<&str> = Vec::new();
    for entry in &sidecar.signatures {
        if entry.algo != "ed25519" {
            continue;
        }
        if trust.is_revoked(&entry.kid) {
            return Err(PkgError::Trust(format!(
                "signer kid '{}' is revoked",
                entry.kid
            )));
        }
        let Some(key) = trust.keys.get(&entry.kid) else {
            continue;
        };
        let pub_raw = b64_decode(&key.pubkey)?;
        let sig_raw = b64_decode(&entry.sig)?;
        if ed25519_verify(&pub_raw, pkg_bytes, &sig_raw) {
            accepted.push(&entry.kid);
        }
    }

    for module_id in module_ids {
        let allowed = trust.allowed_kids_for_module(module_id);
        if !accepted.iter().any(|kid| allowed.contains(kid)) {
            return Err(PkgError::Trust(format!(
                "no accepted signer for namespace of module '{module_id}'"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{b64_encode, ed25519_sign_from_seed, sha256_hex};
    use crate::sign::SigEntry;

    fn signed_sidecar(seed: &[u8; 32], pkg_bytes: &[u8]) -> (SigSidecar, String, String) {
        let (sig, pubkey) = ed25519_sign_from_seed(seed, pkg_bytes).unwrap();
        let kid = compute_ed25519_kid(&pubkey);
        let sidecar = SigSidecar {
            format: "dmir-pkg-sig".to_string(),
            version: 0,
            package_sha256: format!("sha256:{}", sha256_hex(pkg_bytes)),
            signatures: vec![SigEntry {
                algo: "ed25519".to_string(),
                kid: kid.clone(),
                sig: b64_encode(&sig),
                pubkey: Some(b64_encode(&pubkey)),
            }],
        };
        (sidecar, kid, b64_encode(&pubkey))
    }

    #[test]
    fn namespace_globs() {
        assert!(namespace_matches("*", "anything"));
        assert!(namespace_matches("acme.*", "acme.http"));
        assert!(namespace_matches("acme.*", "acme"));
        assert!(!namespace_matches("acme.*", "acmeco"));
        assert!(namespace_matches("lib", "lib"));
        assert!(!namespace_matches("lib", "lib2"));
    }

    #[test]
    fn trusted_signature_passes_namespace_check() {
        let pkg_bytes = b"pkg";
        let (sidecar, _kid, pubkey) = signed_sidecar(&[1u8; 32], pkg_bytes);

        let mut store = TrustStore::default();
        store.add_key("lib", &pubkey, None).unwrap();

        let policy = TrustPolicy {
            trust_store: &store,
            require_signatures: true,
            allow_unsigned_roots: vec![],
        };
        verify_package_signatures(
            Path::new("/repo/lib.dmp"),
            pkg_bytes,
            &["lib".to_string()],
            Some(&sidecar),
            &policy,
        )
        .unwrap();
    }

    #[test]
    fn unknown_signer_fails_namespace_check() {
        let pkg_bytes = b"pkg";
        let (sidecar, _, _) = signed_sidecar(&[2u8; 32], pkg_bytes);
        let store = TrustStore::default();
        let policy = TrustPolicy {
            trust_store: &store,
            require_signatures: true,
            allow_unsigned_roots: vec![],
        };
        let err = verify_package_signatures(
            Path::new("/repo/lib.dmp"),
            pkg_bytes,
            &["lib".to_string()],
            Some(&sidecar),
            &policy,
        )
        .unwrap_err();
        assert!(err.to_string().contains("no accepted signer"));
    }

    #[test]
    fn revoked_kid_is_rejected() {
        let pkg_bytes = b"pkg";
        let (sidecar, kid, pubkey) = signed_sidecar(&[3u8; 32], pkg_bytes);
        let mut store = TrustStore::default();
        store.add_key("lib", &pubkey, None).unwrap();
        store.revoke(&kid, Some("compromised"));

        let policy = TrustPolicy {
            trust_store: &store,
            require_signatures: true,
            allow_unsigned_roots: vec![],
        };
        let err = verify_package_signatures(
            Path::new("/repo/lib.dmp"),
            pkg_bytes,
            &["lib".to_string()],
            Some(&sidecar),
            &policy,
        )
        .unwrap_err();
        assert!(err.to_string().contains("revoked"));
    }

    #[test]
    fn unsigned_allowed_only_under_whitelisted_root() {
        let store = TrustStore::default();
        let policy = TrustPolicy {
            trust_store: &store,
            require_signatures: true,
            allow_unsigned_roots: vec![PathBuf::from("/vendored")],
        };
        verify_package_signatures(
            Path::new("/vendored/lib.dmp"),
            b"pkg",
            &["lib".to_string()],
            None,
            &policy,
        )
        .unwrap();
        let err = verify_package_signatures(
            Path::new("/elsewhere/lib.dmp"),
            b"pkg",
            &["lib".to_string()],
            None,
            &policy,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unsigned"));
    }

    #[test]
    fn legacy_revoked_list_is_upgraded() {
        let raw = serde_json::json!({
            "format": "drift-trust",
            "version": 0,
            "namespaces": {},
            "keys": {},
            "revoked": ["deadbeef"],
        });
        let store = TrustStore::from_value(raw).unwrap();
        assert!(store.is_revoked("deadbeef"));
    }

    #[test]
    fn add_key_rejects_mismatched_kid() {
        let (_, pubkey) = ed25519_sign_from_seed(&[4u8; 32], b"").unwrap();
        let mut store = TrustStore::default();
        let err = store
            .add_key("lib", &b64_encode(&pubkey), Some("not-the-kid"))
            .unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }
}
