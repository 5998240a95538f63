//! # DMIR-PKG v0 Container
//!
//! A small, deterministic binary container used by `driftc` and the
//! `drift` tool. Fixed little-endian header layout (the versioned ABI
//! boundary):
//!
//! | field          | width |
//! |----------------|-------|
//! | magic          | 8     |
//! | version        | 2     |
//! | flags          | 2     |
//! | header_size    | 4     |
//! | manifest_len   | 8     |
//! | manifest_sha   | 32    |
//! | toc_len        | 8     |
//! | toc_entry_size | 4     |
//! | toc_sha        | 32    |
//! | reserved       | 64    |
//!
//! Immediately after the header lies the canonical manifest JSON, then the
//! table of contents, then payload blobs.

use std::path::Path;

use serde_json::Value;

use crate::canonical_json::canonical_json_bytes;
use crate::crypto::sha256_bytes;
use crate::{PkgError, PkgResult};

pub const MAGIC: &[u8; 8] = b"DMIRPKG\0";
pub const VERSION: u16 = 0;
pub const HEADER_SIZE_V0: usize = 164;
pub const TOC_ENTRY_SIZE_V0: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIdentity {
    pub package_id: String,
    pub package_version: String,
    pub target: String,
    pub manifest: Value,
}

fn format_err(message: impl Into<String>) -> PkgError {
    PkgError::Format(message.into())
}

/// Assemble container bytes from a manifest value plus raw TOC and payload
/// regions. The manifest is encoded canonically so identical inputs yield
/// identical bytes.
pub fn build_package_bytes(manifest: &Value, toc: &[u8], payload: &[u8]) -> Vec<u8> {
    let manifest_bytes = canonical_json_bytes(manifest);
    let manifest_sha = sha256_bytes(&manifest_bytes);
    let toc_sha = sha256_bytes(toc);

    let mut out = Vec::with_capacity(HEADER_SIZE_V0 + manifest_bytes.len() + toc.len() + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // flags (reserved)
    out.extend_from_slice(&(HEADER_SIZE_V0 as u32).to_le_bytes());
    out.extend_from_slice(&(manifest_bytes.len() as u64).to_le_bytes());
    out.extend_from_slice(&manifest_sha);
    out.extend_from_slice(&(toc.len() as u64).to_le_bytes());
    out.extend_from_slice(&TOC_ENTRY_SIZE_V0.to_le_bytes());
    out.extend_from_slice(&toc_sha);
    out.extend_from_slice(&[0u8; 64]);
    debug_assert_eq!(out.len(), HEADER_SIZE_V0);
    out.extend_from_slice(&manifest_bytes);
    out.extend_from_slice(toc);
    out.extend_from_slice(payload);
    out
}

struct HeaderV0 {
    manifest_len: u64,
    manifest_sha: [u8; 32],
    toc_len: u64,
    toc_sha: [u8; 32],
}

fn read_header_v0(data: &[u8]) -> PkgResult<HeaderV0> {
    if data.len() < HEADER_SIZE_V0 {
        return Err(format_err("package file too small for header"));
    }
    if &data[0..8] != MAGIC {
        return Err(format_err("bad package magic"));
    }
    let version = u16::from_le_bytes([data[8], data[9]]);
    if version != VERSION {
        return Err(format_err(format!("unsupported package version {version}")));
    }
    let manifest_len = u64::from_le_bytes(data[16..24].try_into().expect("8 bytes"));
    let manifest_sha: [u8; 32] = data[24..56].try_into().expect("32 bytes");
    let toc_len = u64::from_le_bytes(data[56..64].try_into().expect("8 bytes"));
    let toc_sha: [u8; 32] = data[68..100].try_into().expect("32 bytes");
    Ok(HeaderV0 {
        manifest_len,
        manifest_sha,
        toc_len,
        toc_sha,
    })
}

/// Decode and validate the manifest region of a package.
pub fn read_manifest_bytes_v0(data: &[u8]) -> PkgResult<Value> {
    let header = read_header_v0(data)?;
    let manifest_off = HEADER_SIZE_V0;
    let manifest_end = manifest_off
        .checked_add(header.manifest_len as usize)
        .ok_or_else(|| format_err("manifest length out of range"))?;
    if manifest_end > data.len() {
        return Err(format_err("manifest length out of range"));
    }
    let manifest_bytes = &data[manifest_off..manifest_end];
    if sha256_bytes(manifest_bytes) != header.manifest_sha {
        return Err(format_err("manifest sha256 mismatch"));
    }

    let toc_end = manifest_end
        .checked_add(header.toc_len as usize)
        .ok_or_else(|| format_err("toc length out of range"))?;
    if toc_end > data.len() {
        return Err(format_err("toc length out of range"));
    }
    if sha256_bytes(&data[manifest_end..toc_end]) != header.toc_sha {
        return Err(format_err("toc sha256 mismatch"));
    }

    let text = std::str::from_utf8(manifest_bytes)
        .map_err(|_| format_err("invalid manifest JSON: not UTF-8"))?;
    let obj: Value = serde_json::from_str(text)
        .map_err(|err| format_err(format!("invalid manifest JSON: {err}")))?;
    if !obj.is_object() {
        return Err(format_err("manifest must be a JSON object"));
    }
    Ok(obj)
}

pub fn read_manifest_v0(pkg_path: &Path) -> PkgResult<Value> {
    let data = std::fs::read(pkg_path)?;
    read_manifest_bytes_v0(&data)
}

fn required_string(manifest: &Value, key: &str) -> PkgResult<String> {
    match manifest.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(format_err(format!("package manifest missing {key}"))),
    }
}

/// Read the package identity triple from container bytes.
pub fn read_identity_bytes_v0(data: &[u8]) -> PkgResult<PackageIdentity> {
    let manifest = read_manifest_bytes_v0(data)?;
    Ok(PackageIdentity {
        package_id: required_string(&manifest, "package_id")?,
        package_version: required_string(&manifest, "package_version")?,
        target: required_string(&manifest, "target")?,
        manifest,
    })
}

pub fn read_identity_v0(pkg_path: &Path) -> PkgResult<PackageIdentity> {
    let data = std::fs::read(pkg_path)?;
    read_identity_bytes_v0(&data)
}

/// Module ids a manifest provides, in manifest order.
pub fn manifest_module_ids(manifest: &Value) -> Vec<String> {
    manifest
        .get("modules")
        .and_then(Value::as_array)
        .map(|modules| {
            modules
                .iter()
                .filter_map(|m| m.get("module_id").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest() -> Value {
        json!({
            "package_id": "lib",
            "package_version": "0.1.0",
            "target": "test-target",
            "modules": [{"module_id": "lib"}],
        })
    }

    #[test]
    fn round_trip_preserves_identity() {
        let bytes = build_package_bytes(&manifest(), b"", b"");
        let identity = read_identity_bytes_v0(&bytes).unwrap();
        assert_eq!(identity.package_id, "lib");
        assert_eq!(identity.package_version, "0.1.0");
        assert_eq!(identity.target, "test-target");
        assert_eq!(manifest_module_ids(&identity.manifest), vec!["lib"]);
    }

    #[test]
    fn identical_manifests_produce_identical_bytes() {
        let a = build_package_bytes(&manifest(), b"toc", b"payload");
        let b = build_package_bytes(&manifest(), b"toc", b"payload");
        assert_eq!(a, b);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = build_package_bytes(&manifest(), b"", b"");
        bytes[0] = b'X';
        let err = read_manifest_bytes_v0(&bytes).unwrap_err();
        assert!(err.to_string().contains("bad package magic"));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut bytes = build_package_bytes(&manifest(), b"", b"");
        bytes[8] = 9;
        let err = read_manifest_bytes_v0(&bytes).unwrap_err();
        assert!(err.to_string().contains("unsupported package version"));
    }

    #[test]
    fn manifest_corruption_is_detected() {
        let mut bytes = build_package_bytes(&manifest(), b"", b"");
        // Flip a byte inside the manifest region.
        bytes[HEADER_SIZE_V0 + 3] ^= 0xFF;
        let err = read_manifest_bytes_v0(&bytes).unwrap_err();
        assert!(err.to_string().contains("manifest sha256 mismatch"));
    }

    #[test]
    fn truncated_file_is_rejected() {
        let bytes = build_package_bytes(&manifest(), b"", b"");
        let err = read_manifest_bytes_v0(&bytes[..HEADER_SIZE_V0 - 1]).unwrap_err();
        assert!(err.to_string().contains("too small"));
    }

    #[test]
    fn missing_identity_field_is_rejected() {
        let bytes = build_package_bytes(&json!({"package_id": "lib"}), b"", b"");
        let err = read_identity_bytes_v0(&bytes).unwrap_err();
        assert!(err.to_string().contains("missing package_version"));
    }
}
