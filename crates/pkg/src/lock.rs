//! # Lockfile (`drift-lock` v0)
//!
//! The authoritative pin from `package_id` to exact
//! `(version, target, sha256, source_id, path)`. When present, `fetch`
//! reproduces it exactly. Placeholder source ids never silently re-enable
//! heuristic source selection.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::canonical_json::to_canonical_bytes;
use crate::fs_util::write_bytes_atomic;
use crate::{PkgError, PkgResult};

pub const LOCK_FORMAT: &str = "drift-lock";
pub const LOCK_VERSION: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
    pub version: String,
    pub target: String,
    /// `sha256:<hex>` of the package bytes.
    pub pkg_sha256: String,
    /// `sha256:<hex>` of the sidecar bytes, when signed.
    #[serde(default)]
    pub sig_sha256: Option<String>,
    #[serde(default)]
    pub sig_kids: Vec<String>,
    #[serde(default)]
    pub modules: Vec<String>,
    /// Pinned source id; must be concrete.
    pub source_id: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFile {
    pub format: String,
    pub version: u32,
    pub packages: BTreeMap<String, LockEntry>,
}

impl Default for LockFile {
    fn default() -> Self {
        Self {
            format: LOCK_FORMAT.to_string(),
            version: LOCK_VERSION,
            packages: BTreeMap::new(),
        }
    }
}

/// Placeholder source ids left by legacy tooling.
fn is_placeholder_source_id(source_id: &str) -> bool {
    source_id.is_empty() || source_id == "unknown"
}

pub fn load_lock(path: &Path) -> PkgResult<LockFile> {
    let text = std::fs::read_to_string(path)?;
    let lock: LockFile = serde_json::from_str(text.trim_end_matches('\n'))?;
    if lock.format != LOCK_FORMAT || lock.version != LOCK_VERSION {
        return Err(PkgError::Format(
            "unsupported lockfile format/version".to_string(),
        ));
    }
    for (package_id, entry) in &lock.packages {
        if is_placeholder_source_id(&entry.source_id) {
            return Err(PkgError::Format(format!(
                "missing source_id for package '{package_id}' in lockfile"
            )));
        }
    }
    Ok(lock)
}

pub fn save_lock(path: &Path, lock: &LockFile) -> PkgResult<()> {
    for (package_id, entry) in &lock.packages {
        if is_placeholder_source_id(&entry.source_id) {
            return Err(PkgError::Invalid(format!(
                "missing source_id for package '{package_id}' in lockfile"
            )));
        }
    }
    write_bytes_atomic(path, &to_canonical_bytes(lock)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(source_id: &str) -> LockEntry {
        LockEntry {
            version: "0.1.0".to_string(),
            target: "test-target".to_string(),
            pkg_sha256: "sha256:aa".to_string(),
            sig_sha256: None,
            sig_kids: vec![],
            modules: vec!["lib".to_string()],
            source_id: source_id.to_string(),
            path: "lib-0.1.0-test-target.dmp".to_string(),
        }
    }

    #[test]
    fn round_trip_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drift.lock.json");
        let mut lock = LockFile::default();
        lock.packages.insert("lib".to_string(), entry("repo"));
        save_lock(&path, &lock).unwrap();
        assert_eq!(load_lock(&path).unwrap(), lock);
    }

    #[test]
    fn placeholder_source_id_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drift.lock.json");
        let mut lock = LockFile::default();
        lock.packages.insert("lib".to_string(), entry("unknown"));
        // Bypass save-side validation to simulate a legacy file.
        let bytes = to_canonical_bytes(&lock).unwrap();
        std::fs::write(&path, bytes).unwrap();
        let err = load_lock(&path).unwrap_err();
        assert!(err.to_string().contains("missing source_id"));
    }

    #[test]
    fn empty_source_id_is_rejected_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut lock = LockFile::default();
        lock.packages.insert("lib".to_string(), entry(""));
        let err = save_lock(&dir.path().join("drift.lock.json"), &lock).unwrap_err();
        assert!(err.to_string().contains("missing source_id"));
    }
}
