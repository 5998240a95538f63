//! # Repository Index (`drift-index` v0)
//!
//! A deliberately tiny, deterministic JSON index used by `drift publish`
//! and `drift fetch`. It is not a registry protocol; it is a local/offline
//! format for directory-based repositories.
//!
//! Pinned rule: a repository contains at most one version per package_id.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::canonical_json::to_canonical_bytes;
use crate::fs_util::write_bytes_atomic;
use crate::{PkgError, PkgResult};

pub const INDEX_FORMAT: &str = "drift-index";
pub const INDEX_VERSION: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub package_version: String,
    pub target: String,
    /// `sha256:<hex>` of the package bytes.
    pub sha256: String,
    pub filename: String,
    #[serde(default)]
    pub signers: Vec<String>,
    #[serde(default)]
    pub unsigned: bool,
    /// Provenance: which source repository provided this entry. The
    /// lockfile pins it for reproducibility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub format: String,
    pub version: u32,
    pub packages: BTreeMap<String, IndexEntry>,
}

impl Default for Index {
    fn default() -> Self {
        Self {
            format: INDEX_FORMAT.to_string(),
            version: INDEX_VERSION,
            packages: BTreeMap::new(),
        }
    }
}

pub fn load_index(path: &Path) -> PkgResult<Index> {
    if !path.exists() {
        return Ok(Index::default());
    }
    let text = std::fs::read_to_string(path)?;
    let index: Index = serde_json::from_str(text.trim_end_matches('\n'))?;
    if index.format != INDEX_FORMAT || index.version != INDEX_VERSION {
        return Err(PkgError::Format(
            "unsupported index format/version".to_string(),
        ));
    }
    Ok(index)
}

pub fn save_index(path: &Path, index: &Index) -> PkgResult<()> {
    write_bytes_atomic(path, &to_canonical_bytes(index)?)
}

/// Insert or replace an entry. Without `force`, a differing
/// (version, target, sha256) for an existing package_id is rejected.
pub fn upsert_entry(
    index: &mut Index,
    package_id: &str,
    entry: IndexEntry,
    force: bool,
) -> PkgResult<()> {
    if let Some(existing) = index.packages.get(package_id) {
        if !force {
            if existing.package_version != entry.package_version
                || existing.target != entry.target
            {
                return Err(PkgError::Invalid(format!(
                    "package_id '{package_id}' already published as {} for {} (use --force to replace)",
                    existing.package_version, existing.target
                )));
            }
            if !existing.sha256.is_empty() && existing.sha256 != entry.sha256 {
                return Err(PkgError::Invalid(format!(
                    "package_id '{package_id}' already published with different sha256 (use --force to replace)"
                )));
            }
        }
    }
    let mut entry = entry;
    entry.signers.sort();
    entry.signers.dedup();
    index.packages.insert(package_id.to_string(), entry);
    Ok(())
}
