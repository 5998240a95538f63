//! # Vendor
//!
//! Copies cached packages into a project tree for CI/offline use and
//! writes a lockfile computed from the *actual vendored bytes*: package
//! SHA, sidecar SHA, signer kids, the manifest's module list, and the
//! cache-recorded source provenance.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::container::{manifest_module_ids, read_identity_bytes_v0};
use crate::crypto::sha256_hex;
use crate::fs_util::copy_file_atomic;
use crate::index::load_index;
use crate::lock::{save_lock, LockEntry, LockFile};
use crate::sign::load_sig_sidecar_v0;
use crate::{PkgError, PkgResult};

#[derive(Debug, Clone)]
pub struct VendorOptions {
    pub cache_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub lock_path: PathBuf,
    /// Restrict vendoring to specific package ids; `None` vendors all.
    pub package_ids: Option<Vec<String>>,
}

pub fn vendor_v0(opts: &VendorOptions) -> PkgResult<()> {
    let index_path = opts.cache_dir.join("index.json");
    let index = load_index(&index_path)?;

    let selected: BTreeSet<&str> = opts
        .package_ids
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(String::as_str)
        .collect();

    std::fs::create_dir_all(&opts.dest_dir)?;
    let mut lock = LockFile::default();

    for (package_id, entry) in &index.packages {
        if !selected.is_empty() && !selected.contains(package_id.as_str()) {
            continue;
        }
        let source_id = entry
            .source_id
            .clone()
            .filter(|s| !s.is_empty() && s != "unknown")
            .ok_or_else(|| {
                PkgError::Invalid(format!(
                    "cache entry for '{package_id}' lacks a concrete source_id"
                ))
            })?;

        let src_pkg = opts.cache_dir.join("pkgs").join(&entry.filename);
        if !src_pkg.exists() {
            return Err(PkgError::Invalid(format!(
                "missing cached package file: {}",
                src_pkg.display()
            )));
        }

        let dst_pkg = opts.dest_dir.join(&entry.filename);
        copy_file_atomic(&src_pkg, &dst_pkg)?;

        let src_sig = opts
            .cache_dir
            .join("pkgs")
            .join(format!("{}.sig", entry.filename));
        let dst_sig = opts.dest_dir.join(format!("{}.sig", entry.filename));
        let (sig_sha256, sig_kids) = if src_sig.exists() {
            copy_file_atomic(&src_sig, &dst_sig)?;
            let sig_bytes = std::fs::read(&dst_sig)?;
            let sidecar = load_sig_sidecar_v0(&dst_sig)?;
            (
                Some(format!("sha256:{}", sha256_hex(&sig_bytes))),
                sidecar.signer_kids(),
            )
        } else {
            (None, Vec::new())
        };

        // The lock records the vendored bytes, not the cache's claims.
        let bytes = std::fs::read(&dst_pkg)?;
        let identity = read_identity_bytes_v0(&bytes)?;
        lock.packages.insert(
            package_id.clone(),
            LockEntry {
                version: identity.package_version.clone(),
                target: identity.target.clone(),
                pkg_sha256: format!("sha256:{}", sha256_hex(&bytes)),
                sig_sha256,
                sig_kids,
                modules: manifest_module_ids(&identity.manifest),
                source_id,
                path: entry.filename.clone(),
            },
        );
    }

    if !selected.is_empty() {
        let missing: Vec<&str> = selected
            .iter()
            .filter(|id| !index.packages.contains_key(**id))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(PkgError::Invalid(format!(
                "requested package ids not found in cache index: {}",
                missing.join(", ")
            )));
        }
    }

    save_lock(&opts.lock_path, &lock)
}
