//! # Fetch
//!
//! Fetches packages from configured directory sources into a project-local
//! cache:
//!
//! - sources are consulted in (priority, id) order; without a lock, the
//!   lexicographically-lowest (priority, id) source wins per package id
//! - a lockfile, when present, is authoritative: selection is restricted
//!   to its package ids and each id is pinned to its lock-declared source
//! - fetched bytes are verified against the source index SHA-256 and any
//!   lock constraints (including the sidecar SHA when pinned)
//! - the package's manifest identity must agree with the index entry

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::container::read_identity_bytes_v0;
use crate::crypto::sha256_hex;
use crate::fs_util::copy_file_atomic;
use crate::index::{load_index, save_index, upsert_entry, IndexEntry};
use crate::lock::{load_lock, LockEntry, LockFile};
use crate::sources::{load_sources_v0, DirSource};
use crate::{PkgError, PkgResult};

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub sources_path: PathBuf,
    pub cache_dir: PathBuf,
    pub force: bool,
    /// Lockfile path; when the file exists, fetch reproduces it exactly.
    pub lock_path: Option<PathBuf>,
}

struct Candidate<'a> {
    source: &'a DirSource,
    entry: IndexEntry,
}

pub fn fetch_v0(opts: &FetchOptions) -> PkgResult<()> {
    let sources = load_sources_v0(&opts.sources_path)?;
    let sorted = sources.sorted_sources();

    // Candidates per package id, in deterministic source order.
    let mut candidates: BTreeMap<String, Vec<Candidate<'_>>> = BTreeMap::new();
    for &source in &sorted {
        let index_path = source.path.join("index.json");
        let index = load_index(&index_path)?;
        for (package_id, entry) in index.packages {
            if entry.package_version.is_empty()
                || entry.target.is_empty()
                || entry.filename.is_empty()
                || entry.sha256.is_empty()
            {
                return Err(PkgError::Format(format!(
                    "invalid index entry for {package_id} in {}",
                    index_path.display()
                )));
            }
            candidates
                .entry(package_id)
                .or_default()
                .push(Candidate { source, entry });
        }
    }

    let lock = match &opts.lock_path {
        Some(path) if path.exists() => Some(load_lock(path)?),
        _ => None,
    };

    let pkgs_dir = opts.cache_dir.join("pkgs");
    std::fs::create_dir_all(&pkgs_dir)?;
    let cache_index_path = opts.cache_dir.join("index.json");
    let mut cache_index = load_index(&cache_index_path)?;

    match &lock {
        Some(lock) => {
            // The lock restricts selection and pins every id to a source.
            for (package_id, lock_entry) in &lock.packages {
                let pinned = sources.source_by_id(&lock_entry.source_id).ok_or_else(|| {
                    PkgError::Invalid(format!(
                        "lock pins package '{package_id}' to unknown source '{}'",
                        lock_entry.source_id
                    ))
                })?;
                let candidate = candidates
                    .get(package_id)
                    .and_then(|list| list.iter().find(|c| c.source.id == pinned.id))
                    .ok_or_else(|| {
                        PkgError::Invalid(format!(
                            "package '{package_id}' not found in pinned source '{}'",
                            lock_entry.source_id
                        ))
                    })?;
                fetch_one(
                    package_id,
                    candidate,
                    Some(lock_entry),
                    &pkgs_dir,
                    &mut cache_index,
                    opts.force,
                )?;
            }
        }
        None => {
            for (package_id, list) in &candidates {
                // Deterministic winner: the first candidate in source order.
                let candidate = &list[0];
                fetch_one(
                    package_id,
                    candidate,
                    None,
                    &pkgs_dir,
                    &mut cache_index,
                    opts.force,
                )?;
            }
        }
    }

    save_index(&cache_index_path, &cache_index)
}

fn fetch_one(
    package_id: &str,
    candidate: &Candidate<'_>,
    lock_entry: Option<&LockEntry>,
    pkgs_dir: &Path,
    cache_index: &mut crate::index::Index,
    force: bool,
) -> PkgResult<()> {
    let entry = &candidate.entry;
    let repo = &candidate.source.path;

    let src_pkg = repo.join(&entry.filename);
    if !src_pkg.exists() {
        return Err(PkgError::Invalid(format!(
            "missing package file referenced by index: {}",
            src_pkg.display()
        )));
    }

    let dst_pkg = pkgs_dir.join(&entry.filename);
    copy_file_atomic(&src_pkg, &dst_pkg)?;

    // Mirror the sidecar when the repository has one.
    let src_sig = repo.join(format!("{}.sig", entry.filename));
    let dst_sig = pkgs_dir.join(format!("{}.sig", entry.filename));
    if src_sig.exists() {
        copy_file_atomic(&src_sig, &dst_sig)?;
    }

    // Guardrail: fetched bytes must match the index sha256.
    let bytes = std::fs::read(&dst_pkg)?;
    let hex_digest = sha256_hex(&bytes);
    if entry.sha256 != format!("sha256:{hex_digest}") {
        return Err(PkgError::Invalid(format!(
            "sha256 mismatch for fetched package {}",
            dst_pkg.display()
        )));
    }

    // The manifest identity must agree with the index entry.
    let identity = read_identity_bytes_v0(&bytes)?;
    if identity.package_id != package_id
        || identity.package_version != entry.package_version
        || identity.target != entry.target
    {
        return Err(PkgError::Invalid(format!(
            "identity mismatch for package '{package_id}': manifest says \
             ({}, {}, {}), index says ({package_id}, {}, {})",
            identity.package_id,
            identity.package_version,
            identity.target,
            entry.package_version,
            entry.target
        )));
    }

    // Lock constraints are authoritative.
    if let Some(lock_entry) = lock_entry {
        if lock_entry.pkg_sha256 != format!("sha256:{hex_digest}") {
            return Err(PkgError::Invalid(format!(
                "sha256 mismatch against lock for package '{package_id}'"
            )));
        }
        if lock_entry.version != entry.package_version || lock_entry.target != entry.target {
            return Err(PkgError::Invalid(format!(
                "lock identity mismatch for package '{package_id}'"
            )));
        }
        if let Some(locked_sig_sha) = &lock_entry.sig_sha256 {
            if !dst_sig.exists() {
                return Err(PkgError::Invalid(format!(
                    "lock pins a signature for package '{package_id}' but the source has no sidecar"
                )));
            }
            let sig_bytes = std::fs::read(&dst_sig)?;
            if *locked_sig_sha != format!("sha256:{}", sha256_hex(&sig_bytes)) {
                return Err(PkgError::Invalid(format!(
                    "sha256 mismatch for sidecar of package '{package_id}'"
                )));
            }
        }
    }

    upsert_entry(
        cache_index,
        package_id,
        IndexEntry {
            package_version: entry.package_version.clone(),
            target: entry.target.clone(),
            sha256: entry.sha256.clone(),
            filename: entry.filename.clone(),
            signers: entry.signers.clone(),
            unsigned: entry.unsigned,
            source_id: Some(candidate.source.id.clone()),
            path: Some(entry.filename.clone()),
        },
        force,
    )
}
