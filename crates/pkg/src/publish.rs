//! # Publish
//!
//! Copies packages into a directory "repository" under deterministic
//! filenames and updates the repository `index.json`. Offline operation;
//! one version per package_id.

use std::path::PathBuf;

use crate::container::read_identity_v0;
use crate::crypto::sha256_hex;
use crate::fs_util::copy_file_atomic;
use crate::index::{load_index, save_index, upsert_entry, IndexEntry};
use crate::sign::load_sig_sidecar_v0;
use crate::{PkgError, PkgResult};

#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub dest_dir: PathBuf,
    pub package_paths: Vec<PathBuf>,
    pub force: bool,
    pub allow_unsigned: bool,
}

/// Publish one or more packages into a directory repository.
pub fn publish_packages_v0(opts: &PublishOptions) -> PkgResult<()> {
    if opts.package_paths.is_empty() {
        return Err(PkgError::Invalid("no packages provided".to_string()));
    }

    std::fs::create_dir_all(&opts.dest_dir)?;
    let index_path = opts.dest_dir.join("index.json");
    let mut index = load_index(&index_path)?;

    for pkg_path in &opts.package_paths {
        if !pkg_path.exists() {
            return Err(PkgError::Invalid(format!(
                "package not found: {}",
                pkg_path.display()
            )));
        }

        let identity = read_identity_v0(pkg_path)?;
        let pkg_bytes = std::fs::read(pkg_path)?;
        let pkg_sha = format!("sha256:{}", sha256_hex(&pkg_bytes));

        let sidecar_path = PathBuf::from(format!("{}.sig", pkg_path.display()));
        let (signers, unsigned) = if sidecar_path.exists() {
            let sidecar = load_sig_sidecar_v0(&sidecar_path)?;
            (sidecar.signer_kids(), false)
        } else {
            if !opts.allow_unsigned {
                return Err(PkgError::Invalid(format!(
                    "missing sidecar for package (use --allow-unsigned): {}",
                    pkg_path.display()
                )));
            }
            (Vec::new(), true)
        };

        // Deterministic filename in the repository.
        let base_name = format!(
            "{}-{}-{}.dmp",
            identity.package_id, identity.package_version, identity.target
        );
        let out_pkg = opts.dest_dir.join(&base_name);
        copy_file_atomic(pkg_path, &out_pkg)?;
        if sidecar_path.exists() {
            copy_file_atomic(&sidecar_path, &opts.dest_dir.join(format!("{base_name}.sig")))?;
        }

        upsert_entry(
            &mut index,
            &identity.package_id,
            IndexEntry {
                package_version: identity.package_version.clone(),
                target: identity.target.clone(),
                sha256: pkg_sha,
                filename: base_name,
                signers,
                unsigned,
                source_id: None,
                path: None,
            },
            opts.force,
        )?;
    }

    save_index(&index_path, &index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::build_package_bytes;
    use serde_json::json;

    fn write_pkg(dir: &std::path::Path, name: &str, version: &str) -> PathBuf {
        let manifest = json!({
            "package_id": "lib",
            "package_version": version,
            "target": "test-target",
            "modules": [{"module_id": "lib"}],
        });
        let path = dir.join(name);
        std::fs::write(&path, build_package_bytes(&manifest, b"", b"")).unwrap();
        path
    }

    #[test]
    fn publish_writes_deterministic_filename_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = write_pkg(dir.path(), "lib.dmp", "0.1.0");
        let repo = dir.path().join("repo");

        publish_packages_v0(&PublishOptions {
            dest_dir: repo.clone(),
            package_paths: vec![pkg],
            force: false,
            allow_unsigned: true,
        })
        .unwrap();

        assert!(repo.join("lib-0.1.0-test-target.dmp").exists());
        let index = load_index(&repo.join("index.json")).unwrap();
        let entry = &index.packages["lib"];
        assert_eq!(entry.package_version, "0.1.0");
        assert!(entry.unsigned);
        assert!(entry.sha256.starts_with("sha256:"));
    }

    #[test]
    fn unsigned_publish_requires_allow_unsigned() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = write_pkg(dir.path(), "lib.dmp", "0.1.0");
        let err = publish_packages_v0(&PublishOptions {
            dest_dir: dir.path().join("repo"),
            package_paths: vec![pkg],
            force: false,
            allow_unsigned: false,
        })
        .unwrap_err();
        assert!(err.to_string().contains("--allow-unsigned"));
    }

    #[test]
    fn republishing_different_version_requires_force() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        let v1 = write_pkg(dir.path(), "lib1.dmp", "0.1.0");
        let v2 = write_pkg(dir.path(), "lib2.dmp", "0.2.0");

        publish_packages_v0(&PublishOptions {
            dest_dir: repo.clone(),
            package_paths: vec![v1],
            force: false,
            allow_unsigned: true,
        })
        .unwrap();

        let err = publish_packages_v0(&PublishOptions {
            dest_dir: repo.clone(),
            package_paths: vec![v2.clone()],
            force: false,
            allow_unsigned: true,
        })
        .unwrap_err();
        assert!(err.to_string().contains("use --force"));

        publish_packages_v0(&PublishOptions {
            dest_dir: repo,
            package_paths: vec![v2],
            force: true,
            allow_unsigned: true,
        })
        .unwrap();
    }
}
