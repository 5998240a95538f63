//! End-to-end package workflow tests: sign → publish → fetch → vendor,
//! lock reproduction, tamper rejection, and deterministic source
//! selection.

use std::path::{Path, PathBuf};

use drift_pkg::canonical_json::to_canonical_bytes;
use drift_pkg::container::build_package_bytes;
use drift_pkg::crypto::{b64_encode, sha256_hex};
use drift_pkg::lock::{load_lock, LockEntry, LockFile};
use drift_pkg::{
    fetch_v0, load_index, publish_packages_v0, sign_package_v0, vendor_v0, FetchOptions,
    PublishOptions, SignOptions, VendorOptions,
};
use serde_json::json;

fn build_lib_pkg(dir: &Path, file_name: &str, payload: &[u8]) -> PathBuf {
    let manifest = json!({
        "package_id": "lib",
        "package_version": "0.0.0",
        "target": "test-target",
        "modules": [{
            "module_id": "lib",
            "interface": {
                "format": "drift-module-interface",
                "version": 0,
                "module_id": "lib",
                "exports": {"values": ["add"], "types": []},
                "signatures": {
                    "lib::add": {
                        "params": ["Int", "Int"],
                        "returns": "Int",
                        "is_exported_entrypoint": true,
                        "is_method": false,
                    }
                },
            },
            "payload": {
                "exports": {"values": ["add"], "types": []},
                "signatures": {
                    "lib::add": {
                        "params": ["Int", "Int"],
                        "returns": "Int",
                        "is_exported_entrypoint": true,
                        "is_method": false,
                    }
                },
            },
        }],
    });
    let path = dir.join(file_name);
    std::fs::write(&path, build_package_bytes(&manifest, b"", payload)).unwrap();
    path
}

fn write_sources(path: &Path, entries: &[(&str, i64, &Path)]) {
    let sources: Vec<_> = entries
        .iter()
        .map(|(id, priority, dir)| {
            json!({"kind": "dir", "id": id, "priority": priority, "path": dir})
        })
        .collect();
    std::fs::write(
        path,
        json!({"format": "drift-sources", "version": 0, "sources": sources}).to_string(),
    )
    .unwrap();
}

#[test]
fn publish_fetch_vendor_round_trip_reproduces_locked_bytes() {
    let tmp = tempfile::tempdir().unwrap();
    let pkg = build_lib_pkg(tmp.path(), "lib.dmp", b"return a + b");

    // Sign it (publisher role).
    let seed = [42u8; 32];
    let key_seed = tmp.path().join("key.seed");
    std::fs::write(&key_seed, format!("{}\n", b64_encode(&seed))).unwrap();
    sign_package_v0(&SignOptions {
        package_path: pkg.clone(),
        key_seed_path: key_seed,
        out_path: PathBuf::from(format!("{}.sig", pkg.display())),
        add_signature: false,
        include_pubkey: true,
    })
    .unwrap();

    // Publish to a local directory repository.
    let repo = tmp.path().join("repo");
    publish_packages_v0(&PublishOptions {
        dest_dir: repo.clone(),
        package_paths: vec![pkg],
        force: false,
        allow_unsigned: false,
    })
    .unwrap();
    let repo_index = load_index(&repo.join("index.json")).unwrap();
    assert!(repo_index.packages.contains_key("lib"));
    assert!(!repo_index.packages["lib"].signers.is_empty());

    // Fetch into a project-local cache.
    let sources = tmp.path().join("drift-sources.json");
    write_sources(&sources, &[("repo", 0, &repo)]);
    let cache = tmp.path().join("cache").join("driftpm");
    fetch_v0(&FetchOptions {
        sources_path: sources.clone(),
        cache_dir: cache.clone(),
        force: false,
        lock_path: None,
    })
    .unwrap();
    assert!(cache.join("index.json").exists());

    // Vendor from cache and write a lockfile.
    let vendor_dir = tmp.path().join("vendor").join("driftpkgs");
    let lock_path = tmp.path().join("drift.lock.json");
    vendor_v0(&VendorOptions {
        cache_dir: cache.clone(),
        dest_dir: vendor_dir.clone(),
        lock_path: lock_path.clone(),
        package_ids: None,
    })
    .unwrap();

    let lock = load_lock(&lock_path).unwrap();
    let entry = &lock.packages["lib"];
    assert!(entry.pkg_sha256.starts_with("sha256:"));
    assert_eq!(entry.modules, vec!["lib"]);
    assert_eq!(entry.source_id, "repo");
    assert!(entry.sig_sha256.is_some());

    // The lock records exactly the vendored bytes.
    let vendored = std::fs::read(vendor_dir.join(&entry.path)).unwrap();
    assert_eq!(entry.pkg_sha256, format!("sha256:{}", sha256_hex(&vendored)));

    // Lock is authoritative: delete the cache and reproduce exactly.
    std::fs::remove_dir_all(&cache).unwrap();
    fetch_v0(&FetchOptions {
        sources_path: sources,
        cache_dir: cache.clone(),
        force: false,
        lock_path: Some(lock_path),
    })
    .unwrap();
    let rebuilt: Vec<_> = std::fs::read_dir(cache.join("pkgs"))
        .unwrap()
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|e| e == "dmp"))
        .collect();
    assert_eq!(rebuilt.len(), 1);
    let pkg_bytes = std::fs::read(&rebuilt[0]).unwrap();
    assert_eq!(entry.pkg_sha256, format!("sha256:{}", sha256_hex(&pkg_bytes)));
}

#[test]
fn fetch_selects_deterministically_across_sources() {
    let tmp = tempfile::tempdir().unwrap();

    // Two packages with the same identity but different contents.
    let pkg_a = build_lib_pkg(tmp.path(), "lib_a.dmp", b"return a + b");
    let pkg_b = build_lib_pkg(tmp.path(), "lib_b.dmp", b"return a + b + 1");
    let bytes_a = std::fs::read(&pkg_a).unwrap();
    let sha_a = sha256_hex(&bytes_a);
    let sha_b = sha256_hex(&std::fs::read(&pkg_b).unwrap());
    assert_ne!(sha_a, sha_b);

    let repo_a = tmp.path().join("repo_a");
    let repo_b = tmp.path().join("repo_b");
    publish_packages_v0(&PublishOptions {
        dest_dir: repo_a.clone(),
        package_paths: vec![pkg_a],
        force: false,
        allow_unsigned: true,
    })
    .unwrap();
    publish_packages_v0(&PublishOptions {
        dest_dir: repo_b.clone(),
        package_paths: vec![pkg_b],
        force: false,
        allow_unsigned: true,
    })
    .unwrap();

    // Sources listed in the opposite order from the deterministic winner;
    // equal priority, so the tie-break is the source id.
    let sources = tmp.path().join("drift-sources.json");
    write_sources(&sources, &[("b", 0, &repo_b), ("a", 0, &repo_a)]);

    let cache = tmp.path().join("cache").join("driftpm");
    fetch_v0(&FetchOptions {
        sources_path: sources,
        cache_dir: cache.clone(),
        force: false,
        lock_path: None,
    })
    .unwrap();

    // The cache must contain repo_a's bytes (source id "a" wins).
    let got = std::fs::read(cache.join("pkgs").join("lib-0.0.0-test-target.dmp")).unwrap();
    assert_eq!(sha256_hex(&got), sha_a);
    assert_eq!(got, bytes_a);

    let cache_index = load_index(&cache.join("index.json")).unwrap();
    assert_eq!(cache_index.packages["lib"].source_id.as_deref(), Some("a"));
}

#[test]
fn fetch_rejects_sha_mismatch_between_index_and_bytes() {
    let tmp = tempfile::tempdir().unwrap();
    let pkg = build_lib_pkg(tmp.path(), "lib.dmp", b"return a + b");
    let repo = tmp.path().join("repo");
    publish_packages_v0(&PublishOptions {
        dest_dir: repo.clone(),
        package_paths: vec![pkg],
        force: false,
        allow_unsigned: true,
    })
    .unwrap();

    // Corrupt the bytes after publishing without updating the index.
    let repo_pkg = repo.join("lib-0.0.0-test-target.dmp");
    let mut data = std::fs::read(&repo_pkg).unwrap();
    let last = data.len() - 1;
    data[last] ^= 0xFF;
    std::fs::write(&repo_pkg, data).unwrap();

    let sources = tmp.path().join("drift-sources.json");
    write_sources(&sources, &[("repo", 0, &repo)]);
    let err = fetch_v0(&FetchOptions {
        sources_path: sources,
        cache_dir: tmp.path().join("cache").join("driftpm"),
        force: false,
        lock_path: None,
    })
    .unwrap_err();
    assert!(err.to_string().contains("sha256 mismatch"));
}

#[test]
fn fetch_rejects_identity_mismatch_in_index() {
    let tmp = tempfile::tempdir().unwrap();
    // Build a package claiming version 0.0.1; the index will claim 0.0.0.
    let manifest = json!({
        "package_id": "lib",
        "package_version": "0.0.1",
        "target": "test-target",
        "modules": [{"module_id": "lib"}],
    });
    let repo = tmp.path().join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    let pkg_bytes = build_package_bytes(&manifest, b"", b"");
    std::fs::write(repo.join("lib-0.0.0-test-target.dmp"), &pkg_bytes).unwrap();

    let index = json!({
        "format": "drift-index",
        "version": 0,
        "packages": {
            "lib": {
                "package_version": "0.0.0",
                "target": "test-target",
                "sha256": format!("sha256:{}", sha256_hex(&pkg_bytes)),
                "filename": "lib-0.0.0-test-target.dmp",
                "signers": [],
                "unsigned": true,
            }
        },
    });
    std::fs::write(repo.join("index.json"), index.to_string()).unwrap();

    let sources = tmp.path().join("drift-sources.json");
    write_sources(&sources, &[("repo", 0, &repo)]);
    let err = fetch_v0(&FetchOptions {
        sources_path: sources,
        cache_dir: tmp.path().join("cache").join("driftpm"),
        force: false,
        lock_path: None,
    })
    .unwrap_err();
    assert!(err.to_string().contains("identity mismatch"));
}

#[test]
fn fetch_rejects_malformed_index_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = tmp.path().join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    std::fs::write(
        repo.join("index.json"),
        json!({
            "format": "drift-index",
            "version": 0,
            "packages": {"lib": {
                "package_version": "",
                "target": "",
                "sha256": "",
                "filename": "x",
            }},
        })
        .to_string(),
    )
    .unwrap();

    let sources = tmp.path().join("drift-sources.json");
    write_sources(&sources, &[("repo", 0, &repo)]);
    let err = fetch_v0(&FetchOptions {
        sources_path: sources,
        cache_dir: tmp.path().join("cache").join("driftpm"),
        force: false,
        lock_path: None,
    })
    .unwrap_err();
    assert!(err.to_string().contains("invalid index entry"));
}

#[test]
fn fetch_rejects_lock_with_placeholder_source_id() {
    let tmp = tempfile::tempdir().unwrap();
    let pkg_a = build_lib_pkg(tmp.path(), "lib_a.dmp", b"return a + b");
    let pkg_b = build_lib_pkg(tmp.path(), "lib_b.dmp", b"return a + b + 1");

    let repo_a = tmp.path().join("repo_a");
    let repo_b = tmp.path().join("repo_b");
    publish_packages_v0(&PublishOptions {
        dest_dir: repo_a.clone(),
        package_paths: vec![pkg_a.clone()],
        force: false,
        allow_unsigned: true,
    })
    .unwrap();
    publish_packages_v0(&PublishOptions {
        dest_dir: repo_b.clone(),
        package_paths: vec![pkg_b],
        force: false,
        allow_unsigned: true,
    })
    .unwrap();

    let sources = tmp.path().join("drift-sources.json");
    write_sources(&sources, &[("a", 0, &repo_a), ("b", 0, &repo_b)]);

    // A legacy/broken lockfile with a placeholder source id must not
    // silently re-enable heuristic selection.
    let mut lock = LockFile::default();
    lock.packages.insert(
        "lib".to_string(),
        LockEntry {
            version: "0.0.0".to_string(),
            target: "test-target".to_string(),
            pkg_sha256: format!("sha256:{}", sha256_hex(&std::fs::read(&pkg_a).unwrap())),
            sig_sha256: None,
            sig_kids: vec![],
            modules: vec!["lib".to_string()],
            source_id: "unknown".to_string(),
            path: "lib-0.0.0-test-target.dmp".to_string(),
        },
    );
    let lock_path = tmp.path().join("drift.lock.json");
    std::fs::write(&lock_path, to_canonical_bytes(&lock).unwrap()).unwrap();

    let err = fetch_v0(&FetchOptions {
        sources_path: sources,
        cache_dir: tmp.path().join("cache").join("driftpm"),
        force: false,
        lock_path: Some(lock_path),
    })
    .unwrap_err();
    assert!(err.to_string().contains("missing source_id"));
}

#[test]
fn vendor_rejects_cache_entries_without_source_id() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = tmp.path().join("cache").join("driftpm");
    std::fs::create_dir_all(cache.join("pkgs")).unwrap();
    std::fs::write(
        cache.join("index.json"),
        json!({
            "format": "drift-index",
            "version": 0,
            "packages": {"lib": {
                "package_version": "0.0.0",
                "target": "test-target",
                "sha256": "sha256:aa",
                "filename": "lib-0.0.0-test-target.dmp",
                "signers": [],
                "unsigned": true,
            }},
        })
        .to_string(),
    )
    .unwrap();

    let err = vendor_v0(&VendorOptions {
        cache_dir: cache,
        dest_dir: tmp.path().join("vendor"),
        lock_path: tmp.path().join("drift.lock.json"),
        package_ids: None,
    })
    .unwrap_err();
    assert!(err.to_string().contains("lacks a concrete source_id"));
}
