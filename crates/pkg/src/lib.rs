//! # Drift Package Toolchain
//!
//! The DMIR-PKG container plus the trust, signing, indexing, locking and
//! reproducible-vendoring workflow behind the `drift` tool:
//!
//! - [`canonical_json`]: the deterministic JSON encoding every document
//!   (index, lock, sidecar, sources, trust store) is written in
//! - [`container`]: the DMIR-PKG v0 binary container
//! - [`interface`]: package discovery and interface/payload invariants
//! - [`crypto`]: SHA-256 content addressing and raw-seed Ed25519
//! - [`sign`] / [`keygen`]: signature sidecars and key generation
//! - [`trust`]: the namespace allow-list trust store
//! - [`index`] / [`sources`] / [`lock`]: repository metadata formats
//! - [`publish`] / [`fetch`] / [`vendor`]: the offline workflows
//!
//! All outputs are written create-then-rename so failed runs never leave
//! partial files behind.

pub mod canonical_json;
pub mod container;
pub mod crypto;
pub mod fetch;
pub mod fs_util;
pub mod index;
pub mod interface;
pub mod keygen;
pub mod lock;
pub mod publish;
pub mod sign;
pub mod sources;
pub mod trust;
pub mod vendor;

use thiserror::Error;

pub use canonical_json::canonical_json_bytes;
pub use container::{
    build_package_bytes, read_identity_v0, read_manifest_v0, PackageIdentity, HEADER_SIZE_V0,
    MAGIC, VERSION,
};
pub use fetch::{fetch_v0, FetchOptions};
pub use index::{load_index, save_index, upsert_entry, Index, IndexEntry};
pub use keygen::{keygen_ed25519_seed, KeygenOptions};
pub use lock::{load_lock, save_lock, LockEntry, LockFile};
pub use publish::{publish_packages_v0, PublishOptions};
pub use sign::{load_sig_sidecar_v0, sign_package_v0, SigEntry, SigSidecar, SignOptions};
pub use sources::{load_sources_v0, DirSource, SourcesV0};
pub use trust::{verify_package_signatures, TrustPolicy, TrustStore};
pub use vendor::{vendor_v0, VendorOptions};

/// Errors across the package toolchain. Workflows never leave partial
/// output behind when returning one of these.
#[derive(Debug, Error)]
pub enum PkgError {
    /// Malformed container or metadata document.
    #[error("{0}")]
    Format(String),
    /// Signature or trust policy failure.
    #[error("{0}")]
    Trust(String),
    /// Invalid workflow input or state.
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type PkgResult<T> = Result<T, PkgError>;
