//! DMIR-PKG emission for compiled modules.

use std::path::Path;

use drift_pkg::container::build_package_bytes;
use drift_pkg::fs_util::write_bytes_atomic;
use drift_pkg::PkgResult;
use serde_json::{json, Value};

use crate::pipeline::CompiledModule;

/// Build the package manifest for a compiled module.
pub fn build_manifest(
    compiled: &CompiledModule,
    package_id: &str,
    package_version: &str,
    target: &str,
) -> Value {
    let signatures: serde_json::Map<String, Value> = compiled
        .export_signatures
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let exports = json!({
        "values": compiled.exports,
        "types": Vec::<String>::new(),
    });
    let interface = json!({
        "format": "drift-module-interface",
        "version": 0,
        "module_id": compiled.name,
        "exports": exports,
        "signatures": signatures,
    });
    let payload = json!({
        "exports": exports,
        "signatures": signatures,
        "private": {},
    });
    json!({
        "package_id": package_id,
        "package_version": package_version,
        "target": target,
        "modules": [{
            "module_id": compiled.name,
            "interface": interface,
            "payload": payload,
        }],
    })
}

/// Write a DMIR-PKG container for a compiled module. The compiled LLVM IR
/// travels as the payload blob.
pub fn emit_package(
    compiled: &CompiledModule,
    package_id: &str,
    package_version: &str,
    target: &str,
    out_path: &Path,
) -> PkgResult<()> {
    let manifest = build_manifest(compiled, package_id, package_version, target);
    let bytes = build_package_bytes(&manifest, b"", compiled.llvm_ir.as_bytes());
    write_bytes_atomic(out_path, &bytes)
}
