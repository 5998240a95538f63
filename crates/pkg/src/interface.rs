//! # Package Provider
//!
//! Discovers package files, loads them through the DMIR-PKG v0 container,
//! and exposes the data the workspace needs: which modules exist and what
//! they export. The provider is conservative: duplicate module ids across
//! packages are a hard error, and packages must pass integrity and
//! interface checks before any metadata is trusted.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::container::{manifest_module_ids, read_manifest_v0};
use crate::sign::load_sig_sidecar_v0;
use crate::trust::{verify_package_signatures, TrustPolicy};
use crate::{PkgError, PkgResult};

/// One module of a loaded package: its interface and payload sections.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub interface: Value,
    pub payload: Value,
}

/// A package that passed integrity checks.
#[derive(Debug, Clone)]
pub struct LoadedPackage {
    pub path: PathBuf,
    pub manifest: Value,
    pub modules_by_id: BTreeMap<String, ModuleRecord>,
}

fn invalid(message: impl Into<String>) -> PkgError {
    PkgError::Invalid(message.into())
}

/// Discover package artifacts under package roots.
///
/// Any `*.dmp` file under a root is a package artifact; the returned list
/// is deterministic (sorted, deduplicated).
pub fn discover_package_files(package_roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut out: BTreeSet<PathBuf> = BTreeSet::new();
    for root in package_roots {
        if !root.exists() {
            continue;
        }
        if root.is_file() {
            if root.extension().is_some_and(|e| e == "dmp") {
                out.insert(root.clone());
            }
            continue;
        }
        collect_dmp_files(root, &mut out);
    }
    out.into_iter().collect()
}

fn collect_dmp_files(dir: &Path, out: &mut BTreeSet<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();
    for path in paths {
        if path.is_dir() {
            collect_dmp_files(&path, out);
        } else if path.extension().is_some_and(|e| e == "dmp") {
            out.insert(path);
        }
    }
}

/// Load a package and verify container integrity only.
pub fn load_package_v0(path: &Path) -> PkgResult<LoadedPackage> {
    let manifest = read_manifest_v0(path)?;
    let mut modules_by_id = BTreeMap::new();
    if let Some(modules) = manifest.get("modules").and_then(Value::as_array) {
        for module in modules {
            let Some(module_id) = module.get("module_id").and_then(Value::as_str) else {
                return Err(invalid("module entry missing module_id"));
            };
            let interface = module.get("interface").cloned().unwrap_or(Value::Null);
            let payload = module.get("payload").cloned().unwrap_or(Value::Null);
            if modules_by_id
                .insert(module_id.to_string(), ModuleRecord { interface, payload })
                .is_some()
            {
                return Err(invalid(format!(
                    "module '{module_id}' appears twice in manifest"
                )));
            }
        }
    }
    Ok(LoadedPackage {
        path: path.to_path_buf(),
        manifest,
        modules_by_id,
    })
}

/// Load a package and enforce signature/trust policy plus interface
/// invariants.
pub fn load_package_v0_with_policy(
    path: &Path,
    policy: &TrustPolicy<'_>,
) -> PkgResult<LoadedPackage> {
    let pkg = load_package_v0(path)?;
    let pkg_bytes = std::fs::read(path)?;
    let sidecar_path = PathBuf::from(format!("{}.sig", path.display()));
    let sidecar = if sidecar_path.exists() {
        Some(load_sig_sidecar_v0(&sidecar_path)?)
    } else {
        None
    };
    verify_package_signatures(
        path,
        &pkg_bytes,
        &manifest_module_ids(&pkg.manifest),
        sidecar.as_ref(),
        policy,
    )?;
    validate_package_interfaces(&pkg)?;
    Ok(pkg)
}

/// Validate module interfaces against payload metadata.
///
/// Pinned ABI rule: any exported value must have a payload signature entry
/// with `is_exported_entrypoint == true`, must not be a method, and must
/// not reference private symbols.
pub fn validate_package_interfaces(pkg: &LoadedPackage) -> PkgResult<()> {
    for (mid, module) in &pkg.modules_by_id {
        let Some(interface) = module.interface.as_object() else {
            return Err(invalid(format!("module '{mid}' interface is not a JSON object")));
        };
        if interface.get("format").and_then(Value::as_str) != Some("drift-module-interface") {
            return Err(invalid(format!(
                "module '{mid}' has unsupported interface format"
            )));
        }
        if interface.get("version").and_then(Value::as_i64) != Some(0) {
            return Err(invalid(format!(
                "module '{mid}' has unsupported interface version"
            )));
        }
        if interface.get("module_id").and_then(Value::as_str) != Some(mid.as_str()) {
            return Err(invalid(format!("module '{mid}' interface module_id mismatch")));
        }

        let Some(exports) = interface.get("exports").and_then(Value::as_object) else {
            return Err(invalid(format!("module '{mid}' interface missing exports")));
        };
        let values = string_list(exports.get("values")).ok_or_else(|| {
            invalid(format!(
                "module '{mid}' interface exports.values must be a list of strings"
            ))
        })?;
        let types = string_list(exports.get("types")).ok_or_else(|| {
            invalid(format!(
                "module '{mid}' interface exports.types must be a list of strings"
            ))
        })?;
        if values.iter().collect::<BTreeSet<_>>().len() != values.len() {
            return Err(invalid(format!(
                "module '{mid}' interface exports.values contains duplicates"
            )));
        }
        if types.iter().collect::<BTreeSet<_>>().len() != types.len() {
            return Err(invalid(format!(
                "module '{mid}' interface exports.types contains duplicates"
            )));
        }

        // Payload must agree with interface exports exactly.
        let Some(payload_exports) = module.payload.get("exports").and_then(Value::as_object)
        else {
            return Err(invalid(format!("module '{mid}' payload missing exports")));
        };
        let payload_values = string_list(payload_exports.get("values"));
        let payload_types = string_list(payload_exports.get("types"));
        let (Some(payload_values), Some(payload_types)) = (payload_values, payload_types) else {
            return Err(invalid(format!(
                "module '{mid}' payload exports must include values/types lists"
            )));
        };
        if sorted(&payload_values) != sorted(&values) || sorted(&payload_types) != sorted(&types) {
            return Err(invalid(format!(
                "module '{mid}' interface exports do not match payload exports"
            )));
        }

        let Some(iface_sigs) = interface.get("signatures").and_then(Value::as_object) else {
            return Err(invalid(format!(
                "module '{mid}' interface missing signatures table"
            )));
        };
        let Some(payload_sigs) = module.payload.get("signatures").and_then(Value::as_object)
        else {
            return Err(invalid(format!(
                "module '{mid}' payload missing signatures table"
            )));
        };

        for value in &values {
            let sym = format!("{mid}::{value}");
            if sym.contains("__impl") {
                return Err(invalid(format!(
                    "exported value '{value}' must not reference private symbols"
                )));
            }
            let Some(iface_sd) = iface_sigs.get(&sym) else {
                return Err(invalid(format!(
                    "exported value '{value}' is missing interface signature metadata"
                )));
            };
            let Some(payload_sd) = payload_sigs.get(&sym) else {
                return Err(invalid(format!(
                    "exported value '{value}' is missing payload signature metadata"
                )));
            };
            if !iface_sd.is_object() || !payload_sd.is_object() {
                return Err(invalid(format!(
                    "exported value '{value}' has invalid signature metadata"
                )));
            }
            if iface_sd != payload_sd {
                return Err(invalid(format!(
                    "exported value '{value}' interface signature does not match payload signature"
                )));
            }
            if payload_sd
                .get("is_exported_entrypoint")
                .and_then(Value::as_bool)
                != Some(true)
            {
                return Err(invalid(format!(
                    "exported value '{value}' is missing exported entrypoint signature metadata"
                )));
            }
            if payload_sd.get("is_method").and_then(Value::as_bool) == Some(true) {
                return Err(invalid(format!(
                    "exported value '{value}' must not be a method"
                )));
            }
        }

        // Forbid extra interface signature entries (strict interface).
        let allowed: BTreeSet<String> = values.iter().map(|v| format!("{mid}::{v}")).collect();
        if iface_sigs.keys().any(|k| !allowed.contains(k)) {
            return Err(invalid(format!(
                "module '{mid}' interface contains non-export signature entries"
            )));
        }
    }
    Ok(())
}

/// Collect module export sets from loaded packages. Duplicate module ids
/// across packages are a hard error.
pub fn collect_external_exports(
    packages: &[LoadedPackage],
) -> PkgResult<BTreeMap<String, (BTreeSet<String>, BTreeSet<String>)>> {
    let mut mod_to_pkg: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut out = BTreeMap::new();
    for pkg in packages {
        for (mid, module) in &pkg.modules_by_id {
            match mod_to_pkg.get(mid) {
                None => {
                    mod_to_pkg.insert(mid.clone(), pkg.path.clone());
                }
                Some(prev) if prev != &pkg.path => {
                    return Err(invalid(format!(
                        "module '{mid}' provided by multiple packages: '{}' and '{}'",
                        prev.display(),
                        pkg.path.display()
                    )));
                }
                Some(_) => {}
            }
            let values = module
                .interface
                .get("exports")
                .and_then(|e| string_list(e.get("values")))
                .unwrap_or_default();
            let types = module
                .interface
                .get("exports")
                .and_then(|e| string_list(e.get("types")))
                .unwrap_or_default();
            out.insert(
                mid.clone(),
                (
                    values.into_iter().collect(),
                    types.into_iter().collect(),
                ),
            );
        }
    }
    Ok(out)
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let items = value?.as_array()?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(item.as_str()?.to_string());
    }
    Some(out)
}

fn sorted(items: &[String]) -> Vec<&String> {
    let mut out: Vec<&String> = items.iter().collect();
    out.sort();
    out
}
