//! `driftc`, the Drift ahead-of-time compiler.
//!
//! Consumes the parser's AST interchange document and lowers it through
//! HIR → MIR → SSA → LLVM IR, optionally emitting a DMIR-PKG artifact.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use drift_compiler::{compile_module, emit_package, CompileError};
use drift_compiler_hir::ast;
use drift_pkg::interface::{discover_package_files, load_package_v0};

#[derive(Parser)]
#[command(
    name = "driftc",
    version,
    about = "Drift ahead-of-time compiler (AST → HIR → MIR → SSA → LLVM)"
)]
struct Cli {
    /// Input AST interchange file produced by the parser
    input: PathBuf,

    /// Module roots to search for dependency packages (*.dmp)
    #[arg(short = 'M', long = "module-root")]
    module_roots: Vec<PathBuf>,

    /// Package id for --emit-package
    #[arg(long)]
    package_id: Option<String>,

    /// Package version for --emit-package
    #[arg(long)]
    package_version: Option<String>,

    /// Package target for --emit-package
    #[arg(long)]
    package_target: Option<String>,

    /// Write a DMIR-PKG artifact to this path
    #[arg(long)]
    emit_package: Option<PathBuf>,

    /// Write the textual LLVM IR to this path
    #[arg(long)]
    emit_llvm: Option<PathBuf>,

    /// Entry function name
    #[arg(long, default_value = "drift_main")]
    entry: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("cannot read {}", cli.input.display()))?;
    let module: ast::Module = serde_json::from_str(&text)
        .with_context(|| format!("invalid AST document {}", cli.input.display()))?;

    // Load dependency packages early so malformed artifacts fail fast.
    let package_files = discover_package_files(&cli.module_roots);
    for path in &package_files {
        load_package_v0(path)
            .map_err(|err| anyhow::anyhow!("{err}"))
            .with_context(|| format!("bad dependency package {}", path.display()))?;
    }
    tracing::debug!(count = package_files.len(), "dependency packages loaded");

    let file_path = cli.input.display().to_string();
    let compiled = match compile_module(&module, &file_path) {
        Ok(compiled) => compiled,
        Err(CompileError::Diagnostics(diagnostics)) => {
            for diagnostic in diagnostics.iter() {
                eprintln!("{diagnostic}");
            }
            bail!("{} diagnostics emitted", diagnostics.len());
        }
        Err(err) => return Err(err.into()),
    };

    if !compiled.fn_infos.contains_key(&cli.entry) {
        tracing::warn!(entry = %cli.entry, "entry function not found in module");
    }

    if let Some(path) = &cli.emit_llvm {
        std::fs::write(path, compiled.llvm_ir.as_bytes())
            .with_context(|| format!("cannot write {}", path.display()))?;
    }

    if let Some(out_path) = &cli.emit_package {
        let (Some(package_id), Some(package_version), Some(target)) = (
            cli.package_id.as_deref(),
            cli.package_version.as_deref(),
            cli.package_target.as_deref(),
        ) else {
            bail!("--emit-package requires --package-id, --package-version and --package-target");
        };
        emit_package(&compiled, package_id, package_version, target, out_path)
            .map_err(|err| anyhow::anyhow!("{err}"))?;
    }

    Ok(())
}
