//! `drift`: package tooling (signing, trust, publishing, fetching,
//! vendoring).
//!
//! Every subcommand is deterministic given the same inputs. Exit codes:
//! 0 success, 1 user error, 2 usage error (from argument parsing).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use drift_pkg::{
    fetch_v0, keygen_ed25519_seed, publish_packages_v0, sign_package_v0, vendor_v0,
    FetchOptions, KeygenOptions, PublishOptions, SignOptions, TrustStore, VendorOptions,
};

#[derive(Parser)]
#[command(
    name = "drift",
    version,
    about = "Drift tooling (package signing, publishing, fetching, vendoring)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign a DMIR-PKG package (.dmp) by writing a .dmp.sig sidecar
    Sign(SignArgs),
    /// Generate an Ed25519 private seed key file (base64)
    Keygen(KeygenArgs),
    /// Trust-store management (project-local)
    Trust(TrustArgs),
    /// Publish package(s) to a local directory repository (index.json)
    Publish(PublishArgs),
    /// Fetch packages from local sources into a project cache
    Fetch(FetchArgs),
    /// Vendor cached packages and write a lockfile
    Vendor(VendorArgs),
}

#[derive(Args)]
struct SignArgs {
    /// Path to pkg.dmp
    package: PathBuf,
    /// Path to base64-encoded Ed25519 private seed (32 bytes)
    #[arg(long)]
    key: PathBuf,
    /// Output sidecar path (default: <pkg>.sig)
    #[arg(long)]
    out: Option<PathBuf>,
    /// Append a signature to an existing sidecar
    #[arg(long)]
    add_signature: bool,
    /// Include the public key bytes in the sidecar
    #[arg(long)]
    include_pubkey: bool,
}

#[derive(Args)]
struct KeygenArgs {
    /// Output path for the key seed file
    #[arg(long)]
    out: PathBuf,
    /// Print the public key (base64) to stdout
    #[arg(long)]
    print_pubkey: bool,
    /// Print the kid to stdout
    #[arg(long)]
    print_kid: bool,
}

#[derive(Args)]
struct TrustArgs {
    #[command(subcommand)]
    command: TrustCommand,
}

#[derive(Subcommand)]
enum TrustCommand {
    /// List keys, namespaces, and revocations in a trust store
    List {
        #[arg(long, default_value = "drift/trust.json")]
        trust_store: PathBuf,
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a trusted signing key and allow it for a namespace
    AddKey {
        #[arg(long, default_value = "drift/trust.json")]
        trust_store: PathBuf,
        /// Module namespace (e.g. acme.*)
        #[arg(long)]
        namespace: String,
        /// Base64-encoded Ed25519 public key (32 bytes)
        #[arg(long)]
        pubkey: String,
        /// Key id (kid); derived from pubkey if omitted
        #[arg(long)]
        kid: Option<String>,
    },
    /// Revoke a trusted signing key id (kid)
    Revoke {
        #[arg(long, default_value = "drift/trust.json")]
        trust_store: PathBuf,
        #[arg(long)]
        kid: String,
        /// Optional revocation reason
        #[arg(long)]
        reason: Option<String>,
    },
}

#[derive(Args)]
struct PublishArgs {
    /// Destination directory (repository root)
    #[arg(long)]
    dest_dir: PathBuf,
    /// One or more pkg.dmp files to publish
    #[arg(required = true)]
    packages: Vec<PathBuf>,
    /// Replace existing entry/files for the same package_id
    #[arg(long)]
    force: bool,
    /// Allow publishing unsigned packages (no .sig sidecar)
    #[arg(long)]
    allow_unsigned: bool,
}

#[derive(Args)]
struct FetchArgs {
    /// Path to drift-sources.json
    #[arg(long)]
    sources: PathBuf,
    /// Cache directory
    #[arg(long, default_value = "cache/driftpm")]
    cache_dir: PathBuf,
    /// Replace conflicting entries in the cache index
    #[arg(long)]
    force: bool,
    /// Lockfile path; if it exists, fetch reproduces it exactly
    #[arg(long, default_value = "drift.lock.json")]
    lock: PathBuf,
}

#[derive(Args)]
struct VendorArgs {
    /// Cache directory
    #[arg(long, default_value = "cache/driftpm")]
    cache_dir: PathBuf,
    /// Vendored package directory
    #[arg(long, default_value = "vendor/driftpkgs")]
    dest_dir: PathBuf,
    /// Lockfile output path
    #[arg(long, default_value = "drift.lock.json")]
    lock: PathBuf,
    /// Restrict vendoring to specific package_id (repeatable)
    #[arg(long = "package-id")]
    package_ids: Vec<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Sign(args) => {
            let out = args
                .out
                .unwrap_or_else(|| PathBuf::from(format!("{}.sig", args.package.display())));
            sign_package_v0(&SignOptions {
                package_path: args.package,
                key_seed_path: args.key,
                out_path: out,
                add_signature: args.add_signature,
                include_pubkey: args.include_pubkey,
            })?;
            Ok(())
        }
        Command::Keygen(args) => {
            let generated = keygen_ed25519_seed(&KeygenOptions {
                out_path: args.out,
                print_pubkey: args.print_pubkey,
                print_kid: args.print_kid,
            })?;
            if args.print_pubkey {
                println!("{}", generated.pubkey_b64);
            }
            if args.print_kid {
                println!("{}", generated.kid);
            }
            Ok(())
        }
        Command::Trust(args) => run_trust(args.command),
        Command::Publish(args) => {
            publish_packages_v0(&PublishOptions {
                dest_dir: args.dest_dir,
                package_paths: args.packages,
                force: args.force,
                allow_unsigned: args.allow_unsigned,
            })?;
            Ok(())
        }
        Command::Fetch(args) => {
            fetch_v0(&FetchOptions {
                sources_path: args.sources,
                cache_dir: args.cache_dir,
                force: args.force,
                lock_path: Some(args.lock),
            })?;
            Ok(())
        }
        Command::Vendor(args) => {
            vendor_v0(&VendorOptions {
                cache_dir: args.cache_dir,
                dest_dir: args.dest_dir,
                lock_path: args.lock,
                package_ids: if args.package_ids.is_empty() {
                    None
                } else {
                    Some(args.package_ids)
                },
            })?;
            Ok(())
        }
    }
}

fn run_trust(command: TrustCommand) -> anyhow::Result<()> {
    match command {
        TrustCommand::List { trust_store, json } => {
            let store = TrustStore::load_or_init(&trust_store)?;
            let value = serde_json::to_value(&store)?;
            if json {
                println!("{}", serde_json::to_string(&value)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            Ok(())
        }
        TrustCommand::AddKey {
            trust_store,
            namespace,
            pubkey,
            kid,
        } => {
            let mut store = TrustStore::load_or_init(&trust_store)?;
            let kid = store.add_key(&namespace, &pubkey, kid.as_deref())?;
            store.save(&trust_store)?;
            tracing::info!(%kid, %namespace, "key added to trust store");
            Ok(())
        }
        TrustCommand::Revoke {
            trust_store,
            kid,
            reason,
        } => {
            let mut store = TrustStore::load_or_init(&trust_store)?;
            store.revoke(&kid, reason.as_deref());
            store.save(&trust_store)?;
            Ok(())
        }
    }
}
