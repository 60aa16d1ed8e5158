//! nftkit - typed nftables rulesets from the command line
//!
//! # Usage
//!
//! ```bash
//! nftkit decode ruleset.json             # Render wire JSON as nft text
//! nftkit normalize ruleset.json          # Re-encode wire JSON canonically
//! nftkit diff old.json new.json          # Diff two rulesets as nft text
//! nftkit export --save                   # Dump the running ruleset, keep a snapshot
//! nftkit check ruleset.json              # nft --check without committing
//! nftkit apply ruleset.json --replace    # Flush and load in one transaction
//! nftkit restore <snapshot>              # Load a saved snapshot
//! nftkit snapshots                       # List saved snapshots
//! nftkit config --elevate-with sudo      # Persist settings
//! nftkit audit -n 20                     # Show recent audited operations
//! ```

use clap::{Parser, Subcommand};
use nftkit::core::encode::encode_json_pretty;
use nftkit::core::error::NftablesErrorPattern;
use nftkit::core::nft_json::{list_snapshots, load_snapshot, save_snapshot};
use nftkit::{Error, Ruleset, audit, config, utils};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

shadow_rs::shadow!(build);

const LONG_VERSION: &str = shadow_rs::formatcp!(
    "{} (commit {}, built {})",
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME
);

#[derive(Parser)]
#[command(name = "nftkit")]
#[command(about = "Decode, render and apply nftables JSON rulesets", long_about = None)]
#[command(version = build::PKG_VERSION, long_version = LONG_VERSION)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a wire JSON ruleset as nft rule text
    Decode {
        /// File holding `nft -j list ruleset` output
        file: PathBuf,
    },
    /// Decode and re-encode a ruleset as pretty JSON
    Normalize { file: PathBuf },
    /// Show the differences between two rulesets as nft text
    Diff { old: PathBuf, new: PathBuf },
    /// Print the running ruleset as JSON
    Export {
        /// Also store it as a snapshot in the state directory
        #[arg(short, long)]
        save: bool,
    },
    /// Verify a ruleset with `nft --check` without applying it
    Check { file: PathBuf },
    /// Apply a ruleset to the kernel
    Apply {
        file: PathBuf,
        /// Flush the running ruleset first, in the same transaction
        #[arg(short, long)]
        replace: bool,
    },
    /// Replace the running ruleset with a saved snapshot
    Restore { snapshot: PathBuf },
    /// List saved snapshots, newest first
    Snapshots,
    /// Show or change persistent settings
    Config {
        /// nft binary to run
        #[arg(long)]
        nft_command: Option<String>,
        /// Privilege helper for non-root users (sudo, run0, doas)
        #[arg(long)]
        elevate_with: Option<String>,
    },
    /// Show recent audited operations
    Audit {
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _ = utils::ensure_dirs();
    init_logging(cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to create Tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(handle_cli(cli.command)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            if let Some(Error::Nftables { message, .. }) = e.downcast_ref::<Error>() {
                print_hints(message);
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let log_file = utils::get_state_dir()
        .and_then(|dir| std::fs::File::create(dir.join("nftkit.log")).ok());
    match log_file {
        Some(file) => tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init(),
        None => tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .init(),
    }
}

fn print_hints(message: &str) {
    let translation = NftablesErrorPattern::match_error(message);
    eprintln!("{}", translation.user_message);
    for suggestion in &translation.suggestions {
        eprintln!("  - {suggestion}");
    }
    if let Some(url) = &translation.help_url {
        eprintln!("  See {url}");
    }
}

async fn read_ruleset(path: &Path) -> Result<Ruleset, Box<dyn std::error::Error>> {
    let bytes = tokio::fs::read(path).await?;
    Ok(Ruleset::from_json(&bytes)?)
}

fn snapshot_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    utils::get_state_dir().ok_or_else(|| "state directory not found".into())
}

async fn handle_cli(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_config().await;

    match command {
        Commands::Decode { file } => {
            let ruleset = read_ruleset(&file).await?;
            print!("{}", ruleset.to_nft_text());
        }
        Commands::Normalize { file } => {
            let ruleset = read_ruleset(&file).await?;
            println!("{}", String::from_utf8(encode_json_pretty(&ruleset)?)?);
        }
        Commands::Diff { old, new } => {
            let old = read_ruleset(&old).await?.to_nft_text();
            let new = read_ruleset(&new).await?.to_nft_text();
            let diff = similar::TextDiff::from_lines(&old, &new);
            for change in diff.iter_all_changes() {
                let sign = match change.tag() {
                    similar::ChangeTag::Delete => "-",
                    similar::ChangeTag::Insert => "+",
                    similar::ChangeTag::Equal => " ",
                };
                print!("{sign}{change}");
            }
        }
        Commands::Export { save } => {
            let snapshot = config.backend().export().await?;
            if save {
                let path = save_snapshot(&snapshot_dir()?, &snapshot, config.max_snapshots)?;
                audit::log_snapshot(&path, &nftkit::core::nft_json::compute_checksum(&snapshot))
                    .await;
                eprintln!("Saved snapshot {}", path.display());
            }
            println!("{}", String::from_utf8_lossy(&snapshot));
        }
        Commands::Check { file } => {
            let ruleset = read_ruleset(&file).await?;
            let result = config.backend().check(&ruleset).await?;
            for warning in &result.warnings {
                eprintln!("warning: {warning}");
            }
            audit::log_check(
                result.success,
                result.errors.len(),
                result.errors.first().cloned(),
            )
            .await;
            if !result.success {
                return Err(format!("Verification failed:\n{}", result.errors.join("\n")).into());
            }
            println!("Ruleset is valid");
        }
        Commands::Apply { file, replace } => {
            let ruleset = read_ruleset(&file).await?;
            let backend = config.backend();

            if config.check_before_apply {
                let result = backend.check(&ruleset).await?;
                if !result.success {
                    return Err(
                        format!("Verification failed:\n{}", result.errors.join("\n")).into(),
                    );
                }
            }

            if !nix::unistd::getuid().is_root() && config.elevate_with.is_none() {
                eprintln!("Note: not running as root and no --elevate-with configured");
            }

            if config.snapshot_before_apply {
                let snapshot = backend.export().await?;
                let path = save_snapshot(&snapshot_dir()?, &snapshot, config.max_snapshots)?;
                audit::log_snapshot(&path, &nftkit::core::nft_json::compute_checksum(&snapshot))
                    .await;
                println!("Previous ruleset saved to {}", path.display());
            }

            let checksum = ruleset.checksum()?;
            let result = if replace {
                backend.replace(&ruleset).await
            } else {
                backend.apply(&ruleset).await
            };
            audit::log_apply(
                replace,
                ruleset.rules.len(),
                &checksum,
                result.is_ok(),
                result.as_ref().err().map(ToString::to_string),
            )
            .await;
            result?;
            println!("Applied {} rules ({checksum})", ruleset.rules.len());
        }
        Commands::Restore { snapshot } => {
            let bytes = load_snapshot(&snapshot)?;
            let result = config.backend().restore(&bytes).await;
            audit::log_restore(
                &snapshot,
                result.is_ok(),
                result.as_ref().err().map(ToString::to_string),
            )
            .await;
            result?;
            println!("Restored {}", snapshot.display());
        }
        Commands::Snapshots => {
            let dir = snapshot_dir()?;
            let snapshots = if dir.exists() {
                list_snapshots(&dir)?
            } else {
                Vec::new()
            };
            if snapshots.is_empty() {
                println!("No snapshots in {}", dir.display());
            }
            for path in snapshots {
                println!("{}", path.display());
            }
        }
        Commands::Config {
            nft_command,
            elevate_with,
        } => {
            if nft_command.is_none() && elevate_with.is_none() {
                println!("{}", serde_json::to_string_pretty(&config)?);
                return Ok(());
            }
            let mut config = config;
            if nft_command.is_some() {
                config.nft_command = nft_command;
            }
            if elevate_with.is_some() {
                config.elevate_with = elevate_with;
            }
            config::save_config(&config).await?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Audit { count } => {
            let log = audit::AuditLog::new()?;
            if !log.path().exists() {
                println!("No audited operations yet");
                return Ok(());
            }
            for event in log.read_recent(count).await? {
                let status = if event.success { "ok" } else { "failed" };
                println!(
                    "{}  {:<18} {:<6} {}",
                    event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    serde_json::to_value(event.event_type)?
                        .as_str()
                        .unwrap_or_default(),
                    status,
                    event
                        .error
                        .as_deref()
                        .map_or_else(|| event.details.to_string(), |e| utils::truncate_string(e, 80))
                );
            }
        }
    }
    Ok(())
}
