//! `borg`: brain maintenance tools and a line-in chat front-end.
//!
//! Examples:
//!   borg brain list
//!   borg brain upgrade                 # brains/archive.borg -> brains/current.borg.json
//!   borg brain stats current
//!   borg brain doctor
//!   borg brain backup current
//!   borg linein                        # chat with the local brain
//!   borg linein --multiplex            # chat through a running borgd
//!
//! Brains live under the platform data directory; override it with `--data-dir`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use borg::commands::{self, Outcome};
use borg::legacy;
use borg::prelude::*;
use borg::snapshot;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, Level};

#[derive(Parser, Debug)]
#[command(name = "borg", version)]
#[command(about = "Self-learning chat brain: maintenance tools and line-in chat")]
struct Args {
    /// Log debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(long, global = true, conflicts_with = "debug")]
    silent: bool,

    /// Data directory (defaults to the platform data directory)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Brain file tools
    Brain {
        #[command(subcommand)]
        action: BrainAction,
    },
    /// Read lines from stdin, learn them and print replies
    Linein {
        /// Talk to a shared brain through borgd
        #[arg(long)]
        multiplex: bool,

        /// Gateway address (implies --multiplex)
        #[arg(long)]
        server: Option<String>,
    },
    /// Print version and platform
    Version,
}

#[derive(Subcommand, Debug)]
enum BrainAction {
    /// List brain files
    List,
    /// Copy a brain to a dated backup file
    Backup {
        #[arg(default_value = "current")]
        target: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Copy a legacy archive into the brains directory
    Import {
        archive: PathBuf,
        /// Name to store it under (defaults to the file name)
        #[arg(long)]
        tag: Option<String>,
    },
    /// Convert a legacy archive to the current JSON format
    Upgrade {
        #[arg(default_value = "archive.borg")]
        target: String,
        /// Output file (defaults to the current brain)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite an existing output file
        #[arg(long)]
        force: bool,
    },
    /// Print word, context and line counts as JSON
    Stats {
        #[arg(default_value = "current")]
        target: String,
    },
    /// Check a brain for consistency problems
    Doctor {
        #[arg(default_value = "current")]
        target: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let level = if args.debug {
        Level::DEBUG
    } else if args.silent {
        Level::WARN
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let paths = match &args.data_dir {
        Some(dir) => AppPaths::at(dir),
        None => AppPaths::new(),
    }
    .context("failed to prepare the data directory")?;

    match args.command {
        Command::Brain { action } => brain_tool(&paths, action),
        Command::Linein { multiplex, server } => {
            linein(&paths, multiplex, server).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Version => {
            println!(
                "borg {} ({}/{})",
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS,
                std::env::consts::ARCH
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn brain_tool(paths: &AppPaths, action: BrainAction) -> Result<ExitCode> {
    match action {
        BrainAction::List => list(paths)?,
        BrainAction::Backup { target, output } => {
            let src = existing_brain(paths, &target)?;
            let dest = output.unwrap_or_else(|| backup_name(paths, &src));
            if dest.exists() {
                bail!("refusing to overwrite {}", dest.display());
            }
            std::fs::copy(&src, &dest)
                .with_context(|| format!("failed to copy {} to {}", src.display(), dest.display()))?;
            info!("Backed up {:?} to {:?}", src, dest);
            println!("{}", dest.display());
        }
        BrainAction::Import { archive, tag } => {
            if !legacy::is_legacy_archive(&archive)
                .with_context(|| format!("failed to open {}", archive.display()))?
            {
                bail!("{} is not a legacy brain archive", archive.display());
            }
            // Decode it once so a damaged archive is rejected here rather than at upgrade.
            legacy::load_brain_legacy(&archive)?;
            let name = match tag {
                Some(tag) => format!("{tag}.borg"),
                None => archive
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .context("archive path has no file name")?,
            };
            let dest = paths.brains_dir().join(name);
            if dest.exists() {
                bail!("{} already exists", dest.display());
            }
            std::fs::copy(&archive, &dest)?;
            info!("Imported {:?} as {:?}", archive, dest);
        }
        BrainAction::Upgrade {
            target,
            output,
            force,
        } => {
            let src = existing_brain(paths, &target)?;
            let dest = output.unwrap_or_else(|| paths.current_brain());
            if dest.exists() && !force {
                bail!("{} exists; pass --force to replace it", dest.display());
            }
            let report = legacy::upgrade(&src, &dest)?;
            println!(
                "{} words, {} contexts, {} lines -> {}",
                report.words,
                report.contexts,
                report.lines,
                dest.display()
            );
            let r = report.repairs;
            if r.decoded_keys + r.latin1_fallbacks + r.merged_keys > 0 {
                println!(
                    "repaired {} byte-string keys ({} as latin-1), merged {}",
                    r.decoded_keys, r.latin1_fallbacks, r.merged_keys
                );
            }
        }
        BrainAction::Stats { target } => {
            let path = existing_brain(paths, &target)?;
            let stats = brain_stats(&path)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        BrainAction::Doctor { target } => {
            let path = existing_brain(paths, &target)?;
            return doctor(&path);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn existing_brain(paths: &AppPaths, target: &str) -> Result<PathBuf> {
    let path = paths.resolve_brain(target);
    if !path.exists() {
        bail!("no brain at {}", path.display());
    }
    Ok(path)
}

fn backup_name(paths: &AppPaths, src: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y-%m-%d-%H%M%S");
    let name = src
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "brain".to_string());
    paths.brains_dir().join(format!("backup-{stamp}-{name}"))
}

fn list(paths: &AppPaths) -> Result<()> {
    let current = paths.current_brain();
    let mut entries = std::fs::read_dir(paths.brains_dir())?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .collect::<Vec<_>>();
    entries.sort_by_key(|e| e.file_name());

    if entries.is_empty() {
        println!("no brains in {}", paths.brains_dir().display());
    }
    for entry in entries {
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let mark = if entry.path() == current { "*" } else { " " };
        println!(
            "{mark} {:<40} {:>10}",
            entry.file_name().to_string_lossy(),
            human_size(size)
        );
    }
    Ok(())
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

fn brain_stats(path: &Path) -> Result<BrainStats> {
    let snap = if legacy::is_legacy_archive(path)? {
        legacy::load_brain_legacy(path)?.into_snapshot()
    } else {
        snapshot::load_brain_json(path)?
    };
    Ok(Brain::from_snapshot(snap, BrainConfig::default())?.stats())
}

fn doctor(path: &Path) -> Result<ExitCode> {
    let snap = if legacy::is_legacy_archive(path)? {
        let brain = legacy::load_brain_legacy(path)?;
        let r = brain.repairs;
        println!(
            "legacy archive: {} byte-string keys ({} latin-1), {} merged",
            r.decoded_keys, r.latin1_fallbacks, r.merged_keys
        );
        brain.into_snapshot()
    } else {
        snapshot::load_brain_json(path)?
    };

    if let Err(e) = snap.validate() {
        println!("invalid: {e}");
        return Ok(ExitCode::FAILURE);
    }
    let brain = match Brain::from_snapshot(snap, BrainConfig::default()) {
        Ok(brain) => brain,
        Err(e) => {
            println!("unloadable: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let audit = brain.audit();
    println!("words               {}", audit.words);
    println!("contexts            {}", audit.contexts);
    println!("references          {}", audit.references);
    println!("orphaned references {}", audit.orphaned_references);
    println!("missing backrefs    {}", audit.missing_backrefs);
    println!("unnormalized keys   {}", audit.unnormalized_keys);
    println!("duplicate contexts  {}", audit.duplicate_contexts);
    println!("counters match      {}", audit.counters_match);

    if audit.is_healthy() {
        println!("ok");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("damaged");
        Ok(ExitCode::FAILURE)
    }
}

async fn linein(paths: &AppPaths, multiplex: bool, server: Option<String>) -> Result<()> {
    let mut cfg = ClientConfig::load(&paths.client_config_file())?;
    cfg.multiplex |= multiplex;
    if let Some(server) = server {
        cfg.multiplex = true;
        cfg.multiplex_server = server;
    }

    let client = match cfg.connect(paths).await {
        Ok(client) => client,
        Err(ClientError::Transport(e)) => {
            error!("Connection to borg gateway failed: {}", e);
            bail!("is borgd running at {}?", cfg.multiplex_server);
        }
        Err(e) => return Err(e.into()),
    };

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match handle_line(client.as_ref(), line).await {
            Ok(Some(Outcome::Say(text))) => {
                stdout.write_all(text.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
            Ok(Some(Outcome::Quit)) => break,
            Ok(None) => {}
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => error!("{}", e),
        }
    }

    if !cfg.multiplex {
        client.save_all().await?;
    }
    Ok(())
}

/// Commands go to the registry; anything else is answered, then learned.
async fn handle_line(client: &dyn BrainClient, line: &str) -> Result<Option<Outcome>, ClientError> {
    if line.starts_with(commands::PREFIX) {
        return match commands::parse(line) {
            Some(cmd) => commands::run(cmd, client).await.map(Some),
            None => Ok(Some(Outcome::Say(format!(
                "unknown command, try {}help",
                commands::PREFIX
            )))),
        };
    }
    let reply = client.reply(line).await?;
    client.learn(line).await?;
    Ok(reply.map(Outcome::Say))
}
