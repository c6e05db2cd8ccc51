/*============================================================
  Synavera Project: Syn-Repo
  Module: synrepo_core::main
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Entry point for Syn-Repo Core. Checks mirror sync state,
    rescans repository catalogs and maintains outdated flags
    and git metadata in the catalog store.

  Security / Safety Notes:
    Operates within user privileges. Performs HTTP HEAD/GET
    requests and local reads only; writes are confined to the
    configured database and log directory.

  Dependencies:
    clap for CLI parsing, chrono for timestamps, serde_json for
    summaries.

  Operational Scope:
    Invoked by cron or operators to refresh the repository web
    front-end's backing store.

  Revision History:
    2026-09-14 COD  Authored Syn-Repo Core runtime.
    2026-09-18 COD  Flag and git subcommands.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Result-first error handling with deterministic exits
    - Structured logging following Synavera cadence
    - Configurable execution via CLI and config file
============================================================*/

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;

use synrepo_core::package::Flag;
use synrepo_core::store::SqliteStore;
use synrepo_core::transport::HttpTransport;
use synrepo_core::{Logger, Result, SynrepoConfig, SynrepoError, UpdateContext};

/// Command-line arguments for Syn-Repo-Core.
#[derive(Debug, Parser)]
#[command(
    name = "Syn-Repo-Core",
    version,
    author = "Synavera Systems",
    about = "Mirror sync checker and repository catalog keeper"
)]
struct Cli {
    /// Override configuration file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Explicit log file path.
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,
    /// Enable verbose logging to stderr.
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
    /// Compute and report without writing to the store.
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Probe every mirror and record which repositories are in sync.
    UpdateMirrors,
    /// Rescan repository archives and reconcile the package catalog.
    UpdateRepos {
        /// Limit the scan to these repositories.
        #[arg(value_name = "REPO")]
        repositories: Vec<String>,
    },
    /// Run mirror and catalog updates together and commit once.
    UpdateAll,
    /// Manage outdated flags.
    #[command(subcommand)]
    Flag(FlagCommand),
    /// Link a package name to the git location declared in its package file.
    ResolveGit {
        #[arg(long, value_name = "REPO")]
        repo: String,
        #[arg(long, value_name = "NAME")]
        name: String,
    },
}

#[derive(Debug, Subcommand)]
enum FlagCommand {
    /// Flag one package version as outdated.
    Add {
        #[arg(long, value_name = "REPO")]
        repo: String,
        #[arg(long, value_name = "NAME")]
        name: String,
        #[arg(long = "version", value_name = "VERSION")]
        pkg_version: String,
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "TEXT", default_value = "")]
        comment: String,
    },
    /// Delete flags by id.
    Remove {
        #[arg(value_name = "ID", required = true)]
        ids: Vec<i64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("[Syn-Repo-Core] {}", err);
            err.exit_code()
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = SynrepoConfig::load_from_optional_path(cli.config.as_deref())?;

    let session_stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let log_path = cli
        .log
        .clone()
        .or_else(|| Some(config.log_dir().join(format!("core_{session_stamp}.log"))));
    let logger = Arc::new(Logger::new(log_path, cli.verbose)?);
    logger.info("INIT", "Syn-Repo Core awakening.");

    let database = config.database_path();
    let store = SqliteStore::open(&database)?;
    logger.debug("STORE", format!("Using database {}", database.display()));

    let transport = HttpTransport::new(&config.mirror)?;
    let client = transport.client().clone();
    let mut context = UpdateContext::new(config, Arc::new(transport), client, logger.clone(), store)
        .with_dry_run(cli.dry_run);
    if cli.dry_run {
        logger.info("DRYRUN", "Store writes disabled for this session");
    }

    match cli.command {
        Command::UpdateMirrors => print_json(&context.update_mirrors().await?)?,
        Command::UpdateRepos { repositories } => {
            print_json(&context.update_catalog(&repositories).await?)?
        }
        Command::UpdateAll => print_json(&context.update_all().await?)?,
        Command::Flag(FlagCommand::Add {
            repo,
            name,
            pkg_version,
            email,
            comment,
        }) => {
            if cli.dry_run {
                return Err(SynrepoError::Config("flag add cannot run as a dry run".into()));
            }
            let flag = context.add_flag(Flag::new(repo, name, pkg_version, email, comment))?;
            print_json(&FlagReport {
                id: flag.id,
                repository: &flag.repository,
                name: &flag.name,
                version: &flag.version,
            })?;
        }
        Command::Flag(FlagCommand::Remove { ids }) => {
            if cli.dry_run {
                return Err(SynrepoError::Config("flag remove cannot run as a dry run".into()));
            }
            let removed = context.remove_flags(&ids)?;
            print_json(&serde_json::json!({ "flags_removed": removed }))?;
        }
        Command::ResolveGit { repo, name } => {
            if cli.dry_run {
                return Err(SynrepoError::Config("resolve-git cannot run as a dry run".into()));
            }
            let (git, linked) = context.resolve_git(&repo, &name).await?;
            print_json(&serde_json::json!({
                "name": git.name,
                "repository": git.repository,
                "folder": git.folder,
                "linked_packages": linked,
            }))?;
        }
    }

    if logger.warning_count() > 0 {
        logger.info(
            "SUMMARY",
            format!("Completed with {} warning(s)", logger.warning_count()),
        );
    }
    logger.info("COMPLETE", "Catalog state settled.");
    logger.finalize()?;

    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
struct FlagReport<'a> {
    id: Option<i64>,
    repository: &'a str,
    name: &'a str,
    version: &'a str,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| SynrepoError::Serialization(format!("Failed to render summary: {err}")))?;
    println!("{rendered}");
    Ok(())
}
