//! ckb-mcp: MCP server for the CKB code-intelligence backend.
//!
//! Usage:
//!   ckb-mcp                          # serve the current directory
//!   ckb-mcp --repo <path>            # serve one repository
//!   ckb-mcp --registry <file>        # multi-repo mode over a registry
//!   ckb-mcp repos add <name> <path>  # manage the registry

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;

use ckb_mcp::config::loader::load_config;
use ckb_mcp::config::{PresetName, ServerConfig};
use ckb_mcp::engine::{EngineProvider, EnginePool, LocalOpener, LocalRepoEngine, SingleEngine};
use ckb_mcp::error::{Result, ServerError};
use ckb_mcp::mcp::catalog::Catalog;
use ckb_mcp::mcp::McpServer;
use ckb_mcp::observability::init_logging;
use ckb_mcp::workspace::{validate_state, RepoRegistry};

#[derive(Parser)]
#[command(name = "ckb-mcp")]
#[command(about = "MCP server exposing CKB code intelligence over stdio")]
#[command(version)]
struct Cli {
    /// Initial tool preset (core, review, refactor, federation, docs, ops, full)
    #[arg(long)]
    preset: Option<String>,

    /// Repository to serve (default: current directory)
    #[arg(long, conflicts_with = "registry")]
    repo: Option<PathBuf>,

    /// Repository registry file; enables multi-repo mode
    #[arg(long)]
    registry: Option<PathBuf>,

    /// Extra config file, applied over global and project config
    #[arg(long)]
    config: Option<PathBuf>,

    /// tools/list page size
    #[arg(long)]
    page_size: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the repository registry
    Repos {
        #[command(subcommand)]
        action: RepoAction,
    },
}

#[derive(Subcommand)]
enum RepoAction {
    /// List registered repositories and their state
    List,
    /// Register a repository
    Add { name: String, path: PathBuf },
    /// Unregister a repository
    Remove { name: String },
    /// Set (or clear, with no name) the default repository
    Default { name: Option<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let project_root = match &cli.repo {
        Some(repo) => repo.clone(),
        None => std::env::current_dir()?,
    };
    let mut config = load_config(cli.config.as_deref(), Some(project_root.as_path()))?;
    apply_cli_overrides(&mut config, &cli)?;

    if let Some(Commands::Repos { action }) = cli.command {
        return run_repos(&config, action);
    }

    let provider = build_provider(&config, &project_root)?;
    let server = McpServer::new(config, Catalog::builtin(), provider);

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    let result = tokio::select! {
        r = server.serve(stdin, stdout) => r,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            Ok(())
        }
    };

    server.shutdown();
    result
}

fn apply_cli_overrides(config: &mut ServerConfig, cli: &Cli) -> Result<()> {
    if let Some(raw) = &cli.preset {
        config.preset = PresetName::from_str_loose(raw).ok_or_else(|| {
            ServerError::Config(format!(
                "unknown preset '{raw}' (valid: {})",
                PresetName::valid_names()
            ))
        })?;
    }
    if let Some(size) = cli.page_size {
        config.page_size = size;
    }
    if let Some(registry) = &cli.registry {
        config.repos_file = Some(registry.clone());
    }
    Ok(())
}

fn build_provider(config: &ServerConfig, project_root: &Path) -> Result<Arc<dyn EngineProvider>> {
    if config.repos_file.is_some() {
        let capacity = config.effective_max_engines();
        tracing::info!(capacity, "multi-repo mode");
        return Ok(Arc::new(EnginePool::new(Arc::new(LocalOpener), capacity)));
    }

    let root = project_root
        .canonicalize()
        .unwrap_or_else(|_| project_root.to_path_buf());
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "default".to_string());
    tracing::info!(repo = %root.display(), "single-repo mode");
    let engine = LocalRepoEngine::open(&root)?;
    Ok(Arc::new(SingleEngine::new(Arc::new(engine), name)))
}

fn run_repos(config: &ServerConfig, action: RepoAction) -> Result<()> {
    let file = config
        .repos_file
        .as_deref()
        .ok_or_else(|| ServerError::Config("--registry <file> is required for repos commands".into()))?;
    let mut registry = RepoRegistry::load(file)?;

    match action {
        RepoAction::List => {
            for entry in registry.list() {
                let path = registry.resolve(entry);
                let marker = if registry.default_name() == Some(entry.name.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{marker} {:<20} {:<14} {}",
                    entry.name,
                    validate_state(&path).as_str(),
                    path.display()
                );
            }
            return Ok(());
        }
        RepoAction::Add { name, path } => registry.add_repo(&name, &path)?,
        RepoAction::Remove { name } => registry.remove_repo(&name)?,
        RepoAction::Default { name } => registry.set_default(name.as_deref())?,
    }
    registry.save()
}
