use clap::Parser;
use colored::*;
use eyre::{Context, Result, bail, eyre};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use cli::render;
use itdept::config::{Config, ModelSlot};
use itdept::domain::{AgentRole, RunState};
use itdept::driver::{CancelSignal, Driver};
use itdept::id::generate_session_id;
use itdept::llm::LlmFactory;
use itdept::store::{Checkpointer, SessionStore};
use itdept::supervisor::Supervisor;
use itdept::workers::WorkerRegistry;

fn setup_logging(level: Option<&str>, verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("itdept")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("itdept.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let mut builder = env_logger::Builder::from_default_env();
    if verbose {
        builder.parse_filters("debug");
    } else if let Some(level) = level {
        builder.parse_filters(level);
    }
    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(config.log_level.as_deref(), cli.is_verbose()).context("Failed to setup logging")?;

    info!("Starting itdept with config from: {:?}", cli.config);

    run_application(&cli, &config).await.context("Application failed")
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run {
            task,
            repo,
            session,
            hitl,
            interrupt_before,
            json,
        } => {
            let interrupts = resolve_interrupts(*hitl, interrupt_before, config)?;
            handle_run_command(task, repo.as_deref(), session.as_deref(), interrupts, *json, config).await
        }
        Commands::Resume {
            session,
            approve: _,
            feedback,
            hitl,
            json,
        } => {
            let interrupts = resolve_interrupts(*hitl, &[], config)?;
            handle_resume_command(session, feedback.as_deref(), interrupts, *json, config).await
        }
        Commands::Status { session } => handle_status_command(session, config),
        Commands::History { session } => handle_history_command(session, config),
        Commands::Sessions => handle_sessions_command(config),
        Commands::Models => handle_models_command(config),
    }
}

/// Roles to pause before; `--interrupt-before` implies HITL
fn resolve_interrupts(hitl: bool, names: &[String], config: &Config) -> Result<Vec<AgentRole>> {
    if !names.is_empty() {
        return names
            .iter()
            .map(|name| name.parse::<AgentRole>().map_err(|e| eyre!("{}", e)))
            .collect();
    }
    if hitl {
        return Ok(config.hitl.interrupt_before.clone());
    }
    Ok(Vec::new())
}

fn resolve_repo(repo: Option<&Path>, config: &Config) -> Result<PathBuf> {
    let repo = match repo.map(Path::to_path_buf).or_else(|| config.repo_path.clone()) {
        Some(path) => path,
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let repo = repo
        .canonicalize()
        .context(format!("Repository not found: {}", repo.display()))?;
    if !repo.is_dir() {
        bail!("Repository is not a directory: {}", repo.display());
    }
    Ok(repo)
}

fn build_driver(config: &Config, interrupts: Vec<AgentRole>, cancel: CancelSignal) -> Result<Driver> {
    let factory = LlmFactory::new(config.llm.clone());
    let supervisor_llm = factory
        .client_for(ModelSlot::Supervisor)
        .context("Failed to create supervisor LLM client")?;
    let supervisor = Supervisor::new(supervisor_llm, config.supervisor.clone(), AgentRole::ALL.to_vec());
    let workers = WorkerRegistry::standard(&factory, &config.workers, config.llm.max_tokens)
        .context("Failed to create worker LLM clients")?;
    let store = SessionStore::open(&config.storage.dir)?;

    info!(
        "Driver ready: provider={:?} workers={} interrupts={:?}",
        factory.provider(),
        workers.len(),
        interrupts
    );

    Ok(Driver::new(supervisor, workers, Arc::new(store))
        .with_signals(Arc::new(cancel))
        .with_interrupts(interrupts))
}

/// Trip the cancel flag on Ctrl-C; the driver stops at the next step boundary
fn watch_ctrl_c(cancel: CancelSignal) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Cancelling after the current step...".yellow());
            cancel.cancel();
        }
    });
}

fn print_outcome(state: &RunState, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(state)?);
    } else {
        render::print_report(state);
    }
    Ok(())
}

async fn handle_run_command(
    task: &str,
    repo: Option<&Path>,
    session: Option<&str>,
    interrupts: Vec<AgentRole>,
    json: bool,
    config: &Config,
) -> Result<()> {
    let repo = resolve_repo(repo, config)?;
    let session_id = session.map(str::to_string).unwrap_or_else(|| generate_session_id(task));

    info!("Running session {} in {}", session_id, repo.display());
    if !json {
        println!("{} {}", "Session:".cyan(), session_id);
    }

    let cancel = CancelSignal::new();
    let driver = build_driver(config, interrupts, cancel.clone())?;
    watch_ctrl_c(cancel);

    let state = driver.submit(task, &repo, &session_id).await?;
    print_outcome(&state, json)
}

async fn handle_resume_command(
    session: &str,
    feedback: Option<&str>,
    interrupts: Vec<AgentRole>,
    json: bool,
    config: &Config,
) -> Result<()> {
    let approved = feedback.is_none();
    info!("Resuming session {} (approved={})", session, approved);

    let cancel = CancelSignal::new();
    let driver = build_driver(config, interrupts, cancel.clone())?;
    watch_ctrl_c(cancel);

    let state = driver.resume(session, approved, feedback.unwrap_or_default()).await?;
    print_outcome(&state, json)
}

fn load_session(session: &str, config: &Config) -> Result<RunState> {
    let store = SessionStore::open(&config.storage.dir)?;
    store
        .load(session)?
        .ok_or_else(|| eyre!("Session not found: {}", session))
}

fn handle_status_command(session: &str, config: &Config) -> Result<()> {
    let state = load_session(session, config)?;
    render::print_report(&state);
    Ok(())
}

fn handle_history_command(session: &str, config: &Config) -> Result<()> {
    let state = load_session(session, config)?;
    render::print_history(&state);
    Ok(())
}

fn handle_sessions_command(config: &Config) -> Result<()> {
    let store = SessionStore::open(&config.storage.dir)?;
    render::print_sessions(&store.list()?);
    Ok(())
}

fn handle_models_command(config: &Config) -> Result<()> {
    println!("{} {:?}", "Provider:".bold(), config.llm.provider);
    for slot in ModelSlot::all() {
        println!("  {:<12} {}", slot.as_str().cyan(), config.llm.model_for(slot));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_interrupts_explicit_list_wins() {
        let config = Config::default();
        let roles = resolve_interrupts(false, &["qa".to_string(), "devops".to_string()], &config).unwrap();
        assert_eq!(roles, vec![AgentRole::Qa, AgentRole::Devops]);
    }

    #[test]
    fn test_resolve_interrupts_hitl_uses_config() {
        let config = Config::default();
        assert_eq!(resolve_interrupts(true, &[], &config).unwrap(), vec![AgentRole::Developer]);
        assert!(resolve_interrupts(false, &[], &config).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_interrupts_rejects_unknown_role() {
        let config = Config::default();
        assert!(resolve_interrupts(false, &["janitor".to_string()], &config).is_err());
    }

    #[test]
    fn test_resolve_repo_rejects_missing_path() {
        let config = Config::default();
        assert!(resolve_repo(Some(Path::new("/definitely/not/here")), &config).is_err());
    }

    #[test]
    fn test_resolve_repo_prefers_cli_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let repo = resolve_repo(Some(dir.path()), &config).unwrap();
        assert_eq!(repo, dir.path().canonicalize().unwrap());
    }
}
