mod cli;
mod token;

use std::future::Future;
use std::io::{self, BufReader};
use std::path::Path;
use std::process::ExitCode;

use ani_tracker_api::anilist::AniListClient;
use ani_tracker_api::LinePrompt;
use ani_tracker_core::models::TrackedTitle;
use ani_tracker_core::{AppConfig, CoreError, Credentials};
use ani_tracker_mpv::{MpvIpcClient, PollerConfig};
use ani_tracker_runtime::{validate_session, Orchestrator, SessionOutcome};
use clap::Parser;
use tokio::sync::watch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, Command};

const LOG_FILE: &str = "ani-tracker.log";

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            let _ = e.print();
            return code;
        }
    };

    let _log_guard = init_logging();

    let dir = match args.config_dir.clone().map_or_else(AppConfig::config_dir, Ok) {
        Ok(dir) => dir,
        Err(e) => return fatal(e),
    };
    let Some((config, credentials)) = load_settings(&dir) else {
        return ExitCode::FAILURE;
    };

    match args.cmd {
        Command::GetToken => get_token(&config, credentials, &dir).await,
        Command::Run { title, episode } => {
            run(config, credentials, TrackedTitle::new(title, episode)).await
        }
        Command::Update { title, episode } => {
            update(config, credentials, TrackedTitle::new(title, episode)).await
        }
        Command::Kill => {
            let mut client = MpvIpcClient::from_config(&config.player);
            ani_tracker_runtime::kill(&mut client, &mut io::stdout());
            ExitCode::SUCCESS
        }
    }
}

/// File logging keeps stdout free for the status line.
fn init_logging() -> Option<WorkerGuard> {
    let log_dir = AppConfig::log_dir();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: logging disabled, cannot create {}: {e}", log_dir.display());
        return None;
    }

    let appender = tracing_appender::rolling::never(&log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ani_tracker=info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}

/// Load config and credentials, creating the credentials template on first run.
fn load_settings(dir: &Path) -> Option<(AppConfig, Credentials)> {
    let config = match AppConfig::load(dir) {
        Ok(config) => config,
        Err(e) => {
            fatal(e);
            return None;
        }
    };

    let path = AppConfig::credentials_path(dir);
    match Credentials::load(&path) {
        Ok(credentials) => Some((config, credentials)),
        Err(CoreError::MissingCredentials(path)) => {
            bootstrap_credentials(&path);
            None
        }
        Err(e) => {
            fatal(e);
            None
        }
    }
}

fn bootstrap_credentials(path: &Path) {
    eprintln!("Error: credentials file not found.");
    match Credentials::bootstrap(path) {
        Ok(()) => eprintln!(
            "Created {}. Fill in ID and SECRET, then run `ani-tracker get-token`.",
            path.display()
        ),
        Err(e) => eprintln!("Could not create {}: {e}", path.display()),
    }
}

async fn get_token(config: &AppConfig, credentials: Credentials, dir: &Path) -> ExitCode {
    let path = AppConfig::credentials_path(dir);
    let mut input = BufReader::new(io::stdin());
    match token::get_token(&config.anilist, credentials, &path, &mut input, &mut io::stdout()).await
    {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) if e.is_fatal() => fatal(e),
        Err(e) => handled(e),
    }
}

async fn run(config: AppConfig, credentials: Credentials, title: TrackedTitle) -> ExitCode {
    if let Err(e) = validate_session(&credentials, &config) {
        return fatal(e);
    }

    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if forward_interrupts(tokio::signal::ctrl_c, cancel_tx).await {
            eprintln!("\nInterrupted");
            std::process::exit(130);
        }
    });

    let mut orchestrator = orchestrator(&config, &credentials);
    match orchestrator.run(&title, &mut cancel_rx).await {
        Ok(SessionOutcome::Synced(_)) | Ok(SessionOutcome::Cancelled) => ExitCode::SUCCESS,
        Err(e) => handled(e),
    }
}

async fn update(config: AppConfig, credentials: Credentials, title: TrackedTitle) -> ExitCode {
    if let Err(e) = validate_session(&credentials, &config) {
        return fatal(e);
    }

    match orchestrator(&config, &credentials).update_now(&title).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => handled(e),
    }
}

/// The first interrupt asks the session to wind down; returns `true` when a
/// second one arrives and the process should exit right away.
async fn forward_interrupts<F, Fut>(mut interrupts: F, cancel: watch::Sender<bool>) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if let Err(e) = interrupts().await {
        tracing::warn!(error = %e, "Cannot listen for Ctrl+C");
        return false;
    }
    tracing::info!("Interrupt received");
    let _ = cancel.send(true);

    match interrupts().await {
        Ok(()) => {
            tracing::warn!("Second interrupt, exiting");
            true
        }
        Err(_) => false,
    }
}

fn orchestrator(
    config: &AppConfig,
    credentials: &Credentials,
) -> Orchestrator<
    MpvIpcClient,
    AniListClient,
    LinePrompt<BufReader<io::Stdin>, io::Stdout>,
    io::Stdout,
> {
    Orchestrator::new(
        MpvIpcClient::from_config(&config.player),
        AniListClient::from_config(&config.anilist, credentials),
        LinePrompt::stdio(),
        PollerConfig::from_config(config),
        io::stdout(),
    )
}

/// Setup error: nothing was attempted.
fn fatal(e: impl std::fmt::Display) -> ExitCode {
    tracing::error!(error = %e, "Fatal error");
    eprintln!("Error: {e}");
    ExitCode::FAILURE
}

/// The command ran but its attempt failed.
fn handled(e: impl std::fmt::Display) -> ExitCode {
    tracing::warn!(error = %e, "Command failed");
    eprintln!("\nError: {e}");
    ExitCode::SUCCESS
}
