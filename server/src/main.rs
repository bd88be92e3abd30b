use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use server::AppState;
use server::cli::{self, Cli, Command};
use server::handlers::http::{build_router, handle_request};
use server::jobs::{JobRunner, email};
use shared::config::load_config;
use shared::types::server_config::AppConfig;

const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Cli::parse();
    let config = read_config(&args.config)?;
    let state = AppState::open(config).await?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state, args.config.to_string_lossy().into_owned()).await,
        Command::CreateClient { name } => {
            let id = cli::create_client(&state.db, &name).await?;
            println!("{}", id);
            Ok(())
        }
        Command::CreateUser {
            email,
            name,
            password,
            role,
            client_id,
        } => {
            let id =
                cli::create_user(&state.db, &email, &name, &password, role, client_id).await?;
            println!("{}", id);
            Ok(())
        }
        Command::IssueToken {
            user_id,
            name,
            days,
        } => {
            let issued = cli::issue_token(&state.db, user_id, &name, days).await?;
            println!("{}", issued.secret);
            Ok(())
        }
    }
}

/// Missing file means defaults; a present but broken file is fatal.
fn read_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        warn!("Config file {} not found; using defaults", path.display());
        return Ok(AppConfig::default());
    }

    load_config(&path.to_string_lossy())
        .with_context(|| format!("Failed to load config {}", path.display()))
}

async fn serve(state: AppState, config_path: String) -> Result<()> {
    let cfg = state.config.snapshot().await;
    let router = Arc::new(build_router(
        &cfg.surfaces.admin_path,
        &cfg.surfaces.client_path,
        &cfg.surfaces.login_path,
    ));

    spawn_config_reload(state.clone(), config_path);
    spawn_session_pruner(state.clone());
    spawn_email_job(&state, &cfg);

    let addr = cfg.server.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                continue;
            }
        };

        let io = TokioIo::new(stream);
        let router = Arc::clone(&router);
        let state = state.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| {
                handle_request(req, peer, Arc::clone(&router), state.clone())
            });

            if let Err(err) = http1::Builder::new()
                .timer(TokioTimer::new())
                .serve_connection(io, service)
                .await
            {
                warn!("Error serving connection from {}: {:?}", peer, err);
            }
        });
    }
}

/// SIGHUP re-reads the config file. Surface paths and the listen address
/// are fixed at startup.
fn spawn_config_reload(state: AppState, path: String) {
    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to register SIGHUP handler: {}", e);
                return;
            }
        };

        while hangup.recv().await.is_some() {
            match load_config(&path) {
                Ok(new) => {
                    state.config.reload(new).await;
                    info!("Configuration reloaded from {}", path);
                }
                Err(e) => error!("Config reload failed, keeping current config: {}", e),
            }
        }
    });
}

fn spawn_session_pruner(state: AppState) {
    let runner = JobRunner::new("session-prune");
    runner.spawn_every(SESSION_PRUNE_INTERVAL, move || {
        let state = state.clone();
        async move {
            match state.sessions.prune_expired().await {
                Ok(0) => {}
                Ok(n) => info!("Pruned {} expired sessions", n),
                Err(e) => error!("Session prune failed: {:#}", e),
            }
        }
    });
}

fn spawn_email_job(state: &AppState, cfg: &AppConfig) {
    let Some(inbox) = cfg.jobs.email_inbox.clone() else {
        info!("No email inbox configured; email ingestion disabled");
        return;
    };

    let pool = state.db.clone();
    let inbox = Arc::new(inbox);
    JobRunner::new("email-ingest").spawn_every(
        Duration::from_secs(cfg.jobs.email_interval_secs),
        move || {
            let pool = pool.clone();
            let inbox = Arc::clone(&inbox);
            async move {
                if let Err(e) = email::ingest_inbox(&pool, Path::new(inbox.as_str())).await {
                    error!("Email ingestion failed: {:#}", e);
                }
            }
        },
    );
}
