use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpListener;

// Error tracing
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use server::AppState;
use server::handlers::build_router;
use server::session::SessionManager;
use shared::config::{load_config_or_default, validate_config};

#[derive(Parser, Debug)]
#[command(name = "taskgate", version, about = "Username/password gateway for the task app")]
struct Args {
    /// Path to the TOML config file. A missing file means built-in defaults.
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Override `server.bind`
    #[arg(long)]
    bind: Option<String>,

    /// Override `server.port`
    #[arg(short, long)]
    port: Option<u16>,

    /// Override `database.path`
    #[arg(long)]
    database: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = load_config_or_default(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(database) = args.database {
        config.database.path = database;
    }
    validate_config(&config).context("Invalid configuration after CLI overrides")?;

    let addr = config.server.addr();
    let sweep_every = Duration::from_secs(config.auth.session_sweep_seconds);

    let state = AppState::open(config).await?;
    let router = Arc::new(build_router());

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    tokio::spawn(sweep_sessions(state.sessions.clone(), sweep_every));

    let serve = async move {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };
            let io = TokioIo::new(stream);
            let router = router.clone();
            let state = state.clone();

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let router = router.clone();
                    let state = state.clone();
                    async move {
                        Ok::<_, std::convert::Infallible>(router.handle(req, state).await)
                    }
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
    };

    tokio::select! {
        _ = serve => {}
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received, stopping");
        }
    }

    Ok(())
}

/// Periodically delete expired sessions so the table does not grow without
/// bound. Lookups already ignore expired rows.
async fn sweep_sessions(sessions: SessionManager, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        if let Err(e) = sessions.purge_expired().await {
            error!("Session sweep failed: {}", e);
        }
    }
}
