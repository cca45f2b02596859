use anyhow::Context;
use clap::{Parser, Subcommand};
use sesame_auth::RoleAuthority;
use sesame_server::{AppConfig, AppState, load_config, router};
use sesame_store::{RefreshSecretHasher, SqliteStore};
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Sesame session server.
#[derive(Debug, Parser)]
#[command(name = "sesame-server", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "SESAME_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve {
        /// Override the bind address from the configuration.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Grant a role to a user, e.g. to bootstrap the first admin.
    GrantRole { user_id: Uuid, role: String },
    /// Revoke a role from a user.
    RevokeRole { user_id: Uuid, role: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut cfg = load_config(args.config.as_deref())?;

    match args.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            serve(cfg).await
        }
        Command::GrantRole { user_id, role } => {
            let change = role_authority(&cfg).await?.grant(user_id, &role).await?;
            println!("{}", serde_json::to_string_pretty(&change)?);
            Ok(())
        }
        Command::RevokeRole { user_id, role } => {
            let change = role_authority(&cfg).await?.revoke(user_id, &role).await?;
            println!("{}", serde_json::to_string_pretty(&change)?);
            Ok(())
        }
    }
}

async fn serve(cfg: AppConfig) -> anyhow::Result<()> {
    let state = AppState::init(&cfg).await?;
    let app = router(state);

    let addr = cfg.server.bind.clone();
    tracing::info!("sesame-server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

/// Role administration straight against the database, without the HTTP guard.
async fn role_authority(cfg: &AppConfig) -> anyhow::Result<RoleAuthority> {
    let secrets = cfg
        .auth
        .resolve_secrets()
        .context("resolving auth secrets")?;
    let hasher = RefreshSecretHasher::new(&secrets.pepper)?;
    let store = Arc::new(
        SqliteStore::open(
            Path::new(&cfg.server.database_path),
            hasher,
            cfg.auth.refresh.ttl(),
        )
        .await?,
    );
    Ok(RoleAuthority::new(store.clone(), store))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
