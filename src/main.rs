use clap::{Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use talktodata::{
    api::routes::{create_router, AppState},
    config::Config,
    storage::{self, seed, Repository, SeaOrmRepository},
};

#[derive(Parser)]
#[command(name = "talktodata", version, about = "Natural-language analytics over BigQuery")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Manage the database schema
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Roll back the last applied migration
    Down,
    /// Show applied and pending migrations
    Status,
    /// Drop every table and re-apply all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load()?;
    init_tracing(&config.log_level);
    if config.ephemeral_secret {
        tracing::warn!("SECRET_KEY not set; using a generated key, tokens will not survive restarts");
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate { action } => migrate(&config, action).await,
    }
}

/// `RUST_LOG` wins; otherwise the configured level for this crate and tower-http.
fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("talktodata={level},tower_http={level},sea_orm=warn").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(config: Config) -> anyhow::Result<()> {
    if config.anthropic_api_key.trim().is_empty() {
        anyhow::bail!("ANTHROPIC_API_KEY must be set to run the server");
    }

    tracing::info!("{} v{} starting up...", config.app_name, config.app_version);
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("Debug mode: {}", config.debug);

    let db = storage::db::init_db_with_pool(&config.database_url, config.max_connections).await?;
    let repo: Arc<dyn Repository> = Arc::new(SeaOrmRepository::new(db));
    seed::ensure_admin(repo.as_ref(), &config.admin_email, &config.admin_password).await?;

    let addr: SocketAddr = config.bind_address().parse()?;
    let debug = config.debug;
    let app_name = config.app_name.clone();
    let state = AppState::new(config, repo)?;
    let cleanup = state.rate_limiter.spawn_cleanup();

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Server listening on {}", addr);
    if debug {
        tracing::info!("API docs at http://{}/api/docs", addr);
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    cleanup.abort();
    tracing::info!("{} shutting down...", app_name);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

async fn migrate(config: &Config, action: MigrateAction) -> anyhow::Result<()> {
    let db = sea_orm::Database::connect(config.database_url.as_str()).await?;

    match action {
        MigrateAction::Up => Migrator::up(&db, None).await?,
        MigrateAction::Down => Migrator::down(&db, Some(1)).await?,
        MigrateAction::Status => Migrator::status(&db).await?,
        MigrateAction::Fresh => Migrator::fresh(&db).await?,
    }

    tracing::info!("Migration command finished");
    Ok(())
}
