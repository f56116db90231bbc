use clap::Parser;
use dotenv::dotenv;
use linkshelf::db::services;
use linkshelf::gateway::BotGateway;
use linkshelf::metadata::{MetadataResolver, ResolverConfig};
use linkshelf::render::PageRenderer;
use linkshelf::server::config::ServerConfig;
use linkshelf::telegram::{BotApi, TelegramClient};
use linkshelf::version::VERSION;
use linkshelf::web::{self, AppState};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(log_dir: &str) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "linkshelf.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sea_orm=warn,sqlx::query=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal.");
    }
    info!("Shutdown signal received, stopping server.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Manually check for --version before full parsing to keep the simple output.
    if std::env::args().any(|arg| arg == "--version") {
        println!("Server version: {VERSION}");
        return Ok(());
    }

    let args = Args::parse();
    dotenv().ok();

    // Logging needs log_dir, so configuration errors can only go to stderr.
    let server_config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load server configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&server_config.log_dir);
    info!("Starting server, version: {}", VERSION);

    // --- Database Pool Setup ---
    let mut opt = ConnectOptions::new(server_config.database_url.to_owned());
    opt.max_connections(10).sqlx_logging(false);
    let db_pool: DatabaseConnection = match Database::connect(opt).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "Failed to create database connection.");
            return Err(e.into());
        }
    };
    if let Err(e) = services::init_schema(&db_pool).await {
        error!(error = %e, "Failed to initialize database schema.");
        return Err(e.into());
    }
    info!("Database ready.");

    // --- Services Setup ---
    let resolver = Arc::new(MetadataResolver::new(ResolverConfig::from(server_config.as_ref()))?);

    tokio::fs::create_dir_all(&server_config.storage_dir).await?;
    let renderer = Arc::new(PageRenderer::new(
        &server_config.storage_dir,
        &server_config.public_base_url,
    )?);

    let bot: Arc<dyn BotApi> = Arc::new(TelegramClient::new(
        &server_config.telegram_api_base,
        &server_config.telegram_bot_token,
        server_config.fetch_timeout(),
    )?);

    let gateway = Arc::new(BotGateway::new(
        db_pool.clone(),
        resolver,
        renderer,
        bot.clone(),
    ));

    let app_state = Arc::new(AppState {
        db_pool,
        gateway,
        bot,
    });
    let app = web::create_axum_router(app_state, Path::new(&server_config.storage_dir));

    // --- HTTP Server ---
    let addr: SocketAddr = server_config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "HTTP server listening.");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "HTTP server error.");
        return Err(e.into());
    }

    Ok(())
}
