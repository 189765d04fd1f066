use anyhow::Context;
use clap::{Parser, Subcommand};
use parley_config::load as load_config;
use parley_gateway::{create_gateway_state, create_router};
use parley_runtime::{telemetry, BackendServices};
use tokio::net::TcpListener;
use tracing::info;

mod data;

#[derive(Debug, Parser)]
#[command(name = "parley-server")]
#[command(about = "Parley chat backend (serves HTTP by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Print users, chatrooms, members and messages
    DumpData,
    /// Delete every row, keeping the schema
    ClearData,
    /// Create two users who share a chatroom with a few messages
    SeedData,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing().context("failed to initialise tracing")?;

    let config = load_config().context("failed to load configuration")?;
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(&config, services).await,
        Commands::DumpData => data::dump(&services).await,
        Commands::ClearData => data::clear(&services).await,
        Commands::SeedData => data::seed(&services, &config).await.map(|_| ()),
    }
}

async fn run_server(
    config: &parley_config::AppConfig,
    services: BackendServices,
) -> anyhow::Result<()> {
    info!(broker = ?services.broker, "starting Parley backend");

    let state = create_gateway_state(services.db_pool.clone(), config, services.broadcaster);
    let app = create_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(parley_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    info!("backend shut down");
    Ok(())
}
