use ceastats::{create_router, AppState, Catalog, Config, Store};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ceastats")]
#[command(about = "Read-only analytics service for CEA real-estate transactions", long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Data directory (falls back to CEASTATS_DATA_DIR)
    #[arg(long)]
    data_dir: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ceastats=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let data_dir = args
        .data_dir
        .or_else(|| std::env::var("CEASTATS_DATA_DIR").ok())
        .ok_or_else(|| anyhow::anyhow!("--data-dir or CEASTATS_DATA_DIR is required"))?;
    let config = Config::new(&data_dir, Config::cors_origins_from_env());

    let store = Store::open(config.db_path())?;
    let catalog = Catalog::load(config.processed_dir())?;
    tracing::info!("dataset catalog loaded from {}", config.processed_dir().display());

    let state = AppState::new(store, catalog);
    let app = create_router(state, &config.cors_origins);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
