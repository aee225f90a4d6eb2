use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use koperasi_reporting::{
    config::{Config, LogFormat},
    db::init_pool,
    metrics::Metrics,
    router, AppState,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration from environment: {}", e);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    tracing::info!(
        host = %config.host,
        port = config.port,
        export_dir = %config.export_dir.display(),
        cache_ttl_secs = config.dashboard_cache_ttl_secs,
        "Starting koperasi reporting service"
    );

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Service stopped");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Connecting to database...");
    let pool = init_pool(&config.database_url).await?;

    tokio::fs::create_dir_all(&config.export_dir).await?;

    let metrics = Metrics::new()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = Arc::new(AppState::new(pool, config, metrics));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Koperasi reporting service listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
