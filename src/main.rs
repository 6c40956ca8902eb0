use clap::Parser;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use htsget_refserver::{
    Config,
    handlers::{AppState, create_router},
    storage::Storages,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (reads, variants) = config.registries()?;
    let tools = Arc::new(config.tools());

    let state = AppState {
        base_url: config.base_url()?,
        chunk_size: config.chunk_size,
        reads: Arc::new(reads),
        variants: Arc::new(variants),
        storage: Arc::new(Storages::new()?),
        header_reader: tools.clone(),
        tools,
    };

    let app = create_router(state);
    let app = if config.cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    };

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting htsget reference server on {}", addr);
    tracing::info!(
        registry = ?config.registry,
        data_dir = ?config.data_dir,
        samtools = %config.samtools,
        bcftools = %config.bcftools,
        "data sources configured"
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
