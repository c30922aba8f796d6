use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use card_extractor::api::{create_router, AppState};
use card_extractor::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env();

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    if config.ocr_url.is_none() {
        tracing::info!("OCR_URL not set; optical-text extraction is unavailable");
    }

    let state = Arc::new(AppState::new(config));
    let app = create_router(state);

    tracing::info!("Card extractor sidecar starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
