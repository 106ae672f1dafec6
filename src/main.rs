use tracing_subscriber::EnvFilter;

use doc_rag::api;
use doc_rag::config::Config;
use doc_rag::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(
        "Starting doc-rag on {} (provider: {}, data dir: {})",
        config.bind_addr,
        config.llm.provider,
        config.data_dir.display()
    );

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config)?;
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on {bind_addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
