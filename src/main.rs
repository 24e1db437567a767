use std::sync::Arc;

use model_agency_core::collaborators::MockLlmExecutor;
use model_agency_core::server::{build_router, AppState};
use model_agency_core::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    model_agency_core::config::init_tracing();

    let config = Config::from_env()?;
    tracing::info!(bind_addr = %config.bind_addr, driver = ?config.persistence_driver, "starting model_agency_core");

    // No external LLM transport is in scope; the deterministic mock executor
    // stands in until a real `LlmExecutor` is wired by a caller.
    let executor: Arc<dyn model_agency_core::collaborators::LlmExecutor> =
        Arc::new(MockLlmExecutor::new("no LlmExecutor configured"));

    let state = Arc::new(AppState::from_config(&config, executor).await?);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
