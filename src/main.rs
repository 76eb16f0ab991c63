use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tracing::info;

mod brands;
mod config;
mod critique;
mod error;
mod handlers;
mod llm;
mod server;
mod state;
mod utils;

use brands::BrandCatalog;
use config::Config;
use llm::{GeminiClient, VisionModel};
use state::AppState;
use utils::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let config = Config::load()?;
    let _guards = init_logging(&config);

    let model: Arc<dyn VisionModel> = Arc::new(GeminiClient::from_config(&config)?);
    let catalog = BrandCatalog::builtin();
    info!(
        "Starting BrandAI Critique API (model={}, brands={})",
        model.name(),
        catalog.list_keys().join(",")
    );

    let state = AppState::new(catalog, model);
    let router = server::build_router(state, config.max_upload_bytes);
    server::serve(&config.bind_address(), router).await?;

    info!("BrandAI Critique API stopped");
    Ok(())
}
