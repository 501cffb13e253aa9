use anyhow::Result;
use dotenvy::dotenv;
use log::{error, info};

use brandmatch::config::Config;
use brandmatch::http_server::start_http_server;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level)).init();

    info!("🚀 Starting assistant HTTP server...");
    info!("✅ Configuration loaded (model: {})", config.gemini_model);

    if let Err(e) = start_http_server(config).await {
        error!("❌ HTTP server failed: {}", e);
        return Err(e);
    }

    Ok(())
}
