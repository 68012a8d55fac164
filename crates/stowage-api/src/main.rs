use stowage_api::setup::{initialize_app, server::start_server};
use stowage_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;
    let (_state, app) = initialize_app(config.clone()).await?;

    start_server(&config, app).await
}
