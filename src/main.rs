use anyhow::Context;
use letsmodel::{start_server, Settings};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // Defaults, then LETSMODEL_CONFIG, then environment overrides
    let settings = Settings::load().context("loading settings")?;
    let config = settings
        .server_config()
        .context("building the server configuration")?;

    start_server(config).await?;

    Ok(())
}
