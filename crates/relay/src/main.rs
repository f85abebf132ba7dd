use std::sync::Arc;

use relay_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), relay_core::Error> {
    relay_core::logging::init("relay")?;

    let cfg = Arc::new(Config::load()?);
    let mode = if cfg.webhook_base_url.is_some() {
        "webhook"
    } else {
        "polling"
    };
    tracing::info!(mode, "starting relay");

    relay_telegram::router::run(cfg)
        .await
        .map_err(|e| relay_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
