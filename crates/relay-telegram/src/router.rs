use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{error, info};

use relay_core::messaging::throttled::{ThrottleConfig, ThrottledMessenger};
use relay_core::{config::Config, engine::RelayEngine, messaging::port::MessagingPort};

use crate::{handlers, server, TelegramMessenger};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub engine: RelayEngine,
    pub messenger: Arc<dyn MessagingPort>,
}

impl AppState {
    pub fn new(cfg: Arc<Config>, bot: Bot) -> anyhow::Result<Self> {
        // Throttle in front of Telegram; the adapter still retries one RetryAfter.
        let raw_messenger: Arc<dyn MessagingPort> =
            Arc::new(TelegramMessenger::new(bot, cfg.max_upload_bytes));
        let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
            raw_messenger,
            ThrottleConfig::default(),
        ));
        let engine = RelayEngine::new(cfg.engine.clone(), messenger.clone())?;
        Ok(Self {
            cfg,
            engine,
            messenger,
        })
    }
}

/// Webhook mode when a public base URL is configured, long polling otherwise.
pub async fn run(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "relay bot started"),
        Err(e) => error!(error = %e, "get_me failed"),
    }
    info!(
        download_dir = %cfg.engine.download_dir.display(),
        locked_hosts = cfg.engine.locked_hosts.len(),
        "engine configured"
    );

    let state = Arc::new(AppState::new(cfg.clone(), bot.clone())?);

    match cfg.webhook_url() {
        Some(raw) => run_webhook(bot, state, &raw).await,
        None => run_polling(bot, state).await,
    }
}

async fn run_webhook(bot: Bot, state: Arc<AppState>, raw_url: &str) -> anyhow::Result<()> {
    let url = url::Url::parse(raw_url)?;
    bot.set_webhook(url).await?;
    info!(url = %raw_url, "webhook registered");
    server::serve(state).await
}

async fn run_polling(bot: Bot, state: Arc<AppState>) -> anyhow::Result<()> {
    // A stale webhook makes getUpdates fail.
    bot.delete_webhook().await?;

    let health_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = server::serve(health_state).await {
            error!(error = %e, "health server stopped");
        }
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    info!("polling for updates");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
