//! Bot startup: long polling or webhook

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use secrecy::SecretString;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use teloxide::update_listeners::Polling;
use url::Url;

use crate::core::config::Config;
use crate::core::retry::{retry, RetryConfig};
use crate::download::Pipeline;
use crate::telegram::bot::{create_bot, setup_bot_commands};
use crate::telegram::handlers::{schema, HandlerDeps, HandlerError};

/// Webhook path used when the configured URL has none.
const DEFAULT_WEBHOOK_PATH: &str = "/telegram";

const HEALTH_TEXT: &str = "tunefetch is running";

/// Run the Telegram bot until Ctrl-C.
pub async fn run_bot(config: &Config, token: SecretString, use_webhook: bool) -> Result<()> {
    let bot_init_start = std::time::Instant::now();
    log::info!("Starting bot...");

    let pipeline = Arc::new(Pipeline::from_config(config).await);
    let bot = create_bot(&token, config)?;

    // The Bot API server may still be starting up
    let bot_info = retry(
        &RetryConfig::with_attempts(5).initial_delay(std::time::Duration::from_secs(2)),
        || bot.get_me().send(),
    )
    .await
    .into_result()
    .context("Failed to reach the Telegram Bot API")?;
    log::info!("Bot username: @{}", bot_info.username());

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    let deps = HandlerDeps::new(pipeline, bot_info.user.username.clone(), bot_info.user.id);
    let handler = schema(deps);

    log::info!("🎉 Bot initialization complete in {:.2}s", bot_init_start.elapsed().as_secs_f64());

    if use_webhook {
        let raw_url = config
            .webhook_url
            .as_deref()
            .context("Webhook mode needs WEBHOOK_URL (or webhook_url in the config file)")?;
        run_webhook(bot, handler, raw_url, config.port).await
    } else {
        run_polling(bot, handler).await
    }
}

async fn run_polling(bot: Bot, handler: UpdateHandler<HandlerError>) -> Result<()> {
    log::info!("Starting bot in long polling mode");
    if let Err(e) = bot.delete_webhook().await {
        log::warn!("Failed to delete webhook before polling: {}", e);
    }

    let listener = Polling::builder(bot.clone()).drop_pending_updates().build();

    Dispatcher::builder(bot, handler)
        .distribution_function(|_| None::<()>)
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}

async fn run_webhook(bot: Bot, handler: UpdateHandler<HandlerError>, raw_url: &str, port: u16) -> Result<()> {
    let url = webhook_url(raw_url)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log::info!("Starting bot in webhook mode at {} (listening on {})", url, addr);

    let options = webhooks::Options::new(addr, url).drop_pending_updates();
    let (listener, stop_flag, router) = webhooks::axum_to_router(bot.clone(), options)
        .await
        .context("Failed to set webhook")?;

    let app = router.merge(axum::Router::new().route("/", get(health)));
    let tcp = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(tcp, app).with_graceful_shutdown(stop_flag).await {
            log::error!("Webhook server error: {}", e);
        }
    });

    Dispatcher::builder(bot, handler)
        .distribution_function(|_| None::<()>)
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the webhook listener"),
        )
        .await;

    if let Err(e) = server.await {
        log::error!("Webhook server task failed: {}", e);
    }
    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}

async fn health() -> &'static str {
    HEALTH_TEXT
}

/// Parses the public webhook URL, giving it a path when it has none so the
/// health route can own `/`.
fn webhook_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).with_context(|| format!("Invalid webhook URL '{}'", raw))?;
    if url.path().is_empty() || url.path() == "/" {
        url.set_path(DEFAULT_WEBHOOK_PATH);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_url_gets_path() {
        assert_eq!(
            webhook_url("https://bot.example.com").unwrap().as_str(),
            "https://bot.example.com/telegram"
        );
        assert_eq!(
            webhook_url("https://bot.example.com/hook/abc").unwrap().as_str(),
            "https://bot.example.com/hook/abc"
        );
        assert!(webhook_url("nope").is_err());
    }

    #[tokio::test]
    async fn test_health_text() {
        assert_eq!(health().await, "tunefetch is running");
    }
}
