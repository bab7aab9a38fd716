use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::BotCommand};
use tracing::{info, warn};

use vanity_core::{claim::ClaimHandler, config::Config};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub claims: Arc<ClaimHandler>,
    pub messenger: TelegramMessenger,
}

pub fn bot_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("vanity", "Claim a vanity: /vanity <public user id> <vanity>"),
        BotCommand::new("help", "Show usage"),
    ]
}

/// Long-poll Telegram until ctrl-c / SIGTERM. Each update runs independently.
pub async fn run_polling(cfg: Arc<Config>, claims: Arc<ClaimHandler>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    // Basic startup info.
    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "vanity bot started"),
        Err(e) => warn!(error = %e, "get_me failed"),
    }
    if let Err(e) = bot.set_my_commands(bot_commands()).await {
        warn!(error = %e, "failed to register bot commands");
    }

    let state = Arc::new(AppState {
        claims,
        messenger: TelegramMessenger::new(bot.clone()),
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("vanity bot stopped");
    Ok(())
}
