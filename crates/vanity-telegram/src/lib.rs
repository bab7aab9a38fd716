//! Telegram adapter (teloxide).
//!
//! This crate carries the `/vanity` command surface and implements the
//! `vanity-core` ClaimResponder over the Telegram Bot API.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{ChatAction, MessageId as TgMessageId, ParseMode},
};

use tokio::{sync::Mutex, time::sleep};
use tracing::warn;

pub mod handlers;
pub mod router;

use vanity_core::{
    claim::ClaimOutcome,
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    formatting::{render_outcome, ACK_TEXT},
    ports::ClaimResponder,
    Result,
};

/// Thin wrapper over `Bot` with 429 handling.
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> TgMessageId {
        TgMessageId(message_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }

    pub async fn send_html(
        &self,
        chat_id: ChatId,
        html: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                let mut req = self
                    .bot
                    .send_message(Self::tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
                    .disable_web_page_preview(true);
                if let Some(id) = reply_to {
                    req = req.reply_to_message_id(Self::tg_msg_id(id));
                }
                req
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    pub async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .edit_message_text(
                    Self::tg_chat(msg.chat_id),
                    Self::tg_msg_id(msg.message_id),
                    html.to_string(),
                )
                .parse_mode(ParseMode::Html)
                .disable_web_page_preview(true)
        })
        .await?;
        Ok(())
    }

    pub async fn send_typing(&self, chat_id: ChatId) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .send_chat_action(Self::tg_chat(chat_id), ChatAction::Typing)
        })
        .await?;
        Ok(())
    }
}

/// Responses for one `/vanity` invocation.
///
/// The acknowledgment is a placeholder message; the follow-up replaces it.
pub struct TelegramResponder {
    messenger: TelegramMessenger,
    chat_id: ChatId,
    command_msg: MessageId,
    placeholder: Mutex<Option<MessageRef>>,
}

impl TelegramResponder {
    pub fn new(messenger: TelegramMessenger, chat_id: ChatId, command_msg: MessageId) -> Self {
        Self {
            messenger,
            chat_id,
            command_msg,
            placeholder: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ClaimResponder for TelegramResponder {
    async fn acknowledge(&self) -> Result<()> {
        // Best-effort: the placeholder message is what matters.
        let _ = self.messenger.send_typing(self.chat_id).await;
        let sent = self
            .messenger
            .send_html(self.chat_id, ACK_TEXT, Some(self.command_msg))
            .await?;
        *self.placeholder.lock().await = Some(sent);
        Ok(())
    }

    async fn reply(&self, outcome: &ClaimOutcome) -> Result<()> {
        let html = render_outcome(outcome);
        let placeholder = self.placeholder.lock().await.take();
        if let Some(msg) = placeholder {
            match self.messenger.edit_html(msg, &html).await {
                Ok(()) => return Ok(()),
                Err(e) => warn!(error = %e, "failed to edit vanity placeholder, sending new message"),
            }
        }
        self.messenger
            .send_html(self.chat_id, &html, Some(self.command_msg))
            .await?;
        Ok(())
    }
}
