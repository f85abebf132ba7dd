//! Telegram adapter (teloxide).
//!
//! This crate implements the `relay-core` MessagingPort over Telegram Bot API
//! and hosts the update router plus the health/webhook server.

use std::path::Path;

use async_trait::async_trait;

use teloxide::{
    net::Download,
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile},
};

use tokio::time::sleep;
use tracing::{debug, warn};

pub mod handlers;
pub mod router;
pub mod server;

use relay_core::{
    domain::{ChatId, FileRef, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatAction, InlineKeyboard, MessagingCapabilities},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    max_upload_bytes: u64,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, max_upload_bytes: u64) -> Self {
        Self {
            bot,
            max_upload_bytes,
        }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    fn msg_ref(chat_id: ChatId, msg: &Message) -> MessageRef {
        MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        }
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
                        warn!(retry_after = ?d, "telegram rate limit hit, retrying once");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_chat_actions: true,
            supports_inline_keyboards: true,
            max_message_len: 4096,
            max_upload_bytes: self.max_upload_bytes,
        }
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), text.to_string())
                    .disable_web_page_preview(true)
            })
            .await?;
        Ok(Self::msg_ref(chat_id, &msg))
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
            .buttons
            .into_iter()
            .map(|b| vec![InlineKeyboardButton::callback(b.label, b.callback_data)])
            .collect();
        let markup = InlineKeyboardMarkup::new(rows);

        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), text.to_string())
                    .disable_web_page_preview(true)
                    .reply_markup(markup.clone())
            })
            .await?;
        Ok(Self::msg_ref(chat_id, &msg))
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        path: &Path,
        caption: &str,
    ) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_document(Self::tg_chat(chat_id), InputFile::file(path))
                    .caption(caption.to_string())
            })
            .await?;
        Ok(Self::msg_ref(chat_id, &msg))
    }

    async fn send_video(&self, chat_id: ChatId, path: &Path, caption: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_video(Self::tg_chat(chat_id), InputFile::file(path))
                    .caption(caption.to_string())
                    .supports_streaming(true)
            })
            .await?;
        Ok(Self::msg_ref(chat_id, &msg))
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        let tg_action = match action {
            ChatAction::Typing => teloxide::types::ChatAction::Typing,
            ChatAction::UploadDocument => teloxide::types::ChatAction::UploadDocument,
            ChatAction::UploadVideo => teloxide::types::ChatAction::UploadVideo,
        };
        self.with_retry(|| self.bot.send_chat_action(Self::tg_chat(chat_id), tg_action))
            .await?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.with_retry(|| {
            let mut req = self.bot.answer_callback_query(callback_id.to_string());
            if let Some(t) = text {
                req = req.text(t.to_string());
            }
            req
        })
        .await?;
        Ok(())
    }

    async fn fetch_uploaded_file(&self, file: &FileRef) -> Result<Vec<u8>> {
        let meta = self
            .with_retry(|| self.bot.get_file(file.id.clone()))
            .await?;
        debug!(file_id = %file.id, path = %meta.path, "downloading uploaded file");

        let mut buf = Vec::new();
        self.bot
            .download_file(&meta.path, &mut buf)
            .await
            .map_err(|e| Error::External(format!("telegram download error: {e}")))?;
        Ok(buf)
    }
}
