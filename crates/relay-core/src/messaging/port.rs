use std::path::Path;

use async_trait::async_trait;

use crate::{
    domain::{ChatId, FileRef, MessageRef},
    messaging::types::{ChatAction, InlineKeyboard, MessagingCapabilities},
    Result,
};

/// Cross-messenger port.
///
/// The engine drives every outbound action through this trait: notifications,
/// file uploads, and pulling the bytes of a file the user uploaded.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef>;

    async fn send_document(&self, chat_id: ChatId, path: &Path, caption: &str)
        -> Result<MessageRef>;

    async fn send_video(&self, chat_id: ChatId, path: &Path, caption: &str) -> Result<MessageRef>;

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()>;

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()>;

    async fn fetch_uploaded_file(&self, file: &FileRef) -> Result<Vec<u8>>;
}
