use crate::domain::{ChatId, FileRef, UserId};

/// Callback payload carried by the inline stop button.
pub const STOP_CALLBACK_DATA: &str = "relay:stop";

/// Cross-messenger inbound event model.
///
/// Telegram-specific fields live in the Telegram adapter; the engine only ever
/// sees these four kinds.
#[derive(Clone, Debug)]
pub enum InboundEvent {
    Text(TextMessage),
    FileUpload(FileUpload),
    StopCommand(StopRequest),
    StopButton(StopButtonPress),
}

impl InboundEvent {
    pub fn user_id(&self) -> UserId {
        match self {
            Self::Text(m) => m.user_id,
            Self::FileUpload(m) => m.user_id,
            Self::StopCommand(m) => m.user_id,
            Self::StopButton(m) => m.user_id,
        }
    }

    pub fn chat_id(&self) -> ChatId {
        match self {
            Self::Text(m) => m.chat_id,
            Self::FileUpload(m) => m.chat_id,
            Self::StopCommand(m) => m.chat_id,
            Self::StopButton(m) => m.chat_id,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TextMessage {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct FileUpload {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub file: FileRef,
}

#[derive(Clone, Debug)]
pub struct StopRequest {
    pub chat_id: ChatId,
    pub user_id: UserId,
}

#[derive(Clone, Debug)]
pub struct StopButtonPress {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub callback_id: String,
}

/// Outgoing "chat action" (upload indicator, etc).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatAction {
    Typing,
    UploadDocument,
    UploadVideo,
}

/// Inline keyboard (buttons) used for the stop control.
#[derive(Clone, Debug)]
pub struct InlineKeyboard {
    pub buttons: Vec<InlineButton>,
}

#[derive(Clone, Debug)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    pub fn new(buttons: Vec<InlineButton>) -> Self {
        Self { buttons }
    }

    /// Single "stop" button wired to [`STOP_CALLBACK_DATA`].
    pub fn stop_button() -> Self {
        Self::new(vec![InlineButton {
            label: "⛔ Stop".to_string(),
            callback_data: STOP_CALLBACK_DATA.to_string(),
        }])
    }
}

/// Capabilities / limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub supports_inline_keyboards: bool,
    pub supports_chat_actions: bool,
    pub max_message_len: usize,
    pub max_upload_bytes: u64,
}
