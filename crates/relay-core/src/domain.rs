/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a sent message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Opaque handle to a file the user uploaded to the messenger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRef {
    pub id: String,
    pub file_name: Option<String>,
    pub size: u64,
}

/// One unit of work: a raw line from the user plus its batch position.
///
/// `position` is 1-based and drives both filename ordering and progress text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRequest {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub source_text: String,
    pub position: usize,
}
