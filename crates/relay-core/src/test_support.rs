//! In-memory messenger used by the engine tests.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicI32, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    sync::oneshot,
};

use crate::{
    domain::{ChatId, FileRef, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatAction, InlineKeyboard, MessagingCapabilities},
    },
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Text(i64, String),
    Keyboard(i64, String),
    Document(i64, PathBuf, String),
    Video(i64, PathBuf, String),
    Action(i64, ChatAction),
    CallbackAnswer(String, Option<String>),
}

type UploadHook = Box<dyn Fn(&Path) + Send + Sync>;

pub struct FakeMessenger {
    pub(crate) sent: Mutex<Vec<Sent>>,
    pub(crate) next_id: AtomicI32,
    pub fail_uploads: bool,
    pub fail_chat_actions: bool,
    pub max_upload_bytes: u64,
    pub max_message_len: usize,
    pub uploaded_files: HashMap<String, Vec<u8>>,
    pub on_upload: Option<UploadHook>,
}

impl Default for FakeMessenger {
    fn default() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            next_id: AtomicI32::new(1),
            fail_uploads: false,
            fail_chat_actions: false,
            max_upload_bytes: u64::MAX,
            max_message_len: 4096,
            uploaded_files: HashMap::new(),
            on_upload: None,
        }
    }
}

impl FakeMessenger {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text(_, t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn uploads(&self) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| matches!(s, Sent::Document(..) | Sent::Video(..)))
            .collect()
    }

    fn record(&self, chat_id: ChatId, s: Sent) -> MessageRef {
        self.sent.lock().unwrap().push(s);
        MessageRef {
            chat_id,
            message_id: MessageId(self.next_id.fetch_add(1, Ordering::SeqCst)),
        }
    }

    fn upload(&self, chat_id: ChatId, path: &Path, s: Sent) -> Result<MessageRef> {
        if let Some(hook) = &self.on_upload {
            hook(path);
        }
        if self.fail_uploads {
            return Err(Error::External("telegram error: Request Entity Too Large".into()));
        }
        Ok(self.record(chat_id, s))
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_inline_keyboards: true,
            supports_chat_actions: true,
            max_message_len: self.max_message_len,
            max_upload_bytes: self.max_upload_bytes,
        }
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        Ok(self.record(chat_id, Sent::Text(chat_id.0, text.to_string())))
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        _keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        Ok(self.record(chat_id, Sent::Keyboard(chat_id.0, text.to_string())))
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        path: &Path,
        caption: &str,
    ) -> Result<MessageRef> {
        let s = Sent::Document(chat_id.0, path.to_path_buf(), caption.to_string());
        self.upload(chat_id, path, s)
    }

    async fn send_video(&self, chat_id: ChatId, path: &Path, caption: &str) -> Result<MessageRef> {
        let s = Sent::Video(chat_id.0, path.to_path_buf(), caption.to_string());
        self.upload(chat_id, path, s)
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        if self.fail_chat_actions {
            return Err(Error::External("telegram error: Too Many Requests".into()));
        }
        self.record(chat_id, Sent::Action(chat_id.0, action));
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::CallbackAnswer(
            callback_id.to_string(),
            text.map(|s| s.to_string()),
        ));
        Ok(())
    }

    async fn fetch_uploaded_file(&self, file: &FileRef) -> Result<Vec<u8>> {
        self.uploaded_files
            .get(&file.id)
            .cloned()
            .ok_or_else(|| Error::External(format!("unknown file id {}", file.id)))
    }
}

/// Serves `first`, then holds the connection until released before sending `second`.
pub async fn gated_server(first: Vec<u8>, second: Vec<u8>) -> (String, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (release_tx, release_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = sock.read(&mut buf).await;
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/pdf\r\nContent-Length: {}\r\n\r\n",
            first.len() + second.len()
        );
        sock.write_all(head.as_bytes()).await.unwrap();
        sock.write_all(&first).await.unwrap();
        sock.flush().await.unwrap();
        let _ = release_rx.await;
        let _ = sock.write_all(&second).await;
        let _ = sock.flush().await;
    });
    (format!("http://{addr}"), release_tx)
}

/// Poll until `path` holds at least `len` bytes; returns the last size seen.
pub async fn wait_for_len(path: &Path, len: u64) -> u64 {
    let mut seen = 0;
    for _ in 0..500 {
        seen = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if seen >= len {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    seen
}
