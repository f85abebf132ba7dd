//! Hand a finished download to the messenger as document or video.

use std::{path::Path, sync::Arc};

use tracing::{debug, info, warn};

use crate::{
    domain::{ChatId, MessageRef},
    messaging::{port::MessagingPort, types::ChatAction},
    normalize::FileKind,
};

/// What happened to a downloaded file on the way back to the chat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent(MessageRef),
    /// Upload failed; the user got a text confirmation instead.
    Degraded(String),
}

pub fn caption(kind: FileKind, position: usize) -> String {
    match kind {
        FileKind::Pdf => format!("📘 PDF {position}"),
        FileKind::Video => format!("🎥 Video {position}"),
        FileKind::Generic => format!("📁 File {position}"),
    }
}

#[derive(Clone)]
pub struct OutboundRelay {
    messenger: Arc<dyn MessagingPort>,
}

impl OutboundRelay {
    pub fn new(messenger: Arc<dyn MessagingPort>) -> Self {
        Self { messenger }
    }

    pub async fn deliver(
        &self,
        chat_id: ChatId,
        position: usize,
        kind: FileKind,
        path: &Path,
    ) -> DeliveryStatus {
        let caps = self.messenger.capabilities();
        match tokio::fs::metadata(path).await {
            Ok(md) if md.len() > caps.max_upload_bytes => {
                let reason = format!(
                    "file is {} MB, upload limit is {} MB",
                    md.len() / (1024 * 1024),
                    caps.max_upload_bytes / (1024 * 1024)
                );
                return self.degrade(chat_id, position, path, reason).await;
            }
            Ok(_) => {}
            Err(e) => {
                return self
                    .degrade(chat_id, position, path, format!("cannot read file: {e}"))
                    .await
            }
        }

        if caps.supports_chat_actions {
            let action = match kind {
                FileKind::Video => ChatAction::UploadVideo,
                FileKind::Pdf | FileKind::Generic => ChatAction::UploadDocument,
            };
            if let Err(e) = self.messenger.send_chat_action(chat_id, action).await {
                debug!(error = %e, "chat action failed");
            }
        }

        let caption = caption(kind, position);
        let sent = match kind {
            FileKind::Pdf | FileKind::Generic => {
                self.messenger.send_document(chat_id, path, &caption).await
            }
            FileKind::Video => self.messenger.send_video(chat_id, path, &caption).await,
        };

        match sent {
            Ok(msg) => {
                info!(position, path = %path.display(), "file relayed");
                DeliveryStatus::Sent(msg)
            }
            Err(e) => self.degrade(chat_id, position, path, e.to_string()).await,
        }
    }

    async fn degrade(
        &self,
        chat_id: ChatId,
        position: usize,
        path: &Path,
        reason: String,
    ) -> DeliveryStatus {
        warn!(position, path = %path.display(), %reason, "upload failed, sending confirmation only");
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let text = format!(
            "✅ File {position} downloaded ({name}) but could not be sent here.\nReason: {reason}"
        );
        if let Err(e) = self.messenger.send_text(chat_id, &text).await {
            warn!(error = %e, "failed to send delivery fallback notice");
        }
        DeliveryStatus::Degraded(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeMessenger, Sent};

    fn write_file(dir: &Path, name: &str, len: usize) -> std::path::PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, vec![0u8; len]).unwrap();
        p
    }

    #[tokio::test]
    async fn kinds_map_to_matching_upload_calls() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeMessenger::default());
        let relay = OutboundRelay::new(fake.clone());

        let pdf = write_file(dir.path(), "001_a.pdf", 10);
        let mp4 = write_file(dir.path(), "002_b.mp4", 10);
        let bin = write_file(dir.path(), "003_c.bin", 10);

        assert!(matches!(
            relay.deliver(ChatId(9), 1, FileKind::Pdf, &pdf).await,
            DeliveryStatus::Sent(_)
        ));
        relay.deliver(ChatId(9), 2, FileKind::Video, &mp4).await;
        relay.deliver(ChatId(9), 3, FileKind::Generic, &bin).await;

        assert_eq!(
            fake.uploads(),
            vec![
                Sent::Document(9, pdf, "📘 PDF 1".to_string()),
                Sent::Video(9, mp4, "🎥 Video 2".to_string()),
                Sent::Document(9, bin, "📁 File 3".to_string()),
            ]
        );
        assert!(fake
            .sent()
            .contains(&Sent::Action(9, ChatAction::UploadVideo)));
    }

    #[tokio::test]
    async fn upload_failure_degrades_to_text_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeMessenger {
            fail_uploads: true,
            ..FakeMessenger::default()
        });
        let relay = OutboundRelay::new(fake.clone());
        let pdf = write_file(dir.path(), "004_big.pdf", 10);

        let status = relay.deliver(ChatId(1), 4, FileKind::Pdf, &pdf).await;
        assert!(matches!(status, DeliveryStatus::Degraded(ref r) if r.contains("Too Large")));

        let texts = fake.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("File 4 downloaded (004_big.pdf)"));
        assert!(pdf.exists(), "downloaded file is kept on disk");
    }

    #[tokio::test]
    async fn failed_chat_action_does_not_block_the_upload() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeMessenger {
            fail_chat_actions: true,
            ..FakeMessenger::default()
        });
        let relay = OutboundRelay::new(fake.clone());
        let pdf = write_file(dir.path(), "001_a.pdf", 10);

        let status = relay.deliver(ChatId(2), 1, FileKind::Pdf, &pdf).await;
        assert!(matches!(status, DeliveryStatus::Sent(_)));
        assert_eq!(
            fake.uploads(),
            vec![Sent::Document(2, pdf, "📘 PDF 1".to_string())]
        );
        assert!(fake.texts().is_empty());
    }

    #[tokio::test]
    async fn oversized_files_skip_the_upload_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeMessenger {
            max_upload_bytes: 5,
            ..FakeMessenger::default()
        });
        let relay = OutboundRelay::new(fake.clone());
        let mp4 = write_file(dir.path(), "001_long.mp4", 6);

        let status = relay.deliver(ChatId(1), 1, FileKind::Video, &mp4).await;
        assert!(matches!(status, DeliveryStatus::Degraded(_)));
        assert!(fake.uploads().is_empty());
        assert_eq!(fake.texts().len(), 1);
    }
}
