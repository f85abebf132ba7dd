//! Routes inbound events to the batch orchestrator or the cancel registry.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::{
    batch::{clip_message, BatchOrchestrator, BatchReport, BatchSource},
    cancel::CancelRegistry,
    config::EngineConfig,
    domain::{ChatId, FileRef, UserId},
    messaging::{
        port::MessagingPort,
        types::{ChatAction, InboundEvent},
    },
    transfer::TransferWorker,
    Result,
};

/// What handling one event amounted to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandledEvent {
    Batch(BatchReport),
    Stopped { was_running: bool },
    /// The event carried nothing to act on (oversized or empty list, fetch failure).
    Rejected,
}

#[derive(Clone)]
pub struct RelayEngine {
    cfg: Arc<EngineConfig>,
    registry: Arc<CancelRegistry>,
    orchestrator: BatchOrchestrator,
    messenger: Arc<dyn MessagingPort>,
}

impl RelayEngine {
    pub fn new(cfg: EngineConfig, messenger: Arc<dyn MessagingPort>) -> Result<Self> {
        let cfg = Arc::new(cfg);
        let worker = TransferWorker::new(&cfg)?;
        let registry = Arc::new(CancelRegistry::new());
        let orchestrator =
            BatchOrchestrator::new(cfg.clone(), worker, registry.clone(), messenger.clone());
        Ok(Self {
            cfg,
            registry,
            orchestrator,
            messenger,
        })
    }

    pub fn registry(&self) -> &Arc<CancelRegistry> {
        &self.registry
    }

    #[instrument(skip(self, event), fields(user = event.user_id().0, chat = event.chat_id().0))]
    pub async fn handle(&self, event: InboundEvent) -> HandledEvent {
        match event {
            InboundEvent::Text(msg) => {
                let lines = extract_link_lines(&msg.text);
                if lines.is_empty() {
                    self.notify(msg.chat_id, "⚠️ No valid link found, skipped.")
                        .await;
                    return HandledEvent::Rejected;
                }
                let source = if lines.len() > 1 {
                    BatchSource::LinkList
                } else {
                    BatchSource::SingleLink
                };
                let report = self
                    .orchestrator
                    .run(msg.user_id, msg.chat_id, lines, source)
                    .await;
                HandledEvent::Batch(report)
            }
            InboundEvent::FileUpload(upload) => {
                self.handle_list(upload.user_id, upload.chat_id, &upload.file)
                    .await
            }
            InboundEvent::StopCommand(req) => {
                let was_running = self.stop(req.user_id, req.chat_id).await;
                HandledEvent::Stopped { was_running }
            }
            InboundEvent::StopButton(press) => {
                let was_running = self.registry.cancel(press.user_id);
                let ack = if was_running { "Stopping…" } else { "Nothing to stop" };
                if let Err(e) = self
                    .messenger
                    .answer_callback_query(&press.callback_id, Some(ack))
                    .await
                {
                    warn!(error = %e, "failed to answer callback query");
                }
                self.notify(press.chat_id, stop_reply(was_running)).await;
                HandledEvent::Stopped { was_running }
            }
        }
    }

    async fn stop(&self, user_id: UserId, chat_id: ChatId) -> bool {
        let was_running = self.registry.cancel(user_id);
        info!(was_running, "stop requested");
        self.notify(chat_id, stop_reply(was_running)).await;
        was_running
    }

    async fn handle_list(&self, user_id: UserId, chat_id: ChatId, file: &FileRef) -> HandledEvent {
        if file.size > self.cfg.max_list_bytes {
            self.notify(
                chat_id,
                &format!(
                    "⚠️ That list is too large ({} bytes, limit {}).",
                    file.size, self.cfg.max_list_bytes
                ),
            )
            .await;
            return HandledEvent::Rejected;
        }

        if self.messenger.capabilities().supports_chat_actions {
            if let Err(e) = self
                .messenger
                .send_chat_action(chat_id, ChatAction::Typing)
                .await
            {
                debug!(error = %e, "chat action failed");
            }
        }
        let bytes = match self.messenger.fetch_uploaded_file(file).await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, file_id = %file.id, "could not fetch uploaded list");
                self.notify(chat_id, &format!("❌ Could not read the uploaded file.\nError: {e}"))
                    .await;
                return HandledEvent::Rejected;
            }
        };

        let text = String::from_utf8_lossy(&bytes);
        let lines = extract_link_lines(&text);
        if lines.is_empty() {
            self.notify(chat_id, "⚠️ The uploaded file contains no entries.")
                .await;
            return HandledEvent::Rejected;
        }

        self.notify(
            chat_id,
            &format!("📑 Found {} entries. Starting downloads…", lines.len()),
        )
        .await;
        let report = self
            .orchestrator
            .run(user_id, chat_id, lines, BatchSource::LinkList)
            .await;
        HandledEvent::Batch(report)
    }

    async fn notify(&self, chat_id: ChatId, text: &str) {
        let text = clip_message(text, self.messenger.capabilities().max_message_len);
        if let Err(e) = self.messenger.send_text(chat_id, text).await {
            warn!(error = %e, "failed to send notification");
        }
    }
}

fn stop_reply(was_running: bool) -> &'static str {
    if was_running {
        "⛔ Stopping your downloads."
    } else {
        "ℹ️ Nothing to stop."
    }
}

/// Trimmed, non-blank lines. Lines without a link are kept so the batch
/// reports them as skipped at their own position.
pub fn extract_link_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
