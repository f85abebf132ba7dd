//! Sequential, paced processing of the links from one inbound event.

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::{
    cancel::CancelRegistry,
    config::EngineConfig,
    domain::{ChatId, TransferRequest, UserId},
    messaging::{port::MessagingPort, types::InlineKeyboard},
    naming::allocate_target,
    normalize::{Normalizer, ResolveError},
    outbound::OutboundRelay,
    transfer::{TransferOutcome, TransferWorker},
};

/// Where the batch came from; only list uploads get a closing summary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchSource {
    SingleLink,
    LinkList,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Items that reached a terminal outcome, including a cancelled one.
    pub processed: usize,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: &TransferOutcome) {
        self.processed += 1;
        if outcome.is_success() {
            self.succeeded += 1;
        } else if outcome.is_failure() {
            self.failed += 1;
        } else if outcome.is_skip() {
            self.skipped += 1;
        }
    }

    pub fn summary_text(&self) -> String {
        let head = if self.cancelled {
            format!("⛔ Stopped after {}/{} items.", self.processed, self.total)
        } else {
            "🏁 All done.".to_string()
        };
        format!(
            "{head}\nTotal: {}\n✅ Succeeded: {}\n❌ Failed: {}\n⏭ Skipped: {}",
            self.total, self.succeeded, self.failed, self.skipped
        )
    }
}

#[derive(Clone)]
pub struct BatchOrchestrator {
    cfg: Arc<EngineConfig>,
    normalizer: Normalizer,
    worker: TransferWorker,
    relay: OutboundRelay,
    registry: Arc<CancelRegistry>,
    messenger: Arc<dyn MessagingPort>,
}

impl BatchOrchestrator {
    pub fn new(
        cfg: Arc<EngineConfig>,
        worker: TransferWorker,
        registry: Arc<CancelRegistry>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        Self {
            normalizer: Normalizer::from_config(&cfg),
            relay: OutboundRelay::new(messenger.clone()),
            cfg,
            worker,
            registry,
            messenger,
        }
    }

    /// Run every line in order. Resets the user's stop flag first; a stop
    /// during item k abandons items k+1..N.
    #[instrument(skip(self, lines), fields(user = user_id.0, chat = chat_id.0, total = lines.len()))]
    pub async fn run(
        &self,
        user_id: UserId,
        chat_id: ChatId,
        lines: Vec<String>,
        source: BatchSource,
    ) -> BatchReport {
        let guard = self.registry.begin(user_id);
        let token = guard.token().clone();
        let total = lines.len();
        let mut report = BatchReport::new(total);

        for (idx, line) in lines.into_iter().enumerate() {
            if token.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let req = TransferRequest {
                user_id,
                chat_id,
                source_text: line,
                position: idx + 1,
            };
            let outcome = self.process_item(&req, total, &token).await;
            report.record(&outcome);

            if outcome == TransferOutcome::CancelledByUser {
                report.cancelled = true;
                break;
            }
            if req.position < total && !self.pause(&token).await {
                report.cancelled = true;
                break;
            }
        }
        drop(guard);

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            cancelled = report.cancelled,
            "batch finished"
        );

        if source == BatchSource::LinkList {
            self.notify(chat_id, &report.summary_text()).await;
        } else if report.cancelled {
            self.notify(chat_id, "⛔ Download stopped.").await;
        }

        report
    }

    async fn process_item(
        &self,
        req: &TransferRequest,
        total: usize,
        token: &CancellationToken,
    ) -> TransferOutcome {
        let tag = format!("[{}/{}]", req.position, total);

        let resolved = match self.normalizer.resolve(&req.source_text, req.position) {
            Ok(r) => r,
            Err(ResolveError::NoValidUrl) => {
                self.notify(req.chat_id, &format!("⚠️ {tag} No valid link found, skipped."))
                    .await;
                return TransferOutcome::SkippedNoValidUrl;
            }
            Err(ResolveError::LockedResource { url, host }) => {
                info!(%host, "locked resource skipped");
                self.notify(
                    req.chat_id,
                    &format!("🔒 {tag} Locked/private resource, cannot download: {url}"),
                )
                .await;
                return TransferOutcome::SkippedLocked(url);
            }
        };

        let target = allocate_target(&self.cfg.download_dir, &resolved, req.position);

        let progress = format!("⬇️ {tag} Downloading: {}", resolved.original);
        if self.messenger.capabilities().supports_inline_keyboards {
            if let Err(e) = self
                .messenger
                .send_inline_keyboard(req.chat_id, &progress, InlineKeyboard::stop_button())
                .await
            {
                warn!(error = %e, "failed to send progress notice");
            }
        } else {
            self.notify(req.chat_id, &progress).await;
        }

        let outcome = self.worker.fetch(&target, token).await;
        match &outcome {
            TransferOutcome::Delivered(kind, path) => {
                self.relay
                    .deliver(req.chat_id, req.position, *kind, path)
                    .await;
            }
            TransferOutcome::FailedHttp(status) => {
                self.notify(
                    req.chat_id,
                    &format!("⚠️ {tag} Download failed ({status}): {}", resolved.original),
                )
                .await;
            }
            TransferOutcome::FailedException(message) => {
                self.notify(
                    req.chat_id,
                    &format!(
                        "❌ {tag} Downloading interrupted: {}\nError: {message}",
                        resolved.original
                    ),
                )
                .await;
            }
            TransferOutcome::CancelledByUser
            | TransferOutcome::SkippedNoValidUrl
            | TransferOutcome::SkippedLocked(_) => {}
        }
        outcome
    }

    /// Inter-item pause. Returns `false` if a stop arrived meanwhile.
    async fn pause(&self, token: &CancellationToken) -> bool {
        if self.cfg.batch_pause == Duration::ZERO {
            return !token.is_cancelled();
        }
        tokio::select! {
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(self.cfg.batch_pause) => !token.is_cancelled(),
        }
    }

    async fn notify(&self, chat_id: ChatId, text: &str) {
        let text = clip_message(text, self.messenger.capabilities().max_message_len);
        if let Err(e) = self.messenger.send_text(chat_id, text).await {
            warn!(error = %e, "failed to send notification");
        }
    }
}

/// Cut `text` to at most `max_chars` characters; long URLs can overflow a message.
pub(crate) fn clip_message(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
