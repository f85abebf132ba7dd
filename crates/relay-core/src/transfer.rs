//! One streaming HTTP download with cooperative, chunk-granular cancellation.
//!
//! `Pending → Fetching → {Writing ⇄ ChunkCheck} → {Delivered | Cancelled | Failed}`
//!
//! The stop token is checked before every write; it is the only interruption
//! point once the body is flowing.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use futures_util::StreamExt;
use reqwest::StatusCode;
use tokio::{fs::File, io::AsyncWriteExt, time::timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{
    config::EngineConfig, errors::Error, naming::ResolvedTarget, normalize::FileKind, Result,
};

const USER_AGENT: &str = concat!("relay-bot/", env!("CARGO_PKG_VERSION"));

/// Terminal result of one transfer request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferOutcome {
    Delivered(FileKind, PathBuf),
    SkippedNoValidUrl,
    SkippedLocked(String),
    FailedHttp(u16),
    CancelledByUser,
    FailedException(String),
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered(..))
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Self::SkippedNoValidUrl | Self::SkippedLocked(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::FailedHttp(_) | Self::FailedException(_))
    }
}

enum StreamEnd {
    Complete(u64),
    Cancelled,
}

#[derive(Clone, Debug)]
pub struct TransferWorker {
    client: reqwest::Client,
    request_timeout: Duration,
    chunk_size: usize,
}

impl TransferWorker {
    pub fn new(cfg: &EngineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(cfg.request_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self::with_client(client, cfg))
    }

    pub fn with_client(client: reqwest::Client, cfg: &EngineConfig) -> Self {
        Self {
            client,
            request_timeout: cfg.request_timeout,
            chunk_size: cfg.chunk_size.max(1),
        }
    }

    /// Fetch `target` into its local path.
    ///
    /// Never returns an error: every failure is folded into the outcome so a
    /// batch can move on to its next item.
    #[instrument(skip(self, cancel), fields(url = %target.url, path = %target.local_path.display()))]
    pub async fn fetch(&self, target: &ResolvedTarget, cancel: &CancellationToken) -> TransferOutcome {
        if cancel.is_cancelled() {
            return TransferOutcome::CancelledByUser;
        }

        let response = match timeout(self.request_timeout, self.client.get(&target.url).send()).await
        {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                warn!(error = %e, "request failed");
                return TransferOutcome::FailedException(e.to_string());
            }
            Err(_) => {
                warn!("timed out waiting for response headers");
                return TransferOutcome::FailedException(format!(
                    "no response within {:?}",
                    self.request_timeout
                ));
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            info!(status = status.as_u16(), "upstream refused transfer");
            return TransferOutcome::FailedHttp(status.as_u16());
        }

        match self.stream_to_file(response, &target.local_path, cancel).await {
            Ok(StreamEnd::Complete(bytes)) => {
                info!(bytes, "transfer complete");
                TransferOutcome::Delivered(target.kind, target.local_path.clone())
            }
            Ok(StreamEnd::Cancelled) => {
                info!("transfer cancelled by user");
                remove_partial(&target.local_path).await;
                TransferOutcome::CancelledByUser
            }
            Err(e) => {
                warn!(error = %e, "transfer aborted");
                remove_partial(&target.local_path).await;
                TransferOutcome::FailedException(e.to_string())
            }
        }
    }

    async fn stream_to_file(
        &self,
        response: reqwest::Response,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<StreamEnd> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        loop {
            let next = timeout(self.request_timeout, stream.next())
                .await
                .map_err(|_| {
                    Error::External(format!("no data received for {:?}", self.request_timeout))
                })?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;

            for piece in chunk.chunks(self.chunk_size) {
                if cancel.is_cancelled() {
                    return Ok(StreamEnd::Cancelled);
                }
                file.write_all(piece).await?;
                written += piece.len() as u64;
            }
        }

        file.flush().await?;
        Ok(StreamEnd::Complete(written))
    }
}

/// Best-effort cleanup of a partial download: failure is logged, never raised.
pub async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial download"),
    }
}
