//! Archive upload and extraction monitoring

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use srvdeck_core::prelude::*;
use srvdeck_gateway::{ExtractionState, Gateway, ProgressFn};

use srvdeck_core::{ErrorKind, ErrorReport};

use crate::config::UploadSettings;
use crate::message::Message;

use super::guard::CompletionGuard;

/// Terminal result of a background extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub path: String,
    pub message: Option<String>,
}

pub(super) async fn run_archive_upload<G: Gateway + Send + Sync + 'static>(
    gateway: Arc<G>,
    seq: u64,
    path: PathBuf,
    upload: UploadSettings,
    msg_tx: mpsc::Sender<Message>,
) {
    let guard = CompletionGuard::new(
        msg_tx.clone(),
        Message::ArchiveFailed {
            seq,
            error: ErrorReport::new(ErrorKind::Internal, "Upload ended unexpectedly"),
        },
    );

    let progress_tx = msg_tx.clone();
    let progress: ProgressFn = Arc::new(move |progress| {
        let _ = progress_tx.try_send(Message::ArchiveProgress { seq, progress });
    });

    let msg = match upload_and_extract(gateway.as_ref(), seq, &path, progress, &upload, &msg_tx).await
    {
        Ok(done) => Message::ArchiveCompleted {
            seq,
            extraction_path: done.path,
            message: done.message,
        },
        Err(e) => Message::ArchiveFailed {
            seq,
            error: e.report(),
        },
    };
    guard.complete(msg).await;
}

async fn upload_and_extract<G: Gateway + Sync>(
    gateway: &G,
    seq: u64,
    path: &std::path::Path,
    progress: ProgressFn,
    upload: &UploadSettings,
    msg_tx: &mpsc::Sender<Message>,
) -> Result<Extracted> {
    let response = gateway.upload_archive(path, progress).await?;

    if let Some(extracted) = response.extracted_path {
        let _ = msg_tx
            .send(Message::ArchiveExtracting {
                seq,
                message: response.message.clone(),
            })
            .await;
        return Ok(Extracted {
            path: extracted,
            message: response.message,
        });
    }

    let Some(task_id) = response.task_id else {
        return Err(Error::protocol(
            "Upload response carried neither an extraction path nor a task id",
        ));
    };

    let _ = msg_tx
        .send(Message::ArchiveExtracting {
            seq,
            message: response.message,
        })
        .await;

    let outcome = monitor_extraction(
        gateway,
        &task_id,
        upload.extraction_interval(),
        upload.extraction_budget(),
        |percent, message| {
            let _ = msg_tx.try_send(Message::ExtractionProgress {
                seq,
                percent,
                message,
            });
        },
    )
    .await;

    if !matches!(outcome, Err(Error::Timeout { .. })) {
        if let Err(e) = gateway.cleanup_extraction(&task_id).await {
            debug!("Extraction cleanup for {} failed: {}", task_id, e);
        }
    }
    outcome
}

/// Poll extraction of `task_id` every `interval` until it reaches a terminal
/// state or `budget` is spent.
pub async fn monitor_extraction<G, F>(
    gateway: &G,
    task_id: &str,
    interval: Duration,
    budget: Duration,
    mut on_progress: F,
) -> Result<Extracted>
where
    G: Gateway + Sync,
    F: FnMut(Option<u32>, Option<String>) + Send,
{
    let started = Instant::now();

    loop {
        if started.elapsed() + interval > budget {
            return Err(Error::timeout("Archive extraction", budget));
        }
        tokio::time::sleep(interval).await;

        let status = gateway.extraction_status(task_id).await?;
        match status.status {
            ExtractionState::Completed => {
                info!("Extraction task {} completed", task_id);
                return Ok(Extracted {
                    path: status.extraction_path.unwrap_or_default(),
                    message: status.message,
                });
            }
            ExtractionState::Failed => {
                let reason = status
                    .error_message
                    .or(status.message)
                    .unwrap_or_else(|| "Extraction failed".to_string());
                return Err(Error::extraction(reason));
            }
            ExtractionState::Pending | ExtractionState::InProgress => {
                trace!(
                    "Extraction task {} at {:?}%",
                    task_id,
                    status.progress_percentage
                );
                on_progress(status.progress_percentage, status.message);
            }
        }
    }
}
