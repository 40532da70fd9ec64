//! Deployment dialog and archive session handlers

use std::path::PathBuf;

use srvdeck_core::prelude::*;
use srvdeck_core::{ErrorReport, ResourceId, UploadStage};
use srvdeck_gateway::TransferProgress;

use crate::locks::LockToken;
use crate::state::{AppState, ErrorArea, TransientSlot};
use crate::upload_session::{
    validate_archive, ArchiveCandidate, DeployDialog, SelectionSource, TRANSFER_SHARE,
};

use super::{UpdateAction, UpdateResult};

const MSG_UPLOAD_FAILED: &str = "Upload failed. Please try again.";

// ─────────────────────────────────────────────────────────
// Deployment Transfer
// ─────────────────────────────────────────────────────────

/// Open the deployment dialog for a running resource. The deployment path is
/// taken from the resource and cannot be changed afterwards.
pub fn handle_open_deploy(state: &mut AppState, id: ResourceId) -> UpdateResult {
    if state.deploy.as_ref().is_some_and(|d| d.is_uploading()) {
        debug!("Deployment in flight; not opening another dialog");
        return UpdateResult::none();
    }

    let Some(resource) = state.resource(&id) else {
        state.set_error(ErrorArea::Summary, Error::not_found(&id).report());
        return UpdateResult::none();
    };

    if !resource.is_running() {
        state.set_error(
            ErrorArea::Summary,
            ErrorReport::validation(format!("Server '{}' is not running", id)),
        );
        return UpdateResult::none();
    }

    let deployment_path = resource.deployment_path.clone();
    state.deploy = Some(DeployDialog::new(id, deployment_path));
    UpdateResult::none()
}

pub fn handle_select_deploy_files(state: &mut AppState, files: Vec<PathBuf>) -> UpdateResult {
    if let Some(dialog) = state.deploy.as_mut().filter(|d| !d.is_uploading()) {
        dialog.files = files;
        dialog.error = None;
    }
    UpdateResult::none()
}

pub fn handle_submit_deploy(state: &mut AppState) -> UpdateResult {
    let Some(dialog) = state.deploy.as_ref().filter(|d| !d.is_uploading()) else {
        return UpdateResult::none();
    };

    let verdict = dialog.validate().map(str::to_string);
    let id = dialog.resource.clone();
    let files = dialog.files.clone();

    let deployment_path = match verdict {
        Ok(path) => path,
        Err(report) => {
            state.set_error(ErrorArea::Deploy, report);
            return UpdateResult::none();
        }
    };

    let Some(token) = state.locks.try_acquire(&id) else {
        debug!("Ignoring deployment to '{}': busy", id);
        return UpdateResult::none();
    };

    if let Some(dialog) = state.deploy.as_mut() {
        dialog.lock = Some(token);
        dialog.error = None;
    }

    info!("Deploying {} file(s) to '{}'", files.len(), id);
    UpdateResult::action(UpdateAction::UploadDeployables {
        id,
        token,
        deployment_path,
        files,
    })
}

/// A successful transfer resets the selection and closes the dialog.
pub fn handle_deploy_completed(state: &mut AppState, id: ResourceId, token: LockToken) -> UpdateResult {
    if !state.locks.release(&id, token) {
        return UpdateResult::none();
    }
    if state.deploy.as_ref().is_some_and(|d| d.lock == Some(token)) {
        state.deploy = None;
    }

    info!("Deployment to '{}' complete", id);
    let message_id = state.set_transient(
        TransientSlot::Upload,
        format!("Files uploaded successfully to {}", id),
    );
    UpdateResult::action(UpdateAction::ScheduleTransientClear {
        slot: TransientSlot::Upload,
        id: message_id,
        delay: state.settings.behavior.message_clear(),
    })
}

/// A failed transfer keeps the dialog and its selection for another try.
pub fn handle_deploy_failed(
    state: &mut AppState,
    id: ResourceId,
    token: LockToken,
    error: ErrorReport,
) -> UpdateResult {
    if !state.locks.release(&id, token) {
        return UpdateResult::none();
    }
    if let Some(dialog) = state.deploy.as_mut().filter(|d| d.lock == Some(token)) {
        dialog.lock = None;
    }

    error!("Deployment to '{}' failed: {}", id, error);
    state.set_error(ErrorArea::Deploy, error);
    UpdateResult::none()
}

pub fn handle_close_deploy(state: &mut AppState) -> UpdateResult {
    if state.deploy.as_ref().is_some_and(|d| d.is_uploading()) {
        debug!("Refusing to close deployment dialog while uploading");
        return UpdateResult::none();
    }
    state.deploy = None;
    UpdateResult::none()
}

// ─────────────────────────────────────────────────────────
// Archive Upload
// ─────────────────────────────────────────────────────────

fn archive_in_flight(state: &AppState) -> bool {
    state.archive.as_ref().is_some_and(|s| !s.can_close())
}

pub fn handle_open_archive(state: &mut AppState) -> UpdateResult {
    if archive_in_flight(state) {
        return UpdateResult::none();
    }
    state.open_archive_session();
    UpdateResult::none()
}

/// Browse and drop both land here. The candidate is checked before anything
/// touches the network; a rejected file leaves the session in `Validating`
/// with the error shown.
pub fn handle_select_archive(
    state: &mut AppState,
    candidate: ArchiveCandidate,
    source: SelectionSource,
) -> UpdateResult {
    if archive_in_flight(state) {
        debug!("Ignoring archive selection during upload");
        return UpdateResult::none();
    }
    if state.archive.is_none() {
        state.open_archive_session();
    }

    let max_bytes = state.settings.upload.max_archive_bytes;
    let verdict = validate_archive(&candidate, max_bytes);

    if let Some(session) = state.archive.as_mut() {
        debug!(
            "Archive selected via {:?}: {} ({} bytes)",
            source, candidate.file_name, candidate.size
        );
        session.stage = UploadStage::Validating;
        session.total_bytes = candidate.size;
        session.transferred_bytes = 0;
        session.progress_percent = 0;
        session.extraction_path = None;
        session.candidate = Some(candidate);
        session.source = Some(source);
        session.stage_label = "Ready to upload".to_string();
        session.error = verdict.err();
    }
    UpdateResult::none()
}

fn begin_archive_transfer(state: &mut AppState) -> UpdateResult {
    let Some(session) = state.archive.as_mut() else {
        return UpdateResult::none();
    };
    let Some(path) = session.candidate.as_ref().map(|c| c.path.clone()) else {
        return UpdateResult::none();
    };

    session.begin_transfer();
    info!("Uploading archive {}", path.display());
    UpdateResult::action(UpdateAction::UploadArchive {
        seq: session.seq,
        path,
    })
}

pub fn handle_confirm_archive(state: &mut AppState) -> UpdateResult {
    if !state.archive.as_ref().is_some_and(|s| s.is_ready()) {
        return UpdateResult::none();
    }
    begin_archive_transfer(state)
}

/// Re-send the retained selection after a failure. The server has no range
/// support, so the transfer restarts from the first byte.
pub fn handle_retry_archive(state: &mut AppState) -> UpdateResult {
    let max_bytes = state.settings.upload.max_archive_bytes;
    let Some(session) = state
        .archive
        .as_mut()
        .filter(|s| s.stage == UploadStage::Failed)
    else {
        return UpdateResult::none();
    };
    let Some(candidate) = session.candidate.as_ref() else {
        return UpdateResult::none();
    };

    if let Err(report) = validate_archive(candidate, max_bytes) {
        session.stage = UploadStage::Validating;
        session.error = Some(report);
        return UpdateResult::none();
    }
    begin_archive_transfer(state)
}

pub fn handle_close_archive(state: &mut AppState) -> UpdateResult {
    if archive_in_flight(state) {
        debug!("Refusing to close archive dialog while transferring/extracting");
        return UpdateResult::none();
    }
    state.archive = None;
    UpdateResult::none()
}

pub fn handle_archive_progress(
    state: &mut AppState,
    seq: u64,
    progress: TransferProgress,
) -> UpdateResult {
    if let Some(session) = state
        .archive_session_mut(seq)
        .filter(|s| s.stage == UploadStage::Transferring)
    {
        session.record_transfer(progress);
    }
    UpdateResult::none()
}

pub fn handle_archive_extracting(
    state: &mut AppState,
    seq: u64,
    message: Option<String>,
) -> UpdateResult {
    if let Some(session) = state
        .archive_session_mut(seq)
        .filter(|s| s.stage == UploadStage::Transferring)
    {
        session.stage = UploadStage::Extracting;
        session.transferred_bytes = session.total_bytes;
        session.advance(TRANSFER_SHARE);
        session.stage_label = message.unwrap_or_else(|| "Extracting archive".to_string());
    }
    UpdateResult::none()
}

pub fn handle_extraction_progress(
    state: &mut AppState,
    seq: u64,
    percent: Option<u32>,
    message: Option<String>,
) -> UpdateResult {
    if let Some(session) = state
        .archive_session_mut(seq)
        .filter(|s| s.stage == UploadStage::Extracting)
    {
        if let Some(pct) = percent {
            session.record_extraction(pct);
        }
        if let Some(label) = message {
            session.stage_label = label;
        }
    }
    UpdateResult::none()
}

pub fn handle_archive_completed(
    state: &mut AppState,
    seq: u64,
    extraction_path: String,
    message: Option<String>,
) -> UpdateResult {
    let delay = state.settings.upload.auto_dismiss();
    let Some(session) = state
        .archive_session_mut(seq)
        .filter(|s| s.stage.is_in_flight())
    else {
        return UpdateResult::none();
    };

    info!("Archive extracted to {}", extraction_path);
    session.stage = UploadStage::Complete;
    session.transferred_bytes = session.total_bytes;
    session.advance(100);
    session.extraction_path = Some(extraction_path);
    session.stage_label = message.unwrap_or_else(|| "Upload complete".to_string());
    session.error = None;

    UpdateResult::action(UpdateAction::ScheduleArchiveDismiss { seq, delay })
}

/// The session stays open showing the error so the operator can retry or
/// close it.
pub fn handle_archive_failed(state: &mut AppState, seq: u64, error: ErrorReport) -> UpdateResult {
    let Some(session) = state
        .archive_session_mut(seq)
        .filter(|s| s.stage.is_in_flight())
    else {
        return UpdateResult::none();
    };

    error!("Archive upload failed: {}", error);
    let error = if error.message.trim().is_empty() {
        ErrorReport::new(error.kind, MSG_UPLOAD_FAILED)
    } else {
        error
    };
    session.stage = UploadStage::Failed;
    session.stage_label = "Upload failed".to_string();
    session.error = Some(error);
    UpdateResult::none()
}

pub fn handle_archive_auto_dismiss(state: &mut AppState, seq: u64) -> UpdateResult {
    if state
        .archive
        .as_ref()
        .is_some_and(|s| s.seq == seq && s.stage == UploadStage::Complete)
    {
        debug!("Dismissing completed archive session {}", seq);
        state.archive = None;
    }
    UpdateResult::none()
}
