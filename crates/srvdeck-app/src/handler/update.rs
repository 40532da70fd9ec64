//! Main update function - handles state transitions (TEA pattern)
//!
//! Handler implementations live in:
//! - `resource`: listing, start and stop
//! - `upload`: deployment dialog and archive session

use crate::message::Message;
use crate::state::AppState;

use super::{resource, upload, UpdateResult};

/// Process a message and update state
/// Returns optional follow-up message and/or action
pub fn update(state: &mut AppState, message: Message) -> UpdateResult {
    match message {
        // ─────────────────────────────────────────────────────────
        // Resource Listing
        // ─────────────────────────────────────────────────────────
        Message::Refresh { scope } => resource::handle_refresh(state, scope),
        Message::ResourcesLoaded { resources } => {
            resource::handle_resources_loaded(state, resources)
        }
        Message::ResourcesLoadFailed { error } => resource::handle_load_failed(state, error),

        // ─────────────────────────────────────────────────────────
        // Start / Stop
        // ─────────────────────────────────────────────────────────
        Message::StartResource { id } => resource::handle_start(state, id),
        Message::StartAccepted { id, token } => resource::handle_start_accepted(state, id, token),
        Message::StartPollPending { id, token, attempt } => {
            resource::handle_poll_pending(state, id, token, attempt)
        }
        Message::StartReady {
            id,
            token,
            readiness,
        } => resource::handle_start_ready(state, id, token, readiness),
        Message::StartFailed { id, token, error } => {
            resource::handle_start_failed(state, id, token, error)
        }

        Message::StopResource { id } => resource::handle_stop(state, id),
        Message::StopCompleted { id, token, outcome } => {
            resource::handle_stop_completed(state, id, token, outcome)
        }
        Message::StopFailed { id, token, error } => {
            resource::handle_stop_failed(state, id, token, error)
        }

        Message::OperationAbandoned { id, token } => {
            resource::handle_operation_abandoned(state, id, token)
        }

        // ─────────────────────────────────────────────────────────
        // Deployment Transfer
        // ─────────────────────────────────────────────────────────
        Message::OpenDeploy { id } => upload::handle_open_deploy(state, id),
        Message::SelectDeployFiles { files } => upload::handle_select_deploy_files(state, files),
        Message::SubmitDeploy => upload::handle_submit_deploy(state),
        Message::DeployCompleted { id, token } => upload::handle_deploy_completed(state, id, token),
        Message::DeployFailed { id, token, error } => {
            upload::handle_deploy_failed(state, id, token, error)
        }
        Message::CloseDeploy => upload::handle_close_deploy(state),

        // ─────────────────────────────────────────────────────────
        // Archive Upload
        // ─────────────────────────────────────────────────────────
        Message::OpenArchive => upload::handle_open_archive(state),
        Message::SelectArchive { candidate, source } => {
            upload::handle_select_archive(state, candidate, source)
        }
        Message::ConfirmArchive => upload::handle_confirm_archive(state),
        Message::RetryArchive => upload::handle_retry_archive(state),
        Message::CloseArchive => upload::handle_close_archive(state),
        Message::ArchiveProgress { seq, progress } => {
            upload::handle_archive_progress(state, seq, progress)
        }
        Message::ArchiveExtracting { seq, message } => {
            upload::handle_archive_extracting(state, seq, message)
        }
        Message::ExtractionProgress {
            seq,
            percent,
            message,
        } => upload::handle_extraction_progress(state, seq, percent, message),
        Message::ArchiveCompleted {
            seq,
            extraction_path,
            message,
        } => upload::handle_archive_completed(state, seq, extraction_path, message),
        Message::ArchiveFailed { seq, error } => upload::handle_archive_failed(state, seq, error),
        Message::ArchiveAutoDismiss { seq } => upload::handle_archive_auto_dismiss(state, seq),

        // ─────────────────────────────────────────────────────────
        // Transient Messages
        // ─────────────────────────────────────────────────────────
        Message::ClearTransient { slot, id } => {
            state.clear_transient(slot, id);
            UpdateResult::none()
        }
        Message::ClearMessages => {
            state.clear_messages();
            UpdateResult::none()
        }
    }
}
