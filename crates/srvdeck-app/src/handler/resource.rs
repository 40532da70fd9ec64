//! Resource listing, start and stop handlers

use srvdeck_core::prelude::*;
use srvdeck_core::{ErrorKind, ErrorReport, LifecycleState, Resource, ResourceId};
use srvdeck_gateway::protocol::DEFAULT_PORT;

use crate::locks::LockToken;
use crate::message::{ListScope, Readiness, StopOutcome};
use crate::state::{AppState, ErrorArea, StopSnapshot, TransientSlot};

use super::{UpdateAction, UpdateResult};

/// Uptime recorded when a start completes
const STARTED_UPTIME_SECS: u64 = 1;

// ─────────────────────────────────────────────────────────
// Listing
// ─────────────────────────────────────────────────────────

pub fn handle_refresh(_state: &mut AppState, scope: ListScope) -> UpdateResult {
    UpdateResult::action(UpdateAction::FetchResources { scope })
}

pub fn handle_resources_loaded(state: &mut AppState, resources: Vec<Resource>) -> UpdateResult {
    debug!("Loaded {} server(s)", resources.len());
    state.replace_resources(resources);
    state.clear_error(ErrorArea::Summary);
    UpdateResult::none()
}

pub fn handle_load_failed(state: &mut AppState, error: ErrorReport) -> UpdateResult {
    warn!("Failed to load servers: {}", error);
    state.set_error(ErrorArea::Summary, error);
    UpdateResult::none()
}

// ─────────────────────────────────────────────────────────
// Start
// ─────────────────────────────────────────────────────────

/// Start `id` unless it is busy or another start holds the global slot, in
/// which case the request is dropped without surfacing anything.
pub fn handle_start(state: &mut AppState, id: ResourceId) -> UpdateResult {
    let Some(token) = state.locks.try_acquire_start(&id) else {
        debug!(
            "Ignoring start of '{}': busy={}, starting={:?}",
            id,
            state.is_busy(&id),
            state.locks.starting()
        );
        return UpdateResult::none();
    };

    info!("Starting '{}'", id);
    state.set_transient(TransientSlot::Starting, format!("Starting server '{}'...", id));
    UpdateResult::action(UpdateAction::StartResource { id, token })
}

pub fn handle_start_accepted(state: &mut AppState, id: ResourceId, token: LockToken) -> UpdateResult {
    if state.locks.holds(&id, token) {
        state.poll_attempts.insert(id, 0);
    }
    UpdateResult::none()
}

pub fn handle_poll_pending(
    state: &mut AppState,
    id: ResourceId,
    token: LockToken,
    attempt: u32,
) -> UpdateResult {
    if state.locks.holds(&id, token) {
        trace!("'{}' running but not ready (attempt {})", id, attempt);
        state.poll_attempts.insert(id, attempt);
    }
    UpdateResult::none()
}

pub fn handle_start_ready(
    state: &mut AppState,
    id: ResourceId,
    token: LockToken,
    readiness: Readiness,
) -> UpdateResult {
    if !state.locks.release(&id, token) {
        debug!("Dropping stale start completion for '{}'", id);
        return UpdateResult::none();
    }
    state.poll_attempts.remove(&id);

    let known = state.update_resource(&id, |r| {
        r.lifecycle_state = LifecycleState::Running;
        r.uptime_seconds = STARTED_UPTIME_SECS;
        r.port = readiness.port.unwrap_or(DEFAULT_PORT);
        r.process_id = readiness.pid;
        if readiness.path.is_some() {
            r.path = readiness.path.clone();
        }
    });
    if !known {
        warn!("'{}' started but is not in the current listing", id);
    }

    info!("'{}' is ready", id);
    state.clear_error(ErrorArea::Summary);
    let message_id = state.set_transient(
        TransientSlot::Starting,
        format!("Server '{}' started successfully", id),
    );
    UpdateResult::action(UpdateAction::ScheduleTransientClear {
        slot: TransientSlot::Starting,
        id: message_id,
        delay: state.settings.behavior.message_clear(),
    })
}

/// Start failures never touch lifecycle state: nothing was applied
/// optimistically.
pub fn handle_start_failed(
    state: &mut AppState,
    id: ResourceId,
    token: LockToken,
    error: ErrorReport,
) -> UpdateResult {
    if !state.locks.release(&id, token) {
        debug!("Dropping stale start failure for '{}'", id);
        return UpdateResult::none();
    }
    state.poll_attempts.remove(&id);

    error!("Start of '{}' failed: {}", id, error);
    state.starting_message = None;
    state.set_error(ErrorArea::Summary, error);
    UpdateResult::none()
}

// ─────────────────────────────────────────────────────────
// Stop
// ─────────────────────────────────────────────────────────

/// Stop a running resource, optimistically marking it stopped before the
/// server confirms. Busy, stopped, or unknown resources are left alone.
pub fn handle_stop(state: &mut AppState, id: ResourceId) -> UpdateResult {
    let Some(snapshot) = state
        .resource(&id)
        .filter(|r| r.is_running())
        .map(StopSnapshot::capture)
    else {
        debug!("Ignoring stop of '{}': not running", id);
        return UpdateResult::none();
    };

    let Some(token) = state.locks.try_acquire(&id) else {
        debug!("Ignoring stop of '{}': busy", id);
        return UpdateResult::none();
    };

    info!("Stopping '{}'", id);
    state.record_stop_snapshot(id.clone(), snapshot);
    state.update_resource(&id, |r| {
        r.lifecycle_state = LifecycleState::Stopped;
        r.uptime_seconds = 0;
    });

    UpdateResult::action(UpdateAction::StopResource { id, token })
}

pub fn handle_stop_completed(
    state: &mut AppState,
    id: ResourceId,
    token: LockToken,
    outcome: StopOutcome,
) -> UpdateResult {
    if !state.locks.release(&id, token) {
        debug!("Dropping stale stop completion for '{}'", id);
        return UpdateResult::none();
    }
    let snapshot = state.take_stop_snapshot(&id);

    state.update_resource(&id, |r| {
        if outcome.running {
            // Server says it is still up; keep what we had before the stop
            r.lifecycle_state = LifecycleState::Running;
            r.uptime_seconds = snapshot.map_or(STARTED_UPTIME_SECS, |s| s.uptime_seconds);
        } else {
            r.lifecycle_state = LifecycleState::Stopped;
            r.uptime_seconds = 0;
        }
        r.process_id = outcome.pid;
        if outcome.path.is_some() {
            r.path = outcome.path.clone();
        }
    });

    info!("'{}' stopped (running={})", id, outcome.running);
    state.clear_error(ErrorArea::Summary);
    UpdateResult::none()
}

pub fn handle_stop_failed(
    state: &mut AppState,
    id: ResourceId,
    token: LockToken,
    error: ErrorReport,
) -> UpdateResult {
    if !state.locks.release(&id, token) {
        debug!("Dropping stale stop failure for '{}'", id);
        return UpdateResult::none();
    }
    rollback_stop(state, &id);

    error!("Stop of '{}' failed: {}", id, error);
    state.set_error(ErrorArea::Summary, error);
    UpdateResult::none()
}

fn rollback_stop(state: &mut AppState, id: &ResourceId) {
    if let Some(snapshot) = state.take_stop_snapshot(id) {
        state.update_resource(id, |r| snapshot.restore(r));
    }
}

// ─────────────────────────────────────────────────────────
// Abandoned operations
// ─────────────────────────────────────────────────────────

/// A background task ended without sending its completion. Undo whatever
/// the operation applied and free its locks.
pub fn handle_operation_abandoned(
    state: &mut AppState,
    id: ResourceId,
    token: LockToken,
) -> UpdateResult {
    if !state.locks.release(&id, token) {
        return UpdateResult::none();
    }

    warn!("Operation {} on '{}' ended without a result", token, id);
    state.poll_attempts.remove(&id);
    rollback_stop(state, &id);
    if let Some(dialog) = state.deploy.as_mut().filter(|d| d.lock == Some(token)) {
        dialog.lock = None;
    }
    if state.locks.starting().is_none() {
        state.starting_message = None;
    }

    state.set_error(
        ErrorArea::Summary,
        ErrorReport::new(
            ErrorKind::Internal,
            format!("Operation on server '{}' ended unexpectedly", id),
        ),
    );
    UpdateResult::none()
}
