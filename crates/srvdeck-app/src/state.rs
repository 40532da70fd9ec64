//! Application state (Model in TEA pattern)
//!
//! [`AppState`] is only ever mutated by `handler::update`, which the engine
//! drives one message at a time. Resource mutations go through
//! [`AppState::replace_resources`] and [`AppState::update_resource`], both of
//! which recompute the [`Summary`].

use std::collections::HashMap;

use chrono::{DateTime, Local};
use serde::Serialize;

use srvdeck_core::{ErrorReport, LifecycleState, Resource, ResourceId, Summary};

use crate::config::Settings;
use crate::locks::OperationLocks;
use crate::upload_session::{ArchiveSession, DeployDialog};

/// Which user-facing area an error belongs to. Each area shows at most one
/// error; a new one replaces the old.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorArea {
    /// Summary and resource list (start, stop, refresh)
    Summary,
    /// Deployment transfer dialog
    Deploy,
    /// Archive upload dialog
    Archive,
}

/// Success messages that clear themselves after a delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransientSlot {
    Starting,
    Upload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransientMessage {
    /// Matched by the clear timer so it never clears a newer message
    pub id: u64,
    pub text: String,
}

/// Field values overwritten by an optimistic stop, kept by value for rollback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopSnapshot {
    pub lifecycle_state: LifecycleState,
    pub uptime_seconds: u64,
}

impl StopSnapshot {
    pub fn capture(resource: &Resource) -> Self {
        Self {
            lifecycle_state: resource.lifecycle_state,
            uptime_seconds: resource.uptime_seconds,
        }
    }

    pub fn restore(self, resource: &mut Resource) {
        resource.lifecycle_state = self.lifecycle_state;
        resource.uptime_seconds = self.uptime_seconds;
    }
}

/// A resource as presented to the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceView {
    #[serde(flatten)]
    pub resource: Resource,
    /// `stopping`/`starting` while an operation is in flight
    pub display_state: LifecycleState,
    pub busy: bool,
}

#[derive(Debug)]
pub struct AppState {
    pub settings: Settings,

    resources: Vec<Resource>,
    summary: Summary,

    pub locks: OperationLocks,

    /// Rollback values for stops awaiting server confirmation
    pending_stops: HashMap<ResourceId, StopSnapshot>,

    /// Status queries answered "not ready yet", per resource being started
    pub poll_attempts: HashMap<ResourceId, u32>,

    summary_error: Option<ErrorReport>,

    pub starting_message: Option<TransientMessage>,
    pub upload_status: Option<TransientMessage>,
    next_message_id: u64,

    pub deploy: Option<DeployDialog>,
    pub archive: Option<ArchiveSession>,
    next_archive_seq: u64,

    /// When the resource list was last replaced
    pub last_refreshed: Option<DateTime<Local>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_settings(Settings::default())
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            resources: Vec::new(),
            summary: Summary::default(),
            locks: OperationLocks::new(),
            pending_stops: HashMap::new(),
            poll_attempts: HashMap::new(),
            summary_error: None,
            starting_message: None,
            upload_status: None,
            next_message_id: 0,
            deploy: None,
            archive: None,
            next_archive_seq: 0,
            last_refreshed: None,
        }
    }

    // ─────────────────────────────────────────────────────────
    // Resources
    // ─────────────────────────────────────────────────────────

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource(&self, id: &ResourceId) -> Option<&Resource> {
        self.resources.iter().find(|r| &r.id == id)
    }

    pub fn summary(&self) -> Summary {
        self.summary
    }

    /// Replace the whole collection with a fresh listing.
    ///
    /// Busy markers and pending stop snapshots are kept; in-flight operations
    /// complete against the new collection.
    pub fn replace_resources(&mut self, resources: Vec<Resource>) {
        self.resources = resources;
        self.last_refreshed = Some(Local::now());
        self.recompute_summary();
    }

    /// Mutate one resource in place. Returns `false` if `id` is unknown.
    pub fn update_resource(&mut self, id: &ResourceId, f: impl FnOnce(&mut Resource)) -> bool {
        let Some(resource) = self.resources.iter_mut().find(|r| &r.id == id) else {
            return false;
        };
        f(resource);
        self.recompute_summary();
        true
    }

    fn recompute_summary(&mut self) {
        self.summary = Summary::from_resources(&self.resources);
    }

    pub fn is_busy(&self, id: &ResourceId) -> bool {
        self.locks.is_busy(id)
    }

    pub fn display_state(&self, resource: &Resource) -> LifecycleState {
        if self.pending_stops.contains_key(&resource.id) {
            LifecycleState::Stopping
        } else if self.locks.starting() == Some(&resource.id) {
            LifecycleState::Starting
        } else {
            resource.lifecycle_state
        }
    }

    pub fn view(&self, resource: &Resource) -> ResourceView {
        ResourceView {
            resource: resource.clone(),
            display_state: self.display_state(resource),
            busy: self.is_busy(&resource.id),
        }
    }

    pub fn views(&self) -> Vec<ResourceView> {
        self.resources.iter().map(|r| self.view(r)).collect()
    }

    // ─────────────────────────────────────────────────────────
    // Optimistic stop bookkeeping
    // ─────────────────────────────────────────────────────────

    pub fn record_stop_snapshot(&mut self, id: ResourceId, snapshot: StopSnapshot) {
        self.pending_stops.insert(id, snapshot);
    }

    pub fn take_stop_snapshot(&mut self, id: &ResourceId) -> Option<StopSnapshot> {
        self.pending_stops.remove(id)
    }

    pub fn stop_pending(&self, id: &ResourceId) -> bool {
        self.pending_stops.contains_key(id)
    }

    // ─────────────────────────────────────────────────────────
    // Error slots
    // ─────────────────────────────────────────────────────────

    pub fn error(&self, area: ErrorArea) -> Option<&ErrorReport> {
        match area {
            ErrorArea::Summary => self.summary_error.as_ref(),
            ErrorArea::Deploy => self.deploy.as_ref().and_then(|d| d.error.as_ref()),
            ErrorArea::Archive => self.archive.as_ref().and_then(|s| s.error.as_ref()),
        }
    }

    /// Write `report` into `area`, replacing any previous error. Dialog areas
    /// without an open dialog drop the error.
    pub fn set_error(&mut self, area: ErrorArea, report: ErrorReport) {
        match area {
            ErrorArea::Summary => self.summary_error = Some(report),
            ErrorArea::Deploy => {
                if let Some(dialog) = self.deploy.as_mut() {
                    dialog.error = Some(report);
                }
            }
            ErrorArea::Archive => {
                if let Some(session) = self.archive.as_mut() {
                    session.error = Some(report);
                }
            }
        }
    }

    pub fn clear_error(&mut self, area: ErrorArea) {
        match area {
            ErrorArea::Summary => self.summary_error = None,
            ErrorArea::Deploy => {
                if let Some(dialog) = self.deploy.as_mut() {
                    dialog.error = None;
                }
            }
            ErrorArea::Archive => {
                if let Some(session) = self.archive.as_mut() {
                    session.error = None;
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────
    // Transient messages
    // ─────────────────────────────────────────────────────────

    /// Show `text` in `slot`, returning the id the clear timer must match.
    pub fn set_transient(&mut self, slot: TransientSlot, text: impl Into<String>) -> u64 {
        self.next_message_id += 1;
        let message = TransientMessage {
            id: self.next_message_id,
            text: text.into(),
        };
        *self.transient_mut(slot) = Some(message);
        self.next_message_id
    }

    /// Clear `slot` if it still shows message `id`
    pub fn clear_transient(&mut self, slot: TransientSlot, id: u64) {
        let current = self.transient_mut(slot);
        if current.as_ref().is_some_and(|m| m.id == id) {
            *current = None;
        }
    }

    pub fn transient(&self, slot: TransientSlot) -> Option<&TransientMessage> {
        match slot {
            TransientSlot::Starting => self.starting_message.as_ref(),
            TransientSlot::Upload => self.upload_status.as_ref(),
        }
    }

    fn transient_mut(&mut self, slot: TransientSlot) -> &mut Option<TransientMessage> {
        match slot {
            TransientSlot::Starting => &mut self.starting_message,
            TransientSlot::Upload => &mut self.upload_status,
        }
    }

    /// Clear both transient messages and the summary/dialog error slots
    pub fn clear_messages(&mut self) {
        self.starting_message = None;
        self.upload_status = None;
        self.clear_error(ErrorArea::Summary);
        self.clear_error(ErrorArea::Deploy);
        self.clear_error(ErrorArea::Archive);
    }

    // ─────────────────────────────────────────────────────────
    // Archive sessions
    // ─────────────────────────────────────────────────────────

    /// Open a fresh archive session, replacing a closed-able previous one
    pub fn open_archive_session(&mut self) -> u64 {
        self.next_archive_seq += 1;
        self.archive = Some(ArchiveSession::new(self.next_archive_seq));
        self.next_archive_seq
    }

    /// The open archive session, if it is session `seq`
    pub fn archive_session_mut(&mut self, seq: u64) -> Option<&mut ArchiveSession> {
        self.archive.as_mut().filter(|s| s.seq == seq)
    }
}
