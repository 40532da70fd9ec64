//! Domain events emitted by the Engine for external consumers
//!
//! Events are derived by comparing state before and after each message and
//! broadcast via `Engine::subscribe()`. They serialize as one JSON object
//! with an `event` tag, which is what the CLI prints.

use serde::Serialize;

use srvdeck_core::{ErrorReport, LifecycleState, ResourceId, Summary, UploadStage};

use crate::state::{ErrorArea, TransientSlot};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    // ─────────────────────────────────────────────────────────
    // Resources
    // ─────────────────────────────────────────────────────────
    /// The listing was replaced
    ResourcesLoaded { count: usize },

    /// A resource's displayed lifecycle state changed
    ResourceStateChanged {
        id: ResourceId,
        old_state: LifecycleState,
        new_state: LifecycleState,
        uptime_seconds: u64,
    },

    SummaryChanged { summary: Summary },

    /// A start is still waiting for the server to report ready
    PollTick { id: ResourceId, attempt: u32 },

    // ─────────────────────────────────────────────────────────
    // Messages and errors
    // ─────────────────────────────────────────────────────────
    MessageShown { slot: TransientSlot, text: String },

    MessageCleared { slot: TransientSlot },

    ErrorRaised { area: ErrorArea, error: ErrorReport },

    ErrorCleared { area: ErrorArea },

    // ─────────────────────────────────────────────────────────
    // Archive upload
    // ─────────────────────────────────────────────────────────
    UploadStageChanged {
        stage: UploadStage,
        label: String,
        extraction_path: Option<String>,
    },

    UploadProgress {
        progress_percent: u8,
        transferred_bytes: u64,
        total_bytes: u64,
    },

    /// The archive dialog was closed or auto-dismissed
    UploadClosed,

    // ─────────────────────────────────────────────────────────
    // Engine Lifecycle
    // ─────────────────────────────────────────────────────────
    Shutdown,
}

impl EngineEvent {
    /// Returns a short string label for this event type (for logging/debugging).
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ResourcesLoaded { .. } => "resources_loaded",
            Self::ResourceStateChanged { .. } => "resource_state_changed",
            Self::SummaryChanged { .. } => "summary_changed",
            Self::PollTick { .. } => "poll_tick",
            Self::MessageShown { .. } => "message_shown",
            Self::MessageCleared { .. } => "message_cleared",
            Self::ErrorRaised { .. } => "error_raised",
            Self::ErrorCleared { .. } => "error_cleared",
            Self::UploadStageChanged { .. } => "upload_stage_changed",
            Self::UploadProgress { .. } => "upload_progress",
            Self::UploadClosed => "upload_closed",
            Self::Shutdown => "shutdown",
        }
    }
}
