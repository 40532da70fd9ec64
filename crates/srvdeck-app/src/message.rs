//! Message types for the application (TEA pattern)

use std::path::PathBuf;

use srvdeck_core::{ErrorReport, Resource, ResourceId};
use srvdeck_gateway::TransferProgress;

use crate::locks::LockToken;
use crate::state::TransientSlot;
use crate::upload_session::{ArchiveCandidate, SelectionSource};

/// Which listing endpoint a refresh uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    /// `GET /servers`
    All,
    /// `GET /servers/running`
    Running,
}

/// Readiness data reported by the final status query of a start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    pub port: Option<u16>,
    pub pid: Option<u64>,
    pub path: Option<String>,
}

/// Server-confirmed state after a stop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopOutcome {
    pub running: bool,
    pub pid: Option<u64>,
    pub path: Option<String>,
}

/// All possible messages/actions in the application
#[derive(Debug, Clone)]
pub enum Message {
    // ─────────────────────────────────────────────────────────
    // Resource Listing
    // ─────────────────────────────────────────────────────────
    Refresh { scope: ListScope },

    ResourcesLoaded { resources: Vec<Resource> },

    ResourcesLoadFailed { error: ErrorReport },

    // ─────────────────────────────────────────────────────────
    // Start
    // ─────────────────────────────────────────────────────────
    /// Operator asked to start a server
    StartResource { id: ResourceId },

    /// The start command was accepted; readiness polling has begun
    StartAccepted { id: ResourceId, token: LockToken },

    /// A status query answered "running but not ready"
    StartPollPending {
        id: ResourceId,
        token: LockToken,
        attempt: u32,
    },

    StartReady {
        id: ResourceId,
        token: LockToken,
        readiness: Readiness,
    },

    StartFailed {
        id: ResourceId,
        token: LockToken,
        error: ErrorReport,
    },

    // ─────────────────────────────────────────────────────────
    // Stop
    // ─────────────────────────────────────────────────────────
    StopResource { id: ResourceId },

    StopCompleted {
        id: ResourceId,
        token: LockToken,
        outcome: StopOutcome,
    },

    StopFailed {
        id: ResourceId,
        token: LockToken,
        error: ErrorReport,
    },

    /// A background operation ended without reporting (task dropped)
    OperationAbandoned { id: ResourceId, token: LockToken },

    // ─────────────────────────────────────────────────────────
    // Deployment Transfer
    // ─────────────────────────────────────────────────────────
    OpenDeploy { id: ResourceId },

    SelectDeployFiles { files: Vec<PathBuf> },

    SubmitDeploy,

    DeployCompleted { id: ResourceId, token: LockToken },

    DeployFailed {
        id: ResourceId,
        token: LockToken,
        error: ErrorReport,
    },

    CloseDeploy,

    // ─────────────────────────────────────────────────────────
    // Archive Upload
    // ─────────────────────────────────────────────────────────
    OpenArchive,

    SelectArchive {
        candidate: ArchiveCandidate,
        source: SelectionSource,
    },

    ConfirmArchive,

    /// Re-send the retained archive after a failure
    RetryArchive,

    CloseArchive,

    ArchiveProgress {
        seq: u64,
        progress: TransferProgress,
    },

    /// Transfer finished; the server is unpacking the archive
    ArchiveExtracting { seq: u64, message: Option<String> },

    ExtractionProgress {
        seq: u64,
        percent: Option<u32>,
        message: Option<String>,
    },

    ArchiveCompleted {
        seq: u64,
        extraction_path: String,
        message: Option<String>,
    },

    ArchiveFailed { seq: u64, error: ErrorReport },

    ArchiveAutoDismiss { seq: u64 },

    // ─────────────────────────────────────────────────────────
    // Transient Messages
    // ─────────────────────────────────────────────────────────
    ClearTransient { slot: TransientSlot, id: u64 },

    /// Clear transient messages and every error slot
    ClearMessages,
}
