//! Handler module - TEA update function and event handlers
//!
//! Organized into submodules:
//! - `update`: Main update() function and message dispatch
//! - `resource`: Listing, start and stop handlers
//! - `upload`: Deployment dialog and archive session handlers

pub(crate) mod resource;
pub(crate) mod update;
pub(crate) mod upload;


use std::path::PathBuf;
use std::time::Duration;

use srvdeck_core::ResourceId;

use crate::locks::LockToken;
use crate::message::{ListScope, Message};
use crate::state::TransientSlot;

// Re-export main entry point
pub use update::update;

/// Actions that the event loop should perform after update
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    /// Fetch a listing and replace the resource collection
    FetchResources { scope: ListScope },

    /// Issue the start command, then poll status until ready or failed.
    /// Both locks held under `token` are released by the completion message.
    StartResource { id: ResourceId, token: LockToken },

    StopResource { id: ResourceId, token: LockToken },

    UploadDeployables {
        id: ResourceId,
        token: LockToken,
        deployment_path: String,
        files: Vec<PathBuf>,
    },

    /// Stream the archive and monitor extraction for session `seq`
    UploadArchive { seq: u64, path: PathBuf },

    /// Close archive session `seq` after `delay` if it is still open
    ScheduleArchiveDismiss { seq: u64, delay: Duration },

    /// Clear transient message `id` after `delay`
    ScheduleTransientClear {
        slot: TransientSlot,
        id: u64,
        delay: Duration,
    },
}

/// Result of processing a message
#[derive(Debug, Default)]
pub struct UpdateResult {
    /// Optional follow-up message to process
    pub message: Option<Message>,
    /// Optional action for the event loop to perform
    pub action: Option<UpdateAction>,
}

impl UpdateResult {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn message(msg: Message) -> Self {
        Self {
            message: Some(msg),
            action: None,
        }
    }

    pub fn action(action: UpdateAction) -> Self {
        Self {
            message: None,
            action: Some(action),
        }
    }
}
