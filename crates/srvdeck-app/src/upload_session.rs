//! Upload dialog state: deployment transfers and archive sessions

use std::path::{Path, PathBuf};

use serde::Serialize;

use srvdeck_core::{ErrorReport, ResourceId, UploadStage};
use srvdeck_gateway::TransferProgress;

use crate::locks::LockToken;

/// Media types accepted as archives in addition to a `.zip` suffix
pub const ARCHIVE_MEDIA_TYPES: &[&str] = &[
    "application/zip",
    "application/x-zip-compressed",
    "application/x-zip",
    "application/octet-stream",
];

/// Share of the progress bar given to the byte transfer; extraction fills
/// the rest.
pub const TRANSFER_SHARE: u8 = 90;

pub const MSG_NOT_AN_ARCHIVE: &str = "Please select a ZIP file (.zip)";
pub const MSG_EMPTY_FILE: &str = "File is empty";
pub const MSG_NO_FILE: &str = "Please select a file to upload";
pub const MSG_NO_DEPLOYMENT_PATH: &str = "Deployment path not available for this server";

/// How the operator picked a file. Both paths run the same validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionSource {
    Browse,
    Drop,
}

/// A file offered for archive upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveCandidate {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    /// Declared media type, when the selection source provides one
    pub media_type: Option<String>,
}

impl ArchiveCandidate {
    /// Describe a file on disk; the media type is left undeclared.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let size = std::fs::metadata(path)?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size,
            media_type: None,
        })
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    pub fn looks_like_archive(&self) -> bool {
        let by_type = self
            .media_type
            .as_deref()
            .is_some_and(|t| ARCHIVE_MEDIA_TYPES.contains(&t));
        by_type || self.file_name.to_ascii_lowercase().ends_with(".zip")
    }
}

/// Human-readable form of the size ceiling, e.g. "5 GB"
pub fn format_limit(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB && bytes % GB == 0 {
        format!("{} GB", bytes / GB)
    } else if bytes >= MB && bytes % MB == 0 {
        format!("{} MB", bytes / MB)
    } else if bytes >= KB && bytes % KB == 0 {
        format!("{} KB", bytes / KB)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Check a candidate before any network call is made.
pub fn validate_archive(candidate: &ArchiveCandidate, max_bytes: u64) -> Result<(), ErrorReport> {
    if !candidate.looks_like_archive() {
        return Err(ErrorReport::validation(MSG_NOT_AN_ARCHIVE));
    }
    if candidate.size == 0 {
        return Err(ErrorReport::validation(MSG_EMPTY_FILE));
    }
    if candidate.size > max_bytes {
        return Err(ErrorReport::validation(format!(
            "File size must be less than {}",
            format_limit(max_bytes)
        )));
    }
    Ok(())
}

/// A large-archive upload, from selection to completion
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveSession {
    /// Distinguishes this session from earlier ones; late task messages and
    /// the auto-dismiss timer are matched against it.
    pub seq: u64,
    pub candidate: Option<ArchiveCandidate>,
    pub source: Option<SelectionSource>,
    pub stage: UploadStage,
    pub transferred_bytes: u64,
    pub total_bytes: u64,
    pub progress_percent: u8,
    pub stage_label: String,
    pub extraction_path: Option<String>,
    pub error: Option<ErrorReport>,
}

impl ArchiveSession {
    pub fn new(seq: u64) -> Self {
        Self {
            seq,
            candidate: None,
            source: None,
            stage: UploadStage::Selecting,
            transferred_bytes: 0,
            total_bytes: 0,
            progress_percent: 0,
            stage_label: String::new(),
            extraction_path: None,
            error: None,
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.candidate.as_ref().map(|c| c.file_name.as_str())
    }

    /// A candidate passed validation and can be confirmed
    pub fn is_ready(&self) -> bool {
        self.stage == UploadStage::Validating && self.candidate.is_some() && self.error.is_none()
    }

    pub fn can_close(&self) -> bool {
        !self.stage.is_in_flight()
    }

    /// Reset progress for a fresh transfer of the current candidate
    pub fn begin_transfer(&mut self) {
        self.stage = UploadStage::Transferring;
        self.transferred_bytes = 0;
        self.total_bytes = self.candidate.as_ref().map_or(0, |c| c.size);
        self.progress_percent = 0;
        self.stage_label = "Uploading archive".to_string();
        self.extraction_path = None;
        self.error = None;
    }

    /// Raise progress, never lowering it
    pub fn advance(&mut self, percent: u8) {
        self.progress_percent = self.progress_percent.max(percent.min(100));
    }

    pub fn record_transfer(&mut self, progress: TransferProgress) {
        self.transferred_bytes = self.transferred_bytes.max(progress.transferred_bytes);
        if progress.total_bytes > 0 {
            self.total_bytes = progress.total_bytes;
        }
        let scaled = u16::from(progress.percent()) * u16::from(TRANSFER_SHARE) / 100;
        self.advance(scaled as u8);
    }

    /// Map a server-reported extraction percentage into the final band
    pub fn record_extraction(&mut self, server_percent: u32) {
        let pct = server_percent.min(100) as u16;
        let span = u16::from(100 - TRANSFER_SHARE);
        let scaled = u16::from(TRANSFER_SHARE) + pct * span / 100;
        self.advance(scaled as u8);
    }
}

/// Deployment transfer dialog for one resource
#[derive(Debug, Clone, Serialize)]
pub struct DeployDialog {
    pub resource: ResourceId,
    /// Resolved from the resource; never edited by the operator
    pub deployment_path: Option<String>,
    pub files: Vec<PathBuf>,
    /// Held while the transfer is in flight
    #[serde(skip)]
    pub lock: Option<LockToken>,
    pub error: Option<ErrorReport>,
}

impl DeployDialog {
    pub fn new(resource: ResourceId, deployment_path: Option<String>) -> Self {
        Self {
            resource,
            deployment_path,
            files: Vec::new(),
            lock: None,
            error: None,
        }
    }

    pub fn is_uploading(&self) -> bool {
        self.lock.is_some()
    }

    /// Check the dialog can be submitted, yielding the resolved path.
    pub fn validate(&self) -> Result<&str, ErrorReport> {
        if self.files.is_empty() {
            return Err(ErrorReport::validation(MSG_NO_FILE));
        }
        match self.deployment_path.as_deref() {
            Some(path) if !path.is_empty() => Ok(path),
            _ => Err(ErrorReport::validation(MSG_NO_DEPLOYMENT_PATH)),
        }
    }
}
