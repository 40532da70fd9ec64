//! The transport seam between the controller and the management server

use std::path::{Path, PathBuf};

use srvdeck_core::prelude::*;

use crate::protocol::{ArchiveUploadResponse, ExtractionStatus, ServerInfo, StatusReport, StopReport};
use crate::upload::ProgressFn;

/// Network operations against the management server.
///
/// Implement the `Send` variant, [`Gateway`]; the engine drives it from
/// spawned tasks.
#[trait_variant::make(Gateway: Send)]
pub trait LocalGateway {
    /// `GET /servers`
    async fn list_servers(&self) -> Result<Vec<ServerInfo>>;

    /// `GET /servers/running`. A 204 response yields an empty list.
    async fn running_servers(&self) -> Result<Vec<ServerInfo>>;

    /// `POST /servers/{name}/start`. Acceptance does not imply readiness.
    async fn start_server(&self, name: &str) -> Result<String>;

    /// `GET /servers/{name}/status`
    async fn server_status(&self, name: &str) -> Result<StatusReport>;

    /// `POST /servers/stop`
    async fn stop_server(&self, name: &str) -> Result<StopReport>;

    /// `POST /servers/{name}/upload` with every file plus the target folder
    async fn upload_deployables(
        &self,
        name: &str,
        deployment_path: &str,
        files: &[PathBuf],
    ) -> Result<()>;

    /// `POST /servers/upload-zip`, streaming the archive from disk
    async fn upload_archive(
        &self,
        archive: &Path,
        progress: ProgressFn,
    ) -> Result<ArchiveUploadResponse>;

    /// `GET /api/files/extraction-status/{taskId}`
    async fn extraction_status(&self, task_id: &str) -> Result<ExtractionStatus>;

    /// `DELETE /api/files/extraction-status/{taskId}`
    async fn cleanup_extraction(&self, task_id: &str) -> Result<()>;
}
