//! Wire types for the management server's HTTP API
//!
//! The server speaks snake_case for the server endpoints and camelCase for
//! the archive/extraction endpoints; the serde attributes below follow each
//! endpoint's casing.

use serde::{Deserialize, Serialize};

use srvdeck_core::{LifecycleState, Resource, ResourceId};

/// Port assumed when the server omits one
pub const DEFAULT_PORT: u16 = 8080;

/// Uptime shown for a server the listing reports as running
pub const LISTED_RUNNING_UPTIME_SECS: u64 = 3600;

/// Entry returned by `GET /servers` and `GET /servers/running`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub pid: Option<u64>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub deployments_path: Option<String>,
}

impl ServerInfo {
    /// Map a listing entry to a domain [`Resource`].
    ///
    /// `index` is the entry's position in the listing; it names servers the
    /// API returned without a name.
    pub fn into_resource(self, index: usize, host: &str) -> Resource {
        let name = self
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("server-{}", index + 1));

        let (lifecycle_state, uptime_seconds) = if self.running {
            (LifecycleState::Running, LISTED_RUNNING_UPTIME_SECS)
        } else {
            (LifecycleState::Stopped, 0)
        };

        Resource {
            id: ResourceId::new(name.clone()),
            display_name: name,
            host: host.to_string(),
            port: self.port.unwrap_or(DEFAULT_PORT),
            lifecycle_state,
            uptime_seconds,
            process_id: self.pid,
            path: self.path,
            deployment_path: self.deployments_path,
        }
    }
}

/// Map a whole listing, preserving server order.
pub fn to_resources(servers: Vec<ServerInfo>, host: &str) -> Vec<Resource> {
    servers
        .into_iter()
        .enumerate()
        .map(|(index, info)| info.into_resource(index, host))
        .collect()
}

/// Response of `GET /servers/{name}/status`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    #[serde(default)]
    pub is_started: bool,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub pid: Option<u64>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub path: Option<String>,
}

/// Body of `POST /servers/stop`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopRequest<'a> {
    pub id: &'a str,
}

/// Response of `POST /servers/stop`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopReport {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub pid: Option<u64>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub path: Option<String>,
}

/// Response of `POST /servers/upload-zip`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveUploadResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub server_name: Option<String>,
    /// Present when the server finished extracting before responding
    #[serde(default)]
    pub extracted_path: Option<String>,
    /// Present when extraction continues in the background
    #[serde(default)]
    pub task_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractionState {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl ExtractionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExtractionState::Completed | ExtractionState::Failed)
    }
}

/// Response of `GET /api/files/extraction-status/{taskId}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionStatus {
    #[serde(default)]
    pub task_id: Option<String>,
    pub status: ExtractionState,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub extraction_path: Option<String>,
    #[serde(default)]
    pub progress_percentage: Option<u32>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Error payload carried by non-2xx responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}
