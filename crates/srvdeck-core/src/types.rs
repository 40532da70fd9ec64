//! Core domain type definitions

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a managed server process.
///
/// The management API addresses servers by name, so the id is the server
/// name as reported by the listing endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&ResourceId> for ResourceId {
    fn from(value: &ResourceId) -> Self {
        value.clone()
    }
}

/// Lifecycle classification of a managed server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    #[default]
    Stopped,
    Starting,
    Running,
    /// Never reported by the server; only shown while a stop is in flight
    Stopping,
}

impl LifecycleState {
    pub fn is_running(&self) -> bool {
        matches!(self, LifecycleState::Running)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Stopped => write!(f, "stopped"),
            LifecycleState::Starting => write!(f, "starting"),
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::Stopping => write!(f, "stopping"),
        }
    }
}

/// A managed remote server process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub display_name: String,
    pub host: String,
    pub port: u16,
    pub lifecycle_state: LifecycleState,
    pub uptime_seconds: u64,
    pub process_id: Option<u64>,
    /// Install location of the server on the remote host
    pub path: Option<String>,
    /// Folder deployments are copied into; read-only for the operator
    pub deployment_path: Option<String>,
}

impl Resource {
    pub fn is_running(&self) -> bool {
        self.lifecycle_state.is_running()
    }
}

/// Aggregate counters over the resource collection.
///
/// Always derived with [`Summary::from_resources`]; never edited in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub total_count: usize,
    pub running_count: usize,
}

impl Summary {
    pub fn from_resources<'a>(resources: impl IntoIterator<Item = &'a Resource>) -> Self {
        let mut summary = Summary::default();
        for resource in resources {
            summary.total_count += 1;
            if resource.is_running() {
                summary.running_count += 1;
            }
        }
        summary
    }
}

/// Stage of a large-archive upload session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStage {
    /// Waiting for the operator to pick a file
    #[default]
    Selecting,
    /// A candidate was checked; accepted when no error is recorded
    Validating,
    Transferring,
    /// Server is unpacking the archive
    Extracting,
    Complete,
    Failed,
}

impl UploadStage {
    /// Stages during which the session cannot be dismissed
    pub fn is_in_flight(&self) -> bool {
        matches!(self, UploadStage::Transferring | UploadStage::Extracting)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStage::Complete | UploadStage::Failed)
    }
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UploadStage::Selecting => "selecting",
            UploadStage::Validating => "validating",
            UploadStage::Transferring => "transferring",
            UploadStage::Extracting => "extracting",
            UploadStage::Complete => "complete",
            UploadStage::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(id: &str, state: LifecycleState) -> Resource {
        Resource {
            id: ResourceId::from(id),
            display_name: id.to_string(),
            host: "localhost".to_string(),
            port: 8080,
            lifecycle_state: state,
            uptime_seconds: 0,
            process_id: None,
            path: None,
            deployment_path: None,
        }
    }

    #[test]
    fn test_summary_counts_only_running() {
        let resources = vec![
            resource("a", LifecycleState::Running),
            resource("b", LifecycleState::Stopped),
            resource("c", LifecycleState::Stopping),
            resource("d", LifecycleState::Running),
        ];
        let summary = Summary::from_resources(&resources);
        assert_eq!(summary.total_count, 4);
        assert_eq!(summary.running_count, 2);
    }

    #[test]
    fn test_summary_of_empty_collection() {
        let resources: Vec<Resource> = Vec::new();
        let summary = Summary::from_resources(&resources);
        assert_eq!(summary, Summary::default());
    }

    #[test]
    fn test_upload_stage_flags() {
        assert!(UploadStage::Transferring.is_in_flight());
        assert!(UploadStage::Extracting.is_in_flight());
        assert!(!UploadStage::Failed.is_in_flight());
        assert!(UploadStage::Complete.is_terminal());
        assert!(!UploadStage::Validating.is_terminal());
    }

    #[test]
    fn test_lifecycle_state_serializes_lowercase() {
        let json = serde_json::to_string(&LifecycleState::Running).unwrap();
        assert_eq!(json, "\"running\"");
    }

    #[test]
    fn test_resource_id_display() {
        let id = ResourceId::from("web1");
        assert_eq!(id.to_string(), "web1");
        assert_eq!(id.as_str(), "web1");
    }
}
