//! Test utilities for gateway consumers
//!
//! [`ScriptedGateway`] records every call it receives and replays responses
//! queued per operation. When a queue is empty it answers with a benign
//! default (empty listings, accepted commands, a ready status).

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use srvdeck_core::prelude::*;

use crate::gateway::Gateway;
use crate::protocol::{
    ArchiveUploadResponse, ExtractionState, ExtractionStatus, ServerInfo, StatusReport,
    StopReport,
};
use crate::upload::{ProgressFn, TransferProgress};

/// A call observed by [`ScriptedGateway`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    ListServers,
    RunningServers,
    Start(String),
    Status(String),
    Stop(String),
    UploadDeployables {
        name: String,
        deployment_path: String,
        files: Vec<PathBuf>,
    },
    UploadArchive(PathBuf),
    ExtractionStatus(String),
    CleanupExtraction(String),
}

#[derive(Default)]
struct Script {
    list: VecDeque<Result<Vec<ServerInfo>>>,
    running: VecDeque<Result<Vec<ServerInfo>>>,
    start: VecDeque<Result<String>>,
    status: VecDeque<Result<StatusReport>>,
    stop: VecDeque<Result<StopReport>>,
    deploy: VecDeque<Result<()>>,
    archive: VecDeque<Result<ArchiveUploadResponse>>,
    extraction: VecDeque<Result<ExtractionStatus>>,
}

/// In-memory gateway with queued responses
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<Script>,
    calls: Mutex<Vec<GatewayCall>>,
    /// Progress steps reported by `upload_archive` as (sent, total)
    archive_progress: Mutex<Vec<(u64, u64)>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_list(&self, response: Result<Vec<ServerInfo>>) -> &Self {
        self.script().list.push_back(response);
        self
    }

    pub fn push_running(&self, response: Result<Vec<ServerInfo>>) -> &Self {
        self.script().running.push_back(response);
        self
    }

    pub fn push_start(&self, response: Result<String>) -> &Self {
        self.script().start.push_back(response);
        self
    }

    pub fn push_status(&self, response: Result<StatusReport>) -> &Self {
        self.script().status.push_back(response);
        self
    }

    pub fn push_stop(&self, response: Result<StopReport>) -> &Self {
        self.script().stop.push_back(response);
        self
    }

    pub fn push_deploy(&self, response: Result<()>) -> &Self {
        self.script().deploy.push_back(response);
        self
    }

    pub fn push_archive(&self, response: Result<ArchiveUploadResponse>) -> &Self {
        self.script().archive.push_back(response);
        self
    }

    pub fn push_extraction(&self, response: Result<ExtractionStatus>) -> &Self {
        self.script().extraction.push_back(response);
        self
    }

    /// Progress steps `upload_archive` reports before answering
    pub fn set_archive_progress(&self, steps: Vec<(u64, u64)>) {
        *self.archive_progress.lock().unwrap() = steps;
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of start commands that reached the gateway
    pub fn start_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GatewayCall::Start(_)))
            .count()
    }

    pub fn status_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GatewayCall::Status(_)))
            .count()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().unwrap().push(call);
    }
}

/// A listing entry for tests
pub fn server_info(name: &str, running: bool) -> ServerInfo {
    ServerInfo {
        name: Some(name.to_string()),
        port: Some(8080),
        running,
        pid: running.then_some(1000),
        path: Some(format!("/opt/{name}")),
        deployments_path: Some(format!("/opt/{name}/deployments")),
    }
}

/// A status report for tests
pub fn status_report(is_started: bool, is_running: bool) -> StatusReport {
    StatusReport {
        is_started,
        is_running,
        ..Default::default()
    }
}

/// An extraction status for tests
pub fn extraction_status(status: ExtractionState, progress: Option<u32>) -> ExtractionStatus {
    ExtractionStatus {
        task_id: Some("task-1".to_string()),
        status,
        message: None,
        extraction_path: None,
        progress_percentage: progress,
        error_message: None,
    }
}

impl Gateway for ScriptedGateway {
    async fn list_servers(&self) -> Result<Vec<ServerInfo>> {
        self.record(GatewayCall::ListServers);
        self.script().list.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn running_servers(&self) -> Result<Vec<ServerInfo>> {
        self.record(GatewayCall::RunningServers);
        self.script()
            .running
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn start_server(&self, name: &str) -> Result<String> {
        self.record(GatewayCall::Start(name.to_string()));
        self.script()
            .start
            .pop_front()
            .unwrap_or_else(|| Ok(format!("Server {name} is starting")))
    }

    async fn server_status(&self, name: &str) -> Result<StatusReport> {
        self.record(GatewayCall::Status(name.to_string()));
        self.script().status.pop_front().unwrap_or_else(|| {
            Ok(StatusReport {
                is_started: true,
                is_running: true,
                pid: Some(1000),
                port: Some(8080),
                path: None,
            })
        })
    }

    async fn stop_server(&self, name: &str) -> Result<StopReport> {
        self.record(GatewayCall::Stop(name.to_string()));
        self.script().stop.pop_front().unwrap_or_else(|| {
            Ok(StopReport {
                name: Some(name.to_string()),
                ..Default::default()
            })
        })
    }

    async fn upload_deployables(
        &self,
        name: &str,
        deployment_path: &str,
        files: &[PathBuf],
    ) -> Result<()> {
        self.record(GatewayCall::UploadDeployables {
            name: name.to_string(),
            deployment_path: deployment_path.to_string(),
            files: files.to_vec(),
        });
        self.script().deploy.pop_front().unwrap_or(Ok(()))
    }

    async fn upload_archive(
        &self,
        archive: &Path,
        progress: ProgressFn,
    ) -> Result<ArchiveUploadResponse> {
        self.record(GatewayCall::UploadArchive(archive.to_path_buf()));
        let steps = self.archive_progress.lock().unwrap().clone();
        for (sent, total) in steps {
            progress(TransferProgress::new(sent, total));
        }
        self.script().archive.pop_front().unwrap_or_else(|| {
            Ok(ArchiveUploadResponse {
                message: Some("File uploaded and extracted successfully".to_string()),
                server_name: None,
                extracted_path: Some("/srv/extracted".to_string()),
                task_id: None,
            })
        })
    }

    async fn extraction_status(&self, task_id: &str) -> Result<ExtractionStatus> {
        self.record(GatewayCall::ExtractionStatus(task_id.to_string()));
        self.script()
            .extraction
            .pop_front()
            .unwrap_or_else(|| Err(Error::server(404, "Extraction task not found")))
    }

    async fn cleanup_extraction(&self, task_id: &str) -> Result<()> {
        self.record(GatewayCall::CleanupExtraction(task_id.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::ignore_progress;

    #[tokio::test]
    async fn test_replays_queued_responses_in_order() {
        let gateway = ScriptedGateway::new();
        gateway
            .push_status(Ok(status_report(false, true)))
            .push_status(Ok(status_report(true, true)));

        assert!(!gateway.server_status("web1").await.unwrap().is_started);
        assert!(gateway.server_status("web1").await.unwrap().is_started);
        assert_eq!(gateway.status_calls(), 2);
    }

    #[tokio::test]
    async fn test_records_calls() {
        let gateway = ScriptedGateway::new();
        gateway.start_server("web1").await.unwrap();
        gateway
            .upload_archive(Path::new("/tmp/a.zip"), ignore_progress())
            .await
            .unwrap();

        assert_eq!(
            gateway.calls(),
            vec![
                GatewayCall::Start("web1".to_string()),
                GatewayCall::UploadArchive(PathBuf::from("/tmp/a.zip")),
            ]
        );
    }

    #[tokio::test]
    async fn test_queued_error_is_returned() {
        let gateway = ScriptedGateway::new();
        gateway.push_stop(Err(Error::network("Unable to connect to server.")));
        assert!(gateway.stop_server("web1").await.unwrap_err().is_network());
    }
}
