//! reqwest-backed [`Gateway`] implementation

use std::path::{Path, PathBuf};
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use srvdeck_core::prelude::*;

use crate::gateway::Gateway;
use crate::protocol::{
    ArchiveUploadResponse, ErrorBody, ExtractionStatus, ServerInfo, StatusReport, StopReport,
    StopRequest,
};
use crate::upload::{chunk_stream, open_archive, ProgressFn, DEFAULT_CHUNK_SIZE};

/// Characters left unescaped in a path segment (matches `encodeURIComponent`
/// for the characters server names use)
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Message used when the transport never reached the server
const UNREACHABLE: &str = "Unable to connect to server.";

/// Connection settings for [`HttpGateway`]
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    /// Budget for ordinary request/response calls
    pub request_timeout: Duration,
    /// Budget for a whole deployment or archive transfer, body included.
    /// It bounds the slowest link a full-size archive can cross.
    pub upload_timeout: Duration,
    pub chunk_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            request_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(14_400),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// HTTP client for the management server
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    config: GatewayConfig,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        url::Url::parse(&config.base_url)
            .map_err(|e| Error::config(format!("invalid base_url '{}': {e}", config.base_url)))?;

        let client = Client::builder()
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            config,
        })
    }

    /// Create a gateway for `url` with default timeouts.
    pub fn with_url(url: impl Into<String>) -> Result<Self> {
        Self::new(GatewayConfig {
            base_url: url.into(),
            ..GatewayConfig::default()
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn server_url(&self, name: &str, action: &str) -> String {
        format!(
            "{}/servers/{}/{}",
            self.base_url,
            utf8_percent_encode(name, PATH_SEGMENT),
            action
        )
    }

    fn extraction_url(&self, task_id: &str) -> String {
        format!(
            "{}/api/files/extraction-status/{}",
            self.base_url,
            utf8_percent_encode(task_id, PATH_SEGMENT)
        )
    }

    /// Send with the ordinary request budget; non-2xx becomes [`Error::Server`]
    /// with `failure` as the fallback message prefix.
    async fn send(&self, request: RequestBuilder, failure: &str) -> Result<Response> {
        self.send_within(request, failure, self.config.request_timeout)
            .await
    }

    async fn send_within(
        &self,
        request: RequestBuilder,
        failure: &str,
        limit: Duration,
    ) -> Result<Response> {
        let response = request
            .timeout(limit)
            .send()
            .await
            .map_err(|e| transport_error(e, failure, limit))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response, failure).await)
        }
    }
}

/// Classify a reqwest failure into the error taxonomy.
fn transport_error(err: reqwest::Error, operation: &str, limit: Duration) -> Error {
    if err.is_timeout() {
        Error::timeout(operation, limit)
    } else if err.is_decode() {
        Error::protocol(err.to_string())
    } else if err.is_connect() {
        Error::network(UNREACHABLE)
    } else {
        Error::network(err.to_string())
    }
}

/// Build a [`Error::Server`] from a non-2xx response, preferring the
/// server's own `{message}`.
async fn error_from_response(response: Response, failure: &str) -> Error {
    let status = response.status();
    let fallback = format!(
        "{failure}: {} - {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    );

    let message = match response.bytes().await {
        Ok(body) => serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.is_empty())
            .unwrap_or(fallback),
        Err(_) => fallback,
    };

    warn!("Server rejected request ({}): {}", status.as_u16(), message);
    Error::server(status.as_u16(), message)
}

async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    let body = response
        .bytes()
        .await
        .map_err(|e| Error::network(e.to_string()))?;
    serde_json::from_slice(&body)
        .map_err(|e| Error::protocol(format!("unexpected {what} response: {e}")))
}

/// `GET /servers/running` answers with one object or a list depending on
/// the server version.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<ServerInfo>),
    One(ServerInfo),
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}

impl Gateway for HttpGateway {
    async fn list_servers(&self) -> Result<Vec<ServerInfo>> {
        let response = self
            .send(self.client.get(self.url("/servers")), "Server error")
            .await?;
        decode(response, "server list").await
    }

    async fn running_servers(&self) -> Result<Vec<ServerInfo>> {
        let response = self
            .send(self.client.get(self.url("/servers/running")), "Server error")
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            debug!("No server is running");
            return Ok(Vec::new());
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::network(e.to_string()))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        match serde_json::from_slice::<OneOrMany>(&body) {
            Ok(OneOrMany::Many(servers)) => Ok(servers),
            Ok(OneOrMany::One(server)) => Ok(vec![server]),
            Err(e) => Err(Error::protocol(format!(
                "unexpected running server response: {e}"
            ))),
        }
    }

    async fn start_server(&self, name: &str) -> Result<String> {
        info!("Requesting start of '{}'", name);
        let response = self
            .send(
                self.client.post(self.server_url(name, "start")),
                "Failed to start server",
            )
            .await?;
        response
            .text()
            .await
            .map_err(|e| Error::network(e.to_string()))
    }

    async fn server_status(&self, name: &str) -> Result<StatusReport> {
        let response = self
            .send(
                self.client.get(self.server_url(name, "status")),
                "Failed to check server status",
            )
            .await?;
        decode(response, "status").await
    }

    async fn stop_server(&self, name: &str) -> Result<StopReport> {
        info!("Requesting stop of '{}'", name);
        let request = self
            .client
            .post(self.url("/servers/stop"))
            .json(&StopRequest { id: name });
        let response = self.send(request, "Failed to stop server").await?;
        decode(response, "stop").await
    }

    async fn upload_deployables(
        &self,
        name: &str,
        deployment_path: &str,
        files: &[PathBuf],
    ) -> Result<()> {
        let mut form = Form::new();
        for path in files {
            let data = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            form = form.part("files", Part::bytes(data).file_name(file_name_of(path)));
        }
        form = form.text("deploymentPath", deployment_path.to_string());

        info!(
            "Uploading {} file(s) to '{}' at {}",
            files.len(),
            name,
            deployment_path
        );
        let request = self
            .client
            .post(self.server_url(name, "upload"))
            .multipart(form);
        let response = self
            .send_within(request, "Failed to upload files", self.config.upload_timeout)
            .await?;

        let body = response.text().await.unwrap_or_default();
        debug!("Upload response for '{}': {}", name, body);
        Ok(())
    }

    async fn upload_archive(
        &self,
        archive: &Path,
        progress: ProgressFn,
    ) -> Result<ArchiveUploadResponse> {
        let (file, total) = open_archive(archive).await?;
        let stream = chunk_stream(file, total, self.config.chunk_size, progress);

        let part = Part::stream_with_length(Body::wrap_stream(stream), total)
            .file_name(file_name_of(archive))
            .mime_str("application/zip")
            .map_err(|e| Error::protocol(e.to_string()))?;
        let form = Form::new().part("file", part);

        info!("Uploading archive {} ({} bytes)", archive.display(), total);
        let request = self
            .client
            .post(self.url("/servers/upload-zip"))
            .multipart(form);
        let response = self
            .send_within(request, "Upload failed", self.config.upload_timeout)
            .await?;
        decode(response, "archive upload").await
    }

    async fn extraction_status(&self, task_id: &str) -> Result<ExtractionStatus> {
        let response = self
            .send(
                self.client.get(self.extraction_url(task_id)),
                "Failed to check extraction status",
            )
            .await?;
        decode(response, "extraction status").await
    }

    async fn cleanup_extraction(&self, task_id: &str) -> Result<()> {
        self.send(
            self.client.delete(self.extraction_url(task_id)),
            "Failed to clean up extraction task",
        )
        .await?;
        Ok(())
    }
}
