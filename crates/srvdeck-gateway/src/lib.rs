//! # srvdeck-gateway - Management Server Transport
//!
//! HTTP transport for the remote management server: server listing,
//! start/stop commands, status queries, deployment uploads, and streaming
//! archive uploads with extraction tracking.
//!
//! Depends on [`srvdeck_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Transport Seam
//! - [`Gateway`] - Async trait every transport implements (`Send` futures)
//! - [`HttpGateway`] - reqwest implementation
//! - [`GatewayConfig`] - Base URL, timeouts, chunk size
//!
//! ### Wire Types
//! - [`ServerInfo`], [`StatusReport`], [`StopReport`] - Server endpoints
//! - [`ArchiveUploadResponse`], [`ExtractionStatus`] - Archive endpoints
//! - [`to_resources()`] - Map a listing to domain [`srvdeck_core::Resource`]s
//!
//! ### Archive Streaming
//! - [`TransferProgress`] - Bytes sent so far
//! - [`ProgressFn`] - Observer invoked per chunk

pub mod client;
pub mod gateway;
pub mod protocol;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;
pub mod upload;

pub use client::{GatewayConfig, HttpGateway};
pub use gateway::{Gateway, LocalGateway};
pub use protocol::{
    to_resources, ArchiveUploadResponse, ExtractionState, ExtractionStatus, ServerInfo,
    StatusReport, StopReport,
};
pub use upload::{ignore_progress, ProgressFn, TransferProgress, DEFAULT_CHUNK_SIZE};
