//! # srvdeck-core - Core Domain Types
//!
//! Foundation crate for Server Deck. Provides domain types, error handling
//! and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, thiserror, tracing).
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`Resource`] - A managed server process as last fetched
//! - [`ResourceId`] - Server name used to address it
//! - [`LifecycleState`] - Stopped, Starting, Running, Stopping
//! - [`Summary`] - Aggregate counters derived from the resource collection
//! - [`UploadStage`] - Stage of a large-archive upload session
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Error enum covering transport, lifecycle and upload failures
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use srvdeck_core::prelude::*;
//! ```

pub mod error;
pub mod logging;
pub mod prelude;
pub mod types;

// Re-export commonly used types at crate root for convenience
pub use error::{Error, ErrorKind, ErrorReport, Result, ResultExt};
pub use types::{LifecycleState, Resource, ResourceId, Summary, UploadStage};
