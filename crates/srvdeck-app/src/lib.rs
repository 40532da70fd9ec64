//! srvdeck-app - Application state and orchestration for Server Deck
//!
//! This crate implements the TEA (The Elm Architecture) pattern for state
//! management: resource lifecycle, per-resource operation locks, readiness
//! polling, deployment transfers and archive upload sessions. The [`Engine`]
//! ties state, the message channel and a [`srvdeck_gateway::Gateway`]
//! together and reports changes as [`EngineEvent`]s.

pub mod actions;
pub mod config;
pub mod engine;
pub mod engine_event;
pub mod handler;
pub mod locks;
pub mod message;
pub mod process;
pub mod state;
pub mod upload_session;

// Re-export primary types
pub use engine::Engine;
pub use engine_event::EngineEvent;
pub use handler::{UpdateAction, UpdateResult};
pub use locks::{LockToken, OperationLocks};
pub use message::{ListScope, Message, Readiness, StopOutcome};
pub use state::{AppState, ErrorArea, ResourceView, TransientSlot};
pub use upload_session::{ArchiveCandidate, ArchiveSession, DeployDialog, SelectionSource};
