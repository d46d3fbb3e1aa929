//! Orchestration layer for artifact publishing
//!
//! This module provides the high-level components that archive a source
//! directory once and publish it to every configured backend.

pub mod publish_orchestrator;
pub mod publish_worker;

// Re-export main types for convenience
pub use publish_orchestrator::{
    BackendFailure, BackendOutcome, OrchestratorOptions, PublishOrchestrator, PublishReport,
};
pub use publish_worker::{PublishEvent, PublishHandle, start_publish};
