pub mod archive;
pub mod backends;
pub mod core;
pub mod orchestration;
pub mod security;

pub use archive::{Archive, Archiver};
pub use backends::{BackendLoader, GitHubBackend, JFrogBackend};
pub use crate::core::*;
pub use orchestration::{
    BackendFailure, BackendOutcome, OrchestratorOptions, PublishEvent, PublishHandle,
    PublishOrchestrator, PublishReport, start_publish,
};
pub use security::SecureTokenManager;
