//! Hosting backends
//!
//! Each backend implements [`crate::core::Backend`] against one remote
//! service: GitHub releases or a JFrog Artifactory repository.

pub mod backend_loader;
pub mod github_backend;
pub mod http;
pub mod jfrog_backend;

pub use backend_loader::BackendLoader;
pub use github_backend::GitHubBackend;
pub use jfrog_backend::{JFrogBackend, repository_url};
