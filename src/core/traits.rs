//! Core traits and types for artifact publishing
//!
//! This module defines the release request handed over by the calling layer,
//! the remote records a backend resolves, and the [`Backend`] contract every
//! hosting service implements.

use crate::core::error::PublishError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Content type used for every uploaded archive
pub const OCTET_STREAM: &str = "application/octet-stream";

// ============================================================================
// Release Request
// ============================================================================

/// Whether the created release becomes the repository's latest release
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MakeLatest {
    #[default]
    True,
    False,
    Legacy,
}

impl MakeLatest {
    pub fn as_str(&self) -> &'static str {
        match self {
            MakeLatest::True => "true",
            MakeLatest::False => "false",
            MakeLatest::Legacy => "legacy",
        }
    }
}

impl fmt::Display for MakeLatest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MakeLatest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "true" => Ok(MakeLatest::True),
            "false" => Ok(MakeLatest::False),
            "legacy" => Ok(MakeLatest::Legacy),
            other => Err(format!(
                "invalid make-latest value '{}' (expected true, false or legacy)",
                other
            )),
        }
    }
}

/// Release parameters, built and validated by the calling layer
///
/// The core only ever reads a request; it is passed by shared reference
/// into every backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub owner: String,
    pub repo_name: String,
    pub tag: String,
    pub display_name: String,
    pub body: String,
    pub target_commitish: String,
    pub prerelease: bool,
    pub make_latest: MakeLatest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discussion_category: Option<String>,
    pub generate_release_notes: bool,
}

impl ReleaseRequest {
    /// Create a request with the release name defaulting to the tag
    pub fn new(
        owner: impl Into<String>,
        repo_name: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        let tag = tag.into();
        Self {
            owner: owner.into(),
            repo_name: repo_name.into(),
            display_name: tag.clone(),
            tag,
            body: String::new(),
            target_commitish: String::new(),
            prerelease: false,
            make_latest: MakeLatest::default(),
            discussion_category: None,
            generate_release_notes: false,
        }
    }

    /// `owner/repo@tag`, used in log lines and reports
    pub fn coordinates(&self) -> String {
        format!("{}/{}@{}", self.owner, self.repo_name, self.tag)
    }
}

// ============================================================================
// Remote Records
// ============================================================================

/// A release record held by a release-tracking service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub id: u64,
    pub tag_name: String,
    /// Upload URL as returned by the service, possibly with a `{?name,label}` suffix
    pub upload_url_template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_url: Option<String>,
}

impl Release {
    /// Upload endpoint with any URI-template segment stripped
    pub fn upload_endpoint(&self) -> &str {
        match self.upload_url_template.find('{') {
            Some(idx) => &self.upload_url_template[..idx],
            None => &self.upload_url_template,
        }
    }
}

/// Where a backend places an asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PublishTarget {
    /// A resolved release (release-tracking services)
    Release(Release),
    /// A repository path (binary repositories without a release concept)
    Repository { url: String },
}

impl PublishTarget {
    pub fn release_id(&self) -> Option<u64> {
        match self {
            PublishTarget::Release(release) => Some(release.id),
            PublishTarget::Repository { .. } => None,
        }
    }

    /// Human-facing location of the target
    pub fn location(&self) -> &str {
        match self {
            PublishTarget::Release(release) => release
                .html_url
                .as_deref()
                .unwrap_or_else(|| release.upload_endpoint()),
            PublishTarget::Repository { url } => url,
        }
    }
}

// ============================================================================
// Assets
// ============================================================================

/// A local file to be uploaded under `name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    pub local_path: PathBuf,
    pub content_type: String,
}

impl Asset {
    /// Asset named after the file's base name
    pub fn from_path(local_path: impl Into<PathBuf>) -> Result<Self, PublishError> {
        let local_path = local_path.into();
        let name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PublishError::filesystem(&local_path, "asset path has no UTF-8 file name"))?
            .to_string();

        Ok(Self {
            name,
            local_path,
            content_type: OCTET_STREAM.to_string(),
        })
    }
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAsset {
    pub backend: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub size: u64,
}

// ============================================================================
// Backend Trait
// ============================================================================

/// Capability contract implemented by every hosting backend
///
/// Backends are independent of each other: the orchestrator calls
/// [`Backend::resolve_or_create_release`] and, only if it succeeded,
/// [`Backend::upload_asset`] on each backend without any cross-backend
/// ordering.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Backend name (e.g., "github", "jfrog")
    fn name(&self) -> &str;

    /// Resolve the place the asset goes to, creating a release if the service
    /// has that concept and none exists yet for the requested tag
    ///
    /// Backends without releases return a [`PublishTarget::Repository`]
    /// built from their configuration.
    async fn resolve_or_create_release(
        &self,
        request: &ReleaseRequest,
    ) -> Result<PublishTarget, PublishError>;

    /// Upload `asset` to a target previously returned by this backend
    async fn upload_asset(
        &self,
        target: &PublishTarget,
        asset: &Asset,
    ) -> Result<UploadedAsset, PublishError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_request_defaults() {
        let request = ReleaseRequest::new("acme", "widget", "v1.2.3");

        assert_eq!(request.display_name, "v1.2.3");
        assert_eq!(request.make_latest, MakeLatest::True);
        assert!(!request.prerelease);
        assert!(request.discussion_category.is_none());
        assert_eq!(request.coordinates(), "acme/widget@v1.2.3");
    }

    #[test]
    fn test_make_latest_from_str() {
        assert_eq!("true".parse::<MakeLatest>().unwrap(), MakeLatest::True);
        assert_eq!("FALSE".parse::<MakeLatest>().unwrap(), MakeLatest::False);
        assert_eq!("legacy".parse::<MakeLatest>().unwrap(), MakeLatest::Legacy);
        assert!("maybe".parse::<MakeLatest>().is_err());
    }

    #[test]
    fn test_make_latest_serialization() {
        let json = serde_json::to_string(&MakeLatest::Legacy).unwrap();
        assert_eq!(json, r#""legacy""#);
    }

    #[test]
    fn test_upload_endpoint_strips_template() {
        let release = Release {
            id: 42,
            tag_name: "v1.2.3".to_string(),
            upload_url_template:
                "https://uploads.github.com/repos/acme/widget/releases/42/assets{?name,label}"
                    .to_string(),
            html_url: None,
        };

        assert_eq!(
            release.upload_endpoint(),
            "https://uploads.github.com/repos/acme/widget/releases/42/assets"
        );
    }

    #[test]
    fn test_upload_endpoint_without_template() {
        let release = Release {
            id: 1,
            tag_name: "v1".to_string(),
            upload_url_template: "https://uploads.example.com/assets".to_string(),
            html_url: None,
        };

        assert_eq!(release.upload_endpoint(), "https://uploads.example.com/assets");
    }

    #[test]
    fn test_publish_target_accessors() {
        let target = PublishTarget::Repository {
            url: "https://acme.jfrog.io/artifactory/generic-local".to_string(),
        };

        assert!(target.release_id().is_none());
        assert_eq!(
            target.location(),
            "https://acme.jfrog.io/artifactory/generic-local"
        );
    }

    #[test]
    fn test_asset_from_path() {
        let asset = Asset::from_path("/tmp/out/widget.zip").unwrap();

        assert_eq!(asset.name, "widget.zip");
        assert_eq!(asset.content_type, OCTET_STREAM);
    }

    #[test]
    fn test_asset_from_path_without_file_name() {
        let result = Asset::from_path("/");
        assert!(matches!(result, Err(PublishError::FilesystemError { .. })));
    }
}
