//! Configuration structures and types for artifact-publisher
//!
//! This module provides type-safe configuration management with serde support.

use crate::core::error::PublishError;
use crate::core::traits::{MakeLatest, ReleaseRequest};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default GitHub REST API endpoint
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Default number of backends published to at once
pub const DEFAULT_MAX_CONCURRENCY: usize = 2;

/// Default connect timeout for backend HTTP clients
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Root configuration object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishConfig {
    /// Schema version (required)
    pub version: String,

    /// Extend from base configuration file (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    /// Release coordinates and metadata (optional, CLI can supply them)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<ReleaseConfig>,

    /// Backend-specific configurations
    #[serde(default)]
    pub backends: BackendConfigs,

    /// Publish options (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishOptionsConfig>,

    /// Security settings (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityConfig>,
}

/// Release coordinates and metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ReleaseConfig {
    /// Repository owner (user or organization)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Repository name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,

    /// Release tag (e.g., "v1.2.3")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Release display name (default: the tag)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Release notes body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// Branch or commit the tag is created from (default: repository default branch)
    #[serde(skip_serializing_if = "Option::is_none", rename = "targetCommitish")]
    pub target_commitish: Option<String>,

    /// Mark the release as a prerelease
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prerelease: Option<bool>,

    /// Latest-release selection ("true" | "false" | "legacy")
    #[serde(skip_serializing_if = "Option::is_none", rename = "makeLatest")]
    pub make_latest: Option<MakeLatest>,

    /// Discussion category to open for the release
    #[serde(skip_serializing_if = "Option::is_none", rename = "discussionCategory")]
    pub discussion_category: Option<String>,

    /// Let the service generate release notes
    #[serde(skip_serializing_if = "Option::is_none", rename = "generateReleaseNotes")]
    pub generate_release_notes: Option<bool>,
}

/// Backend configurations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BackendConfigs {
    /// GitHub releases backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<GitHubConfig>,

    /// JFrog Artifactory backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jfrog: Option<JFrogConfig>,
}

/// GitHub backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GitHubConfig {
    /// Enable this backend (default: true if defined)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// API token (default: GITHUB_TOKEN environment variable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// REST API base URL (default: https://api.github.com)
    #[serde(skip_serializing_if = "Option::is_none", rename = "apiUrl")]
    pub api_url: Option<String>,
}

impl GitHubConfig {
    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_GITHUB_API_URL)
    }
}

/// JFrog Artifactory backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct JFrogConfig {
    /// Enable this backend (default: true if defined)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Server base URL (e.g., "https://acme.jfrog.io")
    #[serde(skip_serializing_if = "Option::is_none", rename = "baseUrl")]
    pub base_url: Option<String>,

    /// Repository key, optionally followed by a path inside the repository
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Access token (default: JFROG_ACCESS_TOKEN environment variable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// An enabled backend and its configuration
#[derive(Debug, Clone, PartialEq)]
pub enum BackendTarget {
    GitHub(GitHubConfig),
    JFrog(JFrogConfig),
}

impl BackendTarget {
    /// Backend name as used in reports and on the command line
    pub fn name(&self) -> &'static str {
        match self {
            BackendTarget::GitHub(_) => "github",
            BackendTarget::JFrog(_) => "jfrog",
        }
    }

    /// Explicitly configured token, if any
    pub fn configured_token(&self) -> Option<&str> {
        match self {
            BackendTarget::GitHub(config) => config.token.as_deref(),
            BackendTarget::JFrog(config) => config.token.as_deref(),
        }
        .filter(|token| !token.is_empty())
    }
}

/// Publish options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PublishOptionsConfig {
    /// Publish to backends one after another (default: parallel)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequential: Option<bool>,

    /// Maximum number of backends published to at once (default: 2)
    #[serde(skip_serializing_if = "Option::is_none", rename = "maxConcurrency")]
    pub max_concurrency: Option<usize>,

    /// Keep the archive on disk after publishing (default: false)
    #[serde(skip_serializing_if = "Option::is_none", rename = "keepArchive")]
    pub keep_archive: Option<bool>,

    /// Directory the archive is written to (default: working directory)
    #[serde(skip_serializing_if = "Option::is_none", rename = "archiveDir")]
    pub archive_dir: Option<PathBuf>,

    /// Connect timeout for backend requests in seconds (default: 30)
    #[serde(skip_serializing_if = "Option::is_none", rename = "connectTimeoutSecs")]
    pub connect_timeout_secs: Option<u64>,
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityConfig {
    /// Environment variable expansion settings
    #[serde(skip_serializing_if = "Option::is_none", rename = "envVarExpansion")]
    pub env_var_expansion: Option<EnvVarExpansionConfig>,
}

/// Environment variable expansion configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvVarExpansionConfig {
    /// Enable environment variable expansion (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Allowed environment variable prefixes (default: all)
    #[serde(skip_serializing_if = "Option::is_none", rename = "allowedPrefixes")]
    pub allowed_prefixes: Option<Vec<String>>,

    /// Forbidden patterns (regex) for environment variable names
    #[serde(skip_serializing_if = "Option::is_none", rename = "forbiddenPatterns")]
    pub forbidden_patterns: Option<Vec<String>>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            extends: None,
            release: None,
            backends: BackendConfigs::default(),
            publish: None,
            security: None,
        }
    }
}

impl PublishConfig {
    /// Enabled backends, GitHub first
    pub fn targets(&self) -> Vec<BackendTarget> {
        let mut targets = Vec::new();

        if let Some(github) = &self.backends.github
            && github.enabled.unwrap_or(true)
        {
            targets.push(BackendTarget::GitHub(github.clone()));
        }

        if let Some(jfrog) = &self.backends.jfrog
            && jfrog.enabled.unwrap_or(true)
        {
            targets.push(BackendTarget::JFrog(jfrog.clone()));
        }

        targets
    }

    /// Build the immutable release request from the `release` section
    ///
    /// Owner and repository are only required when the GitHub backend is enabled;
    /// a tag is always required.
    pub fn release_request(&self) -> Result<ReleaseRequest, PublishError> {
        let release = self.release.clone().unwrap_or_default();
        let needs_repository = self
            .targets()
            .iter()
            .any(|t| matches!(t, BackendTarget::GitHub(_)));

        let tag = non_empty(release.tag)
            .ok_or_else(|| PublishError::ConfigError("release.tag is required".to_string()))?;
        let owner = non_empty(release.owner);
        let repo = non_empty(release.repo);

        if needs_repository && (owner.is_none() || repo.is_none()) {
            return Err(PublishError::ConfigError(
                "release.owner and release.repo are required for the github backend".to_string(),
            ));
        }

        let mut request = ReleaseRequest::new(
            owner.unwrap_or_default(),
            repo.unwrap_or_default(),
            tag,
        );
        if let Some(name) = non_empty(release.name) {
            request.display_name = name;
        }
        request.body = release.body.unwrap_or_default();
        request.target_commitish = release.target_commitish.unwrap_or_default();
        request.prerelease = release.prerelease.unwrap_or(false);
        request.make_latest = release.make_latest.unwrap_or_default();
        request.discussion_category = non_empty(release.discussion_category);
        request.generate_release_notes = release.generate_release_notes.unwrap_or(false);

        Ok(request)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PublishConfig::default();
        assert_eq!(config.version, "1.0");
        assert!(config.release.is_none());
        assert!(config.targets().is_empty());
    }

    #[test]
    fn test_deserialize_full_config() {
        let yaml = r#"
version: "1.0"
release:
  owner: acme
  repo: widget
  tag: v1.2.3
  makeLatest: "legacy"
  generateReleaseNotes: true
backends:
  github:
    token: ${GITHUB_TOKEN}
  jfrog:
    baseUrl: https://acme.jfrog.io/
    repository: generic-local
publish:
  sequential: true
  maxConcurrency: 1
"#;
        let config: PublishConfig = serde_yaml::from_str(yaml).unwrap();

        let release = config.release.as_ref().unwrap();
        assert_eq!(release.make_latest, Some(MakeLatest::Legacy));
        assert_eq!(release.generate_release_notes, Some(true));
        assert_eq!(
            config.backends.jfrog.as_ref().unwrap().repository.as_deref(),
            Some("generic-local")
        );
        assert_eq!(config.publish.as_ref().unwrap().max_concurrency, Some(1));
    }

    #[test]
    fn test_targets_respect_enabled_flag() {
        let config = PublishConfig {
            backends: BackendConfigs {
                github: Some(GitHubConfig {
                    enabled: Some(false),
                    ..Default::default()
                }),
                jfrog: Some(JFrogConfig::default()),
            },
            ..Default::default()
        };

        let targets = config.targets();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name(), "jfrog");
    }

    #[test]
    fn test_github_default_api_url() {
        let config = GitHubConfig::default();
        assert_eq!(config.api_url(), DEFAULT_GITHUB_API_URL);
    }

    #[test]
    fn test_configured_token_ignores_empty() {
        let target = BackendTarget::GitHub(GitHubConfig {
            token: Some(String::new()),
            ..Default::default()
        });
        assert!(target.configured_token().is_none());
    }

    #[test]
    fn test_release_request_from_config() {
        let config = PublishConfig {
            release: Some(ReleaseConfig {
                owner: Some("acme".to_string()),
                repo: Some("widget".to_string()),
                tag: Some("v1.2.3".to_string()),
                prerelease: Some(true),
                discussion_category: Some(" ".to_string()),
                ..Default::default()
            }),
            backends: BackendConfigs {
                github: Some(GitHubConfig::default()),
                jfrog: None,
            },
            ..Default::default()
        };

        let request = config.release_request().unwrap();
        assert_eq!(request.owner, "acme");
        assert_eq!(request.display_name, "v1.2.3");
        assert!(request.prerelease);
        assert!(request.discussion_category.is_none());
    }

    #[test]
    fn test_release_request_requires_repository_for_github() {
        let config = PublishConfig {
            release: Some(ReleaseConfig {
                tag: Some("v1.2.3".to_string()),
                ..Default::default()
            }),
            backends: BackendConfigs {
                github: Some(GitHubConfig::default()),
                jfrog: None,
            },
            ..Default::default()
        };

        assert!(matches!(
            config.release_request(),
            Err(PublishError::ConfigError(_))
        ));
    }

    #[test]
    fn test_release_request_jfrog_only_needs_tag() {
        let config = PublishConfig {
            release: Some(ReleaseConfig {
                tag: Some("v1.2.3".to_string()),
                ..Default::default()
            }),
            backends: BackendConfigs {
                github: None,
                jfrog: Some(JFrogConfig::default()),
            },
            ..Default::default()
        };

        let request = config.release_request().unwrap();
        assert!(request.owner.is_empty());
        assert_eq!(request.tag, "v1.2.3");
    }
}
