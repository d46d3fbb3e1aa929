//! Backend Loader - builds backend instances from configuration
//!
//! # Example
//!
//! ```no_run
//! use artifact_publisher::backends::BackendLoader;
//! use artifact_publisher::core::PublishConfig;
//!
//! # fn example(config: &PublishConfig) -> Result<(), artifact_publisher::core::PublishError> {
//! let backends = BackendLoader::new().load(config)?;
//! println!("Loaded {} backends", backends.len());
//! # Ok(())
//! # }
//! ```

use crate::backends::github_backend::GitHubBackend;
use crate::backends::http;
use crate::backends::jfrog_backend::JFrogBackend;
use crate::core::config::{BackendTarget, DEFAULT_CONNECT_TIMEOUT_SECS, PublishConfig};
use crate::core::error::PublishError;
use crate::core::traits::Backend;
use crate::security::SecureTokenManager;
use std::sync::Arc;
use std::time::Duration;

/// Loader turning configured [`BackendTarget`]s into backend instances
pub struct BackendLoader {
    token_manager: SecureTokenManager,
}

impl Default for BackendLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendLoader {
    pub fn new() -> Self {
        Self {
            token_manager: SecureTokenManager::new(),
        }
    }

    /// Build every enabled backend, GitHub first
    ///
    /// Fails on the first backend that lacks a token or a required endpoint
    /// field, before any network activity.
    pub fn load(&self, config: &PublishConfig) -> Result<Vec<Arc<dyn Backend>>, PublishError> {
        let connect_timeout = Duration::from_secs(
            config
                .publish
                .as_ref()
                .and_then(|p| p.connect_timeout_secs)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        );

        config
            .targets()
            .iter()
            .map(|target| self.load_target(target, connect_timeout))
            .collect()
    }

    /// Build a single backend
    pub fn load_target(
        &self,
        target: &BackendTarget,
        connect_timeout: Duration,
    ) -> Result<Arc<dyn Backend>, PublishError> {
        let token = self.token_manager.resolve_token(target)?;
        let client = http::build_client(target.name(), connect_timeout)?;

        let backend: Arc<dyn Backend> = match target {
            BackendTarget::GitHub(config) => {
                Arc::new(GitHubBackend::new(client, config.api_url(), token))
            }
            BackendTarget::JFrog(config) => {
                let base_url = required(config.base_url.as_deref(), "backends.jfrog.baseUrl")?;
                let repository =
                    required(config.repository.as_deref(), "backends.jfrog.repository")?;
                Arc::new(JFrogBackend::new(client, base_url, repository, token))
            }
        };

        log::debug!("Loaded backend {}", backend.name());
        Ok(backend)
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, PublishError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PublishError::ConfigError(format!("{} is required", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{BackendConfigs, GitHubConfig, JFrogConfig};

    fn config(github: Option<GitHubConfig>, jfrog: Option<JFrogConfig>) -> PublishConfig {
        PublishConfig {
            backends: BackendConfigs { github, jfrog },
            ..PublishConfig::default()
        }
    }

    fn jfrog(base_url: Option<&str>) -> JFrogConfig {
        JFrogConfig {
            enabled: Some(true),
            base_url: base_url.map(str::to_string),
            repository: Some("generic-local".to_string()),
            token: Some("configured-jfrog-token".to_string()),
        }
    }

    #[test]
    fn test_load_in_fixed_order() {
        let config = config(
            Some(GitHubConfig {
                enabled: Some(true),
                token: Some("configured-github-token".to_string()),
                api_url: None,
            }),
            Some(jfrog(Some("https://acme.jfrog.io/"))),
        );

        let backends = BackendLoader::new().load(&config).unwrap();
        let names: Vec<&str> = backends.iter().map(|b| b.name()).collect();

        assert_eq!(names, vec!["github", "jfrog"]);
    }

    #[test]
    fn test_disabled_backend_skipped() {
        let config = config(
            Some(GitHubConfig {
                enabled: Some(false),
                ..GitHubConfig::default()
            }),
            Some(jfrog(Some("https://acme.jfrog.io"))),
        );

        let backends = BackendLoader::new().load(&config).unwrap();

        assert_eq!(backends.len(), 1);
        assert_eq!(backends[0].name(), "jfrog");
    }

    #[test]
    fn test_missing_base_url_is_config_error() {
        let config = config(None, Some(jfrog(None)));

        let result = BackendLoader::new().load(&config);

        match result {
            Err(PublishError::ConfigError(message)) => {
                assert!(message.contains("backends.jfrog.baseUrl"))
            }
            Err(other) => panic!("expected ConfigError, got {:?}", other),
            Ok(_) => panic!("expected ConfigError"),
        }
    }

    #[test]
    fn test_no_backends() {
        let backends = BackendLoader::new()
            .load(&PublishConfig::default())
            .unwrap();
        assert!(backends.is_empty());
    }
}
