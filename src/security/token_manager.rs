//! Secure token manager with memory-safe handling and masking capabilities
//!
//! Backend credentials are carried as [`SecretString`] so they never end up
//! in `Debug` output or logs; display goes through [`SecureTokenManager::mask_token`].

use crate::core::config::BackendTarget;
use crate::core::error::PublishError;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::env;

/// Backends with the environment variable their token is read from
const BACKEND_TOKENS: &[(&str, &str)] = &[
    ("github", "GITHUB_TOKEN"),
    ("jfrog", "JFROG_ACCESS_TOKEN"),
];

/// Where a resolved token came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Config,
    Environment,
}

/// Secure token manager for backend authentication
///
/// # Examples
///
/// ```
/// use artifact_publisher::security::SecureTokenManager;
/// use secrecy::ExposeSecret;
///
/// let manager = SecureTokenManager::new();
/// if let Some(token) = manager.get_token("github") {
///     println!("GitHub token found: {}", manager.mask_token(token.expose_secret()));
/// }
/// ```
#[derive(Default)]
pub struct SecureTokenManager {
    backend_map: HashMap<String, String>,
}

impl SecureTokenManager {
    /// Creates a new SecureTokenManager with default backend mappings
    ///
    /// # Examples
    ///
    /// ```
    /// use artifact_publisher::security::SecureTokenManager;
    ///
    /// let manager = SecureTokenManager::new();
    /// assert_eq!(manager.get_supported_backends().len(), 2);
    /// ```
    pub fn new() -> Self {
        let backend_map = BACKEND_TOKENS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Self { backend_map }
    }

    /// Retrieves a backend's token from its environment variable
    ///
    /// Returns `None` if the backend is unknown or the variable is unset or empty.
    pub fn get_token(&self, backend_name: &str) -> Option<SecretString> {
        let token_name = self.backend_map.get(backend_name)?;
        let token_value = env::var(token_name).ok().filter(|v| !v.is_empty())?;
        Some(SecretString::new(token_value.into()))
    }

    /// Checks if a token is set for the specified backend
    pub fn has_token(&self, backend_name: &str) -> bool {
        self.get_token(backend_name).is_some()
    }

    /// Resolves the token for a configured backend
    ///
    /// A token written in the configuration wins over the environment.
    pub fn find_token(&self, target: &BackendTarget) -> Option<(SecretString, TokenSource)> {
        if let Some(token) = target.configured_token() {
            return Some((SecretString::new(token.into()), TokenSource::Config));
        }
        self.get_token(target.name())
            .map(|token| (token, TokenSource::Environment))
    }

    /// Like [`find_token`](Self::find_token), but a missing token is a config error
    pub fn resolve_token(&self, target: &BackendTarget) -> Result<SecretString, PublishError> {
        self.find_token(target)
            .map(|(token, _)| token)
            .ok_or_else(|| {
                let hint = self
                    .get_token_name(target.name())
                    .map(|name| format!(" (set backends.{}.token or {})", target.name(), name))
                    .unwrap_or_default();
                PublishError::ConfigError(format!(
                    "no token configured for the {} backend{}",
                    target.name(),
                    hint
                ))
            })
    }

    /// Masks a token for safe logging
    ///
    /// Shows only the first 3 and last 3 characters for identification purposes.
    /// Tokens shorter than 10 characters are fully masked as "****".
    ///
    /// # Examples
    ///
    /// ```
    /// use artifact_publisher::security::SecureTokenManager;
    ///
    /// let manager = SecureTokenManager::new();
    /// assert_eq!(manager.mask_token("abcdef123456"), "abc...456");
    /// assert_eq!(manager.mask_token("short"), "****");
    /// ```
    pub fn mask_token(&self, token: &str) -> String {
        let chars: Vec<char> = token.chars().collect();
        if chars.len() < 10 {
            return "****".to_string();
        }

        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 3..].iter().collect();
        format!("{}...{}", prefix, suffix)
    }

    /// Masks every known token found in a string
    ///
    /// Covers the environment tokens of all backends plus any `extra` tokens,
    /// e.g. tokens written in the configuration file.
    pub fn mask_tokens_in_string(&self, text: &str, extra: &[&str]) -> String {
        let env_tokens: Vec<SecretString> = self
            .backend_map
            .keys()
            .filter_map(|backend| self.get_token(backend))
            .collect();

        let mut masked = text.to_string();
        let tokens = env_tokens
            .iter()
            .map(|t| t.expose_secret())
            .chain(extra.iter().copied())
            .filter(|t| !t.is_empty());

        for token in tokens {
            if let Ok(regex) = Regex::new(&regex::escape(token)) {
                let masked_token = self.mask_token(token);
                masked = regex
                    .replace_all(&masked, masked_token.as_str())
                    .to_string();
            }
        }

        masked
    }

    /// Gets the environment variable name for a backend
    ///
    /// # Examples
    ///
    /// ```
    /// use artifact_publisher::security::SecureTokenManager;
    ///
    /// let manager = SecureTokenManager::new();
    /// assert_eq!(manager.get_token_name("github"), Some("GITHUB_TOKEN"));
    /// assert_eq!(manager.get_token_name("unknown"), None);
    /// ```
    pub fn get_token_name(&self, backend_name: &str) -> Option<&str> {
        self.backend_map.get(backend_name).map(|s| s.as_str())
    }

    /// Returns all supported backend names
    pub fn get_supported_backends(&self) -> Vec<String> {
        self.backend_map.keys().cloned().collect()
    }
}
