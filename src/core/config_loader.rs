//! Configuration file loader for artifact-publisher
//!
//! This module provides configuration loading, validation, and merging capabilities.

use super::config::*;
use crate::core::error::PublishError;
use log::warn;
use regex::Regex;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Configuration file name
pub const CONFIG_FILENAME: &str = ".artifact-publisher.yaml";

/// Environment variable pattern (${VAR_NAME})
const ENV_VAR_PATTERN: &str = r"\$\{([A-Z_][A-Z0-9_]*)\}";

/// Configuration load options
#[derive(Debug, Clone, Default)]
pub struct ConfigLoadOptions {
    /// Project path to look for the project config in
    pub project_path: PathBuf,

    /// Explicit config file (replaces the project config lookup)
    pub config_path: Option<PathBuf>,

    /// CLI arguments (highest priority)
    pub cli_args: Option<PublishConfig>,

    /// Environment variables
    pub env: HashMap<String, String>,

    /// Skip ~/.artifact-publisher.yaml
    pub skip_global: bool,
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    /// Is configuration valid?
    pub valid: bool,

    /// Validation errors
    pub errors: Vec<ConfigValidationError>,

    /// Validation warnings
    pub warnings: Vec<ConfigValidationWarning>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "backends.jfrog.baseUrl")
    pub field: String,

    /// Error message
    pub message: String,

    /// Expected type/value
    pub expected: Option<String>,

    /// Actual type/value
    pub actual: Option<String>,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    /// Field path
    pub field: String,

    /// Warning message
    pub message: String,

    /// Suggestion
    pub suggestion: Option<String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI arguments
    /// 2. Environment variables
    /// 3. Project config (--config or ./.artifact-publisher.yaml)
    /// 4. Global config (~/.artifact-publisher.yaml)
    /// 5. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<PublishConfig, PublishError> {
        let mut configs: Vec<PublishConfig> = Vec::new();

        // 5. Default values (lowest priority)
        configs.push(PublishConfig::default());

        // 4. Global config
        if !options.skip_global
            && let Some(global_config) = Self::load_global_config().await?
        {
            configs.push(global_config);
        }

        // 3. Project config
        let project_config = match &options.config_path {
            Some(path) => Some(Self::load_config_file(path).await?.ok_or_else(|| {
                PublishError::ConfigError(format!("Config file not found: {}", path.display()))
            })?),
            None => Self::load_project_config(&options.project_path).await?,
        };
        if let Some(project_config) = project_config {
            configs.push(project_config);
        }

        // 2. Environment variables
        if let Some(env_config) = Self::load_env_config(&options.env) {
            configs.push(env_config);
        }

        // 1. CLI arguments (highest priority)
        if let Some(cli_config) = options.cli_args {
            configs.push(cli_config);
        }

        let merged_config = Self::merge_configs(configs);

        Self::expand_env_vars(merged_config, &options.env)
    }

    /// Load global configuration from ~/.artifact-publisher.yaml
    async fn load_global_config() -> Result<Option<PublishConfig>, PublishError> {
        let Ok(home_dir) = env::var("HOME") else {
            return Ok(None);
        };
        let global_config_path = PathBuf::from(home_dir).join(CONFIG_FILENAME);

        Self::load_config_file(&global_config_path).await
    }

    /// Load project configuration from ./.artifact-publisher.yaml
    async fn load_project_config(
        project_path: &Path,
    ) -> Result<Option<PublishConfig>, PublishError> {
        let project_config_path = project_path.join(CONFIG_FILENAME);

        Self::load_config_file(&project_config_path).await
    }

    /// Load configuration from YAML file
    fn load_config_file(
        file_path: &Path,
    ) -> std::pin::Pin<
        Box<
            dyn std::future::Future<Output = Result<Option<PublishConfig>, PublishError>>
                + Send
                + '_,
        >,
    > {
        Box::pin(async move {
            if !file_path.exists() {
                return Ok(None);
            }

            let content = fs::read_to_string(file_path).await.map_err(|e| {
                PublishError::ConfigError(format!(
                    "Failed to read config file {}: {}",
                    file_path.display(),
                    e
                ))
            })?;

            let config: PublishConfig = serde_yaml::from_str(&content).map_err(|e| {
                PublishError::ConfigError(format!(
                    "Failed to parse YAML config {}: {}",
                    file_path.display(),
                    e
                ))
            })?;

            // Handle extends if present
            if let Some(extends_path) = &config.extends {
                let base_path = file_path
                    .parent()
                    .ok_or_else(|| {
                        PublishError::ConfigError("Invalid config file path".to_string())
                    })?
                    .join(extends_path);

                if let Some(base_config) = Self::load_config_file(&base_path).await? {
                    return Ok(Some(Self::merge_configs(vec![base_config, config])));
                }
            }

            Ok(Some(config))
        })
    }

    /// Load configuration from environment variables
    fn load_env_config(env: &HashMap<String, String>) -> Option<PublishConfig> {
        let mut config = PublishConfig::default();
        let mut has_changes = false;

        // PUBLISH_TAG -> release.tag
        if let Some(tag) = env.get("PUBLISH_TAG") {
            config.release.get_or_insert_with(ReleaseConfig::default).tag = Some(tag.clone());
            has_changes = true;
        }

        // PUBLISH_TARGET_COMMITISH -> release.targetCommitish
        if let Some(target) = env.get("PUBLISH_TARGET_COMMITISH") {
            config
                .release
                .get_or_insert_with(ReleaseConfig::default)
                .target_commitish = Some(target.clone());
            has_changes = true;
        }

        // PUBLISH_SEQUENTIAL -> publish.sequential
        if let Some(sequential) = env.get("PUBLISH_SEQUENTIAL").and_then(|s| parse_bool(s)) {
            config
                .publish
                .get_or_insert_with(PublishOptionsConfig::default)
                .sequential = Some(sequential);
            has_changes = true;
        }

        // PUBLISH_KEEP_ARCHIVE -> publish.keepArchive
        if let Some(keep) = env.get("PUBLISH_KEEP_ARCHIVE").and_then(|s| parse_bool(s)) {
            config
                .publish
                .get_or_insert_with(PublishOptionsConfig::default)
                .keep_archive = Some(keep);
            has_changes = true;
        }

        if has_changes { Some(config) } else { None }
    }

    /// Merge multiple configurations with priority
    pub fn merge_configs(configs: Vec<PublishConfig>) -> PublishConfig {
        let mut result = PublishConfig::default();

        for config in configs {
            Self::merge_into(&mut result, config);
        }

        result
    }

    /// Merge source config into target
    fn merge_into(target: &mut PublishConfig, source: PublishConfig) {
        if !source.version.is_empty() {
            target.version = source.version;
        }

        if source.extends.is_some() {
            target.extends = source.extends;
        }

        // Release
        if let Some(src) = source.release {
            let dst = target.release.get_or_insert_with(ReleaseConfig::default);
            merge_opt(&mut dst.owner, src.owner);
            merge_opt(&mut dst.repo, src.repo);
            merge_opt(&mut dst.tag, src.tag);
            merge_opt(&mut dst.name, src.name);
            merge_opt(&mut dst.body, src.body);
            merge_opt(&mut dst.target_commitish, src.target_commitish);
            merge_opt(&mut dst.prerelease, src.prerelease);
            merge_opt(&mut dst.make_latest, src.make_latest);
            merge_opt(&mut dst.discussion_category, src.discussion_category);
            merge_opt(&mut dst.generate_release_notes, src.generate_release_notes);
        }

        // Backends
        if let Some(src) = source.backends.github {
            let dst = target.backends.github.get_or_insert_with(GitHubConfig::default);
            merge_opt(&mut dst.enabled, src.enabled);
            merge_opt(&mut dst.token, src.token);
            merge_opt(&mut dst.api_url, src.api_url);
        }

        if let Some(src) = source.backends.jfrog {
            let dst = target.backends.jfrog.get_or_insert_with(JFrogConfig::default);
            merge_opt(&mut dst.enabled, src.enabled);
            merge_opt(&mut dst.base_url, src.base_url);
            merge_opt(&mut dst.repository, src.repository);
            merge_opt(&mut dst.token, src.token);
        }

        // Publish options
        if let Some(src) = source.publish {
            let dst = target.publish.get_or_insert_with(PublishOptionsConfig::default);
            merge_opt(&mut dst.sequential, src.sequential);
            merge_opt(&mut dst.max_concurrency, src.max_concurrency);
            merge_opt(&mut dst.keep_archive, src.keep_archive);
            merge_opt(&mut dst.archive_dir, src.archive_dir);
            merge_opt(&mut dst.connect_timeout_secs, src.connect_timeout_secs);
        }

        // Security (replaced wholesale)
        if source.security.is_some() {
            target.security = source.security;
        }
    }

    /// Expand environment variables in configuration values
    ///
    /// - Only expands variables matching ${VAR_NAME} pattern
    /// - Respects allowedPrefixes if configured
    /// - Checks forbiddenPatterns if configured
    fn expand_env_vars(
        mut config: PublishConfig,
        env: &HashMap<String, String>,
    ) -> Result<PublishConfig, PublishError> {
        let expansion = config
            .security
            .as_ref()
            .and_then(|s| s.env_var_expansion.clone());

        if !expansion.as_ref().and_then(|e| e.enabled).unwrap_or(true) {
            return Ok(config);
        }

        let allowed_prefixes = expansion.as_ref().and_then(|e| e.allowed_prefixes.clone());

        let forbidden_patterns: Vec<Regex> = expansion
            .and_then(|e| e.forbidden_patterns)
            .unwrap_or_default()
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();

        let expand = |value: &mut Option<String>| -> Result<(), PublishError> {
            if let Some(raw) = value.as_deref() {
                *value = Some(Self::expand_string(
                    raw,
                    env,
                    &allowed_prefixes,
                    &forbidden_patterns,
                )?);
            }
            Ok(())
        };

        if let Some(github) = &mut config.backends.github {
            expand(&mut github.token)?;
            expand(&mut github.api_url)?;
        }

        if let Some(jfrog) = &mut config.backends.jfrog {
            expand(&mut jfrog.token)?;
            expand(&mut jfrog.base_url)?;
            expand(&mut jfrog.repository)?;
        }

        Ok(config)
    }

    /// Expand environment variables in a single string
    fn expand_string(
        input: &str,
        env: &HashMap<String, String>,
        allowed_prefixes: &Option<Vec<String>>,
        forbidden_patterns: &[Regex],
    ) -> Result<String, PublishError> {
        let env_var_regex = Regex::new(ENV_VAR_PATTERN)
            .map_err(|e| PublishError::ConfigError(format!("Invalid env var pattern: {}", e)))?;

        let mut result = input.to_string();
        for cap in env_var_regex.captures_iter(input) {
            let var_name = &cap[1];

            if forbidden_patterns.iter().any(|p| p.is_match(var_name)) {
                warn!(
                    "Environment variable {} matches forbidden pattern, skipping",
                    var_name
                );
                continue;
            }

            if let Some(prefixes) = allowed_prefixes
                && !prefixes.iter().any(|prefix| var_name.starts_with(prefix))
            {
                warn!(
                    "Environment variable {} not allowed by prefix whitelist, skipping",
                    var_name
                );
                continue;
            }

            if let Some(value) = env.get(var_name) {
                result = result.replace(&format!("${{{}}}", var_name), value);
            } else {
                warn!("Environment variable {} not found", var_name);
            }
        }

        Ok(result)
    }

    /// Validate configuration
    pub fn validate(config: &PublishConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Check version (required)
        if config.version.is_empty() {
            errors.push(ConfigValidationError {
                field: "version".to_string(),
                message: "Version is required".to_string(),
                expected: Some("string (e.g., \"1.0\")".to_string()),
                actual: Some("empty".to_string()),
            });
        } else if config.version != "1.0" {
            warnings.push(ConfigValidationWarning {
                field: "version".to_string(),
                message: format!("Unknown version: {}", config.version),
                suggestion: Some("Currently supported version is \"1.0\" only".to_string()),
            });
        }

        // 2. Validate backends
        Self::validate_backends(config, &mut errors, &mut warnings);

        // 3. Validate release coordinates
        Self::validate_release(config, &mut errors);

        // 4. Validate publish options
        if let Some(publish) = &config.publish {
            Self::validate_publish_options(publish, &mut errors);
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Validate backend configurations
    fn validate_backends(
        config: &PublishConfig,
        errors: &mut Vec<ConfigValidationError>,
        warnings: &mut Vec<ConfigValidationWarning>,
    ) {
        let targets = config.targets();
        if targets.is_empty() {
            errors.push(ConfigValidationError {
                field: "backends".to_string(),
                message: "At least one backend must be enabled".to_string(),
                expected: Some("backends.github or backends.jfrog".to_string()),
                actual: Some("none".to_string()),
            });
        }

        for target in &targets {
            if let Some(token) = target.configured_token()
                && token.contains("${")
            {
                warnings.push(ConfigValidationWarning {
                    field: format!("backends.{}.token", target.name()),
                    message: "Token contains an unexpanded environment variable".to_string(),
                    suggestion: Some("Export the referenced variable before publishing".to_string()),
                });
            }

            if let BackendTarget::JFrog(jfrog) = target {
                let base_url = jfrog.base_url.as_deref().unwrap_or_default();
                if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
                    errors.push(ConfigValidationError {
                        field: "backends.jfrog.baseUrl".to_string(),
                        message: "baseUrl must be an http(s) URL".to_string(),
                        expected: Some("https://<server>".to_string()),
                        actual: Some(if base_url.is_empty() {
                            "empty".to_string()
                        } else {
                            base_url.to_string()
                        }),
                    });
                }

                if jfrog.repository.as_deref().unwrap_or_default().trim().is_empty() {
                    errors.push(ConfigValidationError {
                        field: "backends.jfrog.repository".to_string(),
                        message: "repository is required".to_string(),
                        expected: Some("non-empty string".to_string()),
                        actual: Some("empty".to_string()),
                    });
                }
            }
        }
    }

    /// Validate release coordinates
    fn validate_release(config: &PublishConfig, errors: &mut Vec<ConfigValidationError>) {
        let release = config.release.clone().unwrap_or_default();
        let is_blank = |v: &Option<String>| v.as_deref().unwrap_or_default().trim().is_empty();

        if is_blank(&release.tag) {
            errors.push(ConfigValidationError {
                field: "release.tag".to_string(),
                message: "tag is required".to_string(),
                expected: Some("non-empty string (e.g., \"v1.2.3\")".to_string()),
                actual: Some("empty".to_string()),
            });
        }

        let github_enabled = config
            .targets()
            .iter()
            .any(|t| matches!(t, BackendTarget::GitHub(_)));
        if github_enabled {
            for (field, value) in [("release.owner", &release.owner), ("release.repo", &release.repo)] {
                if is_blank(value) {
                    errors.push(ConfigValidationError {
                        field: field.to_string(),
                        message: format!("{} is required for the github backend", field),
                        expected: Some("non-empty string".to_string()),
                        actual: Some("empty".to_string()),
                    });
                }
            }
        }
    }

    /// Validate publish options
    fn validate_publish_options(
        publish: &PublishOptionsConfig,
        errors: &mut Vec<ConfigValidationError>,
    ) {
        if publish.max_concurrency == Some(0) {
            errors.push(ConfigValidationError {
                field: "publish.maxConcurrency".to_string(),
                message: "maxConcurrency must be at least 1".to_string(),
                expected: Some("positive integer".to_string()),
                actual: Some("0".to_string()),
            });
        }
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if result.valid {
            lines.push("✅ Configuration validation succeeded".to_string());
        } else {
            lines.push("❌ Configuration has errors".to_string());
        }

        if !result.errors.is_empty() {
            lines.push("\n🔴 Errors:".to_string());
            for error in &result.errors {
                lines.push(format!("  - [{}] {}", error.field, error.message));
                if let (Some(expected), Some(actual)) = (&error.expected, &error.actual) {
                    lines.push(format!("    Expected: {}", expected));
                    lines.push(format!("    Actual: {}", actual));
                }
            }
        }

        if !result.warnings.is_empty() {
            lines.push("\n🟡 Warnings:".to_string());
            for warning in &result.warnings {
                lines.push(format!("  - [{}] {}", warning.field, warning.message));
                if let Some(suggestion) = &warning.suggestion {
                    lines.push(format!("    Suggestion: {}", suggestion));
                }
            }
        }

        lines.join("\n")
    }
}

fn merge_opt<T>(target: &mut Option<T>, source: Option<T>) {
    if source.is_some() {
        *target = source;
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn valid_config() -> PublishConfig {
        PublishConfig {
            release: Some(ReleaseConfig {
                owner: Some("acme".to_string()),
                repo: Some("widget".to_string()),
                tag: Some("v1.2.3".to_string()),
                ..Default::default()
            }),
            backends: BackendConfigs {
                github: Some(GitHubConfig::default()),
                jfrog: Some(JFrogConfig {
                    base_url: Some("https://acme.jfrog.io".to_string()),
                    repository: Some("generic-local".to_string()),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_load_env_config() {
        let mut env = HashMap::new();
        env.insert("PUBLISH_TAG".to_string(), "v2.0.0".to_string());
        env.insert("PUBLISH_SEQUENTIAL".to_string(), "true".to_string());
        env.insert("PUBLISH_KEEP_ARCHIVE".to_string(), "no".to_string());

        let config = ConfigLoader::load_env_config(&env).unwrap();

        assert_eq!(
            config.release.as_ref().unwrap().tag.as_deref(),
            Some("v2.0.0")
        );
        let publish = config.publish.as_ref().unwrap();
        assert_eq!(publish.sequential, Some(true));
        assert_eq!(publish.keep_archive, Some(false));
    }

    #[test]
    fn test_load_env_config_without_variables() {
        assert!(ConfigLoader::load_env_config(&HashMap::new()).is_none());
    }

    #[test]
    fn test_expand_string() {
        let mut env = HashMap::new();
        env.insert("GITHUB_TOKEN".to_string(), "secret123".to_string());

        let result = ConfigLoader::expand_string("${GITHUB_TOKEN}", &env, &None, &[]).unwrap();

        assert_eq!(result, "secret123");
    }

    #[test]
    fn test_expand_string_with_allowed_prefixes() {
        let mut env = HashMap::new();
        env.insert("JFROG_TOKEN".to_string(), "secret123".to_string());
        env.insert("SECRET_KEY".to_string(), "forbidden".to_string());

        let allowed_prefixes = Some(vec!["JFROG_".to_string()]);

        let input = "${JFROG_TOKEN}-${SECRET_KEY}";
        let result = ConfigLoader::expand_string(input, &env, &allowed_prefixes, &[]).unwrap();

        assert_eq!(result, "secret123-${SECRET_KEY}");
    }

    #[test]
    fn test_expand_string_with_forbidden_pattern() {
        let mut env = HashMap::new();
        env.insert("AWS_SECRET".to_string(), "nope".to_string());

        let forbidden = vec![Regex::new("^AWS_").unwrap()];
        let result = ConfigLoader::expand_string("${AWS_SECRET}", &env, &None, &forbidden).unwrap();

        assert_eq!(result, "${AWS_SECRET}");
    }

    #[test]
    fn test_validate_version_required() {
        let mut config = valid_config();
        config.version = "".to_string();

        let result = ConfigLoader::validate(&config);

        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "version");
    }

    #[test]
    fn test_validate_unknown_version_warning() {
        let mut config = valid_config();
        config.version = "2.0".to_string();

        let result = ConfigLoader::validate(&config);

        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].field, "version");
    }

    #[test]
    fn test_validate_requires_backend() {
        let mut config = valid_config();
        config.backends = BackendConfigs::default();

        let result = ConfigLoader::validate(&config);

        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.field == "backends"));
    }

    #[test]
    fn test_validate_jfrog_fields() {
        let mut config = valid_config();
        config.backends.jfrog = Some(JFrogConfig {
            base_url: Some("acme.jfrog.io".to_string()),
            repository: None,
            ..Default::default()
        });

        let result = ConfigLoader::validate(&config);

        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.field == "backends.jfrog.baseUrl"));
        assert!(result.errors.iter().any(|e| e.field == "backends.jfrog.repository"));
    }

    #[test]
    fn test_validate_github_requires_owner_and_repo() {
        let mut config = valid_config();
        config.release = Some(ReleaseConfig {
            tag: Some("v1.2.3".to_string()),
            ..Default::default()
        });

        let result = ConfigLoader::validate(&config);

        assert!(result.errors.iter().any(|e| e.field == "release.owner"));
        assert!(result.errors.iter().any(|e| e.field == "release.repo"));
    }

    #[test]
    fn test_validate_unexpanded_token_warning() {
        let mut config = valid_config();
        config.backends.github = Some(GitHubConfig {
            token: Some("${GITHUB_TOKEN}".to_string()),
            ..Default::default()
        });

        let result = ConfigLoader::validate(&config);

        assert!(result.valid);
        assert!(result.warnings.iter().any(|w| w.field == "backends.github.token"));
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let mut config = valid_config();
        config.publish = Some(PublishOptionsConfig {
            max_concurrency: Some(0),
            ..Default::default()
        });

        let result = ConfigLoader::validate(&config);

        assert!(!result.valid);
        assert_eq!(result.errors[0].field, "publish.maxConcurrency");
    }

    #[test]
    fn test_merge_configs() {
        let config1 = PublishConfig {
            release: Some(ReleaseConfig {
                owner: Some("acme".to_string()),
                tag: Some("v1.0.0".to_string()),
                ..Default::default()
            }),
            backends: BackendConfigs {
                github: Some(GitHubConfig {
                    api_url: Some("https://ghe.example.com/api/v3".to_string()),
                    ..Default::default()
                }),
                jfrog: None,
            },
            ..Default::default()
        };

        let config2 = PublishConfig {
            release: Some(ReleaseConfig {
                tag: Some("v1.1.0".to_string()), // Override
                ..Default::default()
            }),
            backends: BackendConfigs {
                github: Some(GitHubConfig {
                    token: Some("abc".to_string()),
                    ..Default::default()
                }),
                jfrog: None,
            },
            ..Default::default()
        };

        let merged = ConfigLoader::merge_configs(vec![config1, config2]);

        let release = merged.release.as_ref().unwrap();
        assert_eq!(release.owner.as_deref(), Some("acme"));
        assert_eq!(release.tag.as_deref(), Some("v1.1.0"));
        let github = merged.backends.github.as_ref().unwrap();
        assert_eq!(github.api_url.as_deref(), Some("https://ghe.example.com/api/v3"));
        assert_eq!(github.token.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_load_project_config_with_extends() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("base.yaml"),
            "version: \"1.0\"\nrelease:\n  owner: acme\n  repo: widget\n",
        )
        .unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILENAME),
            "version: \"1.0\"\nextends: base.yaml\nrelease:\n  tag: v1.2.3\nbackends:\n  github:\n    token: ${TEST_GH_TOKEN}\n",
        )
        .unwrap();

        let mut env = HashMap::new();
        env.insert("TEST_GH_TOKEN".to_string(), "ghp_example".to_string());

        let config = ConfigLoader::load(ConfigLoadOptions {
            project_path: temp_dir.path().to_path_buf(),
            env,
            skip_global: true,
            ..Default::default()
        })
        .await
        .unwrap();

        let release = config.release.as_ref().unwrap();
        assert_eq!(release.owner.as_deref(), Some("acme"));
        assert_eq!(release.tag.as_deref(), Some("v1.2.3"));
        assert_eq!(
            config.backends.github.as_ref().unwrap().token.as_deref(),
            Some("ghp_example")
        );
    }

    #[tokio::test]
    async fn test_load_missing_explicit_config_fails() {
        let temp_dir = TempDir::new().unwrap();

        let result = ConfigLoader::load(ConfigLoadOptions {
            project_path: temp_dir.path().to_path_buf(),
            config_path: Some(temp_dir.path().join("missing.yaml")),
            skip_global: true,
            ..Default::default()
        })
        .await;

        assert!(matches!(result, Err(PublishError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_cli_args_override_project_config() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILENAME),
            "version: \"1.0\"\nrelease:\n  tag: v1.0.0\n",
        )
        .unwrap();

        let cli_args = PublishConfig {
            release: Some(ReleaseConfig {
                tag: Some("v9.9.9".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = ConfigLoader::load(ConfigLoadOptions {
            project_path: temp_dir.path().to_path_buf(),
            cli_args: Some(cli_args),
            skip_global: true,
            ..Default::default()
        })
        .await
        .unwrap();

        assert_eq!(config.release.unwrap().tag.as_deref(), Some("v9.9.9"));
    }

    #[test]
    fn test_format_validation_result() {
        let result = ConfigValidationResult {
            valid: false,
            errors: vec![ConfigValidationError {
                field: "version".to_string(),
                message: "Version is required".to_string(),
                expected: Some("string".to_string()),
                actual: Some("empty".to_string()),
            }],
            warnings: vec![ConfigValidationWarning {
                field: "backends.github.token".to_string(),
                message: "Token contains an unexpanded environment variable".to_string(),
                suggestion: Some("Export GITHUB_TOKEN".to_string()),
            }],
        };

        let formatted = ConfigLoader::format_validation_result(&result);

        assert!(formatted.contains("❌ Configuration has errors"));
        assert!(formatted.contains("🔴 Errors:"));
        assert!(formatted.contains("[version]"));
        assert!(formatted.contains("🟡 Warnings:"));
        assert!(formatted.contains("[backends.github.token]"));
    }
}
