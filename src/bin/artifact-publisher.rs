//! Artifact Publisher CLI
//!
//! Archive a build output directory and publish it to GitHub releases and
//! JFrog Artifactory

use anyhow::{Context, Result};
use artifact_publisher::{
    Archiver, BackendLoader, CONFIG_FILENAME, ConfigLoadOptions, ConfigLoader, MakeLatest,
    OrchestratorOptions, PublishConfig, PublishEvent, PublishOrchestrator, PublishReport,
    SecureTokenManager,
    core::{BackendConfigs, GitHubConfig, JFrogConfig, PublishOptionsConfig, ReleaseConfig},
    start_publish,
};
use clap::{Args, Parser, Subcommand};
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

const BACKEND_NAMES: &[&str] = &["github", "jfrog"];

const STARTER_CONFIG: &str = r#"# artifact-publisher configuration
version: "1.0"

release:
  owner: acme
  repo: widget
  tag: v0.1.0
  # name: "Widget 0.1.0"
  # body: "Release notes"
  # targetCommitish: main
  prerelease: false
  makeLatest: "true"
  generateReleaseNotes: false

backends:
  github:
    enabled: true
    # token defaults to the GITHUB_TOKEN environment variable
    # token: ${GITHUB_TOKEN}
  jfrog:
    enabled: false
    baseUrl: https://acme.jfrog.io
    repository: generic-local
    # token defaults to the JFROG_ACCESS_TOKEN environment variable

publish:
  sequential: false
  maxConcurrency: 2
  keepArchive: false
"#;

/// Archive a directory and publish it to GitHub releases and JFrog Artifactory
#[derive(Parser)]
#[command(name = "artifact-publisher")]
#[command(version)]
#[command(about = "Publish a build output directory to GitHub releases and JFrog Artifactory", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive a directory and publish it to every enabled backend
    Publish {
        /// Directory to archive and publish
        #[arg(value_name = "SOURCE_DIR")]
        source_dir: PathBuf,

        #[command(flatten)]
        release: ReleaseArgs,

        /// Comma-separated list of backends to publish to (github, jfrog)
        #[arg(long)]
        backends: Option<String>,

        /// Publish to backends one after another
        #[arg(long)]
        sequential: bool,

        /// Maximum number of backends published to at once
        #[arg(long)]
        max_concurrency: Option<usize>,

        /// Keep the archive after publishing
        #[arg(long)]
        keep_archive: bool,

        /// Directory the archive is written to (defaults to current directory)
        #[arg(long)]
        archive_dir: Option<PathBuf>,

        /// Configuration file (defaults to ./.artifact-publisher.yaml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build the archive only
    Archive {
        /// Directory to archive
        #[arg(value_name = "SOURCE_DIR")]
        source_dir: PathBuf,

        /// Directory the archive is written to (defaults to current directory)
        #[arg(long)]
        archive_dir: Option<PathBuf>,

        /// List archive entries
        #[arg(short, long)]
        list: bool,
    },

    /// Validate configuration and show credential status
    Check {
        /// Configuration file (defaults to ./.artifact-publisher.yaml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write a starter .artifact-publisher.yaml
    Init {
        /// Project path (defaults to current directory)
        #[arg(value_name = "PROJECT_PATH")]
        project_path: Option<PathBuf>,

        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Release fields; each overrides the configuration file when given
#[derive(Args, Default)]
struct ReleaseArgs {
    /// Repository owner
    #[arg(long)]
    owner: Option<String>,

    /// Repository name
    #[arg(long)]
    repo: Option<String>,

    /// Release tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Release display name (defaults to the tag)
    #[arg(long)]
    name: Option<String>,

    /// Release notes
    #[arg(long)]
    body: Option<String>,

    /// Branch or commit the tag is created from
    #[arg(long)]
    target_commitish: Option<String>,

    /// Mark the release as a prerelease
    #[arg(long)]
    prerelease: bool,

    /// Whether the release becomes latest (true, false, legacy)
    #[arg(long)]
    make_latest: Option<MakeLatest>,

    /// Discussion category to create for the release
    #[arg(long)]
    discussion_category: Option<String>,

    /// Let GitHub generate release notes
    #[arg(long)]
    generate_release_notes: bool,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let result = run().await;

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Publish {
            source_dir,
            release,
            backends,
            sequential,
            max_concurrency,
            keep_archive,
            archive_dir,
            config,
            json,
        } => {
            let cli_config = cli_config(
                release,
                backends.as_deref(),
                PublishOptionsConfig {
                    sequential: sequential.then_some(true),
                    max_concurrency,
                    keep_archive: keep_archive.then_some(true),
                    archive_dir,
                    connect_timeout_secs: None,
                },
            )?;
            publish_command(source_dir, config, cli_config, json).await
        }
        Commands::Archive {
            source_dir,
            archive_dir,
            list,
        } => archive_command(source_dir, archive_dir, list).await,
        Commands::Check { config } => check_command(config).await,
        Commands::Init {
            project_path,
            force,
        } => {
            let path = project_path.unwrap_or_else(|| PathBuf::from("."));
            init_command(&path, force).await
        }
    }
}

/// Configuration layer built from command line arguments
fn cli_config(
    release: ReleaseArgs,
    backends: Option<&str>,
    publish: PublishOptionsConfig,
) -> Result<PublishConfig> {
    let mut config = PublishConfig {
        release: Some(ReleaseConfig {
            owner: release.owner,
            repo: release.repo,
            tag: release.tag,
            name: release.name,
            body: release.body,
            target_commitish: release.target_commitish,
            prerelease: release.prerelease.then_some(true),
            make_latest: release.make_latest,
            discussion_category: release.discussion_category,
            generate_release_notes: release.generate_release_notes.then_some(true),
        }),
        publish: Some(publish),
        ..PublishConfig::default()
    };

    if let Some(list) = backends {
        let selected: Vec<&str> = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if let Some(unknown) = selected.iter().find(|s| !BACKEND_NAMES.contains(s)) {
            anyhow::bail!(
                "Unknown backend '{}' (expected one of: {})",
                unknown,
                BACKEND_NAMES.join(", ")
            );
        }

        config.backends = BackendConfigs {
            github: Some(GitHubConfig {
                enabled: Some(selected.contains(&"github")),
                ..GitHubConfig::default()
            }),
            jfrog: Some(JFrogConfig {
                enabled: Some(selected.contains(&"jfrog")),
                ..JFrogConfig::default()
            }),
        };
    }

    Ok(config)
}

async fn load_config(
    config_path: Option<PathBuf>,
    cli_args: Option<PublishConfig>,
) -> Result<PublishConfig> {
    let project_path = env::current_dir().context("Failed to read current directory")?;
    let env: HashMap<String, String> = env::vars().collect();

    let config = ConfigLoader::load(ConfigLoadOptions {
        project_path,
        config_path,
        cli_args,
        env,
        skip_global: false,
    })
    .await?;

    Ok(config)
}

async fn publish_command(
    source_dir: PathBuf,
    config_path: Option<PathBuf>,
    cli_args: PublishConfig,
    json: bool,
) -> Result<i32> {
    if !json {
        println!("\n📦 artifact-publisher\n");
    }

    let config = load_config(config_path, Some(cli_args)).await?;

    let validation = ConfigLoader::validate(&config);
    if !validation.valid {
        eprintln!("{}", ConfigLoader::format_validation_result(&validation));
        return Ok(1);
    }
    for warning in &validation.warnings {
        log::warn!("[{}] {}", warning.field, warning.message);
    }

    let mask = TokenMask::new(&config);
    let request = config.release_request()?;
    let backends = BackendLoader::new().load(&config)?;
    let options = OrchestratorOptions::from_config(&config);

    if !json {
        println!("Release: {}", request.coordinates());
        println!(
            "Backends: {}",
            backends
                .iter()
                .map(|b| b.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!(
            "Mode: {}\n",
            if options.sequential {
                "Sequential".to_string()
            } else {
                format!("Parallel (max {} concurrent)", options.max_concurrency)
            }
        );
    }

    let orchestrator = Arc::new(PublishOrchestrator::new(backends, options));
    let mut handle = start_publish(
        &tokio::runtime::Handle::current(),
        orchestrator,
        source_dir,
        request,
    );

    // Ctrl-C stops backend calls that have not been dispatched yet
    let cancel = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n⏹️  Cancelling publish...");
            cancel.cancel();
        }
    });

    while let Some(event) = handle.next_event().await {
        if !json {
            print_event(&event, &mask);
        }
    }

    let report = match handle.wait().await {
        Ok(report) => report,
        Err(e) => {
            if json {
                let error = serde_json::json!({
                    "success": false,
                    "code": e.code(),
                    "fatal": e.is_fatal_for_publish(),
                    "error": mask.apply(&e.to_string()),
                });
                println!("{}", serde_json::to_string_pretty(&error)?);
            } else {
                if e.is_fatal_for_publish() {
                    eprintln!("\n❌ Publishing aborted before any upload");
                }
                eprintln!("\n❌ Publishing failed: {}", mask.apply(&e.to_string()));
                for action in e.suggested_actions() {
                    eprintln!("  💡 {}", action);
                }
            }
            return Ok(1);
        }
    };

    if json {
        println!("{}", mask.apply(&serde_json::to_string_pretty(&report)?));
    } else {
        print_summary(&report, &mask);
    }

    Ok(if report.success { 0 } else { 1 })
}

/// Masks every token known to this run in user-facing output
struct TokenMask {
    manager: SecureTokenManager,
    configured: Vec<String>,
}

impl TokenMask {
    fn new(config: &PublishConfig) -> Self {
        Self {
            manager: SecureTokenManager::new(),
            configured: config
                .targets()
                .iter()
                .filter_map(|target| target.configured_token().map(str::to_string))
                .collect(),
        }
    }

    fn apply(&self, text: &str) -> String {
        let extra: Vec<&str> = self.configured.iter().map(String::as_str).collect();
        self.manager.mask_tokens_in_string(text, &extra)
    }
}

fn print_event(event: &PublishEvent, mask: &TokenMask) {
    match event {
        PublishEvent::ArchiveCreated {
            path,
            size,
            entries,
        } => println!(
            "🗜️  Archive created: {} ({} entries, {})",
            path.display(),
            entries,
            format_size(*size)
        ),
        PublishEvent::TargetResolved {
            backend,
            location,
            release_id,
        } => match release_id {
            Some(id) => println!("🏷️  {}: release {} ({})", backend, id, location),
            None => println!("📁 {}: {}", backend, location),
        },
        PublishEvent::AssetUploaded { backend, asset } => println!(
            "⬆️  {}: uploaded {} ({})",
            backend,
            asset.name,
            format_size(asset.size)
        ),
        PublishEvent::BackendFailed {
            backend, message, ..
        } => println!("❌ {}: {}", backend, mask.apply(message)),
        PublishEvent::Finished { .. } => {}
    }
}

fn print_summary(report: &PublishReport, mask: &TokenMask) {
    println!("\n{}", "=".repeat(50));
    println!("📊 Publish Summary");
    println!("{}", "=".repeat(50));

    for outcome in &report.outcomes {
        if outcome.success {
            println!("✅ {} ({}ms)", outcome.backend, outcome.duration_ms);
            if let Some(url) = &outcome.asset_url {
                println!("   {}", url);
            }
        } else if let Some(error) = &outcome.error {
            println!("❌ {} [{}]", outcome.backend, error.code);
            println!("   {}", mask.apply(&error.detail));
            for action in &error.suggested_actions {
                println!("   💡 {}", action);
            }
        }
    }

    if report.archive_kept {
        println!("\n🗜️  Archive kept at {}", report.archive_path.display());
    }

    println!(
        "\nSucceeded: {}  Failed: {}  ({}ms)",
        report.succeeded().len(),
        report.failed().len(),
        report.duration_ms
    );

    if report.success {
        println!("\n✅ Publishing completed successfully!");
    } else {
        println!("\n❌ Publishing completed with errors");
    }
}

async fn archive_command(
    source_dir: PathBuf,
    archive_dir: Option<PathBuf>,
    list: bool,
) -> Result<i32> {
    println!("\n🗜️  Archive\n");

    let archiver = match archive_dir {
        Some(dir) => Archiver::new(dir),
        None => Archiver::in_working_dir()?,
    };

    let archive = tokio::task::spawn_blocking(move || archiver.create(&source_dir))
        .await
        .context("Archive task failed")??;

    println!("✅ {}", archive.path.display());
    println!(
        "   {} entries, {}",
        archive.entries.len(),
        format_size(archive.size)
    );

    if list {
        println!();
        for entry in &archive.entries {
            println!("   {}", entry);
        }
    }

    Ok(0)
}

async fn check_command(config_path: Option<PathBuf>) -> Result<i32> {
    println!("\n🔍 Configuration Check\n");

    let config = load_config(config_path, None).await?;
    let validation = ConfigLoader::validate(&config);
    println!("{}", ConfigLoader::format_validation_result(&validation));

    let targets = config.targets();
    if targets.is_empty() {
        println!("⚠️  No backends enabled");
        return Ok(1);
    }

    let token_manager = SecureTokenManager::new();
    let mut all_tokens = true;

    println!("\n🔑 Credentials:");
    for target in &targets {
        match token_manager.find_token(target) {
            Some((token, source)) => println!(
                "  ✅ {}: {} ({:?})",
                target.name(),
                token_manager.mask_token(token.expose_secret()),
                source
            ),
            None => {
                all_tokens = false;
                println!(
                    "  ❌ {}: no token (set backends.{}.token or {})",
                    target.name(),
                    target.name(),
                    token_manager
                        .get_token_name(target.name())
                        .unwrap_or("an environment variable")
                );
            }
        }
    }

    match config.release_request() {
        Ok(request) => println!("\n🏷️  Release: {}", request.coordinates()),
        Err(e) => {
            println!("\n❌ {}", e);
            return Ok(1);
        }
    }

    println!();
    Ok(if validation.valid && all_tokens { 0 } else { 1 })
}

async fn init_command(project_path: &Path, force: bool) -> Result<i32> {
    println!("\n🎯 Initialize artifact-publisher\n");

    let config_path = project_path.join(CONFIG_FILENAME);
    if tokio::fs::try_exists(&config_path).await.unwrap_or(false) && !force {
        eprintln!(
            "⚠️  {} already exists (use --force to overwrite)",
            config_path.display()
        );
        return Ok(1);
    }

    tokio::fs::write(&config_path, STARTER_CONFIG)
        .await
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!("✅ Created {}", config_path.display());
    println!("   Edit the release and backends sections, then run `artifact-publisher check`.");
    Ok(0)
}

fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starter_config_parses() {
        let config: PublishConfig = serde_yaml::from_str(STARTER_CONFIG).unwrap();
        let validation = ConfigLoader::validate(&config);

        assert!(validation.valid, "{:?}", validation.errors);
        assert_eq!(config.targets().len(), 1);
        assert_eq!(
            config.release.unwrap().make_latest,
            Some(MakeLatest::True)
        );
    }

    #[test]
    fn test_cli_config_backend_selection() {
        let config = cli_config(
            ReleaseArgs::default(),
            Some("jfrog"),
            PublishOptionsConfig::default(),
        )
        .unwrap();

        assert_eq!(config.backends.github.unwrap().enabled, Some(false));
        assert_eq!(config.backends.jfrog.unwrap().enabled, Some(true));
    }

    #[test]
    fn test_cli_config_unknown_backend() {
        let result = cli_config(
            ReleaseArgs::default(),
            Some("github,s3"),
            PublishOptionsConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_flags_only_override_when_set() {
        let config = cli_config(
            ReleaseArgs {
                tag: Some("v1.2.3".to_string()),
                ..ReleaseArgs::default()
            },
            None,
            PublishOptionsConfig::default(),
        )
        .unwrap();
        let release = config.release.unwrap();

        assert_eq!(release.tag.as_deref(), Some("v1.2.3"));
        assert_eq!(release.prerelease, None);
        assert!(config.backends.github.is_none());
    }

    #[test]
    fn test_token_mask_hides_configured_tokens() {
        let config: PublishConfig = serde_yaml::from_str(
            r#"
version: "1.0"
backends:
  jfrog:
    baseUrl: https://acme.jfrog.io
    repository: generic-local
    token: configured-jfrog-token-987
"#,
        )
        .unwrap();
        let mask = TokenMask::new(&config);

        let masked = mask.apply(r#"{"errors":[{"message":"bad token configured-jfrog-token-987"}]}"#);

        assert!(!masked.contains("configured-jfrog-token-987"));
        assert!(masked.contains("con...987"));
    }

    #[test]
    fn test_token_mask_leaves_plain_text() {
        let config: PublishConfig = serde_yaml::from_str("version: \"1.0\"\n").unwrap();
        let mask = TokenMask::new(&config);

        assert_eq!(mask.apply("409 Artifact already exists"), "409 Artifact already exists");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }
}
