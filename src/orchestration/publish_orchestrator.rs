//! Publish Orchestrator - archives once, then publishes to every backend
//!
//! Features:
//! - Single archive per publish, built before any backend call
//! - Parallel (bounded) or sequential backend execution
//! - Per-backend outcomes; one backend failing never affects another
//! - Cancellation checked before every backend call

use crate::archive::{Archive, Archiver};
use crate::core::config::{DEFAULT_MAX_CONCURRENCY, PublishConfig};
use crate::core::error::{ErrorKind, PublishError};
use crate::core::traits::{Asset, Backend, PublishTarget, ReleaseRequest, UploadedAsset};
use crate::orchestration::publish_worker::{EventSink, PublishEvent};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

/// Orchestrator options
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorOptions {
    /// Directory the archive is written to (default: working directory)
    pub archive_dir: Option<PathBuf>,

    /// Publish to backends one after another (default: parallel)
    pub sequential: bool,

    /// Maximum number of backends published to at once (default: 2)
    pub max_concurrency: usize,

    /// Keep the archive after publishing (default: delete it)
    pub keep_archive: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            archive_dir: None,
            sequential: false,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            keep_archive: false,
        }
    }
}

impl OrchestratorOptions {
    /// Options from the `publish` section of a configuration
    pub fn from_config(config: &PublishConfig) -> Self {
        let defaults = Self::default();
        match &config.publish {
            Some(publish) => Self {
                archive_dir: publish.archive_dir.clone(),
                sequential: publish.sequential.unwrap_or(defaults.sequential),
                max_concurrency: publish.max_concurrency.unwrap_or(defaults.max_concurrency),
                keep_archive: publish.keep_archive.unwrap_or(defaults.keep_archive),
            },
            None => defaults,
        }
    }
}

/// Error details of a failed backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendFailure {
    pub kind: ErrorKind,
    pub code: String,
    pub detail: String,
    pub suggested_actions: Vec<String>,
}

impl From<&PublishError> for BackendFailure {
    fn from(error: &PublishError) -> Self {
        Self {
            kind: error.kind(),
            code: error.code().to_string(),
            detail: error.to_string(),
            suggested_actions: error
                .suggested_actions()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Result of publishing to one backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendOutcome {
    pub backend: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BackendFailure>,
    pub duration_ms: u64,
}

impl BackendOutcome {
    fn failed(
        backend: &str,
        target: Option<&PublishTarget>,
        error: &PublishError,
        started: Instant,
    ) -> Self {
        Self {
            backend: backend.to_string(),
            success: false,
            release_id: target.and_then(|t| t.release_id()),
            target_url: target.map(|t| t.location().to_string()),
            asset_url: None,
            error: Some(BackendFailure::from(error)),
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// Aggregate result of one publish operation
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub success: bool,
    pub archive_path: PathBuf,
    pub archive_kept: bool,
    pub asset_name: String,
    pub archive_size: u64,
    pub archive_entries: usize,
    pub outcomes: Vec<BackendOutcome>,
    pub duration_ms: u64,
    pub published_at: DateTime<Utc>,
}

impl PublishReport {
    pub fn succeeded(&self) -> Vec<&BackendOutcome> {
        self.outcomes.iter().filter(|o| o.success).collect()
    }

    pub fn failed(&self) -> Vec<&BackendOutcome> {
        self.outcomes.iter().filter(|o| !o.success).collect()
    }
}

/// Drives one archive through every configured backend
pub struct PublishOrchestrator {
    backends: Vec<Arc<dyn Backend>>,
    options: OrchestratorOptions,
}

impl PublishOrchestrator {
    pub fn new(backends: Vec<Arc<dyn Backend>>, options: OrchestratorOptions) -> Self {
        Self { backends, options }
    }

    pub fn backends(&self) -> impl Iterator<Item = &str> {
        self.backends.iter().map(|b| b.name())
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Publish `source_dir` to every backend
    ///
    /// Returns `Err` only for failures that abort the whole publish: an empty
    /// backend set, archive creation failure, or cancellation before the
    /// archive was built. Backend failures are reported in the outcomes.
    pub async fn publish(
        &self,
        source_dir: &Path,
        request: &ReleaseRequest,
        cancel: &CancellationToken,
    ) -> Result<PublishReport, PublishError> {
        self.publish_with_events(source_dir, request, cancel, None)
            .await
    }

    /// Like [`publish`](Self::publish), reporting progress on `events`
    pub async fn publish_with_events(
        &self,
        source_dir: &Path,
        request: &ReleaseRequest,
        cancel: &CancellationToken,
        events: Option<UnboundedSender<PublishEvent>>,
    ) -> Result<PublishReport, PublishError> {
        let started = Instant::now();
        let events = EventSink::new(events);

        if self.backends.is_empty() {
            return Err(PublishError::ConfigError(
                "no backends configured".to_string(),
            ));
        }
        if cancel.is_cancelled() {
            return Err(PublishError::Cancelled {
                scope: "publish".to_string(),
            });
        }

        log::info!(
            "Publishing {} as {} to {}",
            source_dir.display(),
            request.coordinates(),
            self.backends().collect::<Vec<_>>().join(", ")
        );

        // Every backend reads the same archive; it must be complete first
        let archive = self.build_archive(source_dir).await?;
        events.emit(PublishEvent::ArchiveCreated {
            path: archive.path.clone(),
            size: archive.size,
            entries: archive.entries.len(),
        });

        let asset = Arc::new(Asset::from_path(&archive.path)?);
        let request = Arc::new(request.clone());

        let outcomes = if self.options.sequential {
            self.run_sequentially(&request, &asset, cancel, &events)
                .await
        } else {
            self.run_in_parallel(&request, &asset, cancel, &events)
                .await
        };

        let archive_kept = self.options.keep_archive || !Self::remove_archive(&archive).await;
        let success = outcomes.iter().all(|o| o.success);
        events.emit(PublishEvent::Finished { success });

        let report = PublishReport {
            success,
            archive_path: archive.path.clone(),
            archive_kept,
            asset_name: asset.name.clone(),
            archive_size: archive.size,
            archive_entries: archive.entries.len(),
            outcomes,
            duration_ms: started.elapsed().as_millis() as u64,
            published_at: Utc::now(),
        };

        log::info!(
            "Publish finished: {} succeeded, {} failed",
            report.succeeded().len(),
            report.failed().len()
        );
        Ok(report)
    }

    async fn build_archive(&self, source_dir: &Path) -> Result<Archive, PublishError> {
        let archiver = match &self.options.archive_dir {
            Some(dir) => Archiver::new(dir.clone()),
            None => Archiver::in_working_dir()?,
        };
        let source_dir = source_dir.to_path_buf();

        tokio::task::spawn_blocking(move || archiver.create(&source_dir))
            .await
            .map_err(|e| PublishError::Internal {
                scope: "archive".to_string(),
                message: format!("archive task failed: {}", e),
            })?
    }

    /// Returns whether the archive is gone
    async fn remove_archive(archive: &Archive) -> bool {
        match tokio::fs::remove_file(&archive.path).await {
            Ok(()) => {
                log::debug!("Removed archive {}", archive.path.display());
                true
            }
            Err(e) => {
                log::warn!(
                    "Failed to remove archive {}: {}",
                    archive.path.display(),
                    e
                );
                false
            }
        }
    }

    async fn run_sequentially(
        &self,
        request: &Arc<ReleaseRequest>,
        asset: &Arc<Asset>,
        cancel: &CancellationToken,
        events: &EventSink,
    ) -> Vec<BackendOutcome> {
        let mut outcomes = Vec::with_capacity(self.backends.len());
        for backend in &self.backends {
            let outcome = publish_to_backend(
                Arc::clone(backend),
                Arc::clone(request),
                Arc::clone(asset),
                cancel.clone(),
                events.clone(),
            )
            .await;
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn run_in_parallel(
        &self,
        request: &Arc<ReleaseRequest>,
        asset: &Arc<Asset>,
        cancel: &CancellationToken,
        events: &EventSink,
    ) -> Vec<BackendOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));
        let mut tasks = Vec::with_capacity(self.backends.len());

        for backend in &self.backends {
            let name = backend.name().to_string();
            let semaphore = Arc::clone(&semaphore);
            let backend = Arc::clone(backend);
            let request = Arc::clone(request);
            let asset = Arc::clone(asset);
            let cancel = cancel.clone();
            let events = events.clone();

            let task = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        let error = PublishError::Internal {
                            scope: backend.name().to_string(),
                            message: e.to_string(),
                        };
                        return BackendOutcome::failed(
                            backend.name(),
                            None,
                            &error,
                            Instant::now(),
                        );
                    }
                };
                publish_to_backend(backend, request, asset, cancel, events).await
            });

            tasks.push((name, task));
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (name, task) in tasks {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let error = PublishError::Internal {
                        scope: name.clone(),
                        message: format!("backend task failed: {}", e),
                    };
                    log::warn!("{}", error);
                    events.emit(PublishEvent::BackendFailed {
                        backend: name.clone(),
                        kind: error.kind(),
                        message: error.to_string(),
                    });
                    BackendOutcome::failed(&name, None, &error, Instant::now())
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

/// Resolve the target, then upload, on a single backend
async fn publish_to_backend(
    backend: Arc<dyn Backend>,
    request: Arc<ReleaseRequest>,
    asset: Arc<Asset>,
    cancel: CancellationToken,
    events: EventSink,
) -> BackendOutcome {
    let started = Instant::now();
    let name = backend.name().to_string();

    let fail = |target: Option<&PublishTarget>, error: PublishError| {
        log::warn!("{}", error);
        events.emit(PublishEvent::BackendFailed {
            backend: name.clone(),
            kind: error.kind(),
            message: error.to_string(),
        });
        BackendOutcome::failed(&name, target, &error, started)
    };

    let target = match guarded(&cancel, &name, backend.resolve_or_create_release(&request)).await {
        Ok(target) => target,
        Err(error) => return fail(None, error),
    };
    events.emit(PublishEvent::TargetResolved {
        backend: name.clone(),
        location: target.location().to_string(),
        release_id: target.release_id(),
    });

    match guarded(&cancel, &name, backend.upload_asset(&target, &asset)).await {
        Ok(uploaded) => {
            let outcome = BackendOutcome {
                backend: name.clone(),
                success: true,
                release_id: target.release_id(),
                target_url: Some(target.location().to_string()),
                asset_url: uploaded.url.clone(),
                error: None,
                duration_ms: started.elapsed().as_millis() as u64,
            };
            events.emit(PublishEvent::AssetUploaded {
                backend: name.clone(),
                asset: uploaded,
            });
            outcome
        }
        Err(error) => fail(Some(&target), error),
    }
}

/// Run a backend call unless cancellation was requested before or during it
async fn guarded<T, F>(cancel: &CancellationToken, backend: &str, call: F) -> Result<T, PublishError>
where
    F: Future<Output = Result<T, PublishError>>,
{
    let cancelled = || PublishError::Cancelled {
        scope: backend.to_string(),
    };

    if cancel.is_cancelled() {
        return Err(cancelled());
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(cancelled()),
        result = call => result,
    }
}
