//! Publish Worker - runs a publish off the caller's thread
//!
//! [`start_publish`] returns immediately with a [`PublishHandle`]; progress
//! arrives as [`PublishEvent`]s and the final report through
//! [`PublishHandle::wait`]. The calling thread never blocks on network I/O
//! and does not need to be inside the runtime.

use crate::core::error::{ErrorKind, PublishError};
use crate::core::traits::{ReleaseRequest, UploadedAsset};
use crate::orchestration::publish_orchestrator::{PublishOrchestrator, PublishReport};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Progress of a publish operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PublishEvent {
    ArchiveCreated {
        path: PathBuf,
        size: u64,
        entries: usize,
    },
    TargetResolved {
        backend: String,
        location: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        release_id: Option<u64>,
    },
    AssetUploaded {
        backend: String,
        asset: UploadedAsset,
    },
    BackendFailed {
        backend: String,
        kind: ErrorKind,
        message: String,
    },
    Finished {
        success: bool,
    },
}

/// Optional event channel; a dropped receiver is not an error
#[derive(Debug, Clone, Default)]
pub(crate) struct EventSink(Option<UnboundedSender<PublishEvent>>);

impl EventSink {
    pub(crate) fn new(sender: Option<UnboundedSender<PublishEvent>>) -> Self {
        Self(sender)
    }

    pub(crate) fn emit(&self, event: PublishEvent) {
        if let Some(sender) = &self.0 {
            let _ = sender.send(event);
        }
    }
}

/// Handle to a publish running in the background
pub struct PublishHandle {
    cancel: CancellationToken,
    events: UnboundedReceiver<PublishEvent>,
    task: JoinHandle<Result<PublishReport, PublishError>>,
}

impl PublishHandle {
    /// Request cancellation
    ///
    /// Backend calls not yet dispatched are skipped. A request already on the
    /// wire is abandoned locally but may still complete on the remote side.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the next progress event; `None` once the publish has ended
    pub async fn next_event(&mut self) -> Option<PublishEvent> {
        self.events.recv().await
    }

    /// Poll for a progress event without blocking
    pub fn try_next_event(&mut self) -> Option<PublishEvent> {
        self.events.try_recv().ok()
    }

    /// Wait for the publish to finish
    pub async fn wait(self) -> Result<PublishReport, PublishError> {
        self.task.await.map_err(|e| PublishError::Internal {
            scope: "publish".to_string(),
            message: format!("publish task failed: {}", e),
        })?
    }
}

/// Start a publish on `runtime` and return without waiting for it
pub fn start_publish(
    runtime: &Handle,
    orchestrator: Arc<PublishOrchestrator>,
    source_dir: PathBuf,
    request: ReleaseRequest,
) -> PublishHandle {
    let cancel = CancellationToken::new();
    let (sender, events) = mpsc::unbounded_channel();

    let task_cancel = cancel.clone();
    let task = runtime.spawn(async move {
        orchestrator
            .publish_with_events(&source_dir, &request, &task_cancel, Some(sender))
            .await
    });

    PublishHandle {
        cancel,
        events,
        task,
    }
}
