//! Error handling for artifact publishing
//!
//! This module provides the error kinds surfaced by the archiver, the
//! backends and the orchestrator, with recovery guidance, using the
//! thiserror crate for ergonomic error handling.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`PublishError`], reported in per-backend outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Filesystem,
    Auth,
    ReleaseResolution,
    AssetUpload,
    Network,
    Config,
    Cancelled,
    Internal,
}

/// Main error type for artifact publishing operations
#[derive(Error, Debug)]
pub enum PublishError {
    // Archive errors
    #[error("アーカイブの作成に失敗しました ({path}): {message}")]
    FilesystemError { path: PathBuf, message: String },

    // Backend errors
    #[error("[{backend}] 認証に失敗しました (HTTP {status}): {detail}")]
    AuthError {
        backend: String,
        status: u16,
        detail: String,
    },

    #[error("[{backend}] リリースを解決できませんでした: {message}")]
    ReleaseResolutionError { backend: String, message: String },

    #[error("[{backend}] アセット {asset} のアップロードに失敗しました: {detail}")]
    AssetUploadError {
        backend: String,
        asset: String,
        status: Option<u16>,
        detail: String,
    },

    #[error("[{backend}] ネットワークエラーが発生しました: {message}")]
    NetworkError { backend: String, message: String },

    // Configuration errors
    #[error("設定エラー: {0}")]
    ConfigError(String),

    // Lifecycle errors
    #[error("[{scope}] 公開処理がキャンセルされました")]
    Cancelled { scope: String },

    #[error("[{scope}] 内部エラー: {message}")]
    Internal { scope: String, message: String },
}

impl PublishError {
    /// Build a filesystem error for the given path
    pub fn filesystem(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::FilesystemError {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Build a transport-level error for the given backend
    pub fn network(backend: &str, error: &reqwest::Error) -> Self {
        let message = if error.is_timeout() {
            format!("request timed out: {}", error)
        } else if error.is_connect() {
            format!("connection failed: {}", error)
        } else {
            error.to_string()
        };

        Self::NetworkError {
            backend: backend.to_string(),
            message,
        }
    }

    /// Get the backend (or scope) name associated with this error, if any
    pub fn backend(&self) -> Option<&str> {
        match self {
            Self::AuthError { backend, .. }
            | Self::ReleaseResolutionError { backend, .. }
            | Self::AssetUploadError { backend, .. }
            | Self::NetworkError { backend, .. } => Some(backend),
            Self::Cancelled { scope } | Self::Internal { scope, .. } => Some(scope),
            Self::FilesystemError { .. } | Self::ConfigError(_) => None,
        }
    }

    /// Get the coarse kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FilesystemError { .. } => ErrorKind::Filesystem,
            Self::AuthError { .. } => ErrorKind::Auth,
            Self::ReleaseResolutionError { .. } => ErrorKind::ReleaseResolution,
            Self::AssetUploadError { .. } => ErrorKind::AssetUpload,
            Self::NetworkError { .. } => ErrorKind::Network,
            Self::ConfigError(_) => ErrorKind::Config,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Whether this error aborts the whole publish rather than a single backend
    pub fn is_fatal_for_publish(&self) -> bool {
        matches!(self, Self::FilesystemError { .. } | Self::ConfigError(_))
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::FilesystemError { .. } => vec![
                "ソースディレクトリが存在し読み取り可能か確認してください",
                "アーカイブの出力先に書き込み権限とディスク容量があるか確認してください",
            ],
            Self::AuthError { .. } => vec![
                "認証トークンを確認してください",
                "トークンの権限と有効期限を確認してください",
            ],
            Self::ReleaseResolutionError { .. } => vec![
                "リポジトリのオーナー名・リポジトリ名・タグを確認してください",
                "リモートのリリース一覧を確認してください",
            ],
            Self::AssetUploadError { .. } => vec![
                "同じ名前のアセットが既に存在しないか確認してください",
                "既存のアセットを削除するか、別のタグで公開してください",
            ],
            Self::NetworkError { .. } => vec![
                "インターネット接続を確認してください",
                "しばらく待ってから再試行してください",
            ],
            Self::ConfigError(_) => vec![
                ".artifact-publisher.yamlを確認してください",
                "artifact-publisher checkで設定を検証してください",
            ],
            Self::Cancelled { .. } => {
                vec!["リモートの状態を確認してから再実行してください"]
            }
            Self::Internal { .. } => vec!["ログを確認してください"],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::FilesystemError { .. } => "FILESYSTEM_ERROR",
            Self::AuthError { .. } => "AUTH_ERROR",
            Self::ReleaseResolutionError { .. } => "RELEASE_RESOLUTION_ERROR",
            Self::AssetUploadError { .. } => "ASSET_UPLOAD_ERROR",
            Self::NetworkError { .. } => "NETWORK_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::Cancelled { .. } => "CANCELLED",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}
