//! HTTP helpers shared by the backends
//!
//! Client construction, streamed upload bodies and response detail
//! extraction.

use crate::core::error::PublishError;
use crate::core::traits::Asset;
use reqwest::{Body, Client, Response, StatusCode};
use std::time::Duration;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

/// User agent sent with every request
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Longest response detail kept in an error
const MAX_DETAIL_LEN: usize = 2048;

/// Build an HTTP client for a backend
///
/// Only the connect phase is bounded; uploads of large archives may take
/// arbitrarily long once connected.
pub fn build_client(backend: &str, connect_timeout: Duration) -> Result<Client, PublishError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(connect_timeout)
        .build()
        .map_err(|e| PublishError::network(backend, &e))
}

/// Open the asset file as a streamed request body
///
/// Returns the body together with the file length for `Content-Length`.
/// The file is read in chunks while the request is sent, never buffered whole.
pub async fn asset_body(backend: &str, asset: &Asset) -> Result<(Body, u64), PublishError> {
    let upload_error = |detail: String| PublishError::AssetUploadError {
        backend: backend.to_string(),
        asset: asset.name.clone(),
        status: None,
        detail,
    };

    let file = File::open(&asset.local_path).await.map_err(|e| {
        upload_error(format!("cannot open {}: {}", asset.local_path.display(), e))
    })?;
    let len = file
        .metadata()
        .await
        .map_err(|e| upload_error(format!("cannot stat {}: {}", asset.local_path.display(), e)))?
        .len();

    Ok((Body::wrap_stream(ReaderStream::new(file)), len))
}

/// Read the response body as text for error reporting
pub async fn response_detail(response: Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(text) if !text.trim().is_empty() => truncate(text.trim()),
        Ok(_) => status.to_string(),
        Err(e) => format!("{} (body unreadable: {})", status, e),
    }
}

/// 401 and 403 are reported as authentication failures by every backend
pub fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_DETAIL_LEN {
        return text.to_string();
    }

    let mut end = MAX_DETAIL_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}
