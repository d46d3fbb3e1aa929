//! JFrog Backend - direct artifact placement in an Artifactory repository

use crate::backends::http;
use crate::core::error::PublishError;
use crate::core::traits::{Asset, Backend, PublishTarget, ReleaseRequest, UploadedAsset};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

const BACKEND_NAME: &str = "jfrog";

/// Repository URL for `repository` under an Artifactory base URL
///
/// Trailing separators on the base URL are stripped, so `https://acme.jfrog.io`,
/// `https://acme.jfrog.io/` and `https://acme.jfrog.io//` all produce the same URL.
pub fn repository_url(base_url: &str, repository: &str) -> String {
    format!(
        "{}/artifactory/{}",
        base_url.trim_end_matches('/'),
        repository.trim_matches('/')
    )
}

/// Artifact URL for `name` inside the repository at `repository_url`
///
/// The name is appended as a single percent-encoded path segment.
fn artifact_url(repository_url: &str, name: &str) -> Result<Url, PublishError> {
    let mut url = Url::parse(repository_url).map_err(|e| {
        PublishError::ConfigError(format!(
            "JFrog のリポジトリ URL が不正です: {} ({})",
            repository_url, e
        ))
    })?;
    url.path_segments_mut()
        .map_err(|_| {
            PublishError::ConfigError(format!(
                "JFrog のリポジトリ URL にパスを追加できません: {}",
                repository_url
            ))
        })?
        .pop_if_empty()
        .push(name);
    Ok(url)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeployResponse {
    #[serde(default)]
    download_uri: Option<String>,
    #[serde(default)]
    size: Option<String>,
}

/// Artifactory backend
///
/// Has no release concept: resolution returns the repository URL and upload
/// is a single `PUT`.
pub struct JFrogBackend {
    client: Client,
    repository_url: String,
    token: SecretString,
}

impl JFrogBackend {
    pub fn new(client: Client, base_url: &str, repository: &str, token: SecretString) -> Self {
        Self {
            client,
            repository_url: repository_url(base_url, repository),
            token,
        }
    }

    pub fn repository_url(&self) -> &str {
        &self.repository_url
    }
}

#[async_trait]
impl Backend for JFrogBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn resolve_or_create_release(
        &self,
        _request: &ReleaseRequest,
    ) -> Result<PublishTarget, PublishError> {
        Ok(PublishTarget::Repository {
            url: self.repository_url.clone(),
        })
    }

    async fn upload_asset(
        &self,
        target: &PublishTarget,
        asset: &Asset,
    ) -> Result<UploadedAsset, PublishError> {
        let base = match target {
            PublishTarget::Repository { url } => url.as_str(),
            PublishTarget::Release(_) => {
                return Err(PublishError::Internal {
                    scope: BACKEND_NAME.to_string(),
                    message: "upload target is not a repository".to_string(),
                });
            }
        };
        let url = artifact_url(base, &asset.name)?;

        let (body, len) = http::asset_body(BACKEND_NAME, asset).await?;
        log::debug!("PUT {} ({} bytes)", url, len);

        let response = self
            .client
            .put(url.clone())
            .header(
                AUTHORIZATION,
                format!("Bearer {}", self.token.expose_secret()),
            )
            .header(CONTENT_TYPE, asset.content_type.as_str())
            .header(CONTENT_LENGTH, len)
            .body(body)
            .send()
            .await
            .map_err(|e| PublishError::network(BACKEND_NAME, &e))?;

        let status = response.status();
        if status.is_success() {
            let deployed = response.json::<DeployResponse>().await.ok();
            log::info!("Deployed {} to {}", asset.name, base);
            return Ok(UploadedAsset {
                backend: BACKEND_NAME.to_string(),
                name: asset.name.clone(),
                url: deployed
                    .as_ref()
                    .and_then(|d| d.download_uri.clone())
                    .or_else(|| Some(url.to_string())),
                size: deployed
                    .and_then(|d| d.size)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(len),
            });
        }
        if http::is_auth_failure(status) {
            return Err(PublishError::AuthError {
                backend: BACKEND_NAME.to_string(),
                status: status.as_u16(),
                detail: http::response_detail(response).await,
            });
        }

        Err(PublishError::AssetUploadError {
            backend: BACKEND_NAME.to_string(),
            asset: asset.name.clone(),
            status: Some(status.as_u16()),
            detail: http::response_detail(response).await,
        })
    }
}
