//! GitHub Backend - release create-or-resolve and streamed asset upload
//!
//! Release resolution is an upsert: create first, and on a 422 conflict look
//! the existing release up by tag. The lookup only finds the release id and
//! upload target; it never updates the existing release.

use crate::backends::http;
use crate::core::error::PublishError;
use crate::core::traits::{Asset, Backend, PublishTarget, Release, ReleaseRequest, UploadedAsset};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

const BACKEND_NAME: &str = "github";
const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";
const RELEASES_PER_PAGE: usize = 100;

/// Release creation payload; absent optional fields are omitted
#[derive(Debug, Serialize)]
struct CreateReleasePayload<'a> {
    tag_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_commitish: Option<&'a str>,
    name: &'a str,
    body: &'a str,
    draft: bool,
    prerelease: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    discussion_category_name: Option<&'a str>,
    generate_release_notes: bool,
    make_latest: &'a str,
}

impl<'a> CreateReleasePayload<'a> {
    fn from_request(request: &'a ReleaseRequest) -> Self {
        Self {
            tag_name: &request.tag,
            target_commitish: Some(request.target_commitish.as_str()).filter(|c| !c.is_empty()),
            name: &request.display_name,
            body: &request.body,
            draft: false,
            prerelease: request.prerelease,
            discussion_category_name: request
                .discussion_category
                .as_deref()
                .filter(|c| !c.is_empty()),
            generate_release_notes: request.generate_release_notes,
            make_latest: request.make_latest.as_str(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    id: u64,
    tag_name: String,
    upload_url: String,
    #[serde(default)]
    html_url: Option<String>,
}

impl From<ReleaseResponse> for Release {
    fn from(response: ReleaseResponse) -> Self {
        Release {
            id: response.id,
            tag_name: response.tag_name,
            upload_url_template: response.upload_url,
            html_url: response.html_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AssetResponse {
    #[serde(default)]
    browser_download_url: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

/// Outcome of the create step
enum CreateOutcome {
    Created(Release),
    Conflict,
}

/// GitHub release backend
pub struct GitHubBackend {
    client: Client,
    api_url: String,
    token: SecretString,
}

impl GitHubBackend {
    /// Create a backend talking to `api_url` (e.g. `https://api.github.com`)
    pub fn new(client: Client, api_url: impl Into<String>, token: SecretString) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            api_url,
            token,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn releases_url(&self, request: &ReleaseRequest) -> String {
        format!(
            "{}/repos/{}/{}/releases",
            self.api_url, request.owner, request.repo_name
        )
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(AUTHORIZATION, format!("token {}", self.token.expose_secret()))
            .header(ACCEPT, GITHUB_ACCEPT)
    }

    fn resolution_error(message: impl Into<String>) -> PublishError {
        PublishError::ReleaseResolutionError {
            backend: BACKEND_NAME.to_string(),
            message: message.into(),
        }
    }

    async fn auth_error(response: reqwest::Response) -> PublishError {
        let status = response.status().as_u16();
        PublishError::AuthError {
            backend: BACKEND_NAME.to_string(),
            status,
            detail: http::response_detail(response).await,
        }
    }

    async fn create_release(&self, request: &ReleaseRequest) -> Result<CreateOutcome, PublishError> {
        let url = self.releases_url(request);
        log::debug!("POST {}", url);

        let response = self
            .authorized(self.client.post(&url))
            .json(&CreateReleasePayload::from_request(request))
            .send()
            .await
            .map_err(|e| PublishError::network(BACKEND_NAME, &e))?;

        let status = response.status();
        if status == StatusCode::CREATED {
            let release: ReleaseResponse = response.json().await.map_err(|e| {
                Self::resolution_error(format!("invalid release response: {}", e))
            })?;
            return Ok(CreateOutcome::Created(release.into()));
        }
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            return Ok(CreateOutcome::Conflict);
        }
        if http::is_auth_failure(status) {
            return Err(Self::auth_error(response).await);
        }

        let detail = http::response_detail(response).await;
        Err(Self::resolution_error(format!(
            "release creation failed (HTTP {}): {}",
            status.as_u16(),
            detail
        )))
    }

    /// Find the single release carrying the requested tag
    ///
    /// Walks every page of the release list. A tag held by more than one
    /// release is treated as an inconsistency, as is a tag held by none.
    async fn find_release_by_tag(&self, request: &ReleaseRequest) -> Result<Release, PublishError> {
        let url = self.releases_url(request);
        let mut matches: Vec<Release> = Vec::new();
        let mut page = 1usize;

        loop {
            log::debug!("GET {} (page {})", url, page);
            let response = self
                .authorized(self.client.get(&url))
                .query(&[
                    ("per_page", RELEASES_PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ])
                .send()
                .await
                .map_err(|e| PublishError::network(BACKEND_NAME, &e))?;

            let status = response.status();
            if http::is_auth_failure(status) {
                return Err(Self::auth_error(response).await);
            }
            if !status.is_success() {
                let detail = http::response_detail(response).await;
                return Err(Self::resolution_error(format!(
                    "release lookup failed (HTTP {}): {}",
                    status.as_u16(),
                    detail
                )));
            }

            let releases: Vec<ReleaseResponse> = response.json().await.map_err(|e| {
                Self::resolution_error(format!("invalid release list response: {}", e))
            })?;
            let page_len = releases.len();

            matches.extend(
                releases
                    .into_iter()
                    .filter(|r| r.tag_name == request.tag)
                    .map(Release::from),
            );

            if page_len < RELEASES_PER_PAGE {
                break;
            }
            page += 1;
        }

        match matches.len() {
            0 => Err(Self::resolution_error(format!(
                "creation of {} reported a conflict but no release is tagged {}",
                request.coordinates(),
                request.tag
            ))),
            1 => Ok(matches.remove(0)),
            n => {
                let ids: Vec<String> = matches.iter().map(|r| r.id.to_string()).collect();
                Err(Self::resolution_error(format!(
                    "{} releases are tagged {} (ids {})",
                    n,
                    request.tag,
                    ids.join(", ")
                )))
            }
        }
    }
}

#[async_trait]
impl Backend for GitHubBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn resolve_or_create_release(
        &self,
        request: &ReleaseRequest,
    ) -> Result<PublishTarget, PublishError> {
        let release = match self.create_release(request).await? {
            CreateOutcome::Created(release) => {
                log::info!("Created release {} (id {})", request.coordinates(), release.id);
                release
            }
            CreateOutcome::Conflict => {
                log::warn!(
                    "Release {} already exists, looking it up by tag",
                    request.coordinates()
                );
                let release = self.find_release_by_tag(request).await?;
                log::info!("Resolved release {} (id {})", request.coordinates(), release.id);
                release
            }
        };

        Ok(PublishTarget::Release(release))
    }

    async fn upload_asset(
        &self,
        target: &PublishTarget,
        asset: &Asset,
    ) -> Result<UploadedAsset, PublishError> {
        let release = match target {
            PublishTarget::Release(release) => release,
            PublishTarget::Repository { .. } => {
                return Err(PublishError::Internal {
                    scope: BACKEND_NAME.to_string(),
                    message: "upload target is not a release".to_string(),
                });
            }
        };

        let (body, len) = http::asset_body(BACKEND_NAME, asset).await?;
        let url = release.upload_endpoint();
        log::debug!("POST {} ({} bytes)", url, len);

        let response = self
            .authorized(self.client.post(url))
            .query(&[("name", asset.name.as_str())])
            .header(CONTENT_TYPE, asset.content_type.as_str())
            .header(CONTENT_LENGTH, len)
            .body(body)
            .send()
            .await
            .map_err(|e| PublishError::network(BACKEND_NAME, &e))?;

        let status = response.status();
        if status == StatusCode::CREATED {
            // The asset is already stored; an unreadable body only loses the URL
            let uploaded = response.json::<AssetResponse>().await.ok();
            log::info!("Uploaded {} to release {}", asset.name, release.id);
            return Ok(UploadedAsset {
                backend: BACKEND_NAME.to_string(),
                name: asset.name.clone(),
                url: uploaded.as_ref().and_then(|a| a.browser_download_url.clone()),
                size: uploaded.and_then(|a| a.size).unwrap_or(len),
            });
        }
        if http::is_auth_failure(status) {
            return Err(Self::auth_error(response).await);
        }

        Err(PublishError::AssetUploadError {
            backend: BACKEND_NAME.to_string(),
            asset: asset.name.clone(),
            status: Some(status.as_u16()),
            detail: http::response_detail(response).await,
        })
    }
}
