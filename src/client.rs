//! # HTTP client for the workspace service
//!
//! [`TfcClient`] implements [`WorkspaceApi`] over `reqwest`. Every API call goes
//! through [`TfcClient::call`], which attaches the bearer token and the JSON:API
//! content type and turns non-success statuses into `ApiRequestFailed`. Response
//! bodies are handed to the parsers in [`tfc_upload_core::api`].
//!
//! The archive upload is different: it is a raw `PUT` of the archive bytes to the
//! pre-signed URL of the configuration version, without the token and without a
//! JSON envelope.

use async_trait::async_trait;
use reqwest::{header, Client, Method, StatusCode};
use std::path::Path;
use tracing::{debug, error, info};

use tfc_upload_core::api::{self, CONTENT_TYPE};
use tfc_upload_core::contract::{ConfigurationVersion, Run, WorkspaceApi, WorkspaceLockState};
use tfc_upload_core::error::{UploadError, UploadResult};

use crate::load_config::ApiSettings;

pub struct TfcClient {
    http: Client,
    base_url: String,
    token: String,
}

impl TfcClient {
    pub fn new(settings: &ApiSettings) -> UploadResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("tfc-upload/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                error!(error = ?e, "Failed to build HTTP client");
                UploadError::Config(format!("HTTP client: {e}"))
            })?;
        info!(base_url = %settings.base_url(), "Initialised workspace API client");
        Ok(Self {
            http,
            base_url: settings.base_url(),
            token: settings.token.clone(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Authenticated JSON:API request; returns the response body on success.
    async fn call(&self, method: Method, path: &str, body: Option<String>) -> UploadResult<String> {
        let url = self.url(path);
        debug!(%method, %url, "[API] Request");

        let mut request = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(&self.token)
            .header(header::ACCEPT, CONTENT_TYPE);
        if let Some(body) = body {
            request = request.header(header::CONTENT_TYPE, CONTENT_TYPE).body(body);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = ?e, %method, %url, "[API][ERROR] Request could not be sent");
            UploadError::ApiRequestFailed(format!("{method} {url}: {e}"))
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            error!(error = ?e, %url, "[API][ERROR] Failed to read response body");
            UploadError::ApiRequestFailed(format!("{method} {url}: reading body: {e}"))
        })?;

        if !status.is_success() {
            error!(%status, %method, %url, body = %text, "[API][ERROR] Non-success response");
            return Err(UploadError::ApiRequestFailed(describe_status(
                &method, &url, status,
            )));
        }
        debug!(%status, %url, bytes = text.len(), "[API] Response");
        Ok(text)
    }
}

fn describe_status(method: &Method, url: &str, status: StatusCode) -> String {
    match status {
        StatusCode::UNAUTHORIZED => format!("{method} {url}: {status} (check TFE_TOKEN)"),
        StatusCode::NOT_FOUND => {
            format!("{method} {url}: {status} (resource missing or token lacks access)")
        }
        _ => format!("{method} {url}: {status}"),
    }
}

#[async_trait]
impl WorkspaceApi for TfcClient {
    async fn workspace_id(&self, organization: &str, workspace: &str) -> UploadResult<String> {
        let body = self
            .call(
                Method::GET,
                &format!("organizations/{organization}/workspaces/{workspace}"),
                None,
            )
            .await?;
        api::parse_workspace_id(&body)
    }

    async fn create_configuration_version(
        &self,
        workspace_id: &str,
    ) -> UploadResult<ConfigurationVersion> {
        let request = api::configuration_version_request().to_string();
        let body = self
            .call(
                Method::POST,
                &format!("workspaces/{workspace_id}/configuration-versions"),
                Some(request),
            )
            .await?;
        api::parse_configuration_version(&body)
    }

    async fn upload_archive(&self, upload_url: &str, archive: &Path) -> UploadResult<()> {
        let bytes = tokio::fs::read(archive).await.map_err(|e| {
            error!(error = ?e, archive = %archive.display(), "[API][ERROR] Failed to read archive");
            UploadError::UploadFailed(format!("read {}: {e}", archive.display()))
        })?;
        info!(bytes = bytes.len(), "[API] Uploading archive bytes");

        let response = self
            .http
            .put(upload_url)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "[API][ERROR] Archive upload could not be sent");
                UploadError::UploadFailed(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(%status, body = %text, "[API][ERROR] Archive upload rejected");
            return Err(UploadError::UploadFailed(format!("PUT returned {status}")));
        }
        Ok(())
    }

    async fn list_runs(&self, workspace_id: &str) -> UploadResult<Vec<Run>> {
        let body = self
            .call(Method::GET, &format!("workspaces/{workspace_id}/runs"), None)
            .await?;
        api::parse_runs(&body)
    }

    async fn get_run(&self, run_id: &str) -> UploadResult<Run> {
        let body = self.call(Method::GET, &format!("runs/{run_id}"), None).await?;
        api::parse_run(&body)
    }

    async fn workspace_lock(&self, workspace_id: &str) -> UploadResult<WorkspaceLockState> {
        let body = self
            .call(Method::GET, &format!("workspaces/{workspace_id}"), None)
            .await?;
        api::parse_workspace_lock(&body)
    }
}
