use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use airlift_core::{AppId, BundleVersion, Channel, VersionId};

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    apikey: String,
}

impl ApiClient {
    pub fn new(base_url: &str, apikey: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid API URL")?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            apikey: apikey.to_string(),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("failed to build API URL")
    }

    async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        let response = req.bearer_auth(&self.apikey).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("API error ({}): {}", status, body);
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Like `send_json`, but a 404 means the resource does not exist.
    async fn send_json_opt<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<Option<T>> {
        let response = req.bearer_auth(&self.apikey).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("API error ({}): {}", status, body);
        }
        Ok(Some(serde_json::from_str(&body)?))
    }

    async fn send_empty(&self, req: reqwest::RequestBuilder) -> Result<()> {
        let response = req.bearer_auth(&self.apikey).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("API error ({}): {}", status, body);
        }
        Ok(())
    }

    /// Identify the account behind the API key.
    pub async fn me(&self) -> Result<MeResponse> {
        let url = self.url("/v1/auth/me")?;
        self.send_json(self.http.get(url)).await
    }

    pub async fn create_app(&self, req: CreateAppRequest) -> Result<AppResponse> {
        let url = self.url("/v1/apps")?;
        self.send_json(self.http.post(url).json(&req)).await
    }

    pub async fn list_apps(&self) -> Result<Vec<AppResponse>> {
        let url = self.url("/v1/apps")?;
        let response: ListAppsResponse = self.send_json(self.http.get(url)).await?;
        Ok(response.apps)
    }

    pub async fn delete_app(&self, app_id: &AppId) -> Result<()> {
        let url = self.url(&format!("/v1/apps/{app_id}"))?;
        self.send_empty(self.http.delete(url)).await
    }

    /// List versions, newest first. Soft-deleted rows are excluded unless
    /// `include_deleted` is set.
    pub async fn list_versions(
        &self,
        app_id: &AppId,
        include_deleted: bool,
    ) -> Result<Vec<BundleVersion>> {
        let mut url = self.url(&format!("/v1/apps/{app_id}/versions"))?;
        if include_deleted {
            url.query_pairs_mut().append_pair("include_deleted", "true");
        }
        let response: ListVersionsResponse = self.send_json(self.http.get(url)).await?;
        Ok(response.versions)
    }

    pub async fn get_version_by_name(
        &self,
        app_id: &AppId,
        name: &str,
    ) -> Result<Option<BundleVersion>> {
        let url = self.url(&format!("/v1/apps/{app_id}/versions/{name}"))?;
        self.send_json_opt(self.http.get(url)).await
    }

    /// Ids of versions currently referenced by a channel, as baseline or
    /// canary.
    pub async fn in_use_version_ids(&self, app_id: &AppId) -> Result<Vec<VersionId>> {
        let url = self.url(&format!("/v1/apps/{app_id}/versions/in-use"))?;
        let response: InUseVersionsResponse = self.send_json(self.http.get(url)).await?;
        Ok(response.version_ids)
    }

    /// Register a version row. Re-registering an existing name revives a
    /// soft-deleted row and returns it with its original id.
    pub async fn register_version(
        &self,
        app_id: &AppId,
        req: RegisterVersionRequest,
    ) -> Result<BundleVersion> {
        let url = self.url(&format!("/v1/apps/{app_id}/versions"))?;
        self.send_json(self.http.post(url).json(&req)).await
    }

    pub async fn delete_version(&self, app_id: &AppId, name: &str) -> Result<()> {
        let url = self.url(&format!("/v1/apps/{app_id}/versions/{name}"))?;
        self.send_empty(self.http.delete(url)).await
    }

    pub async fn create_upload(
        &self,
        app_id: &AppId,
        name: &str,
        req: CreateUploadRequest,
    ) -> Result<CreateUploadResponse> {
        let url = self.url(&format!("/v1/apps/{app_id}/versions/{name}/upload"))?;
        self.send_json(self.http.post(url).json(&req)).await
    }

    /// Upload the payload to a pre-signed URL. No bearer token: the URL
    /// itself carries the authorization.
    pub async fn put_payload(&self, upload_url: &str, payload: Vec<u8>) -> Result<()> {
        let response = self
            .http
            .put(upload_url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(payload)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("API error ({}): {}", status, body);
        }
        Ok(())
    }

    pub async fn list_channels(&self, app_id: &AppId) -> Result<Vec<Channel>> {
        let url = self.url(&format!("/v1/apps/{app_id}/channels"))?;
        let response: ListChannelsResponse = self.send_json(self.http.get(url)).await?;
        Ok(response.channels)
    }

    pub async fn get_channel(&self, app_id: &AppId, name: &str) -> Result<Option<Channel>> {
        let url = self.url(&format!("/v1/apps/{app_id}/channels/{name}"))?;
        self.send_json_opt(self.http.get(url)).await
    }

    /// Create or replace a channel record.
    pub async fn upsert_channel(&self, channel: &Channel) -> Result<Channel> {
        let url = self.url(&format!(
            "/v1/apps/{}/channels/{}",
            channel.app_id, channel.name
        ))?;
        self.send_json(self.http.put(url).json(channel)).await
    }

    pub async fn delete_channel(&self, app_id: &AppId, name: &str) -> Result<()> {
        let url = self.url(&format!("/v1/apps/{app_id}/channels/{name}"))?;
        self.send_empty(self.http.delete(url)).await
    }
}

// =============================================================================
// Request/response types (mirrored from store handlers)
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct MeResponse {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateAppRequest {
    pub app_id: AppId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AppResponse {
    pub app_id: AppId,
    #[serde(default)]
    pub name: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ListAppsResponse {
    pub apps: Vec<AppResponse>,
}

#[derive(Debug, Serialize)]
pub struct RegisterVersionRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateUploadRequest {
    pub content_length: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateUploadResponse {
    pub upload_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ListVersionsResponse {
    pub versions: Vec<BundleVersion>,
}

#[derive(Debug, Deserialize)]
pub struct InUseVersionsResponse {
    pub version_ids: Vec<VersionId>,
}

#[derive(Debug, Deserialize)]
pub struct ListChannelsResponse {
    pub channels: Vec<Channel>,
}
