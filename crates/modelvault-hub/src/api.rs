//! HTTP client for the hub's REST API.
//!
//! Covers the endpoints the `hf-hub` crate does not expose: listing an
//! account's repositories, per-file blob sizes, and repository management
//! for mirroring. Authentication is a bearer token read from
//! `HUGGING_FACE_HUB_TOKEN`, same as the single-file fetches in
//! [`crate::lfs`].

use serde::Deserialize;
use tracing::debug;

use crate::error::{HubError, HubResult};

pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

/// Files whose size never counts toward a repository's storage footprint.
const SIZE_EXCLUDED_FILES: &[&str] = &[".gitattributes", "README.md"];

/// One repository in an account listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSummary {
    #[serde(alias = "modelId")]
    pub id: String,
    #[serde(default)]
    pub private: bool,
}

/// One file in a repository listing.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoFile {
    pub rfilename: String,
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ModelInfoResponse {
    #[serde(default)]
    siblings: Vec<RepoFile>,
}

pub struct HubClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HubClient {
    /// Build a client against the given endpoint, reading
    /// `HUGGING_FACE_HUB_TOKEN` from the environment if present.
    pub fn new(endpoint: impl Into<String>) -> HubResult<Self> {
        let token = std::env::var("HUGGING_FACE_HUB_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());
        let http = reqwest::Client::builder()
            .user_agent(concat!("modelvault/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Anonymous clone URL for a repository.
    pub fn clone_url(&self, repo_id: &str) -> String {
        format!("{}/{}", self.endpoint, repo_id)
    }

    /// Clone/push URL with the bearer token embedded, for git transport.
    /// Falls back to the anonymous URL when no token is available.
    pub fn authenticated_url(&self, repo_id: &str) -> String {
        match &self.token {
            Some(token) => {
                let rest = self
                    .endpoint
                    .strip_prefix("https://")
                    .unwrap_or(&self.endpoint);
                format!("https://USER:{token}@{rest}/{repo_id}")
            }
            None => self.clone_url(repo_id),
        }
    }

    /// All model repositories owned by `author`.
    pub async fn list_models(&self, author: &str) -> HubResult<Vec<ModelSummary>> {
        let url = format!("{}/api/models?author={author}&limit=1000", self.endpoint);
        debug!(%url, "listing models");
        let response = self.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(HubError::api(response.status().as_u16(), url));
        }
        Ok(response.json().await?)
    }

    /// File listing for one repository, including per-blob sizes.
    pub async fn model_files(&self, repo_id: &str) -> HubResult<Vec<RepoFile>> {
        let url = format!("{}/api/models/{repo_id}?blobs=true", self.endpoint);
        let response = self.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(HubError::api(response.status().as_u16(), url));
        }
        let info: ModelInfoResponse = response.json().await?;
        Ok(info.siblings)
    }

    /// Total content size of a repository in bytes.
    pub async fn repo_size(&self, repo_id: &str) -> HubResult<u64> {
        let files = self.model_files(repo_id).await?;
        Ok(sum_content_size(&files))
    }

    /// Create an (empty) model repository under the authenticated account.
    pub async fn create_repo(&self, repo_id: &str) -> HubResult<()> {
        let url = format!("{}/api/repos/create", self.endpoint);
        let body = create_repo_body(repo_id);
        debug!(repo_id, "creating hub repository");
        let response = self.post(&url).json(&body).send().await?;
        // 409: the repository already exists, which is fine for mirroring.
        if !response.status().is_success() && response.status().as_u16() != 409 {
            return Err(HubError::api(response.status().as_u16(), url));
        }
        Ok(())
    }

    /// Permanently delete a model repository.
    pub async fn delete_repo(&self, repo_id: &str) -> HubResult<()> {
        let url = format!("{}/api/repos/delete", self.endpoint);
        let body = create_repo_body(repo_id);
        debug!(repo_id, "deleting hub repository");
        let response = self
            .with_auth(self.http.delete(&url))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(HubError::api(response.status().as_u16(), url));
        }
        Ok(())
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.with_auth(self.http.get(url))
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.with_auth(self.http.post(url))
    }

    fn with_auth(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }
        req
    }
}

/// Sum sibling sizes, skipping the documentation files the hub always adds.
fn sum_content_size(files: &[RepoFile]) -> u64 {
    files
        .iter()
        .filter(|f| !SIZE_EXCLUDED_FILES.contains(&f.rfilename.as_str()))
        .filter_map(|f| f.size)
        .sum()
}

/// Request body for the repo create/delete endpoints.
fn create_repo_body(repo_id: &str) -> serde_json::Value {
    let (owner, name) = repo_id.split_once('/').unwrap_or(("", repo_id));
    serde_json::json!({
        "type": "model",
        "name": name,
        "organization": owner,
    })
}
