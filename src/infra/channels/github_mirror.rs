use crate::core::channels::{ChannelMirror, StoreError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: ContentsResponse,
}

/// Mirrors the channel file into a GitHub repository through the contents API.
pub struct GithubMirror {
    client: Client,
    base_url: String,
    repo: String,
    path: String,
    branch: String,
    /// Blob sha of the last version we saw; GitHub needs it to update a file.
    last_sha: Mutex<Option<String>>,
}

impl GithubMirror {
    pub fn new(repo: String, path: String, branch: String, token: &str) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Accept",
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert("User-Agent", HeaderValue::from_static("SetsunaBot/0.3"));
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| StoreError::Mirror(e.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::Mirror(e.to_string()))?;

        Ok(Self {
            client,
            base_url: "https://api.github.com".to_string(),
            repo,
            path: path.trim_start_matches('/').to_string(),
            branch,
            last_sha: Mutex::new(None),
        })
    }

    fn contents_url(&self) -> String {
        format!("{}/repos/{}/contents/{}", self.base_url, self.repo, self.path)
    }

    async fn get_contents(&self) -> Result<Option<ContentsResponse>, StoreError> {
        let response = self
            .client
            .get(self.contents_url())
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await
            .map_err(|e| StoreError::Mirror(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Mirror(e.to_string()))?;
        contents_from_response(status, &body)
    }
}

/// A missing file (404) is an empty mirror, not an error.
fn contents_from_response(
    status: StatusCode,
    body: &str,
) -> Result<Option<ContentsResponse>, StoreError> {
    match status {
        StatusCode::NOT_FOUND => Ok(None),
        status if status.is_success() => serde_json::from_str(body)
            .map(Some)
            .map_err(|e| StoreError::Mirror(e.to_string())),
        status => Err(StoreError::Mirror(format!("GitHub returned {}: {}", status, body))),
    }
}

/// The sha to remember after a PUT. `Ok(None)` when the response carried no
/// readable sha, so the next push refetches it.
fn sha_after_put(status: StatusCode, body: &str) -> Result<Option<String>, StoreError> {
    if !status.is_success() {
        return Err(StoreError::Mirror(format!("GitHub returned {}: {}", status, body)));
    }
    match serde_json::from_str::<PutResponse>(body) {
        Ok(put) => Ok(Some(put.content.sha)),
        Err(e) => {
            tracing::debug!("Could not read sha from GitHub response: {}", e);
            Ok(None)
        }
    }
}

/// GitHub returns base64 wrapped at 60 columns.
fn decode_contents(content: &str) -> Result<String, StoreError> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| StoreError::Mirror(format!("bad base64 from GitHub: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| StoreError::Mirror(e.to_string()))
}

#[async_trait]
impl ChannelMirror for GithubMirror {
    async fn fetch(&self) -> Result<Option<String>, StoreError> {
        let Some(contents) = self.get_contents().await? else {
            return Ok(None);
        };
        let json = decode_contents(&contents.content)?;
        *self.last_sha.lock().await = Some(contents.sha);
        Ok(Some(json))
    }

    async fn push(&self, json: &str) -> Result<(), StoreError> {
        let mut last_sha = self.last_sha.lock().await;
        if last_sha.is_none() {
            *last_sha = self.get_contents().await?.map(|c| c.sha);
        }

        let mut body = json!({
            "message": "Update Setsuna channel config",
            "content": STANDARD.encode(json.as_bytes()),
            "branch": self.branch,
        });
        if let Some(sha) = last_sha.as_ref() {
            body["sha"] = json!(sha);
        }

        let response = self
            .client
            .put(self.contents_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Mirror(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        match sha_after_put(status, &text) {
            Ok(sha) => {
                *last_sha = sha;
                tracing::debug!(repo = %self.repo, path = %self.path, "Pushed channel configs to mirror");
                Ok(())
            }
            Err(e) => {
                // A stale sha gives 409/422; forget it so the next push refetches.
                *last_sha = None;
                Err(e)
            }
        }
    }
}
