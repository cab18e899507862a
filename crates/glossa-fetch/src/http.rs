//! HTTP fetcher for GitHub-compatible REST APIs

use crate::error::FetchError;
use crate::fetcher::{DirEntry, EntryKind, RawFile, RemoteFetcher};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use glossa_core::Blame;
use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";

/// HTTP fetcher settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// API root, e.g. `https://api.github.com`
    pub api_base: String,
    /// Bearer token supplied by the auth layer
    pub token: Option<String>,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl FetcherConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            token: None,
            user_agent: concat!("glossa/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
        }
    }
}

/// Fetcher bound to one `owner/name` repository
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    api_base: Url,
    repository: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentsBody {
    content: Option<String>,
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingItem {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct CommitItem {
    sha: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    author: Option<CommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct CommitAuthor {
    name: String,
    email: String,
    date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

impl HttpFetcher {
    /// Create fetcher for `repository`
    ///
    /// # Errors
    /// `FetchError::Unknown` if the API base is not a valid URL or the client
    /// cannot be built
    pub fn new(config: &FetcherConfig, repository: impl Into<String>) -> Result<Self, FetchError> {
        let api_base = Url::parse(&config.api_base)
            .map_err(|e| FetchError::Unknown(format!("invalid api base '{}': {e}", config.api_base)))?;
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::Unknown(format!("http client: {e}")))?;
        Ok(Self {
            client,
            api_base,
            repository: repository.into(),
            token: config.token.clone(),
        })
    }

    #[inline]
    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    fn repo_url<'a>(&self, tail: impl IntoIterator<Item = &'a str>) -> Result<Url, FetchError> {
        let mut url = self.api_base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| FetchError::Unknown("api base cannot carry a path".to_string()))?;
            segments
                .pop_if_empty()
                .push("repos")
                .extend(self.repository.split('/'))
                .extend(tail.into_iter().filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    fn contents_url(&self, path: &str) -> Result<Url, FetchError> {
        self.repo_url(std::iter::once("contents").chain(path.split('/')))
    }

    fn get(&self, url: Url, accept: &str) -> RequestBuilder {
        let request = self.client.get(url).header(ACCEPT, accept);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, path: &str) -> Result<Response, FetchError> {
        let response = request.send().await?;
        check_status(response, path)
    }
}

/// Map an HTTP status onto the fetch taxonomy
fn check_status(response: Response, path: &str) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(classify_status(status, response.headers(), path))
}

fn classify_status(status: StatusCode, headers: &HeaderMap, path: &str) -> FetchError {
    let retry_after = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let quota_exhausted = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");

    match status {
        StatusCode::NOT_FOUND => FetchError::not_found(path),
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited { retry_after },
        StatusCode::FORBIDDEN if quota_exhausted => FetchError::RateLimited { retry_after },
        s if s.is_server_error() => FetchError::Transient(format!("{path}: HTTP {s}")),
        s => FetchError::Unknown(format!("{path}: HTTP {s}")),
    }
}

/// Decode a base64 body field, ignoring the line breaks the API inserts
fn decode_base64(encoded: &str) -> Result<Vec<u8>, FetchError> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    BASE64
        .decode(compact)
        .map_err(|e| FetchError::Unknown(format!("base64: {e}")))
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch_streaming(&self, path: &str, revision: &str) -> Result<RawFile, FetchError> {
        let url = self.contents_url(path)?;
        let request = self.get(url, RAW_MEDIA_TYPE).query(&[("ref", revision)]);
        let response = self.send(request, path).await?;

        let mut content = Vec::with_capacity(
            response
                .content_length()
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(0),
        );
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            content.extend_from_slice(&chunk?);
        }
        Ok(RawFile::new(path, content, revision))
    }

    async fn fetch_whole(&self, path: &str, revision: &str) -> Result<RawFile, FetchError> {
        let url = self.contents_url(path)?;
        let request = self.get(url, JSON_MEDIA_TYPE).query(&[("ref", revision)]);
        let response = self.send(request, path).await?;
        let body: ContentsBody = response
            .json()
            .await
            .map_err(|e| FetchError::Unknown(format!("{path}: unexpected contents body: {e}")))?;

        match (body.encoding.as_deref(), body.content) {
            (Some("base64"), Some(encoded)) => {
                Ok(RawFile::new(path, decode_base64(&encoded)?, revision))
            }
            (encoding, _) => Err(FetchError::Unknown(format!(
                "{path}: unsupported content encoding {encoding:?}"
            ))),
        }
    }

    async fn list_dir(&self, path: &str, revision: &str) -> Result<Vec<DirEntry>, FetchError> {
        let url = self.contents_url(path)?;
        let request = self.get(url, JSON_MEDIA_TYPE).query(&[("ref", revision)]);
        let response = self.send(request, path).await?;
        let items: Vec<ListingItem> = response
            .json()
            .await
            .map_err(|e| FetchError::Unknown(format!("{path}: not a directory listing: {e}")))?;

        Ok(items
            .into_iter()
            .map(|item| DirEntry {
                kind: match item.kind.as_str() {
                    "file" => EntryKind::File,
                    "dir" => EntryKind::Dir,
                    _ => EntryKind::Other,
                },
                name: item.name,
                path: item.path,
            })
            .collect())
    }

    async fn latest_commit(&self, path: &str, revision: &str) -> Result<Option<Blame>, FetchError> {
        let url = self.repo_url(["commits"])?;
        let request = self
            .get(url, JSON_MEDIA_TYPE)
            .query(&[("path", path), ("sha", revision), ("per_page", "1")]);
        let response = self.send(request, path).await?;
        let commits: Vec<CommitItem> = response
            .json()
            .await
            .map_err(|e| FetchError::Unknown(format!("{path}: unexpected commits body: {e}")))?;

        Ok(commits.into_iter().next().and_then(|c| {
            c.commit.author.map(|a| Blame {
                revision_id: c.sha,
                author: a.name,
                email: a.email,
                timestamp: a.date,
            })
        }))
    }

    async fn resolve_revision(&self, reference: &str) -> Result<String, FetchError> {
        if is_commit_sha(reference) {
            return Ok(reference.to_string());
        }
        let url = self.repo_url(["commits", reference])?;
        let response = self.send(self.get(url, JSON_MEDIA_TYPE), reference).await?;
        let commit: CommitRef = response
            .json()
            .await
            .map_err(|e| FetchError::Unknown(format!("{reference}: unexpected commit body: {e}")))?;
        Ok(commit.sha)
    }
}

/// Full 40-character hex SHA
#[must_use]
pub fn is_commit_sha(reference: &str) -> bool {
    reference.len() == 40 && reference.chars().all(|c| c.is_ascii_hexdigit())
}
