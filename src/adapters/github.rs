use crate::config::WorkshopConfig;
use crate::domain::ports::{RemoteHost, RemoteTag, RepoRef};
use crate::utils::error::{RemoteError, Result, WorkshopError};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

/// Remote host speaking the GitHub REST layout.
pub struct HttpRemote {
    client: Client,
    config: WorkshopConfig,
}

#[derive(Debug, Deserialize)]
struct TagPayload {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CommitPayload {
    sha: String,
}

impl HttpRemote {
    pub fn new(config: WorkshopConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.remote.user_agent.clone())
            .build()
            .map_err(|e| WorkshopError::ConfigError {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client, config })
    }

    fn repo_url(&self, repo: &RepoRef, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.config.api_base(&repo.domain),
            repo.owner,
            repo.repo,
            tail
        )
    }

    async fn send(&self, url: &str) -> std::result::Result<Response, RemoteError> {
        tracing::debug!("📡 GET {}", url);
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json");

        if let Some(token) = self.config.token() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("📡 {} -> {}", url, status);

        match status {
            s if s.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RemoteError::Unauthorized {
                url: url.to_string(),
            }),
            StatusCode::NOT_FOUND => Err(RemoteError::NotFound {
                url: url.to_string(),
            }),
            s => Err(RemoteError::Status {
                url: url.to_string(),
                status: s.as_u16(),
            }),
        }
    }
}

#[async_trait]
impl RemoteHost for HttpRemote {
    async fn tags(&self, repo: &RepoRef) -> std::result::Result<Vec<RemoteTag>, RemoteError> {
        let url = self.repo_url(repo, "tags?per_page=100");
        let payload: Vec<TagPayload> = self.send(&url).await?.json().await?;
        Ok(payload
            .into_iter()
            .map(|tag| RemoteTag { name: tag.name })
            .collect())
    }

    async fn head_revision(&self, repo: &RepoRef) -> std::result::Result<String, RemoteError> {
        let url = self.repo_url(repo, "commits/HEAD");
        let payload: CommitPayload = self.send(&url).await?.json().await?;
        Ok(payload.sha)
    }

    async fn download(
        &self,
        repo: &RepoRef,
        rel: &str,
    ) -> std::result::Result<Vec<u8>, RemoteError> {
        let url = self.repo_url(repo, &format!("zipball/{}", rel));
        let bytes = self.send(&url).await?.bytes().await?;
        tracing::debug!("📥 Downloaded {} bytes for {}@{}", bytes.len(), repo.addr(), rel);
        Ok(bytes.to_vec())
    }
}
