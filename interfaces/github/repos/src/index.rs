use std::fmt;
use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, InvalidHeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT},
    Client, StatusCode, Url,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const CLIENT_USER_AGENT: &str = "repos-aggregator";

#[derive(Clone)]
pub struct GitHubClientConfig {
    pub base_url: String,
    pub token: String,
    pub timeout: Duration,
}

impl fmt::Debug for GitHubClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClientConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Shared handle to the GitHub REST API. Cheap to clone; the underlying
/// connection pool and default headers are built once.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    base_url: Url,
}

/// Entry of `GET /users/{username}/repos`, reduced to the fields we read.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RepositorySummary {
    pub name: String,
    pub fork: bool,
    pub owner: Owner,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Owner {
    pub login: String,
}

/// Branch objects are passed through untouched.
pub type BranchList = Vec<serde_json::Value>;

pub struct GitHubResult {
    pub body: String,
    pub status: StatusCode,
}

pub fn authorization_header(token: &str) -> String {
    format!("token {token}")
}

impl GitHubClient {
    pub fn new(config: &GitHubClientConfig) -> Result<Self, BuildGitHubClientError> {
        let base_url = Url::parse(&config.base_url).map_err(|source| {
            BuildGitHubClientError::InvalidBaseUrl {
                url: config.base_url.clone(),
                source,
            }
        })?;
        if base_url.cannot_be_a_base() {
            return Err(BuildGitHubClientError::BaseUrlCannotBeABase {
                url: config.base_url.clone(),
            });
        }

        let mut authorization = HeaderValue::from_str(&authorization_header(&config.token))
            .map_err(|source| BuildGitHubClientError::InvalidToken { source })?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        headers.insert(AUTHORIZATION, authorization);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|source| BuildGitHubClientError::BuildHttpClient { source })?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Lists every repository of `username`, forks included, in upstream order.
    pub async fn fetch_user_repos(
        &self,
        username: &str,
    ) -> Result<Vec<RepositorySummary>, FetchUserReposError> {
        let GitHubResult { body, status } = self.get(&["users", username, "repos"]).await?;

        if status == StatusCode::NOT_FOUND {
            return Err(FetchUserReposError::UserNotFound {
                username: username.to_owned(),
            });
        }
        if !status.is_success() {
            return Err(FetchUserReposError::UnexpectedStatus { status });
        }

        serde_json::from_str(&body)
            .map_err(|source| FetchUserReposError::DeserializeResponseBody { source })
    }

    pub async fn fetch_repo_branches(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<BranchList, FetchRepoBranchesError> {
        let GitHubResult { body, status } = self.get(&["repos", owner, repo, "branches"]).await?;

        if !status.is_success() {
            return Err(FetchRepoBranchesError::UnexpectedStatus { status });
        }

        serde_json::from_str(&body)
            .map_err(|source| FetchRepoBranchesError::DeserializeResponseBody { source })
    }

    async fn get(&self, segments: &[&str]) -> Result<GitHubResult, GitHubRequestError> {
        let url = self.endpoint(segments);
        debug!(%url, "GET upstream");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| GitHubRequestError::RequestSend { source })?;

        let status = response.status();

        let body = response
            .text()
            .await
            .map_err(|source| GitHubRequestError::ResponseRead { source })?;

        debug!(%status, bytes = body.len(), "upstream responded");

        Ok(GitHubResult { body, status })
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot-be-a-base URLs are rejected in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[derive(Debug, Error)]
pub enum BuildGitHubClientError {
    #[error("InvalidBaseUrl: {url}: {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("BaseUrlCannotBeABase: {url}")]
    BaseUrlCannotBeABase {
        url: String,
    },

    #[error("InvalidToken: {source}")]
    InvalidToken {
        source: InvalidHeaderValue,
    },

    #[error("BuildHttpClient: {source}")]
    BuildHttpClient {
        source: reqwest::Error,
    },
}

#[derive(Debug, Error)]
pub enum GitHubRequestError {
    #[error("RequestSend: {source}")]
    RequestSend {
        source: reqwest::Error,
    },

    #[error("ResponseRead: {source}")]
    ResponseRead {
        source: reqwest::Error,
    },
}

#[derive(Debug, Error)]
pub enum FetchUserReposError {
    #[error("A GitHub user named {username} was not found.")]
    UserNotFound {
        username: String,
    },

    #[error("GitHubRequest: {source}")]
    GitHubRequest {
        #[from]
        source: GitHubRequestError,
    },

    #[error("UnexpectedStatus: {status}")]
    UnexpectedStatus {
        status: StatusCode,
    },

    #[error("DeserializeResponseBody: {source}")]
    DeserializeResponseBody {
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum FetchRepoBranchesError {
    #[error("GitHubRequest: {source}")]
    GitHubRequest {
        #[from]
        source: GitHubRequestError,
    },

    #[error("UnexpectedStatus: {status}")]
    UnexpectedStatus {
        status: StatusCode,
    },

    #[error("DeserializeResponseBody: {source}")]
    DeserializeResponseBody {
        source: serde_json::Error,
    },
}
