use axum::{
	body::Body,
	extract::{rejection::QueryRejection, Extension, Query},
	http::{header, HeaderMap, Response, StatusCode},
	response::IntoResponse,
	Json,
};
use interfaces_github_repos::index::{
	BranchList, FetchRepoBranchesError, FetchUserReposError, GitHubClient, RepositorySummary,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

const UNSUPPORTED_ACCEPT: &str = "application/xml";

/// Query parameters for the endpoint.
#[derive(Deserialize)]
pub struct ReposQuery {
	username: Option<String>,
}

/// One non-fork repository with its branches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepositoryBranches {
	#[serde(rename = "Repository")]
	pub repository: String,
	#[serde(rename = "Owner")]
	pub owner: String,
	#[serde(rename = "Branches")]
	pub branches: BranchList,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
	pub status: u16,
	#[serde(rename = "Message")]
	pub message: String,
}

#[derive(Debug, Error)]
pub enum HandlerError {
	#[error("The application/xml format is not supported.")]
	UnsupportedFormat,

	#[error("Required request header 'Accept' is not present.")]
	MissingAccept,

	#[error("Failed to parse request parameters.")]
	InvalidQuery {
		source: QueryRejection,
	},

	#[error("Required request parameter 'username' is not present.")]
	MissingUsername,

	#[error("A GitHub user named {username} was not found.")]
	UserNotFound {
		username: String,
	},

	#[error("FetchAndAggregateRepoBranches: {source}")]
	FetchAndAggregateRepoBranches {
		source: FetchAndAggregateRepoBranchesError,
	},

	#[error("SerializeResponseBody: {source}")]
	SerializeResponseBody {
		source: serde_json::Error,
	},

	#[error("BuildResponse: {source}")]
	BuildResponse {
		source: axum::http::Error,
	},
}

impl From<FetchAndAggregateRepoBranchesError> for HandlerError {
	fn from(source: FetchAndAggregateRepoBranchesError) -> Self {
		match source {
			FetchAndAggregateRepoBranchesError::FetchUserRepos {
				source: FetchUserReposError::UserNotFound { username },
			} => HandlerError::UserNotFound { username },
			source => HandlerError::FetchAndAggregateRepoBranches { source },
		}
	}
}

impl HandlerError {
	pub fn status(&self) -> StatusCode {
		match self {
			HandlerError::UnsupportedFormat => StatusCode::NOT_ACCEPTABLE,
			HandlerError::MissingAccept
			| HandlerError::InvalidQuery { .. }
			| HandlerError::MissingUsername => StatusCode::BAD_REQUEST,
			HandlerError::UserNotFound { .. } => StatusCode::NOT_FOUND,
			HandlerError::FetchAndAggregateRepoBranches { .. }
			| HandlerError::SerializeResponseBody { .. }
			| HandlerError::BuildResponse { .. } => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl IntoResponse for HandlerError {
	fn into_response(self) -> axum::response::Response {
		let status = self.status();

		// internal detail stays in the logs
		let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
			error!(error = %self, "GET /github/repos failed");
			"Internal server error.".to_owned()
		} else {
			match &self {
				HandlerError::InvalidQuery { source } => {
					warn!(%status, error = %source, "GET /github/repos rejected")
				}
				_ => warn!(%status, error = %self, "GET /github/repos rejected"),
			}
			self.to_string()
		};

		let body = ErrorResponse {
			status: status.as_u16(),
			message,
		};

		(status, Json(body)).into_response()
	}
}

/// Axum handler: GET /github/repos?username=<name>
pub async fn handler(
	Extension(client): Extension<GitHubClient>,
	headers: HeaderMap,
	query: Result<Query<ReposQuery>, QueryRejection>,
) -> Result<Response<Body>, HandlerError> {
	let accept = accept_header(&headers).ok_or(HandlerError::MissingAccept)?;
	if is_unsupported_format(&accept) {
		return Err(HandlerError::UnsupportedFormat);
	}

	let Query(query) = query.map_err(|source| HandlerError::InvalidQuery { source })?;

	let username = query
		.username
		.filter(|username| !username.is_empty())
		.ok_or(HandlerError::MissingUsername)?;

	let aggregation = fetch_and_aggregate_repo_branches(&client, &username).await?;

	info!(%username, repositories = aggregation.len(), "aggregated repository branches");

	let json = serde_json::to_string(&aggregation)
		.map_err(|source| HandlerError::SerializeResponseBody { source })?;

	Response::builder()
		.status(StatusCode::OK)
		.header(header::CONTENT_TYPE, "application/json")
		.body(Body::from(json))
		.map_err(|source| HandlerError::BuildResponse { source })
}

/// All `Accept` values joined with ", ", or `None` when the header is absent.
pub fn accept_header(headers: &HeaderMap) -> Option<String> {
	let values: Vec<_> = headers
		.get_all(header::ACCEPT)
		.iter()
		.map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
		.collect();

	(!values.is_empty()).then(|| values.join(", "))
}

/// Exact, case-sensitive match against `application/xml`.
pub fn is_unsupported_format(accept: &str) -> bool {
	accept == UNSUPPORTED_ACCEPT
}

#[derive(Debug, Error)]
pub enum FetchAndAggregateRepoBranchesError {
	#[error("FetchUserRepos: {source}")]
	FetchUserRepos {
		#[from]
		source: FetchUserReposError,
	},

	#[error("FetchRepoBranches: {owner}/{repo}: {source}")]
	FetchRepoBranches {
		owner: String,
		repo: String,
		source: FetchRepoBranchesError,
	},
}

pub fn retain_non_forks(repos: Vec<RepositorySummary>) -> Vec<RepositorySummary> {
	repos.into_iter().filter(|repo| !repo.fork).collect()
}

/// Lists the user's repositories, drops forks, then fetches branches one
/// repository at a time. The first failing branch call aborts the whole run.
pub async fn fetch_and_aggregate_repo_branches(
	client: &GitHubClient,
	username: &str,
) -> Result<Vec<RepositoryBranches>, FetchAndAggregateRepoBranchesError> {
	let repos = retain_non_forks(client.fetch_user_repos(username).await?);
	let mut aggregation = Vec::with_capacity(repos.len());

	for RepositorySummary { name, owner, .. } in repos {
		let branches = client
			.fetch_repo_branches(&owner.login, &name)
			.await
			.map_err(|source| FetchAndAggregateRepoBranchesError::FetchRepoBranches {
				owner: owner.login.clone(),
				repo: name.clone(),
				source,
			})?;

		aggregation.push(RepositoryBranches {
			repository: name,
			owner: owner.login,
			branches,
		});
	}

	Ok(aggregation)
}
