//! GitHub repository + branch aggregation service
//!
//! - REST API endpoints in `endpoints/`
//! - Environment configuration in `config`
//! - Requires GITHUB_TOKEN env var for API access

pub mod config;
pub mod endpoints;

use axum::{routing::get, Extension, Router};
use interfaces_github_repos::index::GitHubClient;
use tower_http::trace::TraceLayer;

use endpoints::github::repos::read::index::handler as github_repos_read_handler;
use endpoints::health::index::handler as health_handler;

pub fn router(client: GitHubClient) -> Router {
    Router::new()
        .route("/github/repos", get(github_repos_read_handler))
        .route("/health", get(health_handler))
        .layer(Extension(client))
        .layer(TraceLayer::new_for_http())
}
