//! GitHub REST client for user repositories and their branches
//!
//! - One `GitHubClient` per process, cloned into request handlers
//! - 404 on the repository listing surfaces as `FetchUserReposError::UserNotFound`

pub mod index;
