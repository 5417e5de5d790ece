#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use interfaces_github_repos::index::{GitHubClient, GitHubClientConfig};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const TEST_TOKEN: &str = "test-token";

/// Client timeout used against the mock; stalled routes sleep well past it.
pub const CLIENT_TIMEOUT: Duration = Duration::from_millis(500);
const STALL: Duration = Duration::from_secs(5);

/// In-memory stand-in for the GitHub REST API.
#[derive(Default)]
pub struct MockGitHub {
    users: HashMap<String, Value>,
    branches: HashMap<(String, String), Value>,
    stalled_branches: HashSet<(String, String)>,
    failing_branches: HashSet<(String, String)>,
    calls: AtomicUsize,
    seen_headers: Mutex<Vec<HeaderMap>>,
}

impl MockGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, username: &str, repos: Value) -> Self {
        self.users.insert(username.to_owned(), repos);
        self
    }

    pub fn with_branches(mut self, owner: &str, repo: &str, branches: Value) -> Self {
        self.branches
            .insert((owner.to_owned(), repo.to_owned()), branches);
        self
    }

    /// Branch requests for this repository never answer within the client timeout.
    pub fn with_stalled_branches(mut self, owner: &str, repo: &str) -> Self {
        self.stalled_branches
            .insert((owner.to_owned(), repo.to_owned()));
        self
    }

    pub fn with_failing_branches(mut self, owner: &str, repo: &str) -> Self {
        self.failing_branches
            .insert((owner.to_owned(), repo.to_owned()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_headers(&self) -> Vec<HeaderMap> {
        self.seen_headers.lock().unwrap().clone()
    }

    fn record(&self, headers: &HeaderMap) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_headers.lock().unwrap().push(headers.clone());
    }
}

async fn user_repos(
    State(mock): State<Arc<MockGitHub>>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Response {
    mock.record(&headers);

    match mock.users.get(&username) {
        Some(repos) => Json(repos.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Not Found" })),
        )
            .into_response(),
    }
}

async fn repo_branches(
    State(mock): State<Arc<MockGitHub>>,
    Path((owner, repo)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    mock.record(&headers);

    let key = (owner, repo);
    if mock.stalled_branches.contains(&key) {
        tokio::time::sleep(STALL).await;
    }
    if mock.failing_branches.contains(&key) {
        return (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "message": "Server Error" })),
        )
            .into_response();
    }

    match mock.branches.get(&key) {
        Some(branches) => Json(branches.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Not Found" })),
        )
            .into_response(),
    }
}

pub async fn spawn(app: Router) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move { axum::serve(listener, app).await });
    Ok(addr)
}

pub async fn spawn_mock(mock: Arc<MockGitHub>) -> anyhow::Result<SocketAddr> {
    let app = Router::new()
        .route("/users/{username}/repos", get(user_repos))
        .route("/repos/{owner}/{repo}/branches", get(repo_branches))
        .with_state(mock);
    spawn(app).await
}

pub fn client_for(base_url: String) -> anyhow::Result<GitHubClient> {
    Ok(GitHubClient::new(&GitHubClientConfig {
        base_url,
        token: TEST_TOKEN.to_owned(),
        timeout: CLIENT_TIMEOUT,
    })?)
}

/// Running service wired to a running mock upstream.
pub struct TestApp {
    pub addr: SocketAddr,
    pub mock: Arc<MockGitHub>,
    http: reqwest::Client,
}

impl TestApp {
    pub async fn start(mock: MockGitHub) -> anyhow::Result<Self> {
        let mock = Arc::new(mock);
        let upstream = spawn_mock(mock.clone()).await?;
        let client = client_for(format!("http://{upstream}"))?;
        let addr = spawn(projects_repos_aggregator::router(client)).await?;

        Ok(Self {
            addr,
            mock,
            http: reqwest::Client::new(),
        })
    }

    pub async fn get_repos(
        &self,
        username: &str,
        accept: &str,
    ) -> anyhow::Result<reqwest::Response> {
        Ok(self
            .http
            .get(format!("http://{}/github/repos", self.addr))
            .query(&[("username", username)])
            .header(reqwest::header::ACCEPT, accept)
            .send()
            .await?)
    }

    pub async fn get(&self, path_and_query: &str) -> anyhow::Result<reqwest::Response> {
        Ok(self
            .http
            .get(format!("http://{}{}", self.addr, path_and_query))
            .send()
            .await?)
    }

    pub async fn get_with_accept(
        &self,
        path_and_query: &str,
        accept: &[&str],
    ) -> anyhow::Result<reqwest::Response> {
        let mut request = self
            .http
            .get(format!("http://{}{}", self.addr, path_and_query));
        for value in accept {
            request = request.header(reqwest::header::ACCEPT, *value);
        }
        Ok(request.send().await?)
    }

    /// Plain HTTP/1.1 GET without an `Accept` header, which reqwest always adds.
    pub async fn get_without_accept(&self, path_and_query: &str) -> anyhow::Result<(u16, Value)> {
        let mut stream = TcpStream::connect(self.addr).await?;
        let request = format!(
            "GET {path_and_query} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            self.addr
        );
        stream.write_all(request.as_bytes()).await?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await?;
        let raw = String::from_utf8(raw)?;

        let (head, body) = raw
            .split_once("\r\n\r\n")
            .ok_or_else(|| anyhow::anyhow!("malformed response: {raw}"))?;
        let status = head
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| anyhow::anyhow!("missing status line: {head}"))?
            .parse()?;

        Ok((status, serde_json::from_str(body)?))
    }
}
