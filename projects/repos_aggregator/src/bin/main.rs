use axum::serve;
use interfaces_github_repos::index::{BuildGitHubClientError, GitHubClient};
use projects_repos_aggregator::{
	config::{Config, ConfigError},
	router,
};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum MainError {
	#[error("Config: {source}")]
	Config {
		#[source]
		source: ConfigError,
	},
	#[error("TracingInit: {source}")]
	TracingInit {
		#[source]
		source: utils_trace::TracingInitError,
	},
	#[error("BuildGitHubClient: {source}")]
	BuildGitHubClient {
		#[source]
		source: BuildGitHubClientError,
	},
	#[error("TcpListenerBind: {source}")]
	TcpListenerBind {
		#[source]
		source: std::io::Error,
	},
	#[error("Serve: {source}")]
	Serve {
		#[source]
		source: std::io::Error,
	}
}

#[tokio::main]
async fn main() -> Result<(), MainError> {
	let config = Config::from_env()
		.map_err(|source| MainError::Config { source })?;

	utils_trace::init(&config.log_level, config.log_format)
		.map_err(|source| MainError::TracingInit { source })?;

	let client = GitHubClient::new(&config.github)
		.map_err(|source| MainError::BuildGitHubClient { source })?;

	info!(
		base_url = %client.base_url(),
		timeout_secs = config.github.timeout.as_secs(),
		"GitHub client ready"
	);

	let app = router(client);

	let listener = tokio::net::TcpListener::bind(config.bind_addr)
		.await
		.map_err(|source| MainError::TcpListenerBind { source })?;

	info!("Server running on addr: {}", config.bind_addr);

	serve(listener, app)
		.with_graceful_shutdown(shutdown_signal())
		.await
		.map_err(|source| MainError::Serve { source })?;

	info!("Server stopped");

	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(err) = tokio::signal::ctrl_c().await {
			error!(error = %err, "failed to listen for Ctrl+C");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		use tokio::signal::unix::{signal, SignalKind};

		match signal(SignalKind::terminate()) {
			Ok(mut sigterm) => {
				sigterm.recv().await;
			}
			Err(err) => {
				error!(error = %err, "failed to listen for SIGTERM");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}

	info!("Shutdown signal received");
}
