//! Startup orchestration helpers.
//!
//! # Responsibilities
//! - Wait for the app (and functions) servers to accept connections
//! - Export the environment child processes expect in local development
//!
//! # Design Decisions
//! - Fail fast: a port that never opens is fatal
//! - Polling, not backoff: local servers come up in seconds

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::BuildError;
use thiserror::Error;
use tokio::net::TcpStream;

use crate::config::ConfigError;
use crate::resilience::{with_timeout, TimeoutError};

const PORT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not reach {host}:{port}: {source}")]
    PortTimeout {
        host: String,
        port: u16,
        #[source]
        source: TimeoutError,
    },

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to watch rule files: {0}")]
    Watch(#[from] notify::Error),

    #[error("failed to start metrics endpoint: {0}")]
    Metrics(#[from] BuildError),

    #[error("invalid address {0}")]
    Address(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Poll `host:port` until a TCP connection succeeds.
pub async fn wait_for_port(host: &str, port: u16, timeout: Duration) -> Result<(), StartupError> {
    tracing::info!(host, port, "Waiting for server to accept connections");

    let probe = async {
        loop {
            match TcpStream::connect((host, port)).await {
                Ok(_) => return,
                Err(e) => tracing::trace!(error = %e, "Port not open yet"),
            }
            tokio::time::sleep(PORT_POLL_INTERVAL).await;
        }
    };

    with_timeout("port probe", timeout, probe)
        .await
        .map_err(|source| StartupError::PortTimeout {
            host: host.to_string(),
            port,
            source,
        })
}

/// Mark the process environment as local development.
pub fn export_dev_environment() {
    std::env::set_var("NETLIFY_DEV", "true");
}

/// Publish the proxy's serving URL once the listener is bound.
pub fn set_serving_url(addr: SocketAddr) -> String {
    let url = format!("http://localhost:{}", addr.port());
    std::env::set_var("URL", &url);
    std::env::set_var("DEPLOY_URL", &url);
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_once_port_is_open() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        wait_for_port("127.0.0.1", port, Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn times_out_on_closed_port() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = wait_for_port("127.0.0.1", port, Duration::from_millis(600))
            .await
            .unwrap_err();
        assert!(matches!(err, StartupError::PortTimeout { port: p, .. } if p == port));
    }

    #[test]
    fn serving_url_uses_localhost() {
        let url = set_serving_url("127.0.0.1:8888".parse().unwrap());
        assert_eq!(url, "http://localhost:8888");
        assert_eq!(std::env::var("DEPLOY_URL").unwrap(), url);
    }
}
