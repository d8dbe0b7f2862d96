//! Upstream HTTP client.
//!
//! # Responsibilities
//! - Send one buffered request to a resolved target
//! - Pick the transport by scheme: hyper for `http://`, reqwest for `https://`
//! - Bound every call with the request timeout
//!
//! # Design Decisions
//! - Response bodies stream through; only request bodies are buffered
//! - Redirects from upstreams are passed to the client, never followed
//! - Addon and external targets are addressed by their own `Host`

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Method, Request, Response, StatusCode, Uri};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

use crate::config::TimeoutConfig;
use crate::resilience::{with_timeout, TimeoutError};
use crate::routing::Target;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream url {url}: {source}")]
    InvalidUri {
        url: String,
        #[source]
        source: axum::http::uri::InvalidUri,
    },

    #[error("failed to build upstream request: {0}")]
    Build(#[from] axum::http::Error),

    #[error("upstream connection failed: {0}")]
    Connect(#[from] hyper_util::client::legacy::Error),

    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream handshake failed: {0}")]
    Handshake(#[from] hyper::Error),

    #[error("upstream connection failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}

impl UpstreamError {
    /// Status answered to the client for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            UpstreamError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Clone)]
pub struct UpstreamClient {
    plain: Client<HttpConnector, Body>,
    tls: reqwest::Client,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(timeouts: &TimeoutConfig) -> Result<Self, reqwest::Error> {
        let connect_timeout = Duration::from_secs(timeouts.connect_secs);

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        let plain = Client::builder(TokioExecutor::new()).build(connector);

        let tls = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(connect_timeout)
            .no_proxy()
            .build()?;

        Ok(Self {
            plain,
            tls,
            timeout: Duration::from_secs(timeouts.request_secs),
        })
    }

    pub async fn send(
        &self,
        method: &Method,
        target: &Target,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Response<Body>, UpstreamError> {
        let url = target.url();
        let mut headers = headers.clone();
        if target.kind.rewrites_host() {
            // Both transports derive Host from the URL when it is absent.
            headers.remove(header::HOST);
        }

        let call = async {
            if url.starts_with("https://") {
                self.send_tls(method, &url, headers, body).await
            } else {
                self.send_plain(method, &url, headers, body).await
            }
        };
        with_timeout("upstream request", self.timeout, call).await?
    }

    async fn send_plain(
        &self,
        method: &Method,
        url: &str,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<Response<Body>, UpstreamError> {
        let uri: Uri = url.parse().map_err(|source| UpstreamError::InvalidUri {
            url: url.to_string(),
            source,
        })?;
        let mut request = Request::builder()
            .method(method.clone())
            .uri(uri)
            .body(Body::from(body))?;
        *request.headers_mut() = headers;

        let response = self.plain.request(request).await?;
        Ok(response.map(Body::new))
    }

    async fn send_tls(
        &self,
        method: &Method,
        url: &str,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<Response<Body>, UpstreamError> {
        let response = self
            .tls
            .request(method.clone(), url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let mut builder = Response::builder().status(response.status());
        if let Some(headers) = builder.headers_mut() {
            *headers = response.headers().clone();
        }
        Ok(builder.body(Body::from_stream(response.bytes_stream()))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::TargetKind;

    #[test]
    fn timeout_maps_to_gateway_timeout() {
        let err = UpstreamError::Timeout(TimeoutError {
            operation: "upstream request",
            after: Duration::from_secs(1),
        });
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn refused_connection_is_bad_gateway() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = UpstreamClient::new(&TimeoutConfig::default()).unwrap();
        let target = Target::new(TargetKind::Static, format!("http://127.0.0.1:{port}"), "/");

        let err = client
            .send(&Method::GET, &target, &HeaderMap::new(), Bytes::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}
