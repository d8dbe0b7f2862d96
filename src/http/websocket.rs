//! Upgrade (WebSocket) pass-through.
//!
//! # Data Flow
//! ```text
//! Client ──upgrade──→ Proxy ──upgrade──→ App origin
//!        ←── 101 ────       ←── 101 ────
//! Client ←═══ raw bytes ═══→ Proxy ←═══ raw bytes ═══→ App origin
//! ```
//!
//! # Design Decisions
//! - Upgrades bypass the rule table and always go to the app origin
//! - Bytes are copied opaquely; frames are never parsed
//! - `Connection`/`Upgrade` headers are forwarded unchanged

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use crate::http::client::UpstreamError;

pub fn is_upgrade_request<B>(request: &Request<B>) -> bool {
    let connection_upgrade = request
        .headers()
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
    connection_upgrade && request.headers().contains_key(header::UPGRADE)
}

/// Forward an upgrade request to `origin` (`http://host:port`) and splice the
/// two connections together once both sides switch protocols.
pub async fn forward(origin: &str, mut request: Request<Body>) -> Result<Response<Body>, UpstreamError> {
    let authority = origin.strip_prefix("http://").unwrap_or(origin);
    let stream = TcpStream::connect(authority).await?;
    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.with_upgrades().await {
            tracing::debug!(error = %e, "Upstream upgrade connection closed");
        }
    });

    let client_upgrade = hyper::upgrade::on(&mut request);

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let mut upstream_request = Request::builder()
        .method(request.method().clone())
        .uri(path_and_query)
        .body(Body::empty())?;
    *upstream_request.headers_mut() = request.headers().clone();

    let mut upstream_response = sender.send_request(upstream_request).await?;
    if upstream_response.status() != StatusCode::SWITCHING_PROTOCOLS {
        return Ok(upstream_response.map(Body::new));
    }

    let upstream_upgrade = hyper::upgrade::on(&mut upstream_response);
    tokio::spawn(async move {
        match tokio::try_join!(client_upgrade, upstream_upgrade) {
            Ok((client, upstream)) => {
                let mut client = TokioIo::new(client);
                let mut upstream = TokioIo::new(upstream);
                match tokio::io::copy_bidirectional(&mut client, &mut upstream).await {
                    Ok((sent, received)) => {
                        tracing::debug!(sent, received, "Upgraded connection closed")
                    }
                    Err(e) => tracing::debug!(error = %e, "Upgraded connection ended with error"),
                }
            }
            Err(e) => tracing::warn!(error = %e, "Protocol upgrade failed"),
        }
    });

    let (parts, _) = upstream_response.into_parts();
    Ok(Response::from_parts(parts, Body::empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_upgrade_requests() {
        let request = Request::builder()
            .header("connection", "keep-alive, Upgrade")
            .header("upgrade", "websocket")
            .body(())
            .unwrap();
        assert!(is_upgrade_request(&request));

        let plain = Request::builder()
            .header("upgrade", "websocket")
            .body(())
            .unwrap();
        assert!(!is_upgrade_request(&plain));
    }
}
