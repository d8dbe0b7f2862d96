//! WebSocket upgrades pass through the proxy to the app origin.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

mod common;

async fn start_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    if message.is_text() || message.is_binary() {
                        let _ = ws.send(message).await;
                    }
                }
            });
        }
    });
    addr
}

#[tokio::test]
async fn echoes_through_upgraded_connection() {
    let site = tempfile::tempdir().unwrap();
    // Rules never apply to upgrades.
    std::fs::write(site.path().join("_redirects"), "/* /elsewhere 301\n").unwrap();
    let echo = start_echo_server().await;
    let proxy = common::start_proxy(common::config(echo.port(), site.path())).await;

    let (mut ws, response) = tokio_tungstenite::connect_async(format!("ws://{}/socket", proxy.addr))
        .await
        .unwrap();
    assert_eq!(response.status(), 101);

    ws.send(Message::text("hello")).await.unwrap();
    let reply = ws.next().await.unwrap().unwrap();
    assert_eq!(reply.to_text().unwrap(), "hello");

    ws.send(Message::binary(vec![1u8, 2, 3])).await.unwrap();
    let reply = ws.next().await.unwrap().unwrap();
    assert_eq!(reply.into_data().as_ref(), &[1u8, 2, 3]);

    ws.close(None).await.unwrap();
}

#[tokio::test]
async fn refused_upgrade_is_bad_gateway() {
    let site = tempfile::tempdir().unwrap();
    let closed_port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let proxy = common::start_proxy(common::config(closed_port, site.path())).await;

    let err = tokio_tungstenite::connect_async(format!("ws://{}/socket", proxy.addr))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("502"), "unexpected error: {err}");
}
