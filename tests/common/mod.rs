//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::Router;
use tokio::sync::mpsc;

/// A request as seen by a mock origin.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub headers: HeaderMap,
    pub body: String,
}

async fn serve(addr: SocketAddr, app: Router) {
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
}

/// Start a mock origin that records every request it receives and answers
/// `200` with `reply`.
pub async fn start_capture_origin(
    addr: SocketAddr,
    reply: &'static str,
) -> mpsc::UnboundedReceiver<CapturedRequest> {
    let (tx, rx) = mpsc::unbounded_channel();

    let app = Router::new().fallback(
        move |method: Method, headers: HeaderMap, body: Bytes| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(CapturedRequest {
                    method: method.to_string(),
                    headers,
                    body: String::from_utf8_lossy(&body).into_owned(),
                });
                reply
            }
        },
    );

    serve(addr, app).await;
    rx
}

/// Start a mock origin that answers a fixed status and body.
#[allow(dead_code)]
pub async fn start_status_origin(addr: SocketAddr, status: u16, body: &'static str) {
    let app = Router::new().fallback(move || async move {
        (StatusCode::from_u16(status).unwrap(), body)
    });
    serve(addr, app).await;
}

/// Start a mock origin that waits before answering.
#[allow(dead_code)]
pub async fn start_slow_origin(addr: SocketAddr, delay: Duration) {
    let app = Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        "slow"
    });
    serve(addr, app).await;
}
