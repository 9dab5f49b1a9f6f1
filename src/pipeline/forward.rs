//! Forwarding step.
//!
//! # Responsibilities
//! - POST the transformed headers and body to the configured origin
//! - Wait for the full response within the upstream timeout
//! - Surface transport failures and timeouts as terminal errors
//!
//! # Design Decisions
//! - No retries and no circuit breaking; resiliency belongs to the
//!   infrastructure around the gateway
//! - Connection pooling and connect timeouts live in the hyper client

use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response, Uri};
use hyper::body::Incoming;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::http::response::strip_hop_by_hop;
use crate::pipeline::{PipelineError, TransformRequest, UpstreamError};

/// Sends transformed requests to the origin.
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
}

impl Forwarder {
    pub fn new(connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));

        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client }
    }

    /// POST the transformed request to `origin` and await the response.
    pub async fn send(
        &self,
        origin: &Uri,
        timeout: Duration,
        req: TransformRequest,
    ) -> Result<Response<Incoming>, PipelineError> {
        let mut outbound_headers = req.headers;
        strip_hop_by_hop(&mut outbound_headers);

        let mut builder = Request::builder().method(Method::POST).uri(origin.clone());

        if let Some(headers) = builder.headers_mut() {
            for (key, value) in outbound_headers.iter() {
                headers.insert(key.clone(), value.clone());
            }
        }

        let outbound = builder
            .body(Body::from(req.body))
            .map_err(|e| UpstreamError::Transport(format!("failed to build outbound request: {e}")))?;

        match tokio::time::timeout(timeout, self.client.request(outbound)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(UpstreamError::Transport(e.to_string()).into()),
            Err(_) => Err(UpstreamError::Timeout(timeout).into()),
        }
    }
}
