//! Response handling and transformation.
//!
//! # Responsibilities
//! - Relay the origin response to the caller unchanged
//! - Strip hop-by-hop headers that must not be forwarded
//! - Map pipeline errors to appropriate HTTP status codes
//!
//! # Design Decisions
//! - Origin responses stream through without buffering
//! - Credential failures answer 401; upstream timeouts 504, other upstream
//!   failures 502
//! - Error bodies name the error kind only; detail stays in the logs

use axum::body::Body;
use axum::http::{HeaderMap, Response, StatusCode};
use axum::response::IntoResponse;
use hyper::body::Incoming;

use crate::pipeline::{PipelineError, UpstreamError};

/// Headers that are connection-scoped and must not be relayed.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers in place.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Turn the origin response into the caller's response, status and body
/// unchanged.
pub fn relay_response(upstream: Response<Incoming>) -> Response<Body> {
    let (mut parts, body) = upstream.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}

/// Map a terminal pipeline error onto the caller-facing response.
pub fn error_response(err: &PipelineError) -> Response<Body> {
    let (status, message) = match err {
        PipelineError::MalformedCredential(_) => {
            (StatusCode::UNAUTHORIZED, "Malformed credential")
        }
        PipelineError::UpstreamUnavailable(UpstreamError::Timeout(_)) => {
            (StatusCode::GATEWAY_TIMEOUT, "Origin timed out")
        }
        PipelineError::UpstreamUnavailable(_) => (StatusCode::BAD_GATEWAY, "Origin unavailable"),
    };

    (status, message).into_response()
}
