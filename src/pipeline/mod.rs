//! Perimeter transform pipeline.
//!
//! # Data Flow
//! ```text
//! Inbound request (headers + body)
//!     → identity.rs (bearer token → claim → identity header)
//!     → rewrite.rs (body reversal)
//!     → forward.rs (POST to the configured origin)
//!     → origin response relayed verbatim to the caller
//! ```
//!
//! # Design Decisions
//! - Steps are an ordered list applied to an owned request value; each step
//!   takes the value and returns a transformed one or a terminal error
//! - No state is retained across requests; a pipeline is a list of stateless
//!   steps and can be shared freely between tasks
//! - First error wins: a failed step short-circuits the remaining steps and
//!   the forward never happens

pub mod forward;
pub mod identity;
pub mod rewrite;

use axum::body::Bytes;
use axum::http::HeaderMap;
use thiserror::Error;

pub use forward::Forwarder;
pub use identity::ClaimExtraction;
pub use rewrite::BodyReverse;

/// A request being transformed on its way to the origin.
///
/// Derived from the inbound request once its body has been buffered, and
/// consumed by the forwarder after the last step has run.
#[derive(Debug, Clone)]
pub struct TransformRequest {
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Errors that terminate a request. No partial results, no retries.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The bearer credential was absent, unparseable, or carried no usable
    /// identity claim. Maps to a 4xx response.
    #[error("malformed credential: {0}")]
    MalformedCredential(#[from] CredentialError),

    /// The origin could not be reached or did not answer in time. Maps to a
    /// 5xx response.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(#[from] UpstreamError),
}

impl PipelineError {
    /// Stable label for the rejection counter.
    pub fn metric_reason(&self) -> &'static str {
        match self {
            PipelineError::MalformedCredential(_) => "malformed_credential",
            PipelineError::UpstreamUnavailable(UpstreamError::Timeout(_)) => "upstream_timeout",
            PipelineError::UpstreamUnavailable(_) => "upstream_unreachable",
        }
    }
}

/// Ways a bearer credential can fail extraction.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("missing Authorization header")]
    MissingHeader,

    #[error("Authorization header is not a Bearer credential")]
    NotBearer,

    #[error("token does not have three segments")]
    TokenStructure,

    #[error("token payload is not valid base64url: {0}")]
    PayloadEncoding(#[from] base64::DecodeError),

    #[error("token payload is not a JSON object: {0}")]
    PayloadJson(#[from] serde_json::Error),

    #[error("token payload is not a JSON object")]
    PayloadNotObject,

    #[error("claim {0:?} is missing or not a string")]
    MissingClaim(String),

    #[error("claim {0:?} is not usable as a header value")]
    ClaimNotHeaderSafe(String),
}

/// Ways the origin call can fail. Origin responses, whatever their status,
/// are not errors; they are relayed to the caller.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("origin did not respond within {0:?}")]
    Timeout(std::time::Duration),

    #[error("request to origin failed: {0}")]
    Transport(String),
}

/// One transformation applied to the request on its way to the origin.
pub trait TransformStep: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Apply the transformation, or fail the request.
    fn apply(&self, req: TransformRequest) -> Result<TransformRequest, PipelineError>;
}

/// An ordered list of transform steps.
pub struct Pipeline {
    steps: Vec<Box<dyn TransformStep>>,
}

impl Pipeline {
    pub fn new(steps: Vec<Box<dyn TransformStep>>) -> Self {
        Self { steps }
    }

    /// Run every step in order, stopping at the first error.
    pub fn apply(&self, mut req: TransformRequest) -> Result<TransformRequest, PipelineError> {
        for step in &self.steps {
            req = step.apply(req)?;
            tracing::trace!(step = step.name(), "Transform step applied");
        }
        Ok(req)
    }
}
