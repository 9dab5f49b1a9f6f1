//! Claim extraction step.
//!
//! # Responsibilities
//! - Parse the `Authorization: Bearer <token>` header (parse-or-fail, no regex)
//! - Decode the token's payload segment into a claim set
//! - Replace the raw credential with the identity header on the outbound set
//!
//! # Design Decisions
//! - The payload is decoded, not verified; the trust boundary in front of the
//!   gateway is responsible for signature verification
//! - `Authorization` and `Host` never cross to the origin; only the derived
//!   identity header does

use axum::http::header::{AUTHORIZATION, HOST};
use axum::http::{HeaderName, HeaderValue};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};

use crate::pipeline::{CredentialError, PipelineError, TransformRequest, TransformStep};

/// Extracts an identity claim from the bearer credential and forwards it as
/// a header.
pub struct ClaimExtraction {
    claim: String,
    header: HeaderName,
}

impl ClaimExtraction {
    pub fn new(claim: impl Into<String>, header: HeaderName) -> Self {
        Self {
            claim: claim.into(),
            header,
        }
    }

    /// Decode the payload segment of a compact JWT into its claim set.
    ///
    /// The signature segment is not inspected.
    fn decode_payload(token: &str) -> Result<Map<String, Value>, CredentialError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(CredentialError::TokenStructure);
        }

        let payload = URL_SAFE_NO_PAD.decode(parts[1])?;
        let value: Value = serde_json::from_slice(&payload)?;

        match value {
            Value::Object(map) => Ok(map),
            _ => Err(CredentialError::PayloadNotObject),
        }
    }
}

impl TransformStep for ClaimExtraction {
    fn name(&self) -> &'static str {
        "claim_extraction"
    }

    fn apply(&self, mut req: TransformRequest) -> Result<TransformRequest, PipelineError> {
        let credential = req
            .headers
            .get(AUTHORIZATION)
            .ok_or(CredentialError::MissingHeader)?;

        let token = credential
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(CredentialError::NotBearer)?;

        let claims = Self::decode_payload(token)?;

        let value = claims
            .get(&self.claim)
            .and_then(Value::as_str)
            .ok_or_else(|| CredentialError::MissingClaim(self.claim.clone()))?;

        let value = HeaderValue::from_str(value)
            .map_err(|_| CredentialError::ClaimNotHeaderSafe(self.claim.clone()))?;

        // The raw credential must not cross into the trusted zone, and the
        // origin sets its own Host.
        req.headers.remove(AUTHORIZATION);
        req.headers.remove(HOST);
        req.headers.insert(self.header.clone(), value);

        Ok(req)
    }
}
