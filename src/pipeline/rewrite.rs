//! Body rewrite step.
//!
//! # Responsibilities
//! - Reverse the request body before it is forwarded
//!
//! # Design Decisions
//! - Valid UTF-8 is reversed by character so multibyte text stays text;
//!   anything else is reversed byte-wise
//! - Both forms are involutions: reversing twice yields the original input
//! - An absent body is an empty reversal, which is a no-op

use axum::body::Bytes;

use crate::pipeline::{PipelineError, TransformRequest, TransformStep};

/// Reverse a body.
pub fn reverse_text(input: &[u8]) -> Vec<u8> {
    match std::str::from_utf8(input) {
        Ok(text) => text.chars().rev().collect::<String>().into_bytes(),
        Err(_) => {
            let mut bytes = input.to_vec();
            bytes.reverse();
            bytes
        }
    }
}

/// Transform step that replaces the body with its reversal.
pub struct BodyReverse;

impl TransformStep for BodyReverse {
    fn name(&self) -> &'static str {
        "body_reverse"
    }

    fn apply(&self, mut req: TransformRequest) -> Result<TransformRequest, PipelineError> {
        req.body = Bytes::from(reverse_text(&req.body));
        Ok(req)
    }
}
