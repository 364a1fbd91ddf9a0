//! JSON codec for request and response documents
//!
//! Inbound requests arrive as a single JSON document:
//! ```text
//! { "directive": { "header": {...}, "endpoint": {...}, "payload": {...} } }
//! ```
//!
//! Device commands leave as a shadow update document:
//! ```text
//! { "state": { "desired": { "power": 0 | 1 } } }
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::ResponseEnvelope;

/// Maximum document size (1 MiB) to prevent memory exhaustion
pub const MAX_DOCUMENT_SIZE: usize = 1024 * 1024;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Document too large: {0} bytes (max: {MAX_DOCUMENT_SIZE})")]
    DocumentTooLarge(usize),

    #[error("Empty document")]
    Empty,

    #[error("Request is not a JSON object")]
    NotAnObject,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode a raw request document
///
/// Only the framing is checked here; directive shape is validated by the
/// dispatcher so that a malformed directive still gets an error envelope.
pub fn decode_request(buf: &[u8]) -> Result<Value, CodecError> {
    if buf.len() > MAX_DOCUMENT_SIZE {
        return Err(CodecError::DocumentTooLarge(buf.len()));
    }
    if buf.iter().all(u8::is_ascii_whitespace) {
        return Err(CodecError::Empty);
    }

    let value: Value = serde_json::from_slice(buf)?;
    if !value.is_object() {
        return Err(CodecError::NotAnObject);
    }
    Ok(value)
}

/// Encode a response envelope as compact JSON
pub fn encode_envelope(envelope: &ResponseEnvelope) -> Result<Bytes, CodecError> {
    let buf = serde_json::to_vec(envelope)?;
    if buf.len() > MAX_DOCUMENT_SIZE {
        return Err(CodecError::DocumentTooLarge(buf.len()));
    }
    Ok(Bytes::from(buf))
}

/// Desired power state, `0` = off and `1` = on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredState {
    pub power: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowState {
    pub desired: DesiredState,
}

/// Device shadow update published on the command channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowUpdate {
    pub state: ShadowState,
}

impl ShadowUpdate {
    pub fn power(on: bool) -> Self {
        Self {
            state: ShadowState {
                desired: DesiredState { power: u8::from(on) },
            },
        }
    }

    pub fn desired_power(&self) -> u8 {
        self.state.desired.power
    }
}

/// Encode a shadow update for publishing
pub fn encode_shadow_update(update: &ShadowUpdate) -> Result<Bytes, CodecError> {
    Ok(Bytes::from(serde_json::to_vec(update)?))
}
