//! Routing envelope for inbound socket frames.
//!
//! Every frame on the wire is UTF-8 JSON with at least a `"type"` field.
//! The connection layer parses each frame into an [`Envelope`] — the routing
//! tag plus the full payload object — before handing it to the dispatch
//! registry. Business fields beyond `type` are opaque at this layer.

use serde_json::Value;

/// Errors produced while parsing an inbound frame into an [`Envelope`].
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The frame was not valid JSON.
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The frame parsed, but the top level is not a JSON object.
    #[error("frame is not a JSON object")]
    NotAnObject,

    /// The frame has no `type` field, or it is not a string.
    #[error("frame has no string `type` field")]
    MissingType,
}

/// A parsed inbound frame: routing tag plus opaque payload.
///
/// Produced by the connection manager on frame receipt and consumed exactly
/// once by the dispatch registry. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// The routing tag (the frame's `type` field).
    tag: String,
    /// The full frame body, including the `type` field.
    payload: Value,
}

impl Envelope {
    /// Parse a raw text frame into an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError`] if the frame is not a JSON object with a
    /// string `type` field. Callers are expected to log and drop such
    /// frames rather than propagate the error.
    pub fn parse(frame: &str) -> Result<Self, EnvelopeError> {
        let payload: Value = serde_json::from_str(frame)?;
        let Some(object) = payload.as_object() else {
            return Err(EnvelopeError::NotAnObject);
        };
        let tag = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(EnvelopeError::MissingType)?
            .to_string();
        Ok(Self { tag, payload })
    }

    /// Build an envelope directly from a tag and payload object.
    ///
    /// Used by tests and by components that synthesize envelopes locally.
    #[must_use]
    pub const fn new(tag: String, payload: Value) -> Self {
        Self { tag, payload }
    }

    /// The routing tag (`type` field) of this frame.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The full frame body.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag)
    }
}
