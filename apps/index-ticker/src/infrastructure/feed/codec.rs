//! Feed Codec
//!
//! Decodes feed text frames into partial records.
//!
//! A frame is either a single JSON object or a JSON array of objects:
//!
//! ```json
//! {"symbol":"NIFTY50","lastPrice":22050.5}
//! [{"symbol":"NIFTY50","lastPrice":22050.5},{"symbol":"SENSEX","volume":1200}]
//! ```
//!
//! Unknown keys are ignored and `null` field values count as absent. A `null`
//! therefore never clears a stored value; there is no clearing update.
//! Arrays are all-or-nothing: one bad element rejects the whole frame.

use serde_json::Value;

use crate::domain::snapshot::PartialRecord;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON parsing or field type mismatch.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Record has no usable `symbol` key.
    #[error("record is missing a symbol")]
    MissingSymbol,

    /// Frame is neither a JSON object nor an array of objects.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

impl CodecError {
    /// Short label for metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::MissingSymbol => "missing_symbol",
            Self::InvalidFormat(_) => "format",
        }
    }
}

/// JSON codec for feed frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a text frame into partial records.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not valid JSON, is not an object or
    /// array of objects, has a mistyped field, or lacks a symbol.
    pub fn decode(&self, text: &str) -> Result<Vec<PartialRecord>, CodecError> {
        let trimmed = text.trim();

        if trimmed.starts_with('[') {
            let values: Vec<Value> = serde_json::from_str(trimmed)?;
            values.into_iter().map(|v| self.decode_value(v)).collect()
        } else if trimmed.starts_with('{') {
            let value: Value = serde_json::from_str(trimmed)?;
            Ok(vec![self.decode_value(value)?])
        } else {
            Err(CodecError::InvalidFormat(format!(
                "expected JSON object or array, got: {}",
                preview(trimmed)
            )))
        }
    }

    /// Decode one JSON value into a record.
    fn decode_value(&self, value: Value) -> Result<PartialRecord, CodecError> {
        if !value.is_object() {
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {}",
                preview(&value.to_string())
            )));
        }

        let has_symbol = value
            .get("symbol")
            .and_then(Value::as_str)
            .is_some_and(|s| !s.trim().is_empty());
        if !has_symbol {
            return Err(CodecError::MissingSymbol);
        }

        Ok(serde_json::from_value(value)?)
    }
}

fn preview(text: &str) -> &str {
    let end = text
        .char_indices()
        .nth(50)
        .map_or(text.len(), |(idx, _)| idx);
    &text[..end]
}
