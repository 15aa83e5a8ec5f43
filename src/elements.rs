//! Output records shared by the command line and the HTTP server.

use schemars::JsonSchema;

use crate::prelude::*;

/// What kind of element we found. PaddleOCR only gives us text, but the field
/// is part of our output format so that other kinds can be added later.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// A line of recognized text.
    #[default]
    Text,
}

/// A single piece of text found in an image.
#[derive(Clone, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DetectedTextElement {
    /// Always `"text"` for now.
    #[serde(rename = "type")]
    pub kind: ElementKind,

    /// The recognized text.
    pub text: String,

    /// Horizontal center of the text's bounding polygon, in pixels.
    pub x: i64,

    /// Vertical center of the text's bounding polygon, in pixels.
    pub y: i64,

    /// Width of the bounding box, in pixels.
    pub width: i64,

    /// Height of the bounding box, in pixels.
    pub height: i64,

    /// Recognition confidence as a percentage.
    pub confidence: i64,
}

/// The result of running OCR on one image.
///
/// This is what the command line prints. Failures are reported here instead of
/// through the exit status, so callers can always parse our output.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
pub struct OcrResult {
    /// Did OCR succeed?
    pub success: bool,

    /// A human-readable error message, if OCR failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Detailed diagnostic information about the failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,

    /// The text we found, in the order the engine reported it. Always empty on
    /// failure.
    pub elements: Vec<DetectedTextElement>,
}

impl OcrResult {
    /// A successful result.
    pub fn success(elements: Vec<DetectedTextElement>) -> Self {
        Self {
            success: true,
            error: None,
            traceback: None,
            elements,
        }
    }

    /// A failed detection. The message is the outermost error, and the
    /// traceback holds the full cause chain.
    pub fn failure(err: &anyhow::Error) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            traceback: Some(format!("{:?}", err)),
            elements: vec![],
        }
    }

    /// We were called incorrectly.
    pub fn usage(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            traceback: None,
            elements: vec![],
        }
    }

    /// Convert the outcome of a detection into a result record.
    pub fn from_detection(outcome: Result<Vec<DetectedTextElement>>) -> Self {
        match outcome {
            Ok(elements) => Self::success(elements),
            Err(err) => Self::failure(&err),
        }
    }
}
