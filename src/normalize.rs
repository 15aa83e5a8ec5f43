//! Converting raw PaddleOCR output into [`DetectedTextElement`] records.
//!
//! PaddleOCR changed its result format incompatibly between major versions:
//!
//! 1. 2.x returns, for each image, a list of `[polygon, [text, score]]` lines.
//! 2. 3.x returns, for each image, a result object with parallel `rec_texts`,
//!    `rec_scores` and `rec_polys` arrays.
//!
//! We decode both shapes once, when the worker's reply is parsed, and produce
//! the same output records either way.

use crate::{
    elements::{DetectedTextElement, ElementKind},
    prelude::*,
};

/// Score used when a structured result has fewer scores than texts.
pub const DEFAULT_SCORE: f64 = 0.9;

/// A polygon corner, as `[x, y]`.
pub type Point = [f64; 2];

/// A legacy result line: `[polygon, [text, score]]`.
type LegacyLine = (Vec<Point>, (String, f64));

/// Raw engine output for one detection call. There is one page per input
/// image, and we only ever send one image.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RawOcrOutput {
    /// Per-image results. PaddleOCR uses `null` for "nothing found".
    pub pages: Vec<Option<RawPage>>,
}

/// The result for a single image, in either of PaddleOCR's formats.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawPage {
    /// PaddleOCR 2.x: a list of lines. Lines are kept as raw JSON here and
    /// unpacked one at a time, so that one malformed line can't spoil the rest.
    Lines(Vec<Value>),

    /// PaddleOCR 3.x: a result object with parallel arrays.
    Structured(StructuredPage),
}

/// PaddleOCR 3.x result object. Any other fields are ignored.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct StructuredPage {
    /// Recognized texts, in engine order.
    #[serde(default, alias = "recognized_texts")]
    pub rec_texts: Vec<String>,

    /// Scores in `[0, 1]`, parallel to `rec_texts`. May be short.
    #[serde(default, alias = "recognized_scores")]
    pub rec_scores: Vec<f64>,

    /// Text polygons, parallel to `rec_texts`. May be short.
    #[serde(default, alias = "recognized_polygons")]
    pub rec_polys: Vec<Vec<Point>>,
}

/// Integer bounding box, described by its center and size.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BoundingBox {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl BoundingBox {
    /// Compute the axis-aligned box around `points`. Returns `None` for an
    /// empty polygon.
    pub fn from_polygon(points: &[Point]) -> Option<Self> {
        let [first_x, first_y] = *points.first()?;
        let (mut x_min, mut x_max, mut y_min, mut y_max) =
            (first_x, first_x, first_y, first_y);
        for &[x, y] in &points[1..] {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
        Some(Self {
            x: ((x_min + x_max) / 2.0).floor() as i64,
            y: ((y_min + y_max) / 2.0).floor() as i64,
            width: (x_max - x_min).floor() as i64,
            height: (y_max - y_min).floor() as i64,
        })
    }
}

/// Convert a `[0, 1]` score into a whole percentage.
fn confidence_percent(score: f64) -> i64 {
    (score * 100.0).floor() as i64
}

fn text_element(text: String, bounds: BoundingBox, score: f64) -> DetectedTextElement {
    DetectedTextElement {
        kind: ElementKind::Text,
        text,
        x: bounds.x,
        y: bounds.y,
        width: bounds.width,
        height: bounds.height,
        confidence: confidence_percent(score),
    }
}

/// Normalize raw engine output. Only the first page is used. A missing or
/// empty first page is not an error, it just means no text was found.
pub fn normalize(raw: &RawOcrOutput) -> Vec<DetectedTextElement> {
    match raw.pages.first() {
        Some(Some(page)) => normalize_page(page),
        _ => vec![],
    }
}

fn normalize_page(page: &RawPage) -> Vec<DetectedTextElement> {
    match page {
        RawPage::Structured(page) => normalize_structured(page),
        RawPage::Lines(lines) => normalize_lines(lines),
    }
}

fn normalize_structured(page: &StructuredPage) -> Vec<DetectedTextElement> {
    page.rec_texts
        .iter()
        .enumerate()
        .map(|(idx, text)| {
            let score = page.rec_scores.get(idx).copied().unwrap_or(DEFAULT_SCORE);
            // Missing polygons still produce an element, just with no geometry.
            let bounds = page
                .rec_polys
                .get(idx)
                .and_then(|polygon| BoundingBox::from_polygon(polygon))
                .unwrap_or_default();
            text_element(text.clone(), bounds, score)
        })
        .collect()
}

fn normalize_lines(lines: &[Value]) -> Vec<DetectedTextElement> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(idx, line)| {
            let (polygon, (text, score)) = match LegacyLine::deserialize(line) {
                Ok(line) => line,
                Err(err) => {
                    debug!(line = idx, "Skipping malformed OCR line: {}", err);
                    return None;
                }
            };
            let Some(bounds) = BoundingBox::from_polygon(&polygon) else {
                debug!(line = idx, "Skipping OCR line with an empty polygon");
                return None;
            };
            Some(text_element(text, bounds, score))
        })
        .collect()
}
