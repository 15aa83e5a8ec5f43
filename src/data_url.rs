//! Decoding Base64 image payloads, either bare or as `data:` URLs.

use std::sync::LazyLock;

use base64::{Engine as _, prelude::BASE64_STANDARD};
use regex::Regex;

use crate::prelude::*;

/// Regex for parsing a `data:` URL.
static DATA_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:(?P<mime_type>[^;,]+);base64,(?P<data>.*)$")
        .expect("failed to compile regex")
});

/// Parse a `data:` URL into a MIME type and Base64-encoded data.
pub fn parse_data_url(data_url: &str) -> Option<(&str, &str)> {
    let caps = DATA_URL_RE.captures(data_url)?;
    let mime_type = caps.name("mime_type")?.as_str();
    let data = caps.name("data")?.as_str();
    Some((mime_type, data))
}

/// Decode an image sent as Base64 or as a `data:` URL. Whitespace (such as
/// MIME line breaks) is ignored.
pub fn decode_image_payload(payload: &str) -> Result<Vec<u8>> {
    let payload = payload.trim();
    let encoded = match parse_data_url(payload) {
        Some((mime_type, data)) => {
            debug!(mime_type, "Image sent as data URL");
            data
        }
        None => payload,
    };
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let data = BASE64_STANDARD
        .decode(compact.as_bytes())
        .context("image is not valid Base64")?;
    if data.is_empty() {
        bail!("image is empty");
    }
    Ok(data)
}
