//! Screenshot decoding
//!
//! Screenshots arrive as base64 payloads, optionally wrapped in a
//! `data:image/png;base64,` URI by browser capture APIs. Decoding is
//! validated up front so a malformed payload is rejected before any
//! run state changes or model inference happens.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::DynamicImage;
use reelcheck_common::{Error, Result};

/// Decode a base64 (or data-URI) screenshot into an image.
pub fn decode_screenshot(data: &str) -> Result<DynamicImage> {
    let payload = match data.split_once(',') {
        Some((head, rest)) if head.contains("base64") => rest,
        _ => data,
    };

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::InvalidImageData(format!("base64 decode failed: {}", e)))?;

    image::load_from_memory(&bytes)
        .map_err(|e| Error::InvalidImageData(format!("image decode failed: {}", e)))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_base64() {
        let data = test_support::sample_screenshot();
        let img = decode_screenshot(&data).unwrap();
        assert_eq!(img.width(), 32);
        assert_eq!(img.height(), 32);
    }

    #[test]
    fn decodes_data_uri() {
        let data = format!("data:image/png;base64,{}", test_support::sample_screenshot());
        assert!(decode_screenshot(&data).is_ok());
    }

    #[test]
    fn rejects_malformed_base64() {
        let err = decode_screenshot("not base64 at all!!!").unwrap_err();
        assert!(matches!(err, Error::InvalidImageData(_)));
    }

    #[test]
    fn rejects_non_image_payload() {
        let data = STANDARD.encode(b"plain text, not an image");
        let err = decode_screenshot(&data).unwrap_err();
        assert!(matches!(err, Error::InvalidImageData(_)));
    }
}
