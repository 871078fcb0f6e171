//! Image payload codec.
//!
//! Decodes incoming image payloads into rasters and encodes rasters back to
//! a compressed byte payload for transport. Payloads arrive either as raw
//! image bytes or as base64 text, optionally carrying a `data:image/...`
//! URI header.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::error::ServiceError;

/// JPEG quality for the streaming path.
const JPEG_QUALITY: u8 = 90;

/// Incoming image payload.
///
/// Text payloads are base64 (optionally data-URI prefixed); byte payloads
/// are already-encoded image bytes.
pub enum ImagePayload<'a> {
    Text(&'a str),
    Bytes(&'a [u8]),
}

/// Decode a payload into an RGB raster.
///
/// Any failure — malformed base64 or bytes that do not parse as an image —
/// yields [`ServiceError::Decode`]; the cause goes to the log only, since
/// the wire string is fixed.
pub fn decode_payload(payload: &ImagePayload<'_>) -> Result<RgbImage, ServiceError> {
    let bytes = match payload {
        ImagePayload::Text(text) => {
            let body = strip_data_uri(text);
            match BASE64.decode(body.trim()) {
                Ok(bytes) => bytes,
                Err(err) => {
                    log::debug!("base64 decode failed: {err}");
                    return Err(ServiceError::Decode);
                }
            }
        }
        ImagePayload::Bytes(bytes) => bytes.to_vec(),
    };

    match image::load_from_memory(&bytes) {
        Ok(image) => Ok(image.to_rgb8()),
        Err(err) => {
            log::debug!("image decode failed: {err}");
            Err(ServiceError::Decode)
        }
    }
}

/// Encode a raster as JPEG bytes.
///
/// Encoding is lossy in pixel content but exact in dimensions: the encoded
/// image always carries the raster's width and height.
pub fn encode_jpeg(frame: &RgbImage) -> Result<Vec<u8>, ServiceError> {
    let mut buf = Vec::new();
    frame
        .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY))
        .map_err(|err| ServiceError::Internal(format!("could not encode frame: {err}")))?;
    Ok(buf)
}

/// Base64-encode bytes for embedding in a JSON response.
pub fn to_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Strip a `data:image/...;base64,` header: everything up to and including
/// the first comma.
fn strip_data_uri(text: &str) -> &str {
    if text.starts_with("data:image") {
        match text.split_once(',') {
            Some((_, body)) => body,
            None => text,
        }
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> RgbImage {
        RgbImage::from_fn(8, 6, |x, y| image::Rgb([x as u8 * 30, y as u8 * 40, 128]))
    }

    #[test]
    fn jpeg_round_trip_preserves_dimensions() {
        let frame = sample_frame();
        let bytes = encode_jpeg(&frame).unwrap();
        let decoded = decode_payload(&ImagePayload::Bytes(&bytes)).unwrap();
        assert_eq!(decoded.dimensions(), (8, 6));
    }

    #[test]
    fn decodes_base64_text_payload() {
        let bytes = encode_jpeg(&sample_frame()).unwrap();
        let text = to_base64(&bytes);
        let decoded = decode_payload(&ImagePayload::Text(&text)).unwrap();
        assert_eq!(decoded.dimensions(), (8, 6));
    }

    #[test]
    fn strips_data_uri_header() {
        let bytes = encode_jpeg(&sample_frame()).unwrap();
        let text = format!("data:image/jpeg;base64,{}", to_base64(&bytes));
        let decoded = decode_payload(&ImagePayload::Text(&text)).unwrap();
        assert_eq!(decoded.dimensions(), (8, 6));
    }

    #[test]
    fn malformed_base64_is_a_decode_error() {
        let err = decode_payload(&ImagePayload::Text("!!!not-base64!!!")).unwrap_err();
        assert_eq!(err.to_string(), "Could not decode image");
    }

    #[test]
    fn valid_base64_of_garbage_is_a_decode_error() {
        let text = to_base64(b"not an image at all");
        let err = decode_payload(&ImagePayload::Text(&text)).unwrap_err();
        assert_eq!(err.to_string(), "Could not decode image");
    }
}
