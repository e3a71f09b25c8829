use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

/// JPEG bytes of the image under test, shared read-only by every job.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    bytes: Arc<[u8]>,
}

impl ImagePayload {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Wire body sent to the predict endpoint.
#[derive(Debug, Serialize, Deserialize)]
struct PredictRequest {
    image_bytes: String,
}

/// Serialized `{"image_bytes": "<hex>"}` body, built once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    body: String,
}

impl EncodedPayload {
    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Wrap image bytes as the JSON request body with lowercase hex encoding.
pub fn encode_payload(bytes: &[u8]) -> EncodedPayload {
    let request = PredictRequest {
        image_bytes: hex::encode(bytes),
    };
    // A struct with one String field always serializes.
    let body = serde_json::to_string(&request).unwrap_or_default();
    EncodedPayload { body }
}

/// Receiving-side inverse of [`encode_payload`].
pub fn decode_payload(body: &str) -> Result<Vec<u8>, PayloadError> {
    let request: PredictRequest = serde_json::from_str(body)?;
    Ok(hex::decode(request.image_bytes)?)
}

/// Read the input image. With `transcode`, decode it and re-encode as RGB JPEG.
pub fn load_image(path: &Path, transcode: bool) -> Result<ImagePayload, PayloadError> {
    let raw = std::fs::read(path).map_err(|source| PayloadError::Read {
        path: path.display().to_string(),
        source,
    })?;

    if !transcode {
        return Ok(ImagePayload::new(raw));
    }

    let jpeg = to_jpeg(&raw)?;
    tracing::debug!(
        path = %path.display(),
        source_bytes = raw.len(),
        jpeg_bytes = jpeg.len(),
        "Re-encoded input image as JPEG"
    );
    Ok(ImagePayload::new(jpeg))
}

/// Decode any supported image format and re-encode it as an RGB JPEG.
pub fn to_jpeg(raw: &[u8]) -> Result<Vec<u8>, PayloadError> {
    let image = image::load_from_memory(raw)?;
    let rgb = image::DynamicImage::ImageRgb8(image.to_rgb8());

    let mut buffer = Cursor::new(Vec::new());
    rgb.write_to(&mut buffer, ImageFormat::Jpeg)?;
    Ok(buffer.into_inner())
}

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("Failed to read image {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode or encode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Malformed payload JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed hex in payload: {0}")]
    Hex(#[from] hex::FromHexError),
}
