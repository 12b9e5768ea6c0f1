use crate::types::{DecodedImage, ImageEncoding, UploadedImage};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageError, ImageReader, Limits};
use std::io::Cursor;
use thiserror::Error;

/// Largest accepted width or height. A few KB of PNG can declare far more
/// pixels than the upload limit suggests.
pub const MAX_DIMENSION: u32 = 8192;
const MAX_ALLOC_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Missing image data")]
    Empty,

    #[error("Invalid base64 image data")]
    InvalidBase64(#[source] base64::DecodeError),

    #[error("Unsupported or corrupt image")]
    UnsupportedOrCorruptImage(#[source] image::ImageError),
}

pub fn decode(upload: UploadedImage) -> Result<DecodedImage, DecodeError> {
    if upload.data.is_empty() {
        return Err(DecodeError::Empty);
    }
    let raw = match upload.encoding {
        ImageEncoding::Base64 => decode_base64(&upload.data)?,
        ImageEncoding::MultipartFile => upload.data,
    };
    if raw.is_empty() {
        return Err(DecodeError::Empty);
    }
    let image = load_bounded(raw).map_err(DecodeError::UnsupportedOrCorruptImage)?;
    Ok(DecodedImage::new(image.to_rgb8()))
}

fn load_bounded(raw: Vec<u8>) -> Result<DynamicImage, ImageError> {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DIMENSION);
    limits.max_image_height = Some(MAX_DIMENSION);
    limits.max_alloc = Some(MAX_ALLOC_BYTES);

    let mut reader = ImageReader::new(Cursor::new(raw))
        .with_guessed_format()
        .map_err(ImageError::IoError)?;
    reader.limits(limits);
    reader.decode()
}

fn decode_base64(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut payload = data.trim_ascii();
    // Browsers hand out data URLs, e.g. "data:image/jpeg;base64,/9j/4AAQ..."
    if payload.starts_with(b"data:") {
        if let Some(comma) = payload.iter().position(|&b| b == b',') {
            payload = &payload[comma + 1..];
        }
    }
    STANDARD.decode(payload).map_err(DecodeError::InvalidBase64)
}
