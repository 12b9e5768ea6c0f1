use bytes::Bytes;
use image::{GrayImage, RgbImage};
use reqwest::StatusCode;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    Base64,
    MultipartFile,
}

#[derive(Debug)]
pub struct UploadedImage {
    pub data: Vec<u8>,
    pub encoding: ImageEncoding,
}

impl UploadedImage {
    pub fn base64(data: impl Into<Vec<u8>>) -> UploadedImage {
        UploadedImage {
            data: data.into(),
            encoding: ImageEncoding::Base64,
        }
    }

    pub fn multipart(data: Vec<u8>) -> UploadedImage {
        UploadedImage {
            data,
            encoding: ImageEncoding::MultipartFile,
        }
    }
}

/// An 8-bit RGB pixel grid. Consumed by recognition.
#[derive(Debug)]
pub struct DecodedImage {
    pixels: RgbImage,
}

impl DecodedImage {
    pub fn new(pixels: RgbImage) -> DecodedImage {
        DecodedImage { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn into_grayscale(self) -> GrayImage {
        image::imageops::grayscale(&self.pixels)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedSpan {
    pub text: String,
    /// `None` when the engine does not score its output.
    pub confidence: Option<f32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest<'a> {
    pub license_plate: &'a str,
}

/// Downstream answer, kept as the exact bytes received.
#[derive(Debug, Clone)]
pub struct VerificationResponse {
    pub status: StatusCode,
    pub body: Bytes,
}
