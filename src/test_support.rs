use crate::recognition::{RecognitionError, Recognizer};
use crate::types::RecognizedSpan;
use image::{DynamicImage, GrayImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// White plate with a dark band, enough to exercise decode and grayscale.
pub fn plate_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |_, y| {
        if y > height / 3 && y < 2 * height / 3 {
            Rgb([20, 20, 20])
        } else {
            Rgb([240, 240, 240])
        }
    })
}

pub fn encode_image(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut out, format)
        .unwrap();
    out.into_inner()
}

pub fn png_bytes() -> Vec<u8> {
    encode_image(&plate_image(32, 16), ImageFormat::Png)
}

/// Returns the same spans for every image.
pub struct ScriptedRecognizer {
    pub spans: Vec<RecognizedSpan>,
}

impl ScriptedRecognizer {
    pub fn new(texts: &[&str]) -> ScriptedRecognizer {
        ScriptedRecognizer {
            spans: texts
                .iter()
                .map(|text| RecognizedSpan {
                    text: text.to_string(),
                    confidence: Some(0.9),
                })
                .collect(),
        }
    }
}

impl Recognizer for ScriptedRecognizer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn recognize(&self, _image: &GrayImage) -> Result<Vec<RecognizedSpan>, RecognitionError> {
        Ok(self.spans.clone())
    }
}
