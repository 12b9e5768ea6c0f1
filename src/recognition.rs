use crate::types::{DecodedImage, RecognizedSpan};
use anyhow::Context;
use image::GrayImage;
use log::{debug, info};
use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("Failed to initialize OCR engine: {0:#}")]
    Init(anyhow::Error),

    #[error("OCR engine failed: {0:#}")]
    Engine(anyhow::Error),

    #[error("Recognition task aborted: {0}")]
    Aborted(String),
}

/// A text recognition engine. Implementations are shared by all in-flight
/// requests and must be callable from several threads at once.
pub trait Recognizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns one span per detected line, in reading order.
    fn recognize(&self, image: &GrayImage) -> Result<Vec<RecognizedSpan>, RecognitionError>;
}

pub struct OcrsRecognizer {
    engine: OcrEngine,
}

impl OcrsRecognizer {
    pub fn load(detection_model: &Path, recognition_model: &Path) -> Result<Self, RecognitionError> {
        info!(
            "Loading OCR models from {:?} and {:?}",
            detection_model, recognition_model
        );
        let detection = load_model(detection_model).map_err(RecognitionError::Init)?;
        let recognition = load_model(recognition_model).map_err(RecognitionError::Init)?;
        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection),
            recognition_model: Some(recognition),
            ..Default::default()
        })
        .context("Failed to build OCR engine")
        .map_err(RecognitionError::Init)?;
        Ok(OcrsRecognizer { engine })
    }

    fn run(&self, image: &GrayImage) -> anyhow::Result<Vec<RecognizedSpan>> {
        let source = image_source(image)?;
        let input = self
            .engine
            .prepare_input(source)
            .context("Failed to prepare OCR input")?;
        let words = self
            .engine
            .detect_words(&input)
            .context("Failed to detect words")?;
        let lines = self.engine.find_text_lines(&input, &words);
        let texts = self
            .engine
            .recognize_text(&input, &lines)
            .context("Failed to recognize text")?;
        Ok(texts
            .into_iter()
            .flatten()
            .map(|line| RecognizedSpan {
                text: line.to_string(),
                confidence: None,
            })
            .collect())
    }
}

/// Single-channel view of `image` in the layout `ocrs` expects.
fn image_source(image: &GrayImage) -> anyhow::Result<ImageSource<'_>> {
    ImageSource::from_bytes(image.as_raw(), image.dimensions())
        .context("Failed to create image source")
}

fn load_model(path: &Path) -> anyhow::Result<Model> {
    let data = fs::read(path).with_context(|| format!("Unable to read model {:?}", path))?;
    Model::load(data).with_context(|| format!("Unable to load model {:?}", path))
}

impl Recognizer for OcrsRecognizer {
    fn name(&self) -> &'static str {
        "ocrs"
    }

    fn recognize(&self, image: &GrayImage) -> Result<Vec<RecognizedSpan>, RecognitionError> {
        self.run(image).map_err(RecognitionError::Engine)
    }
}

/// Runs a shared recognizer off the async executor, with at most
/// `max_concurrency` recognitions in flight.
#[derive(Clone)]
pub struct RecognitionAdapter {
    engine: Arc<dyn Recognizer>,
    permits: Arc<Semaphore>,
}

impl RecognitionAdapter {
    pub fn new(engine: Arc<dyn Recognizer>, max_concurrency: usize) -> RecognitionAdapter {
        info!(
            "Recognizer '{}' ready, {} concurrent recognitions",
            engine.name(),
            max_concurrency
        );
        RecognitionAdapter {
            engine,
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    pub async fn recognize(&self, image: DecodedImage) -> Result<Vec<RecognizedSpan>, RecognitionError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| RecognitionError::Aborted(e.to_string()))?;
        let engine = self.engine.clone();
        // The permit moves into the blocking task so it is only released once
        // the engine is done, even if this future is dropped.
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let gray = image.into_grayscale();
            let result = engine.recognize(&gray);
            if let Ok(spans) = &result {
                debug!("Recognized {} span(s)", spans.len());
            }
            result
        })
        .await
        .map_err(|e| RecognitionError::Aborted(e.to_string()))?
    }
}
