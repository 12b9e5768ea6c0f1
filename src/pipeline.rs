use crate::decode;
use crate::error::UploadError;
use crate::plate::{self, NoCandidateError, PlateCandidate};
use crate::recognition::RecognitionAdapter;
use crate::relay::VerificationRelay;
use crate::types::{UploadedImage, VerificationResponse};
use log::{debug, error, info, warn};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Decoding,
    Recognizing,
    Normalizing,
    Selecting,
    Relaying,
    Responded,
    Failed(&'static str),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Received => f.write_str("received"),
            Stage::Decoding => f.write_str("decoding"),
            Stage::Recognizing => f.write_str("recognizing"),
            Stage::Normalizing => f.write_str("normalizing"),
            Stage::Selecting => f.write_str("selecting"),
            Stage::Relaying => f.write_str("relaying"),
            Stage::Responded => f.write_str("responded"),
            Stage::Failed(reason) => write!(f, "failed({})", reason),
        }
    }
}

/// Tracks one request through the stages and logs each transition.
struct Trace {
    id: Uuid,
    stage: Stage,
}

impl Trace {
    fn new() -> Trace {
        let trace = Trace {
            id: Uuid::new_v4(),
            stage: Stage::Received,
        };
        debug!("[{}] {}", trace.id, trace.stage);
        trace
    }

    fn enter(&mut self, next: Stage) {
        debug!("[{}] {} -> {}", self.id, self.stage, next);
        self.stage = next;
    }

    fn fail(&mut self, err: &UploadError) {
        let from = self.stage;
        self.stage = Stage::Failed(err.kind());
        if err.status().is_server_error() && !matches!(err, UploadError::Relay(_)) {
            error!("[{}] {} -> {}: {:?}", self.id, from, self.stage, err);
        } else {
            warn!("[{}] {} -> {}: {}", self.id, from, self.stage, err);
        }
    }
}

/// The upload request cycle: decode, recognize, normalize, select, relay.
#[derive(Clone)]
pub struct Pipeline {
    recognizer: RecognitionAdapter,
    relay: VerificationRelay,
}

impl Pipeline {
    pub fn new(recognizer: RecognitionAdapter, relay: VerificationRelay) -> Pipeline {
        Pipeline { recognizer, relay }
    }

    pub async fn process(&self, upload: UploadedImage) -> Result<VerificationResponse, UploadError> {
        let mut trace = Trace::new();
        match self.run(upload, &mut trace).await {
            Ok(response) => {
                trace.enter(Stage::Responded);
                Ok(response)
            }
            Err(e) => {
                trace.fail(&e);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        upload: UploadedImage,
        trace: &mut Trace,
    ) -> Result<VerificationResponse, UploadError> {
        trace.enter(Stage::Decoding);
        let image = tokio::task::spawn_blocking(move || decode::decode(upload))
            .await
            .map_err(|e| UploadError::Internal(format!("decode task failed: {}", e)))??;
        debug!(
            "[{}] decoded {}x{} image",
            trace.id,
            image.width(),
            image.height()
        );

        trace.enter(Stage::Recognizing);
        let spans = self.recognizer.recognize(image).await?;

        trace.enter(Stage::Normalizing);
        for span in &spans {
            debug!(
                "[{}] span {:?} confidence {:?}",
                trace.id, span.text, span.confidence
            );
        }
        let candidates: Vec<PlateCandidate> =
            spans.iter().map(|span| plate::normalize(&span.text)).collect();
        debug!("[{}] candidates {:?}", trace.id, candidates);

        trace.enter(Stage::Selecting);
        let plate = plate::select(candidates).map_err(|e: NoCandidateError| {
            info!("[{}] no plate among {} span(s)", trace.id, spans.len());
            e
        })?;

        trace.enter(Stage::Relaying);
        let response = self.relay.verify(&plate).await?;
        Ok(response)
    }
}
