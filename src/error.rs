use crate::decode::DecodeError;
use crate::plate::NoCandidateError;
use crate::recognition::RecognitionError;
use crate::relay::RelayError;
use thiserror::Error;
use warp::http::StatusCode;

/// Every way an upload can fail, as seen by the HTTP boundary.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Missing image data")]
    MissingImage,

    #[error("Invalid request body: {0}")]
    MalformedBody(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    NoCandidate(#[from] NoCandidateError),

    #[error(transparent)]
    Recognition(#[from] RecognitionError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::MissingImage
            | UploadError::MalformedBody(_)
            | UploadError::Decode(_)
            | UploadError::NoCandidate(_) => StatusCode::BAD_REQUEST,
            UploadError::Relay(RelayError::Timeout(_))
            | UploadError::Relay(RelayError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            UploadError::Relay(RelayError::BadUpstreamResponse(_)) => StatusCode::BAD_GATEWAY,
            UploadError::Recognition(_) | UploadError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// What the caller gets to see. Internal detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            UploadError::MalformedBody(_) => "Invalid request body".to_string(),
            UploadError::Recognition(_) | UploadError::Internal(_) => {
                "Processing failed".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::MissingImage => "missing_image",
            UploadError::MalformedBody(_) => "malformed_body",
            UploadError::Decode(_) => "decode",
            UploadError::NoCandidate(_) => "no_candidate",
            UploadError::Recognition(_) => "recognition",
            UploadError::Relay(RelayError::Timeout(_)) => "relay_timeout",
            UploadError::Relay(RelayError::Unavailable(_)) => "relay_unavailable",
            UploadError::Relay(RelayError::BadUpstreamResponse(_)) => "relay_bad_response",
            UploadError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_bad_request() {
        for err in [
            UploadError::MissingImage,
            UploadError::MalformedBody("expected value".to_string()),
            UploadError::Decode(DecodeError::Empty),
            UploadError::NoCandidate(NoCandidateError),
        ] {
            assert_eq!(err.status(), StatusCode::BAD_REQUEST, "{:?}", err);
        }
    }

    #[test]
    fn test_internal_detail_is_not_exposed() {
        let err = UploadError::Internal("task panicked at src/pipeline.rs".to_string());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Processing failed");

        let err = UploadError::Recognition(RecognitionError::Engine(anyhow::anyhow!(
            "tensor shape mismatch"
        )));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Processing failed");
    }

    #[test]
    fn test_public_messages() {
        assert_eq!(
            UploadError::NoCandidate(NoCandidateError).public_message(),
            "No license plate detected"
        );
        assert_eq!(
            UploadError::MalformedBody("line 1 column 2".to_string()).public_message(),
            "Invalid request body"
        );
        assert_eq!(
            UploadError::Decode(DecodeError::Empty).public_message(),
            "Missing image data"
        );
    }
}
