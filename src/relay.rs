use crate::plate::PlateCandidate;
use crate::types::{VerificationRequest, VerificationResponse};
use log::{info, warn};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Backend timeout")]
    Timeout(#[source] reqwest::Error),

    #[error("Backend unavailable")]
    Unavailable(#[source] reqwest::Error),

    #[error("Invalid backend response")]
    BadUpstreamResponse(#[source] serde_json::Error),
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RelayError::Timeout(e)
        } else {
            RelayError::Unavailable(e)
        }
    }
}

/// Forwards plate candidates to the verification service. One attempt per
/// call; the underlying client is pooled and shared.
#[derive(Clone)]
pub struct VerificationRelay {
    client: reqwest::Client,
    verify_url: Url,
}

impl VerificationRelay {
    pub fn new(verify_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(VerificationRelay { client, verify_url })
    }

    pub async fn verify(&self, plate: &PlateCandidate) -> Result<VerificationResponse, RelayError> {
        info!("Sending plate {} to {}", plate, self.verify_url);
        let response = self
            .client
            .post(self.verify_url.clone())
            .json(&VerificationRequest {
                license_plate: plate.as_str(),
            })
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;

        // The body goes back to the caller untouched; parse only to make sure
        // it is JSON.
        if let Err(e) = serde_json::from_slice::<Value>(&body) {
            warn!(
                "Verification service returned {} with a non-JSON body: {}",
                status, e
            );
            return Err(RelayError::BadUpstreamResponse(e));
        }
        if status.is_success() {
            info!("Verification service accepted plate {}", plate);
        } else {
            warn!("Verification service returned {} for plate {}", status, plate);
        }
        Ok(VerificationResponse { status, body })
    }
}
