use crate::error::UploadError;
use crate::pipeline::Pipeline;
use crate::types::{UploadedImage, VerificationResponse};
use bytes::{Buf, Bytes};
use futures::{pin_mut, TryStreamExt};
use log::{debug, error, info, warn};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use warp::filters::multipart::FormData;
use warp::http::header::{HeaderValue, CONTENT_TYPE};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Shared by every request; read-only apart from the readiness flag.
pub struct AppState {
    pipeline: Pipeline,
    ocr_ready: AtomicBool,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> AppState {
        AppState {
            pipeline,
            ocr_ready: AtomicBool::new(false),
        }
    }

    pub fn mark_ready(&self) {
        self.ocr_ready.store(true, Ordering::Release);
    }

    fn is_ready(&self) -> bool {
        self.ocr_ready.load(Ordering::Acquire)
    }
}

#[derive(Debug, Deserialize)]
struct UploadRequest {
    image: Option<String>,
}

pub fn routes(
    state: Arc<AppState>,
    max_upload_bytes: u64,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path!("health")
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: Arc<AppState>| health_reply(&state));

    let upload = warp::path!("upload")
        .and(warp::post())
        .and(warp::body::content_length_limit(max_upload_bytes))
        .and(uploaded_image(max_upload_bytes))
        .and(with_state(state))
        .then(handle_upload);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST"])
        .allow_headers(vec!["content-type"]);

    health
        .or(upload)
        .with(cors)
        .recover(handle_rejection)
        .with(warp::log("plate_relay"))
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Extracts the image from a JSON body, a multipart form, or neither.
fn uploaded_image(
    max_upload_bytes: u64,
) -> impl Filter<Extract = (Result<UploadedImage, UploadError>,), Error = Infallible> + Clone {
    let json_body = json_content_type()
        .and(warp::body::bytes())
        .map(|body: Bytes| parse_json_upload(&body));
    let multipart_body = warp::multipart::form()
        .max_length(max_upload_bytes)
        .then(read_multipart_upload);
    let missing = warp::any().map(|| -> Result<UploadedImage, UploadError> {
        Err(UploadError::MissingImage)
    });
    json_body.or(multipart_body).unify().or(missing).unify()
}

fn json_content_type() -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::<String>("content-type")
        .and_then(|value: String| async move {
            if value.to_ascii_lowercase().starts_with("application/json") {
                Ok(())
            } else {
                Err(warp::reject())
            }
        })
        .untuple_one()
}

fn parse_json_upload(body: &[u8]) -> Result<UploadedImage, UploadError> {
    let request: UploadRequest =
        serde_json::from_slice(body).map_err(|e| UploadError::MalformedBody(e.to_string()))?;
    match request.image {
        Some(image) if !image.is_empty() => Ok(UploadedImage::base64(image)),
        _ => Err(UploadError::MissingImage),
    }
}

async fn read_multipart_upload(form: FormData) -> Result<UploadedImage, UploadError> {
    pin_mut!(form);
    while let Some(part) = form.try_next().await.map_err(malformed)? {
        debug!("Got part {}", part.name());
        if part.name() != "image" {
            warn!("Ignoring part {}", part.name());
            continue;
        }
        let mut data: Vec<u8> = vec![];
        let stream = part.stream();
        pin_mut!(stream);
        while let Some(buf) = stream.try_next().await.map_err(malformed)? {
            data.extend_from_slice(buf.chunk());
        }
        return Ok(UploadedImage::multipart(data));
    }
    Err(UploadError::MissingImage)
}

fn malformed(e: warp::Error) -> UploadError {
    UploadError::MalformedBody(e.to_string())
}

async fn handle_upload(upload: Result<UploadedImage, UploadError>, state: Arc<AppState>) -> Response {
    let result = match upload {
        Ok(upload) => {
            info!(
                "Received {:?} upload of {} bytes",
                upload.encoding,
                upload.data.len()
            );
            state.pipeline.process(upload).await
        }
        Err(e) => {
            warn!("Rejected upload: {}", e);
            Err(e)
        }
    };
    match result {
        Ok(verification) => relayed(verification),
        Err(e) => error_reply(e.status(), &e.public_message()),
    }
}

fn relayed(verification: VerificationResponse) -> Response {
    let mut response = Response::new(verification.body.into());
    *response.status_mut() = verification.status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn error_reply(status: StatusCode, message: &str) -> Response {
    warp::reply::with_status(warp::reply::json(&json!({ "error": message })), status)
        .into_response()
}

fn health_reply(state: &AppState) -> Response {
    if state.is_ready() {
        warp::reply::json(&json!({
            "status": "healthy",
            "services": { "ocr": "ready" },
        }))
        .into_response()
    } else {
        warp::reply::with_status(
            warp::reply::json(&json!({
                "status": "starting",
                "services": { "ocr": "initializing" },
            })),
            StatusCode::SERVICE_UNAVAILABLE,
        )
        .into_response()
    }
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Image too large")
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Content-Length required")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        error!("Unhandled rejection: {:?}", err);
        (StatusCode::BAD_REQUEST, "Bad request")
    };
    Ok(error_reply(status, message))
}
