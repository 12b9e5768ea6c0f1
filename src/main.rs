mod config;
mod decode;
mod error;
mod pipeline;
mod plate;
mod recognition;
mod relay;
mod server;
mod types;

#[cfg(test)]
mod test_support;

use config::Config;
use env_logger::Env;
use log::{error, info};
use pipeline::Pipeline;
use recognition::{OcrsRecognizer, RecognitionAdapter};
use relay::VerificationRelay;
use server::AppState;
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    info!("Starting plate-relay");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    // Model loading is slow and blocking; nothing is served until it is done.
    let detection_model = config.detection_model.clone();
    let recognition_model = config.recognition_model.clone();
    let engine = match tokio::task::spawn_blocking(move || {
        OcrsRecognizer::load(&detection_model, &recognition_model)
    })
    .await
    {
        Ok(Ok(engine)) => engine,
        Ok(Err(e)) => {
            error!("{}", e);
            process::exit(1);
        }
        Err(e) => {
            error!("OCR initialization task failed: {}", e);
            process::exit(1);
        }
    };
    let recognizer = RecognitionAdapter::new(Arc::new(engine), config.ocr_max_concurrency);

    let relay = match VerificationRelay::new(config.verify_url.clone(), config.backend_timeout) {
        Ok(relay) => relay,
        Err(e) => {
            error!("Unable to build HTTP client: {}", e);
            process::exit(1);
        }
    };
    info!(
        "Relaying plates to {} (timeout {:?})",
        config.verify_url, config.backend_timeout
    );

    let state = Arc::new(AppState::new(Pipeline::new(recognizer, relay)));
    state.mark_ready();

    let routes = server::routes(state, config.max_upload_bytes);
    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => {
                error!("Unable to listen for shutdown signal: {}", e);
                futures::future::pending::<()>().await;
            }
        }
    };
    match warp::serve(routes).try_bind_with_graceful_shutdown(config.listen_addr, shutdown) {
        Ok((addr, server)) => {
            info!("Listening on {}", addr);
            server.await;
        }
        Err(e) => {
            error!("Unable to bind {}: {}", config.listen_addr, e);
            process::exit(1);
        }
    }
    info!("Exiting main");
}
