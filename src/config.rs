use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const DEFAULT_PORT: u16 = 5001;
const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 25;
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} environment variable unset")]
    Missing(&'static str),

    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// `{BACKEND_BASE_URL}/verify`
    pub verify_url: Url,
    pub backend_timeout: Duration,
    pub detection_model: PathBuf,
    pub recognition_model: PathBuf,
    pub ocr_max_concurrency: usize,
    pub max_upload_bytes: u64,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host: IpAddr = parse_or(&lookup, "HOST", IpAddr::from([0, 0, 0, 0]))?;
        let port: u16 = parse_or(&lookup, "PORT", DEFAULT_PORT)?;

        let base_url = lookup("BACKEND_BASE_URL").ok_or(ConfigError::Missing("BACKEND_BASE_URL"))?;
        let verify_url = verify_url(&base_url)?;

        let timeout_secs: u64 =
            parse_or(&lookup, "BACKEND_TIMEOUT_SECS", DEFAULT_BACKEND_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(invalid("BACKEND_TIMEOUT_SECS", "0", "must be positive"));
        }

        let default_concurrency = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let ocr_max_concurrency: usize =
            parse_or(&lookup, "OCR_MAX_CONCURRENCY", default_concurrency)?;
        if ocr_max_concurrency == 0 {
            return Err(invalid("OCR_MAX_CONCURRENCY", "0", "must be at least 1"));
        }

        Ok(Config {
            listen_addr: SocketAddr::new(host, port),
            verify_url,
            backend_timeout: Duration::from_secs(timeout_secs),
            detection_model: lookup("OCR_DETECTION_MODEL")
                .unwrap_or_else(|| "models/text-detection.rten".to_string())
                .into(),
            recognition_model: lookup("OCR_RECOGNITION_MODEL")
                .unwrap_or_else(|| "models/text-recognition.rten".to_string())
                .into(),
            ocr_max_concurrency,
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(key, &value, &e.to_string())),
        None => Ok(default),
    }
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn verify_url(base: &str) -> Result<Url, ConfigError> {
    let url = format!("{}/verify", base.trim().trim_end_matches('/'));
    let parsed = Url::parse(&url).map_err(|e| invalid("BACKEND_BASE_URL", base, &e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(invalid(
            "BACKEND_BASE_URL",
            base,
            &format!("unsupported scheme {}", other),
        )),
    }
}
