//! HTTP client abstraction for testability

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Default request timeout for tile downloads.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors from an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    /// The server answered with a status other than 200.
    #[error("HTTP status {0}")]
    Status(u16),

    /// The request never produced a response (connection, timeout, body read).
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Trait for HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait HttpClient: Send + Sync {
    /// Performs an HTTP GET request.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    ///
    /// # Returns
    ///
    /// The response body as bytes, or an error for any status other than 200.
    fn get(&self, url: &str) -> Result<Vec<u8>, HttpError>;

    /// Performs an HTTP POST with a JSON body and parses a JSON response.
    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<serde_json::Value, HttpError>;
}

/// Real HTTP client implementation using reqwest.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with the default tile timeout.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a new ReqwestClient with custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, HttpError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| HttpError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    fn read_body(response: reqwest::blocking::Response) -> Result<Vec<u8>, HttpError> {
        if response.status() != StatusCode::OK {
            return Err(HttpError::Status(response.status().as_u16()));
        }
        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| HttpError::Transport(format!("Failed to read response: {}", e)))
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| HttpError::Transport(format!("Request failed: {}", e)))?;

        Self::read_body(response)
    }

    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<serde_json::Value, HttpError> {
        let payload = serde_json::to_vec(body)
            .map_err(|e| HttpError::Transport(format!("Failed to encode request: {}", e)))?;

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .map_err(|e| HttpError::Transport(format!("Request failed: {}", e)))?;

        let bytes = Self::read_body(response)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| HttpError::Transport(format!("Invalid JSON response: {}", e)))
    }
}
