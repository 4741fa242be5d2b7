use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

use super::error::GatewayError;

/// Per-call options layered onto a request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    /// Send without credentials and never attempt renewal on 401.
    pub anonymous: bool,
}

impl RequestOptions {
    pub fn anonymous() -> Self {
        Self {
            anonymous: true,
            ..Self::default()
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// One logical call as it moves through the gateway.
///
/// A retry is a fresh descriptor produced by `into_retry`, so the retried flag
/// only ever travels forward.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub options: RequestOptions,
    pub retried: bool,
}

impl PendingRequest {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        body: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            body,
            options,
            retried: false,
        }
    }

    pub fn into_retry(self) -> Self {
        Self {
            retried: true,
            ..self
        }
    }
}

/// Successful (2xx) response payload.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, GatewayError> {
        if self.body.is_empty() {
            return Err(GatewayError::InvalidResponse(format!(
                "Empty body with status {}",
                self.status
            )));
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| GatewayError::InvalidResponse(format!("Failed to parse JSON: {}", e)))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}
