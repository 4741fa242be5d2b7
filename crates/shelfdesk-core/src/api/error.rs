use reqwest::StatusCode;
use thiserror::Error;

/// Boxed transport failure, kept opaque so test transports can produce one.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Network(#[source] TransportError),

    #[error("API error {status}: {}", truncate_body(.body))]
    Api { status: StatusCode, body: String },

    #[error("Session expired - please log in again")]
    SessionExpired,

    #[error("Credential storage error: {0:#}")]
    Storage(#[from] anyhow::Error),

    #[error("Failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Truncate a response body to avoid logging excessive data
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
}

impl GatewayError {
    pub fn from_status(status: StatusCode, body: &[u8]) -> Self {
        GatewayError::Api {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GatewayError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, GatewayError::SessionExpired)
    }

    /// Human-readable message from a server error body.
    ///
    /// Looks at the `error`, `detail` and `message` fields the API uses, in
    /// that order, then falls back to the first field-level validation error.
    pub fn detail(&self) -> Option<String> {
        let GatewayError::Api { body, .. } = self else {
            return None;
        };
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        let object = value.as_object()?;

        for key in ["error", "detail", "message"] {
            if let Some(text) = object.get(key).and_then(|v| v.as_str()) {
                return Some(text.to_string());
            }
        }

        // DRF validation errors: {"field": ["problem", ...]}
        object.iter().find_map(|(field, v)| {
            let first = match v {
                serde_json::Value::Array(items) => items.first()?.as_str()?,
                serde_json::Value::String(s) => s.as_str(),
                _ => return None,
            };
            Some(format!("{}: {}", field, first))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_prefers_error_field() {
        let err = GatewayError::from_status(
            StatusCode::BAD_REQUEST,
            br#"{"detail": "second", "error": "first"}"#,
        );
        assert_eq!(err.detail().as_deref(), Some("first"));
    }

    #[test]
    fn test_detail_from_field_errors() {
        let err = GatewayError::from_status(
            StatusCode::BAD_REQUEST,
            br#"{"book": ["No available copies for this book."]}"#,
        );
        assert_eq!(
            err.detail().as_deref(),
            Some("book: No available copies for this book.")
        );
    }

    #[test]
    fn test_detail_non_json_body() {
        let err = GatewayError::from_status(StatusCode::BAD_GATEWAY, b"<html>bad gateway</html>");
        assert_eq!(err.detail(), None);
        assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
    }

    #[test]
    fn test_body_kept_verbatim_but_display_truncated() {
        let body = "x".repeat(2000);
        let err = GatewayError::from_status(StatusCode::INTERNAL_SERVER_ERROR, body.as_bytes());
        match &err {
            GatewayError::Api { body: kept, .. } => assert_eq!(kept.len(), 2000),
            other => panic!("unexpected error: {other:?}"),
        }
        let shown = err.to_string();
        assert!(shown.contains("truncated, 2000 total bytes"));
        assert!(shown.len() < 700);
    }

    #[test]
    fn test_session_expired_predicate() {
        assert!(GatewayError::SessionExpired.is_session_expired());
        assert!(!GatewayError::InvalidResponse("x".into()).is_session_expired());
    }
}
