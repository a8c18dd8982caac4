//! Error types
//!
//! Every fallible operation in the crate returns [`Result`]. Remote failures
//! are classified from the Google API error envelope; local precondition
//! failures are raised before any request is sent.

use serde_json::Value;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The remote resource does not exist (HTTP 404)
    #[error("not found: {message}")]
    NotFound { message: String },

    /// Any other non-success API response
    #[error("API request failed ({status}): {message}")]
    Api {
        status: u16,
        reason: Option<String>,
        message: String,
    },

    /// A load source that is neither a Storage reference nor a local file
    #[error("don't know how to load {0}")]
    UnsupportedSource(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    /// Build an error from a non-success status and its decoded body.
    ///
    /// Google APIs wrap failures as
    /// `{"error": {"code": 404, "message": "...", "errors": [{"reason": "notFound"}]}}`.
    /// Bodies that do not follow the envelope still produce an error carrying
    /// the status code.
    pub fn from_response(status: u16, body: &Value) -> Self {
        let envelope = body.get("error");
        let message = envelope
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| envelope.and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| format!("HTTP {}", status));
        let reason = envelope
            .and_then(|e| e.get("errors"))
            .and_then(Value::as_array)
            .and_then(|errors| errors.first())
            .and_then(|e| e.get("reason"))
            .and_then(Value::as_str)
            .map(str::to_string);
        // Some endpoints report the code only inside the envelope
        let code = envelope
            .and_then(|e| e.get("code"))
            .and_then(Value::as_u64)
            .map(|c| c as u16)
            .unwrap_or(status);

        if code == 404 || status == 404 {
            Error::NotFound { message }
        } else {
            Error::Api {
                status: code,
                reason,
                message,
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Status code of a remote failure, if this is one
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::NotFound { .. } => Some(404),
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Short, sanitized message suitable for terminal output.
    ///
    /// Raw API messages can echo request details, so well-known statuses are
    /// mapped to fixed text and everything else is truncated.
    pub fn user_message(&self) -> String {
        match self.status() {
            Some(403) => return "Permission denied. Check your GCP IAM permissions.".to_string(),
            Some(401) => {
                return "Authentication failed. Run 'gcloud auth application-default login'."
                    .to_string()
            },
            Some(404) => return "Resource not found.".to_string(),
            Some(429) => return "Rate limit exceeded. Please try again later.".to_string(),
            Some(400) => return "Invalid request. Check your parameters.".to_string(),
            Some(409) => {
                return "Resource conflict. The resource may already exist or be in use."
                    .to_string()
            },
            Some(500) | Some(503) => {
                return "GCP service temporarily unavailable. Please try again.".to_string()
            },
            _ => {},
        }

        let error_str = self.to_string();
        let sanitized = error_str
            .chars()
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .take(80)
            .collect::<String>();

        if sanitized.len() < error_str.len() {
            format!("{}...", sanitized)
        } else {
            sanitized
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_not_found_from_envelope() {
        let body = json!({"error": {"code": 404, "message": "Not found: Dataset p:d"}});
        let err = Error::from_response(404, &body);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "not found: Not found: Dataset p:d");
    }

    #[test]
    fn test_api_error_carries_reason() {
        let body = json!({
            "error": {
                "code": 409,
                "message": "Already Exists: Table p:d.t",
                "errors": [{"reason": "duplicate", "message": "Already Exists"}]
            }
        });
        match Error::from_response(409, &body) {
            Error::Api {
                status,
                reason,
                message,
            } => {
                assert_eq!(status, 409);
                assert_eq!(reason.as_deref(), Some("duplicate"));
                assert_eq!(message, "Already Exists: Table p:d.t");
            },
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_non_envelope_body_keeps_status() {
        let err = Error::from_response(502, &Value::Null);
        assert_eq!(err.status(), Some(502));
        assert_eq!(err.to_string(), "API request failed (502): HTTP 502");
    }

    #[test]
    fn test_user_message_is_generic_for_known_statuses() {
        let err = Error::from_response(403, &json!({"error": {"message": "secret detail"}}));
        assert_eq!(
            err.user_message(),
            "Permission denied. Check your GCP IAM permissions."
        );
    }

    #[test]
    fn test_user_message_truncates() {
        let err = Error::InvalidArgument("x".repeat(200));
        let msg = err.user_message();
        assert!(msg.ends_with("..."));
        assert_eq!(msg.len(), 83);
    }
}
