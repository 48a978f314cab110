use reqwest::header::{HeaderMap, WWW_AUTHENTICATE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A single field-level error reported by the Canvas API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorEntry {
    /// Field the error is attached to, when the API names one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    /// Machine-readable error type (e.g. "blank", "invalid")
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Human-readable message
    pub message: String,
}

/// Main error type for Canvas API operations
#[derive(Debug, Error)]
pub enum CanvasError {
    /// No static API key configured while the client authenticates with one
    #[error("Canvas API key is not set")]
    MissingApiKey,

    /// No base URL configured
    #[error("Canvas base URL is not set")]
    MissingBaseUrl,

    /// No OAuth token configured while the client authenticates with OAuth
    #[error("Canvas OAuth token is not set")]
    MissingOAuthToken,

    /// The OAuth access token was rejected as expired
    #[error("Canvas OAuth access token has expired")]
    OAuthTokenExpired,

    /// Exchanging the refresh token for a new access token failed
    #[error("failed to refresh OAuth token: {message}")]
    OAuthRefreshFailed { message: String, status: Option<u16> },

    /// Error returned by the Canvas API, or a transport failure reaching it
    #[error("Canvas API error: {message}")]
    Api {
        message: String,
        /// HTTP status, `None` for transport failures
        status: Option<u16>,
        errors: Vec<ApiErrorEntry>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A DTO failed validation before any request was made
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A successful response body could not be decoded into the expected shape
    #[error("failed to decode response (status {status}): {source}")]
    Decode {
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CanvasError {
    /// Create a generic API error without structured errors
    pub fn api(message: impl Into<String>, status: Option<u16>) -> Self {
        CanvasError::Api {
            message: message.into(),
            status,
            errors: Vec::new(),
            source: None,
        }
    }

    /// Map a non-2xx response to a typed error.
    ///
    /// `oauth_active` decides whether a 401 may be read as an expired OAuth token.
    pub fn from_response(
        status: StatusCode,
        headers: &HeaderMap,
        body: &[u8],
        oauth_active: bool,
    ) -> Self {
        let parsed = parse_error_body(body);
        let message = parsed.message.unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(|r| r.to_string())
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
        });

        if oauth_active
            && status == StatusCode::UNAUTHORIZED
            && is_expiry_signal(headers, &message)
        {
            return CanvasError::OAuthTokenExpired;
        }

        CanvasError::Api {
            message,
            status: Some(status.as_u16()),
            errors: parsed.errors,
            source: None,
        }
    }

    /// Map a transport failure (DNS, timeout, connection reset)
    pub fn transport(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            "failed to connect to Canvas".to_string()
        } else {
            format!("transport failure: {}", err)
        };

        CanvasError::Api {
            message,
            status: None,
            errors: Vec::new(),
            source: Some(Box::new(err)),
        }
    }

    /// Structured field-level errors; empty unless this is an API error that carried some
    pub fn errors(&self) -> &[ApiErrorEntry] {
        match self {
            CanvasError::Api { errors, .. } => errors,
            _ => &[],
        }
    }

    /// Get the HTTP status code if the error came from an HTTP response
    pub fn status_code(&self) -> Option<u16> {
        match self {
            CanvasError::Api { status, .. } => *status,
            CanvasError::OAuthRefreshFailed { status, .. } => *status,
            CanvasError::Decode { status, .. } => Some(*status),
            CanvasError::OAuthTokenExpired => Some(401),
            _ => None,
        }
    }

    /// Check if this error is a permission denied error (403)
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, CanvasError::Api { status: Some(403), .. })
    }

    /// Check if this error is a not found error (404)
    pub fn is_not_found(&self) -> bool {
        matches!(self, CanvasError::Api { status: Some(404), .. })
    }

    /// Whether a token refresh followed by a retry may resolve this error
    pub fn is_retryable_auth(&self) -> bool {
        matches!(self, CanvasError::OAuthTokenExpired)
    }
}

/// Result type for Canvas operations
pub type Result<T> = std::result::Result<T, CanvasError>;

#[derive(Debug, Default)]
struct ParsedErrorBody {
    message: Option<String>,
    errors: Vec<ApiErrorEntry>,
}

/// Canvas prefixes some JSON bodies with `while(1);`
pub(crate) fn strip_json_prefix(body: &[u8]) -> &[u8] {
    body.strip_prefix(b"while(1);".as_slice()).unwrap_or(body)
}

fn parse_error_body(body: &[u8]) -> ParsedErrorBody {
    let body = strip_json_prefix(body);
    let value: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(_) => {
            let text = String::from_utf8_lossy(body).trim().to_string();
            return ParsedErrorBody {
                message: (!text.is_empty()).then_some(text),
                errors: Vec::new(),
            };
        }
    };

    let mut parsed = ParsedErrorBody::default();

    match value.get("errors") {
        Some(Value::Array(items)) => {
            parsed.errors = items.iter().filter_map(|item| entry_from_value(None, item)).collect();
        }
        Some(Value::Object(fields)) => {
            for (field, detail) in fields {
                match detail {
                    Value::Array(items) => parsed.errors.extend(
                        items
                            .iter()
                            .filter_map(|item| entry_from_value(Some(field), item)),
                    ),
                    other => parsed.errors.extend(entry_from_value(Some(field), other)),
                }
            }
        }
        Some(other) => parsed.errors.extend(entry_from_value(None, other)),
        None => {}
    }

    parsed.message = value
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| value.get("error").and_then(Value::as_str))
        .map(|s| s.to_string())
        .or_else(|| parsed.errors.first().map(|e| e.message.clone()));

    parsed
}

fn entry_from_value(field: Option<&String>, value: &Value) -> Option<ApiErrorEntry> {
    match value {
        Value::String(message) => Some(ApiErrorEntry {
            attribute: field.cloned(),
            error_type: None,
            message: message.clone(),
        }),
        Value::Object(map) => {
            let message = map.get("message").and_then(Value::as_str)?.to_string();
            let attribute = map
                .get("attribute")
                .and_then(Value::as_str)
                .map(|s| s.to_string())
                .or_else(|| field.cloned());
            let error_type = map.get("type").and_then(Value::as_str).map(|s| s.to_string());
            Some(ApiErrorEntry {
                attribute,
                error_type,
                message,
            })
        }
        _ => None,
    }
}

fn is_expiry_signal(headers: &HeaderMap, message: &str) -> bool {
    if headers.contains_key(WWW_AUTHENTICATE) {
        return true;
    }
    let message = message.to_ascii_lowercase();
    message.contains("invalid access token") || message.contains("expired")
}
