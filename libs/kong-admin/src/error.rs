use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Error returned by the Admin API for any response outside the 2xx/3xx range.
///
/// The `message` is taken from the `message` field of the JSON error
/// envelope. When the body is not such an envelope, the body text is used
/// verbatim.
#[derive(Debug, Clone)]
pub struct ApiError {
    code: StatusCode,
    message: String,
    headers: HeaderMap,
    raw: Bytes,
}

impl ApiError {
    /// Build an API error from a status code and the raw response body.
    #[must_use]
    pub fn from_body(code: StatusCode, headers: HeaderMap, raw: Bytes) -> Self {
        Self {
            code,
            message: message_from_body(&raw),
            headers,
            raw,
        }
    }

    /// Build an API error with an explicit message and no body.
    #[must_use]
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            headers: HeaderMap::new(),
            raw: Bytes::new(),
        }
    }

    /// HTTP status code returned by the server.
    #[must_use]
    pub fn code(&self) -> StatusCode {
        self.code
    }

    /// Message extracted from the response body.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Response headers, kept so callers can inspect them after a failure.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw response body bytes.
    #[must_use]
    pub fn raw_body(&self) -> &Bytes {
        &self.raw
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HTTP status {} (message: {:?})",
            self.code.as_u16(),
            self.message
        )
    }
}

impl std::error::Error for ApiError {}

fn message_from_body(raw: &[u8]) -> String {
    #[derive(serde::Deserialize)]
    struct Envelope {
        message: Option<serde_json::Value>,
    }

    match serde_json::from_slice::<Envelope>(raw) {
        Ok(Envelope {
            message: Some(serde_json::Value::String(message)),
        }) => message,
        Ok(Envelope {
            message: Some(other),
        }) => other.to_string(),
        _ => String::from_utf8_lossy(raw).trim().to_owned(),
    }
}

/// Failures raised while registering a custom entity type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    #[error("entity type cannot be empty")]
    EmptyType,

    #[error("entity type '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("entity type '{0}' is not registered")]
    NotRegistered(String),

    #[error("invalid endpoint template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("endpoint template placeholders {placeholders:?} do not match identifier fields {fields:?}")]
    PlaceholderMismatch {
        placeholders: Vec<String>,
        fields: Vec<String>,
    },
}

/// Admin API client error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum KongError {
    /// A local precondition failed; no request was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The server answered with a status outside the success range.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// JSON encoding of a request body or decoding of a response failed.
    #[error("JSON serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Query-string encoding failed.
    #[error("query encoding failed: {0}")]
    QueryEncode(#[from] serde_urlencoded::ser::Error),

    /// Network, DNS or TLS failure, with the underlying cause preserved.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The request did not complete within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// A URL could not be parsed or composed.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Reading a request source or writing a response sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Custom entity registry failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[source] Box<figment::Error>),
}

impl KongError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Returns the API error if this error came from a server response.
    #[must_use]
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the HTTP status code if this error came from a server response.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.api_error().map(ApiError::code)
    }

    /// `true` when the server answered 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// `true` when the server answered 409.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(StatusCode::CONFLICT)
    }

    /// `true` when the server answered 403.
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(StatusCode::FORBIDDEN)
    }
}

impl From<figment::Error> for KongError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl From<hyper_util::client::legacy::Error> for KongError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}

/// Returns `true` if `err` is an API error with status 404.
#[must_use]
pub fn is_not_found(err: &KongError) -> bool {
    err.is_not_found()
}
