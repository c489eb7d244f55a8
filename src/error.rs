use std::error::Error;
use std::fmt::{Display, Formatter};

use reqwest::StatusCode;
use serde::Deserialize;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SharePointErrorCode {
    /// The transport produced no response at all.
    NetworkFailure,
    /// Any non-2xx response without a more specific mapping.
    BackendError,
    NotFound,
    /// The calling principal could not be resolved.
    Unauthenticated,
    Unauthorized,
    /// A write was rejected and no request digest had been cached.
    TokenAbsent,
    InvalidArgument,
    Internal,
}

impl SharePointErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SharePointErrorCode::NetworkFailure => "sharepoint/network-failure",
            SharePointErrorCode::BackendError => "sharepoint/backend-error",
            SharePointErrorCode::NotFound => "sharepoint/not-found",
            SharePointErrorCode::Unauthenticated => "sharepoint/unauthenticated",
            SharePointErrorCode::Unauthorized => "sharepoint/unauthorized",
            SharePointErrorCode::TokenAbsent => "sharepoint/token-absent",
            SharePointErrorCode::InvalidArgument => "sharepoint/invalid-argument",
            SharePointErrorCode::Internal => "sharepoint/internal",
        }
    }
}

#[derive(Clone, Debug)]
pub struct SharePointError {
    pub code: SharePointErrorCode,
    message: String,
    status: Option<u16>,
}

impl SharePointError {
    pub fn new(code: SharePointErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status of the backend response that produced this error, if any.
    pub fn status(&self) -> Option<u16> {
        self.status
    }
}

impl Display for SharePointError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {status}, {})", self.message, self.code_str()),
            None => write!(f, "{} ({})", self.message, self.code_str()),
        }
    }
}

impl Error for SharePointError {}

pub type SharePointResult<T> = Result<T, SharePointError>;

pub fn network_failure(message: impl Into<String>) -> SharePointError {
    SharePointError::new(SharePointErrorCode::NetworkFailure, message)
}

pub fn backend_error(status: u16, message: impl Into<String>) -> SharePointError {
    SharePointError::new(SharePointErrorCode::BackendError, message).with_status(status)
}

pub fn not_found(message: impl Into<String>) -> SharePointError {
    SharePointError::new(SharePointErrorCode::NotFound, message)
}

pub fn unauthenticated(message: impl Into<String>) -> SharePointError {
    SharePointError::new(SharePointErrorCode::Unauthenticated, message)
}

pub fn unauthorized(message: impl Into<String>) -> SharePointError {
    SharePointError::new(SharePointErrorCode::Unauthorized, message)
}

pub fn token_absent(message: impl Into<String>) -> SharePointError {
    SharePointError::new(SharePointErrorCode::TokenAbsent, message)
}

pub fn invalid_argument(message: impl Into<String>) -> SharePointError {
    SharePointError::new(SharePointErrorCode::InvalidArgument, message)
}

pub fn internal_error(message: impl Into<String>) -> SharePointError {
    SharePointError::new(SharePointErrorCode::Internal, message)
}

/// OData error envelopes. Verbose responses use `error`, light and minimal
/// metadata responses use `odata.error`.
#[derive(Debug, Deserialize)]
struct ODataErrorBody {
    #[serde(default)]
    error: Option<ODataError>,
    #[serde(default, rename = "odata.error")]
    odata_error: Option<ODataError>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ODataError {
    #[serde(default)]
    message: Option<ODataMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ODataMessage {
    Localized { value: String },
    Plain(String),
}

/// Maps a non-2xx backend response onto the crate error taxonomy.
///
/// `write_without_digest` is set by callers that issued a mutating request
/// while no request digest was cached; a 401/403 for such a request is
/// reported as [`SharePointErrorCode::TokenAbsent`] so the caller knows a
/// refresh is the remedy.
pub fn map_http_error(status: u16, body: &str, write_without_digest: bool) -> SharePointError {
    let message = extract_message(body).unwrap_or_else(|| {
        StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("HTTP error")
            .to_string()
    });
    let error = match status {
        404 => not_found(message),
        401 | 403 if write_without_digest => {
            token_absent(format!("request digest missing: {message}"))
        }
        401 | 403 => unauthorized(message),
        other => return backend_error(other, message),
    };
    error.with_status(status)
}

fn extract_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ODataErrorBody>(body).ok()?;
    let from_error = parsed
        .error
        .or(parsed.odata_error)
        .and_then(|error| error.message)
        .map(|message| match message {
            ODataMessage::Localized { value } => value,
            ODataMessage::Plain(text) => text,
        });
    from_error
        .or(parsed.message)
        .filter(|message| !message.is_empty())
}
