//! HTTP boundary of the client.
//!
//! Everything above this module talks to the backend through the
//! [`HttpTransport`] trait, handing it an explicit [`HttpVerb`]. How a verb
//! reaches the wire (SharePoint only accepts GET and POST from most hosts, so
//! the reqwest transport tunnels the rest through `X-HTTP-Method`) stays an
//! implementation detail of the transport.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::{internal_error, SharePointResult};

pub mod in_memory;
mod http;

pub use in_memory::{InMemoryBackend, RecordedRequest};
pub use http::ReqwestTransport;

pub const ODATA_VERBOSE: &str = "application/json;odata=verbose";
pub const REQUEST_DIGEST_HEADER: &str = "X-RequestDigest";
pub const HTTP_METHOD_OVERRIDE_HEADER: &str = "X-HTTP-Method";
pub const IF_MATCH_HEADER: &str = "If-Match";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    Get,
    Post,
    /// Partial update of an existing entity.
    Merge,
    /// Full replacement of an existing resource.
    Put,
    Delete,
}

impl HttpVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Merge => "MERGE",
            HttpVerb::Put => "PUT",
            HttpVerb::Delete => "DELETE",
        }
    }

    pub fn is_mutating(&self) -> bool {
        !matches!(self, HttpVerb::Get)
    }

    /// Value of the `X-HTTP-Method` header for verbs tunnelled over POST.
    pub fn override_method(&self) -> Option<&'static str> {
        match self {
            HttpVerb::Get | HttpVerb::Post => None,
            other => Some(other.as_str()),
        }
    }
}

impl Display for HttpVerb {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(JsonValue),
    Bytes(Vec<u8>),
}

impl RequestBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }

    pub fn to_bytes(&self) -> SharePointResult<Vec<u8>> {
        match self {
            RequestBody::Empty => Ok(Vec::new()),
            RequestBody::Json(value) => serde_json::to_vec(value)
                .map_err(|err| internal_error(format!("Failed to encode request body: {err}"))),
            RequestBody::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    pub verb: HttpVerb,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn new(verb: HttpVerb, url: impl Into<String>) -> Self {
        Self {
            verb,
            url: url.into(),
            headers: BTreeMap::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_json(mut self, body: JsonValue) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn with_bytes(mut self, body: Vec<u8>) -> Self {
        self.body = RequestBody::Bytes(body);
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    pub fn json(status: u16, value: &JsonValue) -> Self {
        Self::new(status, value.to_string().into_bytes())
    }

    pub fn empty(status: u16) -> Self {
        Self::new(status, Vec::new())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parses the body as JSON; an empty body yields `None`.
    pub fn json_body(&self) -> SharePointResult<Option<JsonValue>> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&self.body)
            .map(Some)
            .map_err(|err| internal_error(format!("Response is not valid JSON: {err}")))
    }
}

/// Asynchronous HTTP capability injected into the client.
///
/// Implementations return `Ok` for every response the server produced,
/// whatever its status; `Err` is reserved for failures where no response
/// exists (`NetworkFailure`).
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait HttpTransport: Send + Sync + 'static {
    async fn send(&self, request: HttpRequest) -> SharePointResult<HttpResponse>;
}

pub type TransportArc = Arc<dyn HttpTransport>;
