use std::fmt::{Display, Formatter};
use std::sync::Mutex;

use serde_json::Value as JsonValue;

use crate::client::odata::unwrap_entity;
use crate::context::ResourceLocation;
use crate::error::{internal_error, map_http_error, SharePointResult};
use crate::transport::{HttpRequest, HttpTransport, HttpVerb, ODATA_VERBOSE};

/// Opaque form digest value issued by the context-info endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FormDigest(String);

impl FormDigest {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FormDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DigestState {
    #[default]
    Unset,
    Valid(FormDigest),
}

/// Owns the cached digest of one client instance.
///
/// `refresh` moves the state to `Valid` on success and leaves it untouched
/// on failure, so a stale digest survives a failed refresh.
#[derive(Debug, Default)]
pub struct DigestManager {
    state: Mutex<DigestState>,
}

impl DigestManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DigestState {
        self.state.lock().unwrap().clone()
    }

    /// The cached digest, or `None` while the manager is `Unset`.
    pub fn current_token(&self) -> Option<FormDigest> {
        match &*self.state.lock().unwrap() {
            DigestState::Unset => None,
            DigestState::Valid(digest) => Some(digest.clone()),
        }
    }

    /// Seeds the cache with a digest obtained elsewhere, e.g. one rendered
    /// into the hosting page.
    pub fn seed(&self, digest: FormDigest) {
        *self.state.lock().unwrap() = DigestState::Valid(digest);
    }

    pub async fn refresh(
        &self,
        transport: &dyn HttpTransport,
        location: &ResourceLocation,
    ) -> SharePointResult<FormDigest> {
        let result = request_digest(transport, location).await;

        match result {
            Ok(digest) => {
                *self.state.lock().unwrap() = DigestState::Valid(digest.clone());
                Ok(digest)
            }
            Err(err) => {
                log::warn!("request digest refresh failed: {err}");
                Err(err)
            }
        }
    }
}

async fn request_digest(
    transport: &dyn HttpTransport,
    location: &ResourceLocation,
) -> SharePointResult<FormDigest> {
    let request = HttpRequest::new(HttpVerb::Post, location.context_info_url())
        .with_header("Accept", ODATA_VERBOSE);
    log::debug!("refreshing request digest from {}", request.url);

    let response = transport.send(request).await?;
    if !response.is_success() {
        return Err(map_http_error(response.status, &response.text(), false));
    }
    let body = response.json_body()?.unwrap_or(JsonValue::Null);
    extract_form_digest(&body)
}

fn extract_form_digest(body: &JsonValue) -> SharePointResult<FormDigest> {
    let entity = unwrap_entity(body);
    let info = entity.get("GetContextWebInformation").unwrap_or(entity);
    info.get("FormDigestValue")
        .and_then(JsonValue::as_str)
        .filter(|value| !value.is_empty())
        .map(FormDigest::new)
        .ok_or_else(|| internal_error("Context info response is missing FormDigestValue"))
}
