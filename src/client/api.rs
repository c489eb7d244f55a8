use std::fmt::{Debug, Formatter};
use std::sync::{Arc, RwLock};

use async_lock::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use serde_json::Value as JsonValue;

use crate::context::{ContextSource, EnvContext, ResourceLocation, SharePointOptions, WEB_URL_ENV};
use crate::digest::{DigestManager, FormDigest};
use crate::documents::JsonDocumentStore;
use crate::error::{invalid_argument, map_http_error, SharePointResult};
use crate::files::FileClient;
use crate::identity::IdentityResolver;
use crate::lists::ListClient;
use crate::mail::MailClient;
use crate::transport::{
    HttpRequest, HttpTransport, HttpVerb, ReqwestTransport, RequestBody, TransportArc,
    ODATA_VERBOSE, REQUEST_DIGEST_HEADER,
};

/// Entry point of the crate: one client per SharePoint web.
///
/// Cloning is cheap and every clone shares the same transport, resource
/// location and digest cache. Separate `build()` calls produce independent
/// clients with their own digest.
///
/// # Examples
/// ```ignore
/// # use sharepoint_rest::client::SharePointClient;
/// # use sharepoint_rest::context::SharePointOptions;
/// # async fn demo() -> sharepoint_rest::error::SharePointResult<()> {
/// let client = SharePointClient::builder()
///     .with_options(SharePointOptions {
///         web_url: Some("https://contoso.sharepoint.com/sites/team".into()),
///         ..Default::default()
///     })
///     .build()?;
/// let settings = client.documents().get("JSON-Settings").await?;
/// println!("{:?}", settings.map(|doc| doc.value));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SharePointClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    context: Arc<dyn ContextSource>,
    location: RwLock<ResourceLocation>,
    transport: TransportArc,
    digest: DigestManager,
    document_writes: AsyncMutex<()>,
}

impl Debug for SharePointClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharePointClient")
            .field("web_url", &self.location().web_url())
            .field("context", &self.inner.context)
            .field("digest", &self.inner.digest.state())
            .finish()
    }
}

#[derive(Default)]
pub struct SharePointClientBuilder {
    options: SharePointOptions,
    context: Option<Arc<dyn ContextSource>>,
    transport: Option<TransportArc>,
    digest: Option<FormDigest>,
}

impl SharePointClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: SharePointOptions) -> Self {
        self.options = options;
        self
    }

    /// Replaces the default [`EnvContext`] as the source of the current web.
    pub fn with_context(mut self, context: Arc<dyn ContextSource>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_transport(mut self, transport: TransportArc) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Starts the client with a digest already cached.
    pub fn with_digest(mut self, digest: FormDigest) -> Self {
        self.digest = Some(digest);
        self
    }

    pub fn build(self) -> SharePointResult<SharePointClient> {
        let context = self
            .context
            .unwrap_or_else(|| Arc::new(EnvContext) as Arc<dyn ContextSource>);
        let location = resolve_location(self.options.web_url.as_deref(), context.as_ref())?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::with_options(&self.options)?) as TransportArc,
        };
        let digest = DigestManager::new();
        if let Some(seed) = self.digest {
            digest.seed(seed);
        }
        log::debug!("sharepoint client bound to {}", location.web_url());

        Ok(SharePointClient {
            inner: Arc::new(ClientInner {
                context,
                location: RwLock::new(location),
                transport,
                digest,
                document_writes: AsyncMutex::new(()),
            }),
        })
    }
}

fn resolve_location(
    explicit: Option<&str>,
    context: &dyn ContextSource,
) -> SharePointResult<ResourceLocation> {
    let web_url = match explicit {
        Some(url) => url.to_string(),
        None => context.web_absolute_url().ok_or_else(|| {
            invalid_argument(format!(
                "No SharePoint web URL configured: set SharePointOptions.web_url or {WEB_URL_ENV}"
            ))
        })?,
    };
    ResourceLocation::new(&web_url)
}

impl SharePointClient {
    pub fn builder() -> SharePointClientBuilder {
        SharePointClientBuilder::new()
    }

    /// Builds a client over the default reqwest transport.
    pub fn new(options: SharePointOptions) -> SharePointResult<Self> {
        Self::builder().with_options(options).build()
    }

    pub fn location(&self) -> ResourceLocation {
        self.inner.location.read().unwrap().clone()
    }

    /// Re-targets the client at `web_url`, or at whatever the ambient context
    /// reports now when `None` is given. The cached digest is kept.
    pub fn set_web_url(&self, web_url: Option<&str>) -> SharePointResult<()> {
        let location = resolve_location(web_url, self.inner.context.as_ref())?;
        log::debug!("sharepoint client re-bound to {}", location.web_url());
        *self.inner.location.write().unwrap() = location;
        Ok(())
    }

    pub fn refresh_location(&self) -> SharePointResult<()> {
        self.set_web_url(None)
    }

    pub fn transport(&self) -> &dyn HttpTransport {
        self.inner.transport.as_ref()
    }

    pub fn digest(&self) -> &DigestManager {
        &self.inner.digest
    }

    pub fn current_digest(&self) -> Option<FormDigest> {
        self.inner.digest.current_token()
    }

    /// Fetches a fresh digest from the context-info endpoint and caches it.
    pub async fn refresh_digest(&self) -> SharePointResult<FormDigest> {
        let location = self.location();
        self.inner
            .digest
            .refresh(self.transport(), &location)
            .await
    }

    pub fn lists(&self) -> ListClient {
        ListClient::new(self.clone())
    }

    pub fn identity(&self) -> IdentityResolver {
        IdentityResolver::new(self.clone())
    }

    pub fn documents(&self) -> JsonDocumentStore {
        JsonDocumentStore::new(self.clone())
    }

    pub fn files(&self) -> FileClient {
        FileClient::new(self.clone())
    }

    pub fn mail(&self) -> MailClient {
        MailClient::new(self.clone())
    }

    /// Serializes document-store upserts issued through this client.
    pub(crate) async fn lock_document_writes(&self) -> AsyncMutexGuard<'_, ()> {
        self.inner.document_writes.lock().await
    }

    pub(crate) async fn get_json(&self, url: String) -> SharePointResult<JsonValue> {
        let body = self.execute(HttpRequest::new(HttpVerb::Get, url)).await?;
        Ok(body.unwrap_or(JsonValue::Null))
    }

    /// Sends `request` with the OData headers and, for writes, the cached
    /// digest attached. Returns the parsed response body, `None` when empty.
    pub(crate) async fn execute(&self, request: HttpRequest) -> SharePointResult<Option<JsonValue>> {
        let digest = if request.verb.is_mutating() {
            self.current_digest()
        } else {
            None
        };
        let write_without_digest = request.verb.is_mutating() && digest.is_none();
        let request = decorate(request, digest.as_ref());
        let verb = request.verb;
        let url = request.url.clone();
        log::debug!("{verb} {url}");

        let response = match self.transport().send(request).await {
            Ok(response) => response,
            Err(err) => {
                log::warn!("{verb} {url} failed: {err}");
                return Err(err);
            }
        };
        if !response.is_success() {
            let err = map_http_error(response.status, &response.text(), write_without_digest);
            log::warn!("{verb} {url} failed: {err}");
            return Err(err);
        }
        response.json_body()
    }
}

fn decorate(mut request: HttpRequest, digest: Option<&FormDigest>) -> HttpRequest {
    if request.header("Accept").is_none() {
        request = request.with_header("Accept", ODATA_VERBOSE);
    }
    if matches!(request.body, RequestBody::Json(_)) && request.header("Content-Type").is_none() {
        request = request.with_header("Content-Type", ODATA_VERBOSE);
    }
    if let Some(digest) = digest {
        request = request.with_header(REQUEST_DIGEST_HEADER, digest.as_str());
    }
    request
}
