use async_trait::async_trait;
use reqwest::Client;

use crate::context::SharePointOptions;
use crate::error::{internal_error, network_failure, SharePointError, SharePointResult};

use super::{HttpRequest, HttpResponse, HttpTransport, HttpVerb, HTTP_METHOD_OVERRIDE_HEADER};

/// [`HttpTransport`] backed by an async `reqwest::Client`.
///
/// GET requests are sent as-is. Every other verb is sent as POST, with the
/// real verb carried in `X-HTTP-Method` when it is not POST itself.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> SharePointResult<Self> {
        Self::with_options(&SharePointOptions::default())
    }

    pub fn with_options(options: &SharePointOptions) -> SharePointResult<Self> {
        #[allow(unused_mut)]
        let mut builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        {
            let user_agent = options
                .user_agent
                .clone()
                .unwrap_or_else(|| format!("sharepoint-rest/{}", env!("CARGO_PKG_VERSION")));
            builder = builder.user_agent(user_agent);
            if let Some(timeout) = options.request_timeout {
                builder = builder.timeout(timeout);
            }
        }
        #[cfg(target_arch = "wasm32")]
        let _ = options;

        let client = builder
            .build()
            .map_err(|err| internal_error(format!("Failed to build HTTP client: {err}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> SharePointError {
    if err.is_timeout() {
        return network_failure(format!("request timed out: {err}"));
    }
    if err.is_connect() {
        return network_failure(format!("failed to connect to SharePoint: {err}"));
    }
    if err.is_builder() {
        return internal_error(format!("malformed request: {err}"));
    }
    network_failure(format!("request failed: {err}"))
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> SharePointResult<HttpResponse> {
        let mut builder = match request.verb {
            HttpVerb::Get => self.client.get(&request.url),
            _ => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(method) = request.verb.override_method() {
            builder = builder.header(HTTP_METHOD_OVERRIDE_HEADER, method);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.to_bytes()?);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| network_failure(format!("failed to read response body: {err}")))?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}
