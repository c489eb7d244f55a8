//! Test utilities shared across crate-level unit tests.

pub mod http;

pub use http::{client_for_server, start_mock_server};

use std::sync::Arc;

use crate::client::SharePointClient;
use crate::context::SharePointOptions;
use crate::transport::InMemoryBackend;

pub const TEST_WEB_URL: &str = "https://contoso.sharepoint.com/sites/team";

/// Build a client bound to `backend` at [`TEST_WEB_URL`].
pub fn client_for(backend: &InMemoryBackend) -> SharePointClient {
    SharePointClient::builder()
        .with_options(SharePointOptions {
            web_url: Some(TEST_WEB_URL.to_string()),
            ..Default::default()
        })
        .with_transport(Arc::new(backend.clone()))
        .build()
        .expect("test client")
}
