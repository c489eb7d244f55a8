use std::sync::Arc;

use httpmock::MockServer;

use crate::client::SharePointClient;
use crate::context::SharePointOptions;
use crate::transport::ReqwestTransport;

/// Starts an `httpmock` server standing in for a SharePoint web.
pub fn start_mock_server() -> MockServer {
    MockServer::start()
}

/// Client whose web URL is the root of `server`, talking over reqwest.
pub fn client_for_server(server: &MockServer) -> SharePointClient {
    SharePointClient::builder()
        .with_options(SharePointOptions {
            web_url: Some(server.base_url()),
            ..Default::default()
        })
        .with_transport(Arc::new(ReqwestTransport::new().expect("reqwest transport")))
        .build()
        .expect("mock server client")
}
