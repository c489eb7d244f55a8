use std::fmt::Debug;
use std::time::Duration;

/// Environment variable consulted by [`EnvContext`].
pub const WEB_URL_ENV: &str = "SHAREPOINT_WEB_URL";

/// Construction-time settings for a [`SharePointClient`](crate::client::SharePointClient).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SharePointOptions {
    /// Absolute URL of the target web. When absent the ambient context decides.
    pub web_url: Option<String>,
    /// Per-request timeout handed to the HTTP transport.
    pub request_timeout: Option<Duration>,
    pub user_agent: Option<String>,
}

/// Source of the "current web" the hosting environment runs in.
///
/// Consulted once when a client is built and again whenever the client is
/// asked to re-derive its resource location.
pub trait ContextSource: Send + Sync + Debug {
    fn web_absolute_url(&self) -> Option<String>;
}

/// Reads the current web from the `SHAREPOINT_WEB_URL` environment variable.
#[derive(Clone, Debug, Default)]
pub struct EnvContext;

impl ContextSource for EnvContext {
    fn web_absolute_url(&self) -> Option<String> {
        std::env::var(WEB_URL_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
    }
}

#[derive(Clone, Debug)]
pub struct StaticContext {
    web_url: String,
}

impl StaticContext {
    pub fn new(web_url: impl Into<String>) -> Self {
        Self {
            web_url: web_url.into(),
        }
    }
}

impl ContextSource for StaticContext {
    fn web_absolute_url(&self) -> Option<String> {
        Some(self.web_url.clone())
    }
}
