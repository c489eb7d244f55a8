//! # sharepoint-rest
//!
//! Async client for the SharePoint list REST API.
//!
//! * [`lists`]: row CRUD against named lists, plus list and field creation.
//! * [`query`]: `$filter`/`$select`/`$orderby`/`$expand`/`$top`/`$skip` query
//!   builder.
//! * [`digest`]: the request digest every write must carry.
//! * [`identity`]: the calling principal, site users and user profiles.
//! * [`documents`]: a per-user JSON document store kept in a list with
//!   `Title` and `JSON` columns.
//! * [`files`] and [`mail`]: folders, files, attachments and outgoing mail.
//!
//! All services hang off a [`client::SharePointClient`]. The web it talks to
//! comes from [`context::SharePointOptions::web_url`] or, when unset, from the
//! `SHAREPOINT_WEB_URL` environment variable. Requests go through an
//! injectable [`transport::HttpTransport`]; [`transport::ReqwestTransport`] is
//! the default and [`transport::InMemoryBackend`] serves tests.
//!
//! ```no_run
//! use sharepoint_rest::client::SharePointClient;
//! use sharepoint_rest::context::SharePointOptions;
//! use sharepoint_rest::lists::EntityPayload;
//! use sharepoint_rest::query::QuerySpec;
//!
//! # async fn run() -> sharepoint_rest::error::SharePointResult<()> {
//! let client = SharePointClient::new(SharePointOptions {
//!     web_url: Some("https://contoso.sharepoint.com/sites/team".into()),
//!     ..Default::default()
//! })?;
//!
//! client.refresh_digest().await?;
//! let lists = client.lists();
//! lists
//!     .create("Tasks", &EntityPayload::list_item().field("Title", "Write report"))
//!     .await?;
//! let open = lists
//!     .read("Tasks", Some(&QuerySpec::new().select(["Id", "Title"]).top(10)))
//!     .await?;
//! println!("{} tasks", open.len());
//!
//! client
//!     .documents()
//!     .set("JSON-Settings", &serde_json::json!({ "theme": "dark" }))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod context;
pub mod digest;
pub mod documents;
pub mod error;
pub mod files;
pub mod identity;
pub mod lists;
pub mod mail;
pub mod query;
pub mod transport;

#[cfg(test)]
pub mod test_support;
