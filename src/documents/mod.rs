//! JSON document store layered on a list.
//!
//! Each principal owns at most one row of the target list: `Title` holds the
//! normalized principal and `JSON` the serialized document. The list must
//! exist with both columns; `JSON` should be a multi-line text field.
//!
//! ```ignore
//! # async fn demo(client: sharepoint_rest::client::SharePointClient) -> sharepoint_rest::error::SharePointResult<()> {
//! let documents = client.documents();
//! documents.set("JSON-Settings", &serde_json::json!({"theme": "dark"})).await?;
//! let stored = documents.get("JSON-Settings").await?;
//! assert!(stored.is_some());
//! # Ok(())
//! # }
//! ```

mod record;
mod store;

pub use record::{DocumentRecord, JsonDocument, JSON_FIELD, TITLE_FIELD};
pub use store::JsonDocumentStore;
