//! Client core shared by every service: ambient context resolution, the
//! injected transport, the request digest cache and the request pipeline
//! that attaches OData headers and maps backend failures.

mod api;
pub(crate) mod odata;

pub use api::{SharePointClient, SharePointClientBuilder};
