//! Request digest (security token) management.
//!
//! SharePoint rejects mutating REST calls that do not carry a current form
//! digest in `X-RequestDigest`. A [`DigestManager`] caches exactly one digest
//! per client and replaces it wholesale on every successful refresh.

mod manager;

pub use manager::{DigestManager, DigestState, FormDigest};
