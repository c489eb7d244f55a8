//! Ambient web context: where the client finds its SharePoint web and how the
//! REST resource URLs are derived from it.

mod location;
mod options;

pub use location::{escape_odata_literal, path_literal, segment_literal, ResourceLocation};
pub use options::{ContextSource, EnvContext, SharePointOptions, StaticContext, WEB_URL_ENV};
