//! Who is calling: the normalized principal used as a document key, plus
//! site user and user-profile lookups.

mod api;
mod principal;

pub use api::IdentityResolver;
pub use principal::{PrincipalIdentity, SiteUser};
