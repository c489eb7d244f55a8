//! Row store: CRUD over the items of a named SharePoint list, plus the list
//! and column provisioning calls that go with it.

mod api;
mod item;
mod payload;

pub use api::{ListClient, GENERIC_LIST_TEMPLATE};
pub use item::ListItem;
pub use payload::{EntityPayload, EntityType};
