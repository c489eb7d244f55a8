//! Folders, document library files and list item attachments.

mod api;

pub use api::{Attachment, FileClient};
