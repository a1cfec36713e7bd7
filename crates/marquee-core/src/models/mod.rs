//! Data models shared by the storage, database, service and API crates.

mod document;
mod media;
mod pagination;
mod project;

pub use document::*;
pub use media::*;
pub use pagination::*;
pub use project::*;
