//! Marquee Database Layer
//!
//! Repositories for the media registry and projects, a Postgres pool helper,
//! and in-memory stand-ins used by tests and local tooling.

pub mod db;
pub mod memory;

pub use db::transaction::WriteTransaction;
pub use db::{
    is_missing_identity_default, InsertError, MediaRepository, MediaRepositoryTrait,
    ProjectRepository, ProjectRepositoryTrait,
};
pub use memory::{InMemoryMediaRepository, InMemoryProjectRepository};
