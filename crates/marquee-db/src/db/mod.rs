//! Database repositories
//!
//! One repository per table. Services depend on the `*RepositoryTrait` seams;
//! the Postgres implementations live here and in-memory ones in
//! [`crate::memory`].

pub mod media;
pub mod project;
pub mod search;
pub mod transaction;

pub use media::{MediaRepositoryTrait, PostgresMediaRepository as MediaRepository};
pub use project::{
    is_missing_identity_default, InsertError, PostgresProjectRepository as ProjectRepository,
    ProjectRepositoryTrait,
};
