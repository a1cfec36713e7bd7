//! Marquee Storage Library
//!
//! Filesystem persistence for Marquee: the managed upload tree behind the
//! `Storage` trait, and the JSON/text `DocumentStore`.
//!
//! # Storage key format
//!
//! Upload keys are `{images|videos}/{stored name}`. Keys must not contain `..`
//! or a leading `/`. Key generation is centralized in the `keys` module.

pub mod document;
pub mod factory;
pub mod keys;
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use document::{DocumentStore, StagedWrite};
pub use factory::{create_document_store, create_storage};
pub use local::LocalStorage;
pub use traits::{Storage, StorageError, StorageResult, StoredObject};
