//! Marquee Core Library
//!
//! Domain models, error types, configuration and link parsing shared by every
//! Marquee crate.

pub mod config;
pub mod error;
pub mod link;
pub mod models;

pub use config::{BaseConfig, Config, ContentConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use link::VideoLink;
