//! Marquee API Library
//!
//! HTTP surface of the content service: handlers, the auth gate, error
//! rendering and application setup.

pub mod auth;
pub mod constants;
pub mod error;
mod handlers;
pub mod response;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use setup::routes::api_router;
pub use state::AppState;
