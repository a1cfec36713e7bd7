//! Caller authentication for mutating routes.
//!
//! The middleware extracts a bearer token and asks an [`AuthGate`] for the
//! caller identity. Reads stay public.

pub mod middleware;

use async_trait::async_trait;
use subtle::ConstantTimeEq;

pub use middleware::auth_middleware;

/// Verified caller, stored in request extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub subject: String,
}

#[async_trait]
pub trait AuthGate: Send + Sync {
    /// Identity for a bearer token, or `None` when the token is not accepted.
    async fn verify(&self, token: &str) -> Option<CallerIdentity>;
}

/// Single shared admin token compared in constant time.
pub struct StaticTokenGate {
    token: String,
}

impl StaticTokenGate {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AuthGate for StaticTokenGate {
    async fn verify(&self, token: &str) -> Option<CallerIdentity> {
        if !self.token.is_empty() && secure_compare(token, &self.token) {
            Some(CallerIdentity {
                subject: "admin".to_string(),
            })
        } else {
            None
        }
    }
}

fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
