use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use marquee_core::AppError;

use crate::auth::AuthGate;
use crate::constants::AUTHORIZATION_HEADER;
use crate::error::HttpAppError;

fn unauthorized(message: &str) -> Response {
    HttpAppError(AppError::Unauthorized(message.to_string())).into_response()
}

/// Require a verified caller on every non-safe method.
pub async fn auth_middleware(
    State(gate): State<Arc<dyn AuthGate>>,
    mut request: Request,
    next: Next,
) -> Response {
    if matches!(
        *request.method(),
        Method::GET | Method::HEAD | Method::OPTIONS
    ) {
        return next.run(request).await;
    }

    let auth_header = match request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|h| h.to_str().ok())
    {
        Some(h) => h,
        None => {
            tracing::debug!(path = %request.uri().path(), "Missing authorization header");
            return unauthorized("Missing authorization header");
        }
    };

    let Some(token) = auth_header.strip_prefix("Bearer ") else {
        return unauthorized("Invalid authorization header format");
    };

    match gate.verify(token).await {
        Some(identity) => {
            tracing::debug!(subject = %identity.subject, "Caller authenticated");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        None => {
            tracing::warn!(path = %request.uri().path(), "Rejected invalid token");
            unauthorized("Invalid token")
        }
    }
}
