//! Route configuration and setup

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use marquee_core::Config;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::auth::auth_middleware;
use crate::constants::API_PREFIX;
use crate::handlers::{content, health, media, projects};
use crate::state::AppState;

/// Versioned API routes with the auth gate applied. Transport layers (CORS,
/// tracing, global body limit) are added by [`setup_routes`].
pub fn api_router(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/content/json/{key}",
            get(content::get_json_document).put(content::put_json_document),
        )
        .route(
            "/content/text/{key}",
            get(content::get_text_document).put(content::put_text_document),
        )
        .route("/content/{namespace}", get(content::list_document_keys))
        .route("/media", get(media::list_media))
        .route(
            "/media/upload",
            post(media::upload_media).layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        )
        .route("/media/link", post(media::create_media_link))
        .route(
            "/media/{id}",
            get(media::get_media).delete(media::delete_media),
        )
        .route("/media/{id}/references", get(media::media_references))
        .route(
            "/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/projects/dangling-references",
            get(projects::dangling_references),
        )
        .route(
            "/projects/{id}",
            get(projects::get_project)
                .patch(projects::update_project)
                .delete(projects::delete_project),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new().nest(API_PREFIX, routes)
}

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(config);
    let max_body_bytes = state.max_upload_bytes;

    let app = api_router(state)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins()
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    }
}
