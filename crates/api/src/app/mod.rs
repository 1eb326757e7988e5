//! HTTP API application wiring (Axum router + service wiring).
//!
//! Layout:
//! - `services.rs`: store/uploader/token wiring chosen from config
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: response DTOs and multipart form parsing
//! - `errors.rs`: consistent error responses
//!
//! Request path: trace → CORS → access policy → body limit → handler.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Extension, Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::get,
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use cakestore_auth::{AccessPolicy, JwtValidator};
use cakestore_infra::config::AppConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, build_services};

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
pub fn build_app(config: &AppConfig, services: Arc<AppServices>) -> Router {
    let jwt: Arc<dyn JwtValidator> = services.jwt.clone();
    let access_state = middleware::AccessState {
        policy: Arc::new(AccessPolicy::storefront()),
        jwt,
        users: services.users.clone(),
    };

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::docs::router())
        .nest("/api", routes::router())
        .layer(Extension(services))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.cors_allowed_origins))
                .layer(axum::middleware::from_fn_with_state(
                    access_state,
                    middleware::access_middleware,
                )),
        )
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60))
}
