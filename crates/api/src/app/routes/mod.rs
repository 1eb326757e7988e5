use axum::Router;

pub mod auth;
pub mod cakes;
pub mod categories;
pub mod docs;
pub mod system;

/// Router for everything under `/api`. Access rules are enforced by the
/// middleware in front of it, not per route.
pub fn router() -> Router {
    Router::new()
        .nest("/cakes", cakes::router())
        .nest("/categories", categories::router())
        .nest("/auth", auth::router())
}
