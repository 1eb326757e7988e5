use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};

use cakestore_core::CategoryId;

use crate::app::dto::{CategoryRequest, CategoryResponse, ErrorResponse};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/:id", put(update_category).delete(delete_category))
}

fn parse_category_id(raw: &str) -> Result<CategoryId, axum::response::Response> {
    raw.parse().map_err(|e: cakestore_core::DomainError| errors::bad_request(e.to_string()))
}

#[utoipa::path(
    get,
    path = "/api/categories",
    tag = "categories",
    responses((status = 200, description = "All categories", body = [CategoryResponse]))
)]
pub async fn list_categories(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.catalog.list_categories().await {
        Ok(categories) => {
            let body: Vec<CategoryResponse> = categories.into_iter().map(CategoryResponse::from).collect();
            Json(body).into_response()
        }
        Err(e) => errors::catalog_error_to_response(e),
    }
}

#[utoipa::path(
    post,
    path = "/api/categories",
    tag = "categories",
    request_body = CategoryRequest,
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Created category", body = CategoryResponse),
        (status = 400, description = "Invalid body", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    )
)]
pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<CategoryRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(details) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::bad_request(rejection.body_text()),
    };

    match services.catalog.create_category(details.into()).await {
        Ok(category) => Json(CategoryResponse::from(category)).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

#[utoipa::path(
    put,
    path = "/api/categories/{id}",
    tag = "categories",
    params(("id" = i64, Path, description = "Category id")),
    request_body = CategoryRequest,
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Updated category", body = CategoryResponse),
        (status = 400, description = "Invalid body", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "No such category")
    )
)]
pub async fn update_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<CategoryRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match parse_category_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(details) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::bad_request(rejection.body_text()),
    };

    match services.catalog.update_category(id, details.into()).await {
        Ok(category) => Json(CategoryResponse::from(category)).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

#[utoipa::path(
    delete,
    path = "/api/categories/{id}",
    tag = "categories",
    params(("id" = i64, Path, description = "Category id")),
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Category deleted; referencing cakes are untouched"),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "No such category")
    )
)]
pub async fn delete_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_category_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog.delete_category(id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}
