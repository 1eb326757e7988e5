use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Multipart, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use serde::Deserialize;
use tracing::info;

use cakestore_core::{CakeId, CategoryId};
use cakestore_infra::catalog::CakeView;

use crate::app::dto::{CakeFields, CakeResponse, ErrorResponse};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::AuthenticatedUser;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_cakes).post(create_cake))
        .route("/search", get(search_cakes))
        .route("/category/:id", get(cakes_by_category))
        .route("/:id", get(get_cake).put(update_cake).delete(delete_cake))
        .route("/:id/images/:index", delete(delete_cake_image))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub name: Option<String>,
}

fn list_response(views: Vec<CakeView>) -> axum::response::Response {
    let body: Vec<CakeResponse> = views.into_iter().map(CakeResponse::from).collect();
    Json(body).into_response()
}

fn parse_cake_id(raw: &str) -> Result<CakeId, axum::response::Response> {
    raw.parse().map_err(|e: cakestore_core::DomainError| errors::bad_request(e.to_string()))
}

#[utoipa::path(
    get,
    path = "/api/cakes",
    tag = "cakes",
    responses((status = 200, description = "All cakes", body = [CakeResponse]))
)]
pub async fn list_cakes(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.catalog.list_cakes().await {
        Ok(views) => list_response(views),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

#[utoipa::path(
    get,
    path = "/api/cakes/category/{id}",
    tag = "cakes",
    params(("id" = i64, Path, description = "Category id")),
    responses(
        (status = 200, description = "Cakes in the category", body = [CakeResponse]),
        (status = 400, description = "Unknown category", body = ErrorResponse)
    )
)]
pub async fn cakes_by_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let category_id: CategoryId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::bad_request("Invalid category ID"),
    };

    match services.catalog.cakes_by_category(category_id).await {
        Ok(views) => list_response(views),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

#[utoipa::path(
    get,
    path = "/api/cakes/search",
    tag = "cakes",
    params(("name" = String, Query, description = "Case-insensitive name fragment")),
    responses(
        (status = 200, description = "Matching cakes", body = [CakeResponse]),
        (status = 400, description = "Missing name", body = ErrorResponse)
    )
)]
pub async fn search_cakes(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<SearchParams>,
) -> axum::response::Response {
    let Some(name) = params.name else {
        return errors::bad_request("Required parameter 'name' is not present");
    };

    match services.catalog.search_cakes(&name).await {
        Ok(views) => list_response(views),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

#[utoipa::path(
    get,
    path = "/api/cakes/{id}",
    tag = "cakes",
    params(("id" = i64, Path, description = "Cake id")),
    responses(
        (status = 200, description = "The cake", body = CakeResponse),
        (status = 404, description = "No such cake")
    )
)]
pub async fn get_cake(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_cake_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog.get_cake(id).await {
        Ok(view) => Json(CakeResponse::from(view)).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

#[utoipa::path(
    post,
    path = "/api/cakes",
    tag = "cakes",
    request_body(content = CakeUploadForm, content_type = "multipart/form-data"),
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Created cake", body = CakeResponse),
        (status = 400, description = "Invalid form, category or upload", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    )
)]
pub async fn create_cake(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<AuthenticatedUser>,
    multipart: Multipart,
) -> axum::response::Response {
    let fields = match CakeFields::from_multipart(multipart).await {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let form = match fields.into_form() {
        Ok(f) => f,
        Err(msg) => return errors::bad_request(msg),
    };

    match services.catalog.create_cake(form).await {
        Ok(view) => {
            info!(
                user_id = user.user_id().get(),
                user = user.username(),
                cake_id = view.cake.id.get(),
                "cake created via api"
            );
            Json(CakeResponse::from(view)).into_response()
        }
        Err(e) => errors::catalog_error_to_response(e),
    }
}

#[utoipa::path(
    put,
    path = "/api/cakes/{id}",
    tag = "cakes",
    params(("id" = i64, Path, description = "Cake id")),
    request_body(content = CakeUploadForm, content_type = "multipart/form-data"),
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Updated cake; new images are appended", body = CakeResponse),
        (status = 400, description = "Invalid form, category or upload", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "No such cake")
    )
)]
pub async fn update_cake(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> axum::response::Response {
    let id = match parse_cake_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let fields = match CakeFields::from_multipart(multipart).await {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let form = match fields.into_form() {
        Ok(f) => f,
        Err(msg) => return errors::bad_request(msg),
    };

    match services.catalog.update_cake(id, form).await {
        Ok(view) => {
            info!(
                user_id = user.user_id().get(),
                user = user.username(),
                cake_id = id.get(),
                "cake updated via api"
            );
            Json(CakeResponse::from(view)).into_response()
        }
        Err(e) => errors::catalog_error_to_response(e),
    }
}

#[utoipa::path(
    delete,
    path = "/api/cakes/{id}/images/{index}",
    tag = "cakes",
    params(
        ("id" = i64, Path, description = "Cake id"),
        ("index" = i64, Path, description = "Zero-based image position")
    ),
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Cake with the image removed", body = CakeResponse),
        (status = 400, description = "Index out of range", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "No such cake")
    )
)]
pub async fn delete_cake_image(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((id, index)): Path<(String, String)>,
) -> axum::response::Response {
    let id = match parse_cake_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let index: i64 = match index.parse() {
        Ok(v) => v,
        Err(_) => return errors::bad_request("Invalid image index"),
    };

    match services.catalog.delete_cake_image(id, index).await {
        Ok(view) => {
            info!(
                user_id = user.user_id().get(),
                user = user.username(),
                cake_id = id.get(),
                index,
                "cake image removed via api"
            );
            Json(CakeResponse::from(view)).into_response()
        }
        Err(e) => errors::catalog_error_to_response(e),
    }
}

#[utoipa::path(
    delete,
    path = "/api/cakes/{id}",
    tag = "cakes",
    params(("id" = i64, Path, description = "Cake id")),
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Cake and its discount deleted"),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "No such cake")
    )
)]
pub async fn delete_cake(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_cake_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog.delete_cake(id).await {
        Ok(()) => {
            info!(
                user_id = user.user_id().get(),
                user = user.username(),
                cake_id = id.get(),
                "cake deleted via api"
            );
            StatusCode::OK.into_response()
        }
        Err(e) => errors::catalog_error_to_response(e),
    }
}
