use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use cakestore_infra::catalog::CatalogError;
use cakestore_infra::store::StoreError;

use crate::app::dto::ErrorResponse;

/// Map a catalog failure onto the wire.
///
/// Missing ids are a bare 404. Every other failure, storage and upload
/// errors included, is reported to the client as 400 with its message.
pub fn catalog_error_to_response(err: CatalogError) -> Response {
    match &err {
        CatalogError::Domain(cakestore_core::DomainError::NotFound) => not_found(),
        CatalogError::Domain(_) => json_error(StatusCode::BAD_REQUEST, err.to_string()),
        CatalogError::Upload(_) => {
            warn!(error = %err, "image upload failed");
            json_error(StatusCode::BAD_REQUEST, err.to_string())
        }
        CatalogError::Store(_) => {
            warn!(error = %err, "store operation failed");
            json_error(StatusCode::BAD_REQUEST, err.to_string())
        }
    }
}

pub fn store_error_to_response(err: StoreError) -> Response {
    match err {
        StoreError::Conflict(_) => json_error(StatusCode::BAD_REQUEST, "username already taken"),
        other => {
            warn!(error = %other, "store operation failed");
            json_error(StatusCode::BAD_REQUEST, other.to_string())
        }
    }
}

pub fn not_found() -> Response {
    StatusCode::NOT_FOUND.into_response()
}

pub fn bad_request(message: impl Into<String>) -> Response {
    json_error(StatusCode::BAD_REQUEST, message)
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ErrorResponse {
        error: message.into(),
    };
    (status, axum::Json(body)).into_response()
}
