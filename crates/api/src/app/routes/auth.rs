use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;
use tracing::{error, info};

use cakestore_auth::Credentials;

use crate::app::dto::{CredentialsRequest, ErrorResponse, RegisteredUserResponse, TokenResponse};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

fn internal_error(context: &str, detail: impl std::fmt::Display) -> axum::response::Response {
    error!(%detail, "{context}");
    errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "User created", body = RegisteredUserResponse),
        (status = 400, description = "Blank fields or username taken", body = ErrorResponse)
    )
)]
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> axum::response::Response {
    let credentials: Credentials = match body {
        Ok(Json(b)) => b.into(),
        Err(rejection) => return errors::bad_request(rejection.body_text()),
    };
    if let Err(e) = credentials.validate() {
        return errors::bad_request(e.to_string());
    }

    // bcrypt runs on the blocking pool.
    let passwords = services.passwords;
    let plain = credentials.password;
    let hash = match tokio::task::spawn_blocking(move || passwords.hash(&plain)).await {
        Ok(Ok(hash)) => hash,
        Ok(Err(e)) => return internal_error("password hashing failed", e),
        Err(e) => return internal_error("password hashing task failed", e),
    };

    match services.users.insert(credentials.username.trim(), &hash).await {
        Ok(user) => {
            info!(user_id = user.id.get(), username = %user.username, "user registered");
            Json(RegisteredUserResponse::from(user)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Bearer token", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> axum::response::Response {
    let credentials: Credentials = match body {
        Ok(Json(b)) => b.into(),
        Err(rejection) => return errors::bad_request(rejection.body_text()),
    };

    let user = match services.users.find_by_username(credentials.username.trim()).await {
        Ok(Some(user)) => user,
        Ok(None) => return invalid_credentials(),
        Err(e) => return errors::store_error_to_response(e),
    };

    let passwords = services.passwords;
    let plain = credentials.password;
    let stored = user.password_hash.clone();
    let verified = match tokio::task::spawn_blocking(move || passwords.verify(&plain, &stored)).await {
        Ok(Ok(ok)) => ok,
        Ok(Err(e)) => return internal_error("password verification failed", e),
        Err(e) => return internal_error("password verification task failed", e),
    };
    if !verified {
        return invalid_credentials();
    }

    match services.jwt.issue(&user.username, Utc::now()) {
        Ok(issued) => Json(TokenResponse::from(issued)).into_response(),
        Err(e) => internal_error("token issue failed", e),
    }
}

fn invalid_credentials() -> axum::response::Response {
    errors::json_error(StatusCode::UNAUTHORIZED, "invalid credentials")
}
