use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::debug;

use cakestore_auth::{Access, AccessPolicy, JwtValidator};
use cakestore_infra::store::UserStore;

use crate::app::errors;
use crate::context::AuthenticatedUser;

#[derive(Clone)]
pub struct AccessState {
    pub policy: Arc<AccessPolicy>,
    pub jwt: Arc<dyn JwtValidator>,
    pub users: Arc<dyn UserStore>,
}

/// Evaluate the access policy for every request before it reaches a handler.
///
/// Public routes pass through untouched. Everything else needs a valid bearer
/// token whose subject names an existing user; the resolved identity is
/// attached as an [`AuthenticatedUser`] extension.
pub async fn access_middleware(
    State(state): State<AccessState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let access = state
        .policy
        .required_access(req.method().as_str(), req.uri().path());
    if access == Access::Public {
        return next.run(req).await;
    }

    let token = match extract_bearer(req.headers()) {
        Ok(token) => token,
        Err(reason) => return deny(req.method().as_str(), req.uri().path(), reason),
    };

    let claims = match state.jwt.validate(token, Utc::now()) {
        Ok(claims) => claims,
        Err(e) => return deny(req.method().as_str(), req.uri().path(), &e.to_string()),
    };

    let user = match state.users.find_by_username(&claims.sub).await {
        Ok(Some(user)) => user,
        Ok(None) => return deny(req.method().as_str(), req.uri().path(), "unknown subject"),
        Err(e) => return deny(req.method().as_str(), req.uri().path(), &e.to_string()),
    };

    req.extensions_mut()
        .insert(AuthenticatedUser::new(user.id, user.username));

    next.run(req).await
}

fn deny(method: &str, path: &str, reason: &str) -> Response {
    debug!(%method, %path, %reason, "request denied");
    errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized")
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, &'static str> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or("missing authorization header")?;

    let header = header.to_str().map_err(|_| "non-ascii authorization header")?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or("authorization scheme is not Bearer")?;

    let token = header.trim();
    if token.is_empty() {
        return Err("empty bearer token");
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header::AUTHORIZATION};

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(extract_bearer(&headers("Bearer abc.def")).unwrap(), "abc.def");
    }

    #[test]
    fn other_schemes_and_blank_tokens_are_rejected() {
        assert!(extract_bearer(&HeaderMap::new()).is_err());
        assert!(extract_bearer(&headers("Basic dXNlcjpwdw==")).is_err());
        assert!(extract_bearer(&headers("Bearer    ")).is_err());
    }
}
