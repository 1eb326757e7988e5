//! OpenAPI description of the REST surface, plus a Swagger UI page for it.

use axum::{
    Json, Router,
    response::{Html, IntoResponse, Redirect},
    routing::get,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::app::dto::{
    CakeResponse, CakeUploadForm, CategoryRequest, CategoryResponse, CredentialsRequest,
    DiscountResponse, ErrorResponse, RegisteredUserResponse, TokenResponse,
};
use crate::app::routes::{auth, cakes, categories, system};

pub const OPENAPI_PATH: &str = "/v3/api-docs";

pub fn router() -> Router {
    Router::new()
        .route(OPENAPI_PATH, get(openapi))
        .route("/swagger-ui.html", get(swagger_ui))
        .route("/swagger-ui/", get(|| async { Redirect::permanent("/swagger-ui.html") }))
}

pub async fn openapi() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

pub async fn swagger_ui() -> Html<String> {
    Html(format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Cake Store API</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.onload = () => {{
      window.ui = SwaggerUIBundle({{ url: "{OPENAPI_PATH}", dom_id: "#swagger-ui" }});
    }};
  </script>
</body>
</html>"##
    ))
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Cake Store API"),
    paths(
        system::health,
        cakes::list_cakes,
        cakes::cakes_by_category,
        cakes::search_cakes,
        cakes::get_cake,
        cakes::create_cake,
        cakes::update_cake,
        cakes::delete_cake_image,
        cakes::delete_cake,
        categories::list_categories,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        auth::register,
        auth::login,
    ),
    components(schemas(
        CakeResponse,
        CakeUploadForm,
        CategoryRequest,
        CategoryResponse,
        CredentialsRequest,
        DiscountResponse,
        ErrorResponse,
        RegisteredUserResponse,
        TokenResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "cakes", description = "Cake catalog"),
        (name = "categories", description = "Cake categories"),
        (name = "auth", description = "Registration and token issue"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearerAuth` scheme referenced by the write endpoints.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
