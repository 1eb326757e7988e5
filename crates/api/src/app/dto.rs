use std::str::FromStr;

use axum::extract::Multipart;
use axum::response::Response;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use cakestore_auth::{Credentials, IssuedToken, User};
use cakestore_catalog::{Category, Discount, NewCategory};
use cakestore_core::{CategoryId, Price};
use cakestore_infra::catalog::{CakeForm, CakeView};
use cakestore_infra::images::ImageUpload;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl From<CategoryRequest> for NewCategory {
    fn from(r: CategoryRequest) -> Self {
        NewCategory::new(r.name, r.description)
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

impl From<CredentialsRequest> for Credentials {
    fn from(r: CredentialsRequest) -> Self {
        Credentials::new(r.username, r.password)
    }
}

/// Documented shape of a cake create/update multipart body.
///
/// Parsing goes through [`CakeFields`]; this type only describes the parts.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CakeUploadForm {
    pub name: String,
    #[schema(value_type = f64)]
    pub price: Decimal,
    pub description: String,
    pub category_id: Option<i64>,
    #[schema(value_type = Option<String>, example = "PERCENTAGE")]
    pub discount_type: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub discount_value: Option<Decimal>,
    #[schema(value_type = Option<Vec<String>>, format = Binary)]
    pub images: Option<Vec<Vec<u8>>>,
}

// -------------------------
// Response DTOs
// -------------------------

/// Body of every non-404 error response.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
}

impl From<Category> for CategoryResponse {
    fn from(c: Category) -> Self {
        Self {
            id: c.id.get(),
            name: c.name,
            description: c.description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DiscountResponse {
    pub id: Option<i64>,
    #[serde(rename = "type")]
    #[schema(value_type = String, example = "PERCENTAGE")]
    pub kind: &'static str,
    #[schema(value_type = f64)]
    pub value: Decimal,
}

impl From<Discount> for DiscountResponse {
    fn from(d: Discount) -> Self {
        Self {
            id: d.id.map(|id| id.get()),
            kind: d.kind.as_str(),
            value: d.value,
        }
    }
}

/// Flat cake representation with category and discount inlined.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CakeResponse {
    pub id: i64,
    pub name: String,
    #[schema(value_type = f64)]
    pub price: Decimal,
    pub description: String,
    pub category: Option<CategoryResponse>,
    pub discount: Option<DiscountResponse>,
    pub image_urls: Vec<String>,
}

impl From<CakeView> for CakeResponse {
    fn from(view: CakeView) -> Self {
        let CakeView { cake, category } = view;
        Self {
            id: cake.id.get(),
            name: cake.name,
            price: cake.price.amount(),
            description: cake.description,
            category: category.map(CategoryResponse::from),
            discount: cake.discount.map(DiscountResponse::from),
            image_urls: cake.image_urls,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisteredUserResponse {
    pub id: i64,
    pub username: String,
}

impl From<User> for RegisteredUserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id.get(),
            username: u.username,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
    #[schema(value_type = String, example = "Bearer")]
    pub token_type: &'static str,
    #[schema(value_type = String, format = DateTime)]
    pub expires_at: DateTime<Utc>,
}

impl From<IssuedToken> for TokenResponse {
    fn from(t: IssuedToken) -> Self {
        Self {
            token: t.token,
            token_type: "Bearer",
            expires_at: t.expires_at,
        }
    }
}

// -------------------------
// Multipart cake form
// -------------------------

/// Raw multipart fields of a cake create/update request, before parsing.
///
/// Blank optional text fields count as absent. Empty file parts are dropped.
#[derive(Debug, Default)]
pub struct CakeFields {
    pub name: Option<String>,
    pub price: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub discount_type: Option<String>,
    pub discount_value: Option<String>,
    pub images: Vec<ImageUpload>,
}

impl CakeFields {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, Response> {
        let mut fields = Self::default();

        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => return Err(errors::json_error(e.status(), e.body_text())),
            };
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name == "images" {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| errors::json_error(e.status(), e.body_text()))?;
                if bytes.is_empty() {
                    continue;
                }
                let mut image = ImageUpload::new(bytes.to_vec());
                if let Some(file_name) = file_name {
                    image = image.with_file_name(file_name);
                }
                if let Some(content_type) = content_type {
                    image = image.with_content_type(content_type);
                }
                fields.images.push(image);
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| errors::json_error(e.status(), e.body_text()))?;
            let slot = match name.as_str() {
                "name" => &mut fields.name,
                "price" => &mut fields.price,
                "description" => &mut fields.description,
                "categoryId" => &mut fields.category_id,
                "discountType" => &mut fields.discount_type,
                "discountValue" => &mut fields.discount_value,
                _ => continue,
            };
            *slot = Some(value);
        }

        Ok(fields)
    }

    /// Check required parts and parse typed values.
    pub fn into_form(self) -> Result<CakeForm, String> {
        let name = self.name.ok_or_else(|| missing("name"))?;
        let price = self.price.ok_or_else(|| missing("price"))?;
        let description = self.description.ok_or_else(|| missing("description"))?;

        let price = Price::from_str(&price).map_err(|e| e.to_string())?;
        let category_id = non_blank(self.category_id)
            .map(|raw| CategoryId::from_str(&raw).map_err(|e| e.to_string()))
            .transpose()?;
        let discount_value = non_blank(self.discount_value)
            .map(|raw| {
                Decimal::from_str(raw.trim()).map_err(|e| format!("invalid discount value: {e}"))
            })
            .transpose()?;

        let mut form = CakeForm::new(name, price, description);
        form.category_id = category_id;
        form.discount_type = non_blank(self.discount_type);
        form.discount_value = discount_value;
        form.images = self.images;
        Ok(form)
    }
}

fn missing(part: &str) -> String {
    format!("Required part '{part}' is not present")
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
