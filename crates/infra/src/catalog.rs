//! Catalog operations (application-level orchestration).
//!
//! `CatalogService` sits between the HTTP handlers and the stores. Each
//! operation follows the same pipeline:
//!
//! ```text
//! Request form
//!   ↓
//! 1. Validate fields and resolve references (category, discount terms)
//!   ↓
//! 2. Upload images, in input order (any failure aborts)
//!   ↓
//! 3. Apply the change to the cake (pure domain logic)
//!   ↓
//! 4. Persist the cake as one unit (row, discount, images)
//!   ↓
//! 5. Resolve the category for the response view
//! ```
//!
//! Nothing is written to a store before step 4, so a failed upload leaves
//! stored state untouched. URLs already handed out by the asset host for the
//! same request are not reclaimed.
//!
//! This module contains no IO itself; it composes store and uploader traits.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info, instrument};

use cakestore_catalog::{Cake, Category, DiscountTerms, NewCake, NewCategory};
use cakestore_core::{CakeId, CategoryId, DomainError, Price, index_by_id};

use crate::images::{CAKE_IMAGE_FOLDER, ImageUpload, ImageUploader, UploadError};
use crate::store::{CakeStore, CategoryStore, StoreError};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl CatalogError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::Domain(DomainError::NotFound))
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Cake fields as submitted on create or update.
///
/// The discount pair is kept raw: it only takes effect when both halves are
/// present, and the type string is parsed here rather than at the edge.
#[derive(Debug, Clone)]
pub struct CakeForm {
    pub name: String,
    pub price: Price,
    pub description: String,
    pub category_id: Option<CategoryId>,
    pub discount_type: Option<String>,
    pub discount_value: Option<Decimal>,
    pub images: Vec<ImageUpload>,
}

impl CakeForm {
    pub fn new(name: impl Into<String>, price: Price, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            price,
            description: description.into(),
            category_id: None,
            discount_type: None,
            discount_value: None,
            images: Vec::new(),
        }
    }

    pub fn with_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_discount(mut self, kind: impl Into<String>, value: Decimal) -> Self {
        self.discount_type = Some(kind.into());
        self.discount_value = Some(value);
        self
    }

    pub fn with_image(mut self, image: ImageUpload) -> Self {
        self.images.push(image);
        self
    }

    fn discount_terms(&self) -> Result<Option<DiscountTerms>, DomainError> {
        DiscountTerms::from_parts(self.discount_type.as_deref(), self.discount_value)
    }
}

/// A cake with its category reference resolved.
///
/// `category` is `None` both when the cake has no category and when the
/// referenced category has since been deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CakeView {
    pub cake: Cake,
    pub category: Option<Category>,
}

#[derive(Clone)]
pub struct CatalogService {
    categories: Arc<dyn CategoryStore>,
    cakes: Arc<dyn CakeStore>,
    images: Arc<dyn ImageUploader>,
}

impl CatalogService {
    pub fn new(
        categories: Arc<dyn CategoryStore>,
        cakes: Arc<dyn CakeStore>,
        images: Arc<dyn ImageUploader>,
    ) -> Self {
        Self {
            categories,
            cakes,
            images,
        }
    }

    // ── Cakes ──────────────────────────────────────────────────────────────

    pub async fn list_cakes(&self) -> CatalogResult<Vec<CakeView>> {
        let cakes = self.cakes.list().await?;
        self.resolve_all(cakes).await
    }

    /// Unknown category ids are rejected rather than yielding an empty list.
    pub async fn cakes_by_category(&self, category_id: CategoryId) -> CatalogResult<Vec<CakeView>> {
        let category = self.require_category(category_id).await?;
        let cakes = self.cakes.find_by_category(category_id).await?;
        Ok(cakes
            .into_iter()
            .map(|cake| CakeView {
                cake,
                category: Some(category.clone()),
            })
            .collect())
    }

    pub async fn search_cakes(&self, name: &str) -> CatalogResult<Vec<CakeView>> {
        let cakes = self.cakes.find_by_name_containing(name).await?;
        self.resolve_all(cakes).await
    }

    pub async fn get_cake(&self, id: CakeId) -> CatalogResult<CakeView> {
        let cake = self.require_cake(id).await?;
        self.resolve(cake).await
    }

    #[instrument(skip(self, form), fields(name = %form.name, images = form.images.len()), err)]
    pub async fn create_cake(&self, form: CakeForm) -> CatalogResult<CakeView> {
        let mut new = NewCake::new(form.name.clone(), form.price, form.description.clone())?;
        let category = match form.category_id {
            Some(id) => Some(self.require_category(id).await?),
            None => None,
        };
        new.category_id = form.category_id;
        new.discount = form.discount_terms()?;
        new.image_urls = self.upload_all(&form.images).await?;

        let cake = self.cakes.insert(new).await?;
        info!(cake_id = %cake.id, "cake created");
        Ok(CakeView { cake, category })
    }

    /// Overwrite scalar fields, replace or clear the category and discount,
    /// and append any new images.
    #[instrument(skip(self, form), fields(name = %form.name, images = form.images.len()), err)]
    pub async fn update_cake(&self, id: CakeId, form: CakeForm) -> CatalogResult<CakeView> {
        let mut cake = self.require_cake(id).await?;

        cake.set_details(form.name.clone(), form.price, form.description.clone())?;
        let category = match form.category_id {
            Some(category_id) => Some(self.require_category(category_id).await?),
            None => None,
        };
        cake.category_id = form.category_id;

        match form.discount_terms()? {
            Some(terms) => cake.apply_discount(terms),
            None => {
                if let Some(released) = cake.clear_discount() {
                    debug!(cake_id = %id, discount_id = ?released.id, "discount released");
                }
            }
        }

        let urls = self.upload_all(&form.images).await?;
        cake.append_images(urls);

        let cake = self.cakes.update(&cake).await?.ok_or(DomainError::NotFound)?;
        info!(cake_id = %cake.id, "cake updated");
        Ok(CakeView { cake, category })
    }

    #[instrument(skip(self), err)]
    pub async fn delete_cake_image(&self, id: CakeId, index: i64) -> CatalogResult<CakeView> {
        let mut cake = self.require_cake(id).await?;
        let removed = cake.remove_image(index)?;
        let cake = self.cakes.update(&cake).await?.ok_or(DomainError::NotFound)?;
        debug!(cake_id = %id, url = %removed, "image removed");
        self.resolve(cake).await
    }

    #[instrument(skip(self), err)]
    pub async fn delete_cake(&self, id: CakeId) -> CatalogResult<()> {
        if !self.cakes.delete(id).await? {
            return Err(DomainError::NotFound.into());
        }
        info!(cake_id = %id, "cake deleted");
        Ok(())
    }

    // ── Categories ─────────────────────────────────────────────────────────

    pub async fn list_categories(&self) -> CatalogResult<Vec<Category>> {
        Ok(self.categories.list().await?)
    }

    #[instrument(skip(self), err)]
    pub async fn create_category(&self, details: NewCategory) -> CatalogResult<Category> {
        details.validate()?;
        let category = self.categories.insert(details).await?;
        info!(category_id = %category.id, "category created");
        Ok(category)
    }

    #[instrument(skip(self), err)]
    pub async fn update_category(&self, id: CategoryId, details: NewCategory) -> CatalogResult<Category> {
        let mut category = self.categories.get(id).await?.ok_or(DomainError::NotFound)?;
        details.validate()?;
        category.apply(details);
        Ok(self
            .categories
            .update(&category)
            .await?
            .ok_or(DomainError::NotFound)?)
    }

    /// Cakes that reference the category keep their (now dangling) id.
    #[instrument(skip(self), err)]
    pub async fn delete_category(&self, id: CategoryId) -> CatalogResult<()> {
        if !self.categories.delete(id).await? {
            return Err(DomainError::NotFound.into());
        }
        info!(category_id = %id, "category deleted");
        Ok(())
    }

    // ── Helpers ────────────────────────────────────────────────────────────

    async fn require_cake(&self, id: CakeId) -> CatalogResult<Cake> {
        Ok(self.cakes.get(id).await?.ok_or(DomainError::NotFound)?)
    }

    async fn require_category(&self, id: CategoryId) -> CatalogResult<Category> {
        self.categories
            .get(id)
            .await?
            .ok_or_else(|| DomainError::invalid_reference("Invalid category ID").into())
    }

    async fn upload_all(&self, images: &[ImageUpload]) -> CatalogResult<Vec<String>> {
        let mut urls = Vec::with_capacity(images.len());
        for image in images {
            urls.push(self.images.upload(image, CAKE_IMAGE_FOLDER).await?);
        }
        Ok(urls)
    }

    async fn resolve(&self, cake: Cake) -> CatalogResult<CakeView> {
        let category = match cake.category_id {
            Some(id) => self.categories.get(id).await?,
            None => None,
        };
        Ok(CakeView { cake, category })
    }

    async fn resolve_all(&self, cakes: Vec<Cake>) -> CatalogResult<Vec<CakeView>> {
        if cakes.iter().all(|c| c.category_id.is_none()) {
            return Ok(cakes.into_iter().map(|cake| CakeView { cake, category: None }).collect());
        }
        let by_id: HashMap<CategoryId, Category> = index_by_id(self.categories.list().await?);
        Ok(cakes
            .into_iter()
            .map(|cake| {
                let category = cake.category_id.and_then(|id| by_id.get(&id).cloned());
                CakeView { cake, category }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::InMemoryImageUploader;
    use crate::store::{InMemoryCakeStore, InMemoryCategoryStore};

    fn price(units: i64) -> Price {
        Price::new(Decimal::new(units, 0)).unwrap()
    }

    fn service() -> CatalogService {
        CatalogService::new(
            Arc::new(InMemoryCategoryStore::new()),
            Arc::new(InMemoryCakeStore::new()),
            Arc::new(InMemoryImageUploader::default()),
        )
    }

    #[tokio::test]
    async fn create_then_get_returns_equal_record() {
        let svc = service();
        let created = svc
            .create_cake(CakeForm::new("Lemon Drizzle", price(12), "tangy"))
            .await
            .unwrap();
        let fetched = svc.get_cake(created.cake.id).await.unwrap();
        assert_eq!(created, fetched);
    }

    #[tokio::test]
    async fn blank_name_is_a_validation_error() {
        let err = service()
            .create_cake(CakeForm::new(" ", price(1), ""))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn unknown_category_is_an_invalid_reference() {
        let svc = service();
        let err = svc
            .create_cake(CakeForm::new("Cake", price(1), "").with_category(CategoryId::new(42)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid category ID");

        let err = svc.cakes_by_category(CategoryId::new(42)).await.unwrap_err();
        assert!(matches!(err, CatalogError::Domain(DomainError::InvalidReference(_))));
    }

    #[tokio::test]
    async fn half_a_discount_is_ignored() {
        let svc = service();
        let mut form = CakeForm::new("Cake", price(1), "");
        form.discount_type = Some("FLAT".into());
        let view = svc.create_cake(form).await.unwrap();
        assert!(view.cake.discount.is_none());
    }

    #[tokio::test]
    async fn unknown_discount_type_is_rejected() {
        let err = service()
            .create_cake(CakeForm::new("Cake", price(1), "").with_discount("BOGOF", Decimal::ONE))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let svc = service();
        assert!(svc.get_cake(CakeId::new(9)).await.unwrap_err().is_not_found());
        assert!(svc.delete_cake(CakeId::new(9)).await.unwrap_err().is_not_found());
        assert!(
            svc.update_cake(CakeId::new(9), CakeForm::new("x", price(1), ""))
                .await
                .unwrap_err()
                .is_not_found()
        );
        assert!(svc.delete_category(CategoryId::new(9)).await.unwrap_err().is_not_found());
        assert!(
            svc.update_category(CategoryId::new(9), NewCategory::new("x", ""))
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn search_with_no_match_is_empty() {
        let svc = service();
        svc.create_cake(CakeForm::new("Chocolate Dream", price(20), "")).await.unwrap();
        assert!(svc.search_cakes("vanilla").await.unwrap().is_empty());
        assert_eq!(svc.search_cakes("CHOC").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_without_category_clears_it() {
        let svc = service();
        let category = svc.create_category(NewCategory::new("Birthday", "")).await.unwrap();
        let created = svc
            .create_cake(CakeForm::new("Cake", price(1), "").with_category(category.id))
            .await
            .unwrap();
        assert_eq!(created.category.as_ref().map(|c| c.id), Some(category.id));

        let updated = svc
            .update_cake(created.cake.id, CakeForm::new("Cake", price(2), ""))
            .await
            .unwrap();
        assert!(updated.cake.category_id.is_none());
        assert!(updated.category.is_none());
    }

    #[tokio::test]
    async fn blank_category_name_is_rejected() {
        let err = service()
            .create_category(NewCategory::new("", "desc"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Domain(DomainError::Validation(_))));
    }
}
