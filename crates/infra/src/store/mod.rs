//! Persistence seams for the catalog and the identity store.
//!
//! Every trait has an in-memory implementation (tests/dev, or when no
//! database is configured) and a Postgres implementation.

use async_trait::async_trait;
use thiserror::Error;

use cakestore_auth::User;
use cakestore_catalog::{Cake, Category, NewCake, NewCategory};
use cakestore_core::{CakeId, CategoryId};

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryCakeStore, InMemoryCategoryStore, InMemoryUserStore};
pub use postgres::{PostgresCakeStore, PostgresCategoryStore, PostgresUserStore, ensure_schema};

/// Store operation error.
///
/// These are infrastructure errors, as opposed to domain errors
/// (validation, dangling references).
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write (e.g. duplicate username).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backend failed (connection, query, decoding).
    #[error("storage failure in {operation}: {message}")]
    Backend { operation: &'static str, message: String },

    /// An in-memory lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn backend(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            operation,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Category>, StoreError>;
    async fn get(&self, id: CategoryId) -> Result<Option<Category>, StoreError>;
    async fn insert(&self, category: NewCategory) -> Result<Category, StoreError>;
    /// Overwrite an existing row. `None` when the id no longer exists.
    async fn update(&self, category: &Category) -> Result<Option<Category>, StoreError>;
    /// `false` when the id did not exist. Cakes referencing it are left alone.
    async fn delete(&self, id: CategoryId) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait CakeStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Cake>, StoreError>;
    async fn get(&self, id: CakeId) -> Result<Option<Cake>, StoreError>;
    async fn find_by_category(&self, category_id: CategoryId) -> Result<Vec<Cake>, StoreError>;
    /// Case-insensitive substring match on the cake name.
    async fn find_by_name_containing(&self, needle: &str) -> Result<Vec<Cake>, StoreError>;
    /// Persist a new cake together with its discount and images.
    async fn insert(&self, cake: NewCake) -> Result<Cake, StoreError>;
    /// Persist `cake` as one unit: scalar fields, discount row and image list.
    ///
    /// A discount row previously owned by the cake and no longer referenced
    /// (cleared or replaced) is deleted. Returns the saved cake with any new
    /// discount id filled in, or `None` when the cake no longer exists.
    async fn update(&self, cake: &Cake) -> Result<Option<Cake>, StoreError>;
    /// Delete the cake and its owned discount. `false` when it did not exist.
    async fn delete(&self, id: CakeId) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    /// Fails with [`StoreError::Conflict`] when the username is taken.
    async fn insert(&self, username: &str, password_hash: &str) -> Result<User, StoreError>;
}
