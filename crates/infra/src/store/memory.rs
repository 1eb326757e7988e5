//! In-memory stores for tests/dev.
//!
//! Rows are kept in id order, so listings come back oldest first, matching
//! the `ORDER BY id` of the Postgres stores.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use cakestore_auth::User;
use cakestore_catalog::{Cake, Category, Discount, NewCake, NewCategory};
use cakestore_core::{CakeId, CategoryId, DiscountId, Price, UserId};

use super::{CakeStore, CategoryStore, StoreError, UserStore};

/// A table with store-assigned, monotonically increasing surrogate keys.
///
/// Ids are never reused, even after deletes.
#[derive(Debug)]
pub(crate) struct InMemoryTable<K, V> {
    rows: BTreeMap<K, V>,
    last_id: i64,
}

impl<K, V> Default for InMemoryTable<K, V> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_id: 0,
        }
    }
}

impl<K, V> InMemoryTable<K, V>
where
    K: Copy + Ord + From<i64>,
{
    pub fn next_id(&mut self) -> K {
        self.last_id += 1;
        K::from(self.last_id)
    }

    pub fn insert(&mut self, id: K, value: V) {
        self.rows.insert(id, value);
    }

    pub fn get(&self, id: &K) -> Option<&V> {
        self.rows.get(id)
    }

    pub fn get_mut(&mut self, id: &K) -> Option<&mut V> {
        self.rows.get_mut(id)
    }

    pub fn remove(&mut self, id: &K) -> Option<V> {
        self.rows.remove(id)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read().map_err(|_| StoreError::Poisoned)
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write().map_err(|_| StoreError::Poisoned)
}

// ─────────────────────────────────────────────────────────────────────────────
// Categories
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryCategoryStore {
    inner: RwLock<InMemoryTable<CategoryId, Category>>,
}

impl InMemoryCategoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CategoryStore for InMemoryCategoryStore {
    async fn list(&self) -> Result<Vec<Category>, StoreError> {
        Ok(read(&self.inner)?.values().cloned().collect())
    }

    async fn get(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        Ok(read(&self.inner)?.get(&id).cloned())
    }

    async fn insert(&self, category: NewCategory) -> Result<Category, StoreError> {
        let mut table = write(&self.inner)?;
        let id = table.next_id();
        let category = category.into_category(id);
        table.insert(id, category.clone());
        Ok(category)
    }

    async fn update(&self, category: &Category) -> Result<Option<Category>, StoreError> {
        let mut table = write(&self.inner)?;
        Ok(table.get_mut(&category.id).map(|row| {
            *row = category.clone();
            row.clone()
        }))
    }

    async fn delete(&self, id: CategoryId) -> Result<bool, StoreError> {
        Ok(write(&self.inner)?.remove(&id).is_some())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cakes (+ owned discounts)
// ─────────────────────────────────────────────────────────────────────────────

/// A cake as stored: the discount is a foreign key into the discount table.
#[derive(Debug, Clone)]
struct CakeRow {
    name: String,
    price: Price,
    description: String,
    category_id: Option<CategoryId>,
    discount_id: Option<DiscountId>,
    image_urls: Vec<String>,
}

#[derive(Debug, Default)]
struct CakeTables {
    cakes: InMemoryTable<CakeId, CakeRow>,
    discounts: InMemoryTable<DiscountId, Discount>,
}

impl CakeTables {
    fn assemble(&self, id: CakeId, row: &CakeRow) -> Cake {
        Cake {
            id,
            name: row.name.clone(),
            price: row.price,
            description: row.description.clone(),
            category_id: row.category_id,
            discount: row.discount_id.and_then(|d| self.discounts.get(&d).cloned()),
            image_urls: row.image_urls.clone(),
        }
    }

    fn select<F>(&self, mut predicate: F) -> Vec<Cake>
    where
        F: FnMut(&CakeRow) -> bool,
    {
        self.cakes
            .rows
            .iter()
            .filter(|(_, row)| predicate(row))
            .map(|(id, row)| self.assemble(*id, row))
            .collect()
    }

    /// Write `discount` into the table, keeping its row when `owned` says the
    /// cake already holds it, and return the row id it ended up in.
    fn save_discount(&mut self, discount: &Discount, owned: Option<DiscountId>) -> DiscountId {
        match discount.id {
            Some(id) if owned == Some(id) && self.discounts.get(&id).is_some() => {
                if let Some(row) = self.discounts.get_mut(&id) {
                    row.kind = discount.kind;
                    row.value = discount.value;
                }
                id
            }
            _ => {
                let id = self.discounts.next_id();
                self.discounts.insert(
                    id,
                    Discount {
                        id: Some(id),
                        kind: discount.kind,
                        value: discount.value,
                    },
                );
                id
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCakeStore {
    inner: RwLock<CakeTables>,
}

impl InMemoryCakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of discount rows currently stored (orphans included, if any).
    pub fn discount_count(&self) -> usize {
        self.inner.read().map(|t| t.discounts.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CakeStore for InMemoryCakeStore {
    async fn list(&self) -> Result<Vec<Cake>, StoreError> {
        Ok(read(&self.inner)?.select(|_| true))
    }

    async fn get(&self, id: CakeId) -> Result<Option<Cake>, StoreError> {
        let tables = read(&self.inner)?;
        Ok(tables.cakes.get(&id).map(|row| tables.assemble(id, row)))
    }

    async fn find_by_category(&self, category_id: CategoryId) -> Result<Vec<Cake>, StoreError> {
        Ok(read(&self.inner)?.select(|row| row.category_id == Some(category_id)))
    }

    async fn find_by_name_containing(&self, needle: &str) -> Result<Vec<Cake>, StoreError> {
        let needle = needle.to_lowercase();
        Ok(read(&self.inner)?.select(|row| row.name.to_lowercase().contains(&needle)))
    }

    async fn insert(&self, cake: NewCake) -> Result<Cake, StoreError> {
        let mut tables = write(&self.inner)?;
        let id = tables.cakes.next_id();
        let cake = cake.into_cake(id);
        let discount_id = cake
            .discount
            .as_ref()
            .map(|d| tables.save_discount(d, None));

        let row = CakeRow {
            name: cake.name,
            price: cake.price,
            description: cake.description,
            category_id: cake.category_id,
            discount_id,
            image_urls: cake.image_urls,
        };
        let saved = tables.assemble(id, &row);
        tables.cakes.insert(id, row);
        Ok(saved)
    }

    async fn update(&self, cake: &Cake) -> Result<Option<Cake>, StoreError> {
        let mut tables = write(&self.inner)?;
        let previous = match tables.cakes.get(&cake.id) {
            Some(row) => row.discount_id,
            None => return Ok(None),
        };

        let discount_id = cake
            .discount
            .as_ref()
            .map(|d| tables.save_discount(d, previous));
        if let Some(released) = previous.filter(|p| Some(*p) != discount_id) {
            tables.discounts.remove(&released);
        }

        let row = CakeRow {
            name: cake.name.clone(),
            price: cake.price,
            description: cake.description.clone(),
            category_id: cake.category_id,
            discount_id,
            image_urls: cake.image_urls.clone(),
        };
        let saved = tables.assemble(cake.id, &row);
        tables.cakes.insert(cake.id, row);
        Ok(Some(saved))
    }

    async fn delete(&self, id: CakeId) -> Result<bool, StoreError> {
        let mut tables = write(&self.inner)?;
        match tables.cakes.remove(&id) {
            Some(row) => {
                if let Some(discount_id) = row.discount_id {
                    tables.discounts.remove(&discount_id);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    inner: RwLock<InMemoryTable<UserId, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(read(&self.inner)?
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn insert(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut table = write(&self.inner)?;
        if table.values().any(|u| u.username == username) {
            return Err(StoreError::Conflict(format!("username '{username}' is already taken")));
        }
        let id = table.next_id();
        let user = User {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        };
        table.insert(id, user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cakestore_catalog::{DiscountTerms, DiscountType};
    use rust_decimal::Decimal;

    fn new_cake(name: &str) -> NewCake {
        NewCake::new(name, Price::new(Decimal::new(1500, 2)).unwrap(), "").unwrap()
    }

    #[tokio::test]
    async fn table_ids_are_never_reused() {
        let store = InMemoryCategoryStore::new();
        let a = store.insert(NewCategory::new("A", "")).await.unwrap();
        assert!(store.delete(a.id).await.unwrap());
        let b = store.insert(NewCategory::new("B", "")).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn update_of_missing_category_returns_none() {
        let store = InMemoryCategoryStore::new();
        let ghost = NewCategory::new("Ghost", "").into_category(CategoryId::new(99));
        assert_eq!(store.update(&ghost).await.unwrap(), None);
    }

    #[tokio::test]
    async fn insert_assigns_discount_row() {
        let store = InMemoryCakeStore::new();
        let mut cake = new_cake("Sachertorte");
        cake.discount = Some(DiscountTerms::new(DiscountType::Percentage, Decimal::new(10, 0)));

        let saved = store.insert(cake).await.unwrap();

        assert!(saved.discount.as_ref().unwrap().id.is_some());
        assert_eq!(store.discount_count(), 1);
        assert_eq!(store.get(saved.id).await.unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn clearing_discount_deletes_its_row() {
        let store = InMemoryCakeStore::new();
        let mut cake = new_cake("Sachertorte");
        cake.discount = Some(DiscountTerms::new(DiscountType::Flat, Decimal::ONE));
        let mut saved = store.insert(cake).await.unwrap();

        saved.clear_discount();
        let updated = store.update(&saved).await.unwrap().unwrap();

        assert_eq!(updated.discount, None);
        assert_eq!(store.discount_count(), 0);
    }

    #[tokio::test]
    async fn delete_cascades_to_discount() {
        let store = InMemoryCakeStore::new();
        let mut cake = new_cake("Pavlova");
        cake.discount = Some(DiscountTerms::new(DiscountType::Flat, Decimal::ONE));
        let saved = store.insert(cake).await.unwrap();

        assert!(store.delete(saved.id).await.unwrap());
        assert!(!store.delete(saved.id).await.unwrap());
        assert_eq!(store.discount_count(), 0);
    }

    #[tokio::test]
    async fn name_search_folds_case() {
        let store = InMemoryCakeStore::new();
        store.insert(new_cake("Chocolate Dream")).await.unwrap();
        store.insert(new_cake("Lemon Drizzle")).await.unwrap();

        for needle in ["choc", "CHOC", "Dream"] {
            let found = store.find_by_name_containing(needle).await.unwrap();
            assert_eq!(found.len(), 1, "needle {needle}");
            assert_eq!(found[0].name, "Chocolate Dream");
        }
        assert!(store.find_by_name_containing("vanilla").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let store = InMemoryUserStore::new();
        store.insert("baker", "h1").await.unwrap();
        assert!(matches!(store.insert("baker", "h2").await, Err(StoreError::Conflict(_))));
        assert_eq!(store.find_by_username("baker").await.unwrap().unwrap().password_hash, "h1");
        assert!(store.find_by_username("nobody").await.unwrap().is_none());
    }
}
