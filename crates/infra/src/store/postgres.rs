//! Postgres-backed stores.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | anything else | any | `Backend` |
//!
//! ## Schema
//!
//! `cake.category_id` has no foreign key: deleting a category
//! leaves referencing cakes pointing at nothing, and readers resolve the
//! dangling id to "no category". `cake.discount_id` does reference
//! `discount` and is unique, so a discount row belongs to at most one cake.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use cakestore_auth::User;
use cakestore_catalog::{Cake, Category, Discount, DiscountType, NewCake, NewCategory};
use cakestore_core::{CakeId, CategoryId, DiscountId, Price, UserId};

use super::{CakeStore, CategoryStore, StoreError, UserStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS category (
    id          BIGSERIAL PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS discount (
    id            BIGSERIAL PRIMARY KEY,
    discount_type TEXT NOT NULL,
    value         NUMERIC NOT NULL
);

CREATE TABLE IF NOT EXISTS cake (
    id          BIGSERIAL PRIMARY KEY,
    name        TEXT NOT NULL,
    price       NUMERIC NOT NULL CHECK (price >= 0),
    description TEXT NOT NULL DEFAULT '',
    category_id BIGINT NULL,
    discount_id BIGINT NULL UNIQUE REFERENCES discount (id)
);

CREATE INDEX IF NOT EXISTS cake_category_id_idx ON cake (category_id);

CREATE TABLE IF NOT EXISTS cake_images (
    cake_id   BIGINT NOT NULL REFERENCES cake (id) ON DELETE CASCADE,
    position  INTEGER NOT NULL,
    image_url TEXT NOT NULL,
    PRIMARY KEY (cake_id, position)
);

CREATE TABLE IF NOT EXISTS app_user (
    id            BIGSERIAL PRIMARY KEY,
    username      TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL
);
"#;

/// Create all tables if they do not exist yet. Idempotent.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;
    Ok(())
}

fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            StoreError::Conflict(format!("{operation}: {}", db_err.message()))
        }
        other => StoreError::backend(operation, other.to_string()),
    }
}

fn decode<T>(operation: &'static str, res: Result<T, sqlx::Error>) -> Result<T, StoreError> {
    res.map_err(|e| StoreError::backend(operation, format!("failed to decode row: {e}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Categories
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PostgresCategoryStore {
    pool: PgPool,
}

impl PostgresCategoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn category_from_row(row: &PgRow) -> Result<Category, StoreError> {
    Ok(Category {
        id: CategoryId::new(decode("category", row.try_get("id"))?),
        name: decode("category", row.try_get("name"))?,
        description: decode("category", row.try_get("description"))?,
    })
}

#[async_trait]
impl CategoryStore for PostgresCategoryStore {
    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query("SELECT id, name, description FROM category ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_categories", e))?;
        rows.iter().map(category_from_row).collect()
    }

    #[instrument(skip(self), fields(category_id = %id), err)]
    async fn get(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query("SELECT id, name, description FROM category WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_category", e))?;
        row.as_ref().map(category_from_row).transpose()
    }

    #[instrument(skip(self, category), err)]
    async fn insert(&self, category: NewCategory) -> Result<Category, StoreError> {
        let row = sqlx::query(
            "INSERT INTO category (name, description) VALUES ($1, $2) RETURNING id, name, description",
        )
        .bind(&category.name)
        .bind(&category.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_category", e))?;
        category_from_row(&row)
    }

    #[instrument(skip(self, category), fields(category_id = %category.id), err)]
    async fn update(&self, category: &Category) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE category SET name = $2, description = $3
            WHERE id = $1
            RETURNING id, name, description
            "#,
        )
        .bind(category.id.get())
        .bind(&category.name)
        .bind(&category.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_category", e))?;
        row.as_ref().map(category_from_row).transpose()
    }

    #[instrument(skip(self), fields(category_id = %id), err)]
    async fn delete(&self, id: CategoryId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM category WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_category", e))?;
        Ok(result.rows_affected() > 0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cakes (+ owned discounts and image lists)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PostgresCakeStore {
    pool: PgPool,
}

impl PostgresCakeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the cake/discount join with an optional extra predicate, then
    /// attach image lists in one follow-up query.
    async fn select(
        &self,
        operation: &'static str,
        predicate: &str,
        bind: Option<SelectBind<'_>>,
    ) -> Result<Vec<Cake>, StoreError> {
        let sql = format!(
            r#"
            SELECT
                c.id,
                c.name,
                c.price,
                c.description,
                c.category_id,
                d.id AS discount_id,
                d.discount_type,
                d.value AS discount_value
            FROM cake c
            LEFT JOIN discount d ON d.id = c.discount_id
            {predicate}
            ORDER BY c.id
            "#
        );
        let query = sqlx::query(&sql);
        let query = match bind {
            Some(SelectBind::Int(v)) => query.bind(v),
            Some(SelectBind::Text(v)) => query.bind(v),
            None => query,
        };
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        let mut cakes = rows.iter().map(cake_from_row).collect::<Result<Vec<_>, _>>()?;
        self.attach_images(operation, &mut cakes).await?;
        Ok(cakes)
    }

    async fn attach_images(&self, operation: &'static str, cakes: &mut [Cake]) -> Result<(), StoreError> {
        if cakes.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = cakes.iter().map(|c| c.id.get()).collect();
        let rows = sqlx::query(
            r#"
            SELECT cake_id, image_url
            FROM cake_images
            WHERE cake_id = ANY($1)
            ORDER BY cake_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(operation, e))?;

        let mut by_cake: HashMap<i64, Vec<String>> = HashMap::new();
        for row in rows {
            let cake_id: i64 = decode(operation, row.try_get("cake_id"))?;
            let url: String = decode(operation, row.try_get("image_url"))?;
            by_cake.entry(cake_id).or_default().push(url);
        }
        for cake in cakes.iter_mut() {
            cake.image_urls = by_cake.remove(&cake.id.get()).unwrap_or_default();
        }
        Ok(())
    }
}

enum SelectBind<'a> {
    Int(i64),
    Text(&'a str),
}

fn cake_from_row(row: &PgRow) -> Result<Cake, StoreError> {
    const OP: &str = "cake";
    let price: Decimal = decode(OP, row.try_get("price"))?;
    let discount_id: Option<i64> = decode(OP, row.try_get("discount_id"))?;
    let discount = match discount_id {
        Some(id) => {
            let kind: String = decode(OP, row.try_get("discount_type"))?;
            let kind: DiscountType = kind
                .parse()
                .map_err(|e| StoreError::backend(OP, format!("stored discount type: {e}")))?;
            Some(Discount {
                id: Some(DiscountId::new(id)),
                kind,
                value: decode(OP, row.try_get("discount_value"))?,
            })
        }
        None => None,
    };

    Ok(Cake {
        id: CakeId::new(decode(OP, row.try_get("id"))?),
        name: decode(OP, row.try_get("name"))?,
        price: Price::new(price).map_err(|e| StoreError::backend(OP, format!("stored price: {e}")))?,
        description: decode(OP, row.try_get("description"))?,
        category_id: decode::<Option<i64>>(OP, row.try_get("category_id"))?.map(CategoryId::new),
        discount,
        image_urls: Vec::new(),
    })
}

/// Insert or overwrite the cake's discount row inside `tx`, returning the
/// row id the cake should reference.
async fn save_discount(
    tx: &mut Transaction<'_, Postgres>,
    discount: &Discount,
    owned: Option<DiscountId>,
) -> Result<DiscountId, StoreError> {
    if let Some(id) = discount.id.filter(|id| owned == Some(*id)) {
        sqlx::query("UPDATE discount SET discount_type = $2, value = $3 WHERE id = $1")
            .bind(id.get())
            .bind(discount.kind.as_str())
            .bind(discount.value)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("update_discount", e))?;
        return Ok(id);
    }

    let row = sqlx::query("INSERT INTO discount (discount_type, value) VALUES ($1, $2) RETURNING id")
        .bind(discount.kind.as_str())
        .bind(discount.value)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_discount", e))?;
    Ok(DiscountId::new(decode("insert_discount", row.try_get("id"))?))
}

async fn replace_images(
    tx: &mut Transaction<'_, Postgres>,
    cake_id: CakeId,
    urls: &[String],
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM cake_images WHERE cake_id = $1")
        .bind(cake_id.get())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("replace_images", e))?;

    for (position, url) in urls.iter().enumerate() {
        sqlx::query("INSERT INTO cake_images (cake_id, position, image_url) VALUES ($1, $2, $3)")
            .bind(cake_id.get())
            .bind(position as i32)
            .bind(url)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("replace_images", e))?;
    }
    Ok(())
}

#[async_trait]
impl CakeStore for PostgresCakeStore {
    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<Cake>, StoreError> {
        self.select("list_cakes", "", None).await
    }

    #[instrument(skip(self), fields(cake_id = %id), err)]
    async fn get(&self, id: CakeId) -> Result<Option<Cake>, StoreError> {
        let mut found = self
            .select("get_cake", "WHERE c.id = $1", Some(SelectBind::Int(id.get())))
            .await?;
        Ok(found.pop())
    }

    #[instrument(skip(self), fields(category_id = %category_id), err)]
    async fn find_by_category(&self, category_id: CategoryId) -> Result<Vec<Cake>, StoreError> {
        self.select(
            "find_cakes_by_category",
            "WHERE c.category_id = $1",
            Some(SelectBind::Int(category_id.get())),
        )
        .await
    }

    #[instrument(skip(self), err)]
    async fn find_by_name_containing(&self, needle: &str) -> Result<Vec<Cake>, StoreError> {
        // POSITION avoids LIKE wildcard escaping for user-supplied needles.
        self.select(
            "find_cakes_by_name",
            "WHERE POSITION(LOWER($1) IN LOWER(c.name)) > 0",
            Some(SelectBind::Text(needle)),
        )
        .await
    }

    #[instrument(skip(self, cake), fields(name = %cake.name), err)]
    async fn insert(&self, cake: NewCake) -> Result<Cake, StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("insert_cake", e))?;

        let row = sqlx::query(
            r#"
            INSERT INTO cake (name, price, description, category_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&cake.name)
        .bind(cake.price.amount())
        .bind(&cake.description)
        .bind(cake.category_id.map(CategoryId::get))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_cake", e))?;
        let id = CakeId::new(decode("insert_cake", row.try_get("id"))?);

        let mut saved = cake.into_cake(id);
        if let Some(discount) = saved.discount.as_mut() {
            let discount_id = save_discount(&mut tx, discount, None).await?;
            discount.id = Some(discount_id);
            sqlx::query("UPDATE cake SET discount_id = $2 WHERE id = $1")
                .bind(id.get())
                .bind(discount_id.get())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_cake", e))?;
        }
        replace_images(&mut tx, id, &saved.image_urls).await?;

        tx.commit().await.map_err(|e| map_sqlx_error("insert_cake", e))?;
        Ok(saved)
    }

    #[instrument(skip(self, cake), fields(cake_id = %cake.id), err)]
    async fn update(&self, cake: &Cake) -> Result<Option<Cake>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("update_cake", e))?;

        let current = sqlx::query("SELECT discount_id FROM cake WHERE id = $1 FOR UPDATE")
            .bind(cake.id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_cake", e))?;
        let previous = match current {
            Some(row) => decode::<Option<i64>>("update_cake", row.try_get("discount_id"))?.map(DiscountId::new),
            None => return Ok(None),
        };

        let mut saved = cake.clone();
        let discount_id = match saved.discount.as_mut() {
            Some(discount) => {
                let id = save_discount(&mut tx, discount, previous).await?;
                discount.id = Some(id);
                Some(id)
            }
            None => None,
        };

        sqlx::query(
            r#"
            UPDATE cake
            SET name = $2, price = $3, description = $4, category_id = $5, discount_id = $6
            WHERE id = $1
            "#,
        )
        .bind(cake.id.get())
        .bind(&cake.name)
        .bind(cake.price.amount())
        .bind(&cake.description)
        .bind(cake.category_id.map(CategoryId::get))
        .bind(discount_id.map(DiscountId::get))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_cake", e))?;

        // Orphan removal: only after the cake stopped referencing the row.
        if let Some(released) = previous.filter(|p| Some(*p) != discount_id) {
            sqlx::query("DELETE FROM discount WHERE id = $1")
                .bind(released.get())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("update_cake", e))?;
        }

        replace_images(&mut tx, cake.id, &cake.image_urls).await?;

        tx.commit().await.map_err(|e| map_sqlx_error("update_cake", e))?;
        Ok(Some(saved))
    }

    #[instrument(skip(self), fields(cake_id = %id), err)]
    async fn delete(&self, id: CakeId) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("delete_cake", e))?;

        let deleted = sqlx::query("DELETE FROM cake WHERE id = $1 RETURNING discount_id")
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_cake", e))?;
        let Some(row) = deleted else {
            return Ok(false);
        };

        if let Some(discount_id) = decode::<Option<i64>>("delete_cake", row.try_get("discount_id"))? {
            sqlx::query("DELETE FROM discount WHERE id = $1")
                .bind(discount_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("delete_cake", e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("delete_cake", e))?;
        Ok(true)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    Ok(User {
        id: UserId::new(decode("user", row.try_get("id"))?),
        username: decode("user", row.try_get("username"))?,
        password_hash: decode("user", row.try_get("password_hash"))?,
    })
}

#[async_trait]
impl UserStore for PostgresUserStore {
    #[instrument(skip(self), err)]
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT id, username, password_hash FROM app_user WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self, password_hash), err)]
    async fn insert(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO app_user (username, password_hash)
            VALUES ($1, $2)
            RETURNING id, username, password_hash
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        user_from_row(&row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use cakestore_catalog::DiscountTerms;

    /// Connects only when `DATABASE_URL` names a disposable database.
    async fn pool() -> Option<PgPool> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = PgPool::connect(&url).await.ok()?;
        ensure_schema(&pool).await.ok()?;
        Some(pool)
    }

    async fn discount_rows(pool: &PgPool) -> i64 {
        sqlx::query("SELECT COUNT(*) AS n FROM discount")
            .fetch_one(pool)
            .await
            .unwrap()
            .get("n")
    }

    #[tokio::test]
    async fn discount_row_is_reused_then_released() {
        let Some(pool) = pool().await else {
            eprintln!("DATABASE_URL not set, skipping");
            return;
        };
        let store = PostgresCakeStore::new(pool.clone());
        let before = discount_rows(&pool).await;

        let mut new = NewCake::new("Sacher", Price::new(Decimal::new(30, 0)).unwrap(), "").unwrap();
        new.discount = Some(DiscountTerms::new(DiscountType::Percentage, Decimal::new(10, 0)));
        new.image_urls = vec!["https://cdn.test/a.jpg".into()];
        let mut cake = store.insert(new).await.unwrap();
        let first = cake.discount.as_ref().and_then(|d| d.id).unwrap();
        assert_eq!(discount_rows(&pool).await, before + 1);

        cake.apply_discount(DiscountTerms::new(DiscountType::Flat, Decimal::new(5, 0)));
        cake.append_images(["https://cdn.test/b.jpg".to_string()]);
        store.update(&cake).await.unwrap().unwrap();
        assert_eq!(discount_rows(&pool).await, before + 1);

        let stored = store.get(cake.id).await.unwrap().unwrap();
        let discount = stored.discount.clone().unwrap();
        assert_eq!(discount.id, Some(first));
        assert_eq!(discount.kind, DiscountType::Flat);
        assert_eq!(discount.value, Decimal::new(5, 0));
        assert_eq!(stored.image_urls, vec!["https://cdn.test/a.jpg", "https://cdn.test/b.jpg"]);

        let mut cleared = stored;
        cleared.clear_discount();
        store.update(&cleared).await.unwrap().unwrap();
        assert_eq!(discount_rows(&pool).await, before);
        assert!(store.get(cake.id).await.unwrap().unwrap().discount.is_none());

        let mut rediscounted = store.get(cake.id).await.unwrap().unwrap();
        rediscounted.apply_discount(DiscountTerms::new(DiscountType::Flat, Decimal::new(2, 0)));
        let saved = store.update(&rediscounted).await.unwrap().unwrap();
        let second = saved.discount.and_then(|d| d.id).unwrap();
        assert_ne!(second, first);
        assert_eq!(discount_rows(&pool).await, before + 1);

        assert!(store.delete(cake.id).await.unwrap());
        assert!(store.get(cake.id).await.unwrap().is_none());
        assert_eq!(discount_rows(&pool).await, before);
    }
}
