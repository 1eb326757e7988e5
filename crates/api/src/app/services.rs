use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use cakestore_auth::{Hs256Jwt, PasswordHasher};
use cakestore_infra::{
    catalog::CatalogService,
    config::AppConfig,
    images::{CloudinaryUploader, ImageUploader, InMemoryImageUploader},
    store::{
        CakeStore, CategoryStore, InMemoryCakeStore, InMemoryCategoryStore, InMemoryUserStore,
        PostgresCakeStore, PostgresCategoryStore, PostgresUserStore, UserStore, ensure_schema,
    },
};

/// Everything the handlers need, wired once at startup.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: CatalogService,
    pub users: Arc<dyn UserStore>,
    pub jwt: Arc<Hs256Jwt>,
    pub passwords: PasswordHasher,
}

impl AppServices {
    pub fn new(
        categories: Arc<dyn CategoryStore>,
        cakes: Arc<dyn CakeStore>,
        users: Arc<dyn UserStore>,
        images: Arc<dyn ImageUploader>,
        config: &AppConfig,
    ) -> Self {
        Self {
            catalog: CatalogService::new(categories, cakes, images),
            users,
            jwt: Arc::new(Hs256Jwt::new(config.jwt_secret.as_bytes(), config.jwt_ttl)),
            passwords: PasswordHasher::new(config.bcrypt_cost),
        }
    }

    /// In-memory stores and the given uploader (dev/test wiring).
    pub fn in_memory(config: &AppConfig, images: Arc<dyn ImageUploader>) -> Self {
        Self::new(
            Arc::new(InMemoryCategoryStore::new()),
            Arc::new(InMemoryCakeStore::new()),
            Arc::new(InMemoryUserStore::new()),
            images,
            config,
        )
    }
}

/// Pick store and uploader backends from configuration.
///
/// `DATABASE_URL` selects Postgres (schema created on startup); otherwise all
/// data lives in process memory. Cloudinary credentials select the real asset
/// host; otherwise uploads get deterministic placeholder URLs.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let images: Arc<dyn ImageUploader> = match &config.cloudinary {
        Some(cloudinary) => {
            info!(cloud = %cloudinary.cloud_name, "using Cloudinary image uploads");
            Arc::new(
                CloudinaryUploader::new(cloudinary.clone(), config.upload_timeout)
                    .context("failed to build asset host client")?,
            )
        }
        None => {
            warn!("Cloudinary not configured; image URLs will be placeholders");
            Arc::new(InMemoryImageUploader::default())
        }
    };

    let Some(database_url) = config.database_url.as_deref() else {
        warn!("DATABASE_URL not set; using in-memory stores");
        return Ok(AppServices::in_memory(config, images));
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")?;
    ensure_schema(&pool)
        .await
        .context("failed to create database schema")?;
    info!("connected to Postgres");

    Ok(AppServices::new(
        Arc::new(PostgresCategoryStore::new(pool.clone())),
        Arc::new(PostgresCakeStore::new(pool.clone())),
        Arc::new(PostgresUserStore::new(pool)),
        images,
        config,
    ))
}
