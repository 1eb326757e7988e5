//! Runtime configuration, read from environment variables.
//!
//! Every setting has a default so a bare `cargo run` starts an in-memory dev
//! server. Values that are present but unparsable abort startup.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::images::CloudinaryConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_JWT_SECRET: &str = "dev-secret";
pub const DEFAULT_JWT_TTL_MINUTES: i64 = 24 * 60;
pub const DEFAULT_CORS_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://localhost:8080"];
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_BCRYPT_COST: u32 = 12;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            key,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Postgres connection string. `None` selects the in-memory stores.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_ttl: chrono::Duration,
    pub cors_allowed_origins: Vec<String>,
    /// Set only when all three Cloudinary credentials are present.
    pub cloudinary: Option<CloudinaryConfig>,
    pub upload_timeout: Duration,
    pub max_upload_bytes: usize,
    pub bcrypt_cost: u32,
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("jwt_secret", &"<redacted>")
            .field("jwt_ttl", &self.jwt_ttl)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("cloudinary", &self.cloudinary)
            .field("upload_timeout", &self.upload_timeout)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            jwt_ttl: chrono::Duration::minutes(DEFAULT_JWT_TTL_MINUTES),
            cors_allowed_origins: DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
            cloudinary: None,
            upload_timeout: Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(raw) = get("BIND_ADDR") {
            config.bind_addr = raw
                .parse()
                .map_err(|e| ConfigError::invalid("BIND_ADDR", &raw, e))?;
        }

        config.database_url = get("DATABASE_URL");

        match get("JWT_SECRET") {
            Some(secret) => config.jwt_secret = secret,
            None => warn!("JWT_SECRET not set; using insecure dev default"),
        }

        if let Some(raw) = get("JWT_TTL_MINUTES") {
            let minutes: i64 = raw
                .parse()
                .map_err(|e| ConfigError::invalid("JWT_TTL_MINUTES", &raw, e))?;
            if minutes <= 0 {
                return Err(ConfigError::invalid("JWT_TTL_MINUTES", &raw, "must be positive"));
            }
            config.jwt_ttl = chrono::Duration::try_minutes(minutes)
                .ok_or_else(|| ConfigError::invalid("JWT_TTL_MINUTES", &raw, "out of range"))?;
        }

        if let Some(raw) = get("CORS_ALLOWED_ORIGINS") {
            let origins: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
            if origins.iter().any(|o| o == "*") {
                return Err(ConfigError::invalid(
                    "CORS_ALLOWED_ORIGINS",
                    &raw,
                    "wildcard origin cannot be combined with credentials",
                ));
            }
            config.cors_allowed_origins = origins;
        }

        config.cloudinary = match (
            get("CLOUDINARY_CLOUD_NAME"),
            get("CLOUDINARY_API_KEY"),
            get("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            (None, None, None) => None,
            _ => {
                warn!("incomplete Cloudinary credentials; falling back to in-memory image uploads");
                None
            }
        };

        if let Some(raw) = get("UPLOAD_TIMEOUT_SECS") {
            let secs: u64 = raw
                .parse()
                .map_err(|e| ConfigError::invalid("UPLOAD_TIMEOUT_SECS", &raw, e))?;
            config.upload_timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = get("MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = raw
                .parse()
                .map_err(|e| ConfigError::invalid("MAX_UPLOAD_BYTES", &raw, e))?;
        }

        if let Some(raw) = get("BCRYPT_COST") {
            let cost: u32 = raw
                .parse()
                .map_err(|e| ConfigError::invalid("BCRYPT_COST", &raw, e))?;
            if !(4..=31).contains(&cost) {
                return Err(ConfigError::invalid("BCRYPT_COST", &raw, "must be between 4 and 31"));
            }
            config.bcrypt_cost = cost;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert!(config.database_url.is_none());
        assert_eq!(config.jwt_secret, DEFAULT_JWT_SECRET);
        assert_eq!(config.jwt_ttl, chrono::Duration::minutes(1440));
        assert_eq!(config.cors_allowed_origins, vec!["http://localhost:3000", "http://localhost:8080"]);
        assert!(config.cloudinary.is_none());
        assert_eq!(config.upload_timeout, Duration::from_secs(30));
        assert_eq!(config.bcrypt_cost, 12);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = from_pairs(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("DATABASE_URL", "postgres://localhost/cakes"),
            ("JWT_SECRET", "s3cret"),
            ("JWT_TTL_MINUTES", "15"),
            ("CORS_ALLOWED_ORIGINS", "https://shop.example, https://admin.example"),
            ("UPLOAD_TIMEOUT_SECS", "5"),
            ("MAX_UPLOAD_BYTES", "1024"),
            ("BCRYPT_COST", "4"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/cakes"));
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.jwt_ttl, chrono::Duration::minutes(15));
        assert_eq!(config.cors_allowed_origins, vec!["https://shop.example", "https://admin.example"]);
        assert_eq!(config.upload_timeout, Duration::from_secs(5));
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.bcrypt_cost, 4);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = from_pairs(&[("DATABASE_URL", "  "), ("JWT_SECRET", "")]).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.jwt_secret, DEFAULT_JWT_SECRET);
    }

    #[test]
    fn cloudinary_needs_all_three_credentials() {
        let partial = from_pairs(&[("CLOUDINARY_CLOUD_NAME", "bakery"), ("CLOUDINARY_API_KEY", "k")]).unwrap();
        assert!(partial.cloudinary.is_none());

        let full = from_pairs(&[
            ("CLOUDINARY_CLOUD_NAME", "bakery"),
            ("CLOUDINARY_API_KEY", "k"),
            ("CLOUDINARY_API_SECRET", "s"),
        ])
        .unwrap();
        assert_eq!(full.cloudinary.unwrap().cloud_name, "bakery");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            from_pairs(&[("BIND_ADDR", "not-an-address")]),
            Err(ConfigError::Invalid { key: "BIND_ADDR", .. })
        ));
        assert!(from_pairs(&[("JWT_TTL_MINUTES", "0")]).is_err());
        assert!(from_pairs(&[("JWT_TTL_MINUTES", "ten")]).is_err());
        assert!(from_pairs(&[("BCRYPT_COST", "2")]).is_err());
        assert!(from_pairs(&[("CORS_ALLOWED_ORIGINS", "*")]).is_err());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = from_pairs(&[("JWT_SECRET", "hunter2"), ("DATABASE_URL", "postgres://u:pw@db/x")]).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("pw@db"));
    }
}
