use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

use crate::shopping::{MissingIngredientPolicy, ReportFormat};

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// S3 / MinIO bucket holding recipe images.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ShoppingListConfig {
    pub missing_ingredient: MissingIngredientPolicy,
    pub default_format: ReportFormat,
}

impl Default for ShoppingListConfig {
    fn default() -> Self {
        Self {
            missing_ingredient: MissingIngredientPolicy::Skip,
            default_format: ReportFormat::PlainText,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub shopping_list: ShoppingListConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "foodgram".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "foodgram-users".into()),
            ttl_minutes: parsed_or("JWT_TTL_MINUTES", 60)?,
            refresh_ttl_minutes: parsed_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14)?,
        };
        let storage = StorageConfig {
            endpoint: std::env::var("S3_ENDPOINT").unwrap_or_else(|_| "http://localhost:9000".into()),
            bucket: std::env::var("S3_BUCKET").unwrap_or_else(|_| "foodgram".into()),
            access_key: std::env::var("S3_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".into()),
            secret_key: std::env::var("S3_SECRET_KEY").unwrap_or_else(|_| "minioadmin".into()),
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };
        let defaults = ShoppingListConfig::default();
        let shopping_list = ShoppingListConfig {
            missing_ingredient: parsed_or(
                "SHOPPING_LIST_MISSING_INGREDIENT",
                defaults.missing_ingredient,
            )?,
            default_format: parsed_or("SHOPPING_LIST_DEFAULT_FORMAT", defaults.default_format)?,
        };
        Ok(Self {
            database_url,
            jwt,
            storage,
            shopping_list,
        })
    }
}

/// Reads `key` from the environment, falling back to `default` when unset.
/// A value that is set but does not parse is a configuration error.
fn parsed_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {key} value {raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_or_falls_back_when_unset() {
        let v: i64 = parsed_or("FOODGRAM_TEST_SURELY_UNSET_VAR", 42).unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn parsed_or_rejects_garbage() {
        std::env::set_var("FOODGRAM_TEST_BAD_POLICY", "sometimes");
        let err = parsed_or::<MissingIngredientPolicy>(
            "FOODGRAM_TEST_BAD_POLICY",
            MissingIngredientPolicy::Skip,
        )
        .unwrap_err();
        assert!(err.to_string().contains("FOODGRAM_TEST_BAD_POLICY"));
    }

    #[test]
    fn parsed_or_reads_policy_and_format() {
        std::env::set_var("FOODGRAM_TEST_POLICY", "fail");
        std::env::set_var("FOODGRAM_TEST_FORMAT", " pdf ");
        let policy = parsed_or("FOODGRAM_TEST_POLICY", MissingIngredientPolicy::Skip).unwrap();
        let format = parsed_or("FOODGRAM_TEST_FORMAT", ReportFormat::PlainText).unwrap();
        assert_eq!(policy, MissingIngredientPolicy::Fail);
        assert_eq!(format, ReportFormat::Document);
    }
}
