use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{AiRegistryError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_PAGE_SIZE: i64 = 10;
const DEFAULT_MAX_PAGE_SIZE: i64 = 100;
const DEFAULT_TODAY_COUNT: i64 = 4;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub sqlite_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollaboratorConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl CollaboratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeout_seconds
                .unwrap_or(DEFAULT_TIMEOUT_SECONDS)
                .max(1),
        )
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlockchainConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_seconds: Option<u64>,
    /// Explorer root used to render `tx_url`; the raw digest is stored when unset.
    pub explorer_url: Option<String>,
}

impl BlockchainConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeout_seconds
                .unwrap_or(DEFAULT_TIMEOUT_SECONDS)
                .max(1),
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ListingConfig {
    pub default_page_size: Option<i64>,
    pub max_page_size: Option<i64>,
    pub today_count: Option<i64>,
}

impl ListingConfig {
    pub fn default_page_size(&self) -> i64 {
        self.default_page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1)
    }

    pub fn max_page_size(&self) -> i64 {
        self.max_page_size.unwrap_or(DEFAULT_MAX_PAGE_SIZE).max(1)
    }

    pub fn today_count(&self) -> i64 {
        self.today_count.unwrap_or(DEFAULT_TODAY_COUNT).max(1)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub database: Option<DatabaseConfig>,
    pub embedding: CollaboratorConfig,
    pub blockchain: BlockchainConfig,
    pub listing: Option<ListingConfig>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| AiRegistryError::Config(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| AiRegistryError::Config(e.to_string()))?;
        Ok(config)
    }

    pub fn from_store(db_path: &str) -> Result<Self> {
        crate::config_store::load_config(db_path)
    }

    pub fn sqlite_path(&self) -> String {
        self.database
            .as_ref()
            .and_then(|db| db.sqlite_path.as_deref())
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(str::to_string)
            .unwrap_or_else(default_db_path)
    }

    pub fn listing(&self) -> ListingConfig {
        self.listing.clone().unwrap_or_default()
    }

    /// Local defaults pointing at collaborators on the loopback interface.
    pub fn local_default(db_path: &str) -> Self {
        Self {
            database: Some(DatabaseConfig {
                sqlite_path: Some(db_path.to_string()),
            }),
            embedding: CollaboratorConfig {
                base_url: "http://127.0.0.1:8001".to_string(),
                api_key: None,
                timeout_seconds: Some(DEFAULT_TIMEOUT_SECONDS),
            },
            blockchain: BlockchainConfig {
                base_url: "http://127.0.0.1:8002".to_string(),
                api_key: None,
                timeout_seconds: Some(DEFAULT_TIMEOUT_SECONDS),
                explorer_url: None,
            },
            listing: Some(ListingConfig::default()),
        }
    }
}

pub fn default_db_path() -> String {
    "./data/ai-registry.db".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_defaults_and_clamps() {
        let listing = ListingConfig::default();
        assert_eq!(listing.default_page_size(), 10);
        assert_eq!(listing.max_page_size(), 100);
        assert_eq!(listing.today_count(), 4);

        let listing = ListingConfig {
            default_page_size: Some(0),
            max_page_size: Some(-3),
            today_count: None,
        };
        assert_eq!(listing.default_page_size(), 1);
        assert_eq!(listing.max_page_size(), 1);
    }

    #[test]
    fn parses_minimal_json() {
        let config: Config = serde_json::from_str(
            r#"{
                "embedding": {"base_url": "http://embed"},
                "blockchain": {"base_url": "http://chain", "explorer_url": "https://scan"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.sqlite_path(), default_db_path());
        assert_eq!(config.embedding.timeout(), Duration::from_secs(30));
        assert_eq!(config.blockchain.explorer_url.as_deref(), Some("https://scan"));
    }
}
