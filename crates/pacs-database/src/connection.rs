//! 数据库连接管理

use pacs_core::{PacsError, Result};
use serde::{Deserialize, Serialize};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// 连接池配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 20,
            min_connections: 5,
            connect_timeout_secs: 10,
            idle_timeout_secs: 300,
            max_lifetime_secs: 3600,
        }
    }
}

impl PoolSettings {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// 连接医院信息系统数据库 (MySQL)
pub async fn connect_hospital(settings: &PoolSettings) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(settings.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(settings.max_lifetime_secs))
        .connect(&settings.url)
        .await
        .map_err(|e| PacsError::Database(format!("无法连接医院数据库: {}", e)))?;

    info!("Connected to hospital database");
    Ok(pool)
}

/// 连接派发台账数据库 (PostgreSQL)
pub async fn connect_ledger(settings: &PoolSettings) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(settings.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(settings.max_lifetime_secs))
        .connect(&settings.url)
        .await
        .map_err(|e| PacsError::Database(format!("无法连接台账数据库: {}", e)))?;

    info!("Connected to ledger database");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_settings_defaults() {
        let settings = PoolSettings::with_url("mysql://root@localhost/sik");
        assert_eq!(settings.url, "mysql://root@localhost/sik");
        assert_eq!(settings.max_connections, 20);
        assert_eq!(settings.min_connections, 5);
        assert_eq!(settings.idle_timeout_secs, 300);
        assert_eq!(settings.max_lifetime_secs, 3600);
    }
}
