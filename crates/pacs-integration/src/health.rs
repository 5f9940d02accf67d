//! HTTP 可达性检查

use async_trait::async_trait;
use pacs_core::{HealthCheck, PacsError, Result};
use std::time::Duration;

/// 对一个 URL 发起 GET，2xx 视为可达
#[derive(Debug, Clone)]
pub struct HttpHealthCheck {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl HttpHealthCheck {
    pub fn new(name: impl Into<String>, url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PacsError::Config(format!("无法创建HTTP客户端: {}", e)))?;

        Ok(Self {
            name: name.into(),
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl HealthCheck for HttpHealthCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_reachable(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
