//! HTTP JSON 제공자 클라이언트.
//!
//! 설정된 URL에 GET 요청을 보내고 `ProviderProduct` 배열을 기대합니다.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use catalog_core::ProviderProduct;

use crate::error::{ProviderError, ProviderResult};
use crate::traits::ProviderClient;

/// HTTP 제공자 클라이언트.
#[derive(Debug, Clone)]
pub struct HttpProviderClient {
    client: Client,
    url: String,
}

impl HttpProviderClient {
    /// 요청 타임아웃이 설정된 클라이언트 생성.
    pub fn new(url: impl Into<String>, timeout: Duration) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unknown(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn get_products(&self) -> ProviderResult<Vec<ProviderProduct>> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let body = response.text().await?;
        let products: Vec<ProviderProduct> = serde_json::from_str(&body)?;
        for product in &products {
            product.validate()?;
        }

        debug!(url = %self.url, count = products.len(), "Fetched provider products");
        Ok(products)
    }
}
