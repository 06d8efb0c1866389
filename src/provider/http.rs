use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;

use crate::metrics::Metrics;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, IsTransient};
use super::{NewProduct, ProviderClient, ProviderError, ProviderProduct, Shop, UploadedAsset};

/// REST client for the provider's `/v1` API, authenticated with a bearer
/// token. Every call goes through one circuit breaker.
pub struct HttpProviderClient {
    client: Client,
    base_url: String,
    token: String,
    circuit_breaker: CircuitBreaker,
    metrics: Option<Arc<Metrics>>,
}

#[derive(Deserialize)]
struct Page<T> {
    data: Vec<T>,
}

impl HttpProviderClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        let cb_config = CircuitBreakerConfig {
            failure_threshold: 5,
            timeout: std::time::Duration::from_secs(30),
            success_threshold: 2,
        };

        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            circuit_breaker: CircuitBreaker::new(cb_config),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    async fn send_raw(request: RequestBuilder) -> Result<String, ProviderError> {
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ProviderError> {
        let request = request.bearer_auth(&self.token);
        let result = self
            .circuit_breaker
            .call(ProviderError::is_transient, Self::send_raw(request))
            .await;

        if let Some(metrics) = &self.metrics {
            metrics.update_circuit_breaker_state(self.circuit_breaker.get_state().await.as_gauge());
        }

        let body = match result {
            Ok(body) => body,
            Err(CircuitBreakerError::CircuitOpen) => {
                tracing::warn!("Circuit breaker open - provider unavailable");
                return Err(ProviderError::CircuitOpen);
            }
            Err(CircuitBreakerError::OperationFailed(e)) => return Err(e),
        };

        // Some endpoints answer with an empty body
        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(body).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn list_shops(&self) -> Result<Vec<Shop>, ProviderError> {
        self.send(self.client.get(self.url("shops.json"))).await
    }

    async fn list_products(&self, shop_id: u64) -> Result<Vec<ProviderProduct>, ProviderError> {
        let page: Page<ProviderProduct> = self
            .send(self.client.get(self.url(&format!("shops/{}/products.json", shop_id))))
            .await?;
        Ok(page.data)
    }

    async fn upload_asset(&self, file_name: &str, url: &str) -> Result<UploadedAsset, ProviderError> {
        let body = serde_json::json!({ "file_name": file_name, "url": url });
        self.send(self.client.post(self.url("uploads/images.json")).json(&body)).await
    }

    async fn create_product(&self, shop_id: u64, product: &NewProduct) -> Result<ProviderProduct, ProviderError> {
        self.send(
            self.client
                .post(self.url(&format!("shops/{}/products.json", shop_id)))
                .json(product),
        )
        .await
    }

    async fn publish_product(&self, shop_id: u64, product_id: &str) -> Result<(), ProviderError> {
        let body = serde_json::json!({
            "title": true,
            "description": true,
            "images": true,
            "variants": true,
            "tags": true,
        });
        let _: serde_json::Value = self
            .send(
                self.client
                    .post(self.url(&format!("shops/{}/products/{}/publish.json", shop_id, product_id)))
                    .json(&body),
            )
            .await?;
        Ok(())
    }

    async fn get_product(&self, shop_id: u64, product_id: &str) -> Result<ProviderProduct, ProviderError> {
        self.send(
            self.client
                .get(self.url(&format!("shops/{}/products/{}.json", shop_id, product_id))),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let client = HttpProviderClient::new("https://api.provider.test/", "token");
        assert_eq!(client.url("shops.json"), "https://api.provider.test/v1/shops.json");
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_transient() {
        let client = HttpProviderClient::new("http://127.0.0.1:9", "token");
        let err = client.list_shops().await.unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_repeated_failures_open_the_circuit() {
        let client = HttpProviderClient::new("http://127.0.0.1:9", "token");
        for _ in 0..5 {
            let _ = client.list_shops().await;
        }
        assert!(matches!(client.list_shops().await, Err(ProviderError::CircuitOpen)));
    }
}
