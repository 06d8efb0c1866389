use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::utils::IsTransient;

pub mod http;

#[cfg(test)]
pub(crate) mod fake;

pub use http::HttpProviderClient;

// ============================================================================
// Fulfillment Provider Client
// ============================================================================
//
// The manufacturing side: shops, products, uploaded artwork. Amounts on this
// API are integer cents of the provider currency.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Provider unreachable: {0}")]
    Network(String),

    #[error("Unexpected provider response: {0}")]
    Decode(String),

    #[error("Provider circuit breaker is open")]
    CircuitOpen,
}

impl IsTransient for ProviderError {
    fn is_transient(&self) -> bool {
        match self {
            ProviderError::Http { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Network(_) | ProviderError::CircuitOpen => true,
            ProviderError::Decode(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shop {
    pub id: u64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedAsset {
    pub id: String,
    pub preview_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductImage {
    pub src: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderProduct {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewVariant {
    pub id: u64,
    /// Retail price the provider shows, in cents
    pub price: i64,
    pub is_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedImage {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    pub angle: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placeholder {
    pub position: String,
    pub images: Vec<PlacedImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrintArea {
    pub variant_ids: Vec<u64>,
    pub placeholders: Vec<Placeholder>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProduct {
    pub title: String,
    pub description: String,
    pub blueprint_id: u64,
    pub print_provider_id: u64,
    pub variants: Vec<NewVariant>,
    pub print_areas: Vec<PrintArea>,
}

impl NewProduct {
    /// One centred front print of `asset_id` across every variant.
    pub fn front_print(
        title: &str,
        description: &str,
        blueprint_id: u64,
        print_provider_id: u64,
        variants: Vec<NewVariant>,
        asset_id: &str,
    ) -> Self {
        let variant_ids = variants.iter().map(|v| v.id).collect();
        Self {
            title: title.to_string(),
            description: description.to_string(),
            blueprint_id,
            print_provider_id,
            variants,
            print_areas: vec![PrintArea {
                variant_ids,
                placeholders: vec![Placeholder {
                    position: "front".to_string(),
                    images: vec![PlacedImage {
                        id: asset_id.to_string(),
                        x: 0.5,
                        y: 0.5,
                        scale: 1.0,
                        angle: 0.0,
                    }],
                }],
            }],
        }
    }
}

#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn list_shops(&self) -> Result<Vec<Shop>, ProviderError>;

    async fn list_products(&self, shop_id: u64) -> Result<Vec<ProviderProduct>, ProviderError>;

    /// Upload artwork by URL; the provider fetches it.
    async fn upload_asset(&self, file_name: &str, url: &str) -> Result<UploadedAsset, ProviderError>;

    async fn create_product(&self, shop_id: u64, product: &NewProduct) -> Result<ProviderProduct, ProviderError>;

    /// Ask the provider to push the product to its sales channel.
    async fn publish_product(&self, shop_id: u64, product_id: &str) -> Result<(), ProviderError>;

    async fn get_product(&self, shop_id: u64, product_id: &str) -> Result<ProviderProduct, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Http { status: 503, body: String::new() }.is_transient());
        assert!(ProviderError::Http { status: 429, body: String::new() }.is_transient());
        assert!(!ProviderError::Http { status: 404, body: String::new() }.is_transient());
        assert!(!ProviderError::Decode("bad json".into()).is_transient());
        assert!(ProviderError::CircuitOpen.is_transient());
    }

    #[test]
    fn test_front_print_covers_all_variants() {
        let product = NewProduct::front_print(
            "Tee",
            "",
            6,
            99,
            vec![
                NewVariant { id: 1, price: 2400, is_enabled: true },
                NewVariant { id: 2, price: 2600, is_enabled: true },
            ],
            "asset-1",
        );
        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["print_areas"][0]["variant_ids"], serde_json::json!([1, 2]));
        assert_eq!(json["print_areas"][0]["placeholders"][0]["images"][0]["id"], "asset-1");
    }
}
