use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Design Request - a creator's design waiting to become a sellable product
// ============================================================================
//
// Draft -> ProductCreated -> (CatalogPending) -> Published
//
// `ProductCreated` and `CatalogPending` are resumable: a later publish call
// skips the provider steps already done instead of creating a second
// provider product.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Draft,
    /// Provider product exists; external publish and listing may be missing
    ProductCreated,
    /// Listing write exhausted its retries; needs manual reconciliation
    CatalogPending,
    Published,
}

impl PublishStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::Draft => "draft",
            PublishStatus::ProductCreated => "product_created",
            PublishStatus::CatalogPending => "catalog_pending",
            PublishStatus::Published => "published",
        }
    }
}

impl std::fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSpec {
    pub variant_id: u64,
    /// Manufacturing cost in provider-currency cents
    pub cost_cents: i64,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignRequest {
    pub id: Uuid,
    pub creator_id: String,
    pub title: String,
    pub description: String,
    pub design_image_url: Option<String>,

    pub blueprint_id: u64,
    pub print_provider_id: u64,
    pub variants: Vec<VariantSpec>,

    pub commission_rate: Decimal,
    /// Explicit local selling price; derived from cost and markup when absent
    pub selling_price: Option<Decimal>,
    pub markup_percent: Decimal,
    pub subcategory: Option<String>,

    pub status: PublishStatus,
    pub provider_asset_id: Option<String>,
    pub provider_product_id: Option<String>,
    pub externally_published: bool,
    pub store_product_id: Option<Uuid>,
    pub store_url: Option<String>,
    pub mockup_images: Vec<String>,
    /// Images on file before the provider renders mockups
    pub placeholder_images: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl DesignRequest {
    pub fn enabled_variants(&self) -> impl Iterator<Item = &VariantSpec> {
        self.variants.iter().filter(|v| v.enabled)
    }

    /// Cheapest enabled variant cost; the listing's base manufacturing cost.
    pub fn base_cost_cents(&self) -> Option<i64> {
        self.enabled_variants().map(|v| v.cost_cents).min()
    }

    pub fn images(&self) -> &[String] {
        if self.mockup_images.is_empty() {
            &self.placeholder_images
        } else {
            &self.mockup_images
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn design_request(creator_id: &str) -> DesignRequest {
        DesignRequest {
            id: Uuid::new_v4(),
            creator_id: creator_id.to_string(),
            title: "Lecture Notes Tee".to_string(),
            description: "Organic cotton".to_string(),
            design_image_url: Some("https://cdn.example.com/designs/tee.png".to_string()),
            blueprint_id: 6,
            print_provider_id: 99,
            variants: vec![
                VariantSpec { variant_id: 12100, cost_cents: 1250, enabled: true },
                VariantSpec { variant_id: 12101, cost_cents: 1100, enabled: true },
                VariantSpec { variant_id: 12102, cost_cents: 900, enabled: false },
            ],
            commission_rate: Decimal::from(70),
            selling_price: None,
            markup_percent: Decimal::from(100),
            subcategory: Some("apparel".to_string()),
            status: PublishStatus::Draft,
            provider_asset_id: None,
            provider_product_id: None,
            externally_published: false,
            store_product_id: None,
            store_url: None,
            mockup_images: Vec::new(),
            placeholder_images: vec!["https://cdn.example.com/placeholders/tee.png".to_string()],
            published_at: None,
            last_error: None,
        }
    }

    #[test]
    fn test_base_cost_ignores_disabled_variants() {
        let request = design_request("creator-1");
        assert_eq!(request.base_cost_cents(), Some(1100));
    }

    #[test]
    fn test_images_fall_back_to_placeholders() {
        let mut request = design_request("creator-1");
        assert_eq!(request.images().len(), 1);
        request.mockup_images = vec!["a.png".into(), "b.png".into()];
        assert_eq!(request.images().len(), 2);
    }
}
