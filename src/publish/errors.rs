use uuid::Uuid;

use crate::domain::pricing::PricingError;
use crate::provider::ProviderError;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Design request not found: {0}")]
    NotFound(Uuid),

    #[error("Design request already published: {0}")]
    AlreadyPublished(Uuid),

    #[error("Design request has no design image: {0}")]
    MissingDesign(Uuid),

    #[error("Design request has no enabled variants: {0}")]
    NoEnabledVariants(Uuid),

    #[error("A publish of {0} is already running")]
    InProgress(Uuid),

    #[error("Provider step '{step}' failed: {source}")]
    Provider {
        step: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("Pricing failed: {0}")]
    Pricing(#[from] PricingError),

    #[error("Provider product {provider_product_id} was created for {id} but could not be recorded")]
    Unrecorded { id: Uuid, provider_product_id: String },

    #[error("Catalog listing for {0} could not be written; left in catalog_pending")]
    CatalogPending(Uuid),

    #[error("Store error: {0:#}")]
    Store(#[from] anyhow::Error),
}
