// ============================================================================
// Provider webhooks: signature check, envelope parsing, dispatch
// ============================================================================

pub mod envelope;
pub mod gateway;
pub mod signature;

#[cfg(test)]
mod tests;

pub use envelope::ProviderEvent;
pub use gateway::{Disposition, GatewaySettings, WebhookAck, WebhookError, WebhookGateway};
pub use signature::SIGNATURE_HEADER;
