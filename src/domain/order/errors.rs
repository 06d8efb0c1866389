use super::value_objects::OrderStatus;
use crate::domain::pricing::PricingError;

// ============================================================================
// Order Business Rule Errors
// ============================================================================
//
// None of these abort a webhook: the gateway logs them and acknowledges.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order is {current} (terminal); refusing {attempted}")]
    TerminalState {
        current: OrderStatus,
        attempted: &'static str,
    },

    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Unrecognized provider status: {0:?}")]
    UnrecognizedProviderStatus(String),

    #[error("Order already opened")]
    AlreadyOpened,

    #[error("Aggregate not initialized")]
    NotInitialized,

    #[error("Invalid item quantity for line {line_id}: {quantity}")]
    InvalidQuantity { line_id: String, quantity: u32 },

    #[error("Pricing failed: {0}")]
    Pricing(#[from] PricingError),

    #[error("Order invariant violated: {0}")]
    InvariantViolation(String),
}
