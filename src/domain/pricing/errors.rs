use rust_decimal::Decimal;

#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("{0} must not be negative, got {1}")]
    NegativeAmount(&'static str, Decimal),

    #[error("Commission rate must be within 0..=100, got {0}")]
    InvalidCommissionRate(Decimal),

    #[error("Exchange rate must be positive, got {0}")]
    InvalidExchangeRate(Decimal),

    #[error("Rate snapshot converts {expected} but amount is in {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    #[error("Exchange rate unavailable: {0}")]
    RateUnavailable(String),
}
