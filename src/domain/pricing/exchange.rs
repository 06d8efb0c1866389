use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::commission::round_money;
use super::errors::PricingError;

// ============================================================================
// Exchange Rates
// ============================================================================
//
// Manufacturing costs arrive in the provider's currency. Orders are priced in
// the local currency. The rate used for an order is captured once, as a
// `RateSnapshot`, and stored on the order; re-deriving an old order's totals
// never consults the live rate.
//
// ============================================================================

/// A single exchange rate, frozen at the moment it was read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    /// Currency the amount is in (provider currency), e.g. "USD"
    pub from_currency: String,
    /// Currency the amount is converted to (local currency), e.g. "INR"
    pub to_currency: String,
    /// Units of `to_currency` per one unit of `from_currency`
    pub rate: Decimal,
    pub captured_at: DateTime<Utc>,
}

impl RateSnapshot {
    pub fn new(
        from_currency: impl Into<String>,
        to_currency: impl Into<String>,
        rate: Decimal,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, PricingError> {
        if rate <= Decimal::ZERO {
            return Err(PricingError::InvalidExchangeRate(rate));
        }
        Ok(Self {
            from_currency: from_currency.into().to_uppercase(),
            to_currency: to_currency.into().to_uppercase(),
            rate,
            captured_at,
        })
    }

    /// Identity rate, used when provider and local currency coincide.
    pub fn identity(currency: impl Into<String>, captured_at: DateTime<Utc>) -> Self {
        let currency = currency.into().to_uppercase();
        Self {
            from_currency: currency.clone(),
            to_currency: currency,
            rate: Decimal::ONE,
            captured_at,
        }
    }

    /// Convert an amount expressed in `from_currency`, rounded to cents.
    pub fn convert(&self, amount: Decimal, currency: &str) -> Result<Decimal, PricingError> {
        if !currency.eq_ignore_ascii_case(&self.from_currency) {
            return Err(PricingError::CurrencyMismatch {
                expected: self.from_currency.clone(),
                actual: currency.to_string(),
            });
        }
        Ok(round_money(amount * self.rate))
    }
}

/// Source of current exchange rates. Injected wherever a new order or a new
/// listing needs to be priced.
#[async_trait]
pub trait ExchangeRateProvider: Send + Sync {
    async fn current(&self, from_currency: &str, to_currency: &str) -> Result<RateSnapshot, PricingError>;
}

// ============================================================================
// Fixed rates (configuration / tests)
// ============================================================================

pub struct FixedRateProvider {
    rates: HashMap<(String, String), Decimal>,
}

impl FixedRateProvider {
    pub fn new() -> Self {
        Self { rates: HashMap::new() }
    }

    pub fn with_rate(mut self, from: &str, to: &str, rate: Decimal) -> Self {
        self.rates.insert((from.to_uppercase(), to.to_uppercase()), rate);
        self
    }
}

impl Default for FixedRateProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeRateProvider for FixedRateProvider {
    async fn current(&self, from_currency: &str, to_currency: &str) -> Result<RateSnapshot, PricingError> {
        if from_currency.eq_ignore_ascii_case(to_currency) {
            return Ok(RateSnapshot::identity(from_currency, Utc::now()));
        }
        let key = (from_currency.to_uppercase(), to_currency.to_uppercase());
        let rate = self.rates.get(&key).copied().ok_or_else(|| {
            PricingError::RateUnavailable(format!("no fixed rate for {}->{}", key.0, key.1))
        })?;
        RateSnapshot::new(key.0, key.1, rate, Utc::now())
    }
}

// ============================================================================
// HTTP rate source with a TTL cache
// ============================================================================

#[derive(Deserialize)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

/// Reads `GET {url}?base=<FROM>` returning `{"rates": {"<TO>": <f64>, ...}}`.
///
/// A refreshed rate replaces the cached one; orders that already captured a
/// snapshot are unaffected. When the source is down a stale cached rate is
/// served, then the configured fallback.
pub struct HttpRateProvider {
    client: reqwest::Client,
    url: String,
    ttl: Duration,
    fallback: Option<FixedRateProvider>,
    cache: RwLock<HashMap<(String, String), RateSnapshot>>,
}

impl HttpRateProvider {
    pub fn new(url: impl Into<String>, ttl: Duration, fallback: Option<FixedRateProvider>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            ttl,
            fallback,
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn fetch(&self, from: &str, to: &str) -> Result<RateSnapshot, PricingError> {
        let response: RatesResponse = self
            .client
            .get(&self.url)
            .query(&[("base", from)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PricingError::RateUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| PricingError::RateUnavailable(e.to_string()))?;

        let raw = response
            .rates
            .get(to)
            .copied()
            .ok_or_else(|| PricingError::RateUnavailable(format!("{} missing from response", to)))?;
        let rate = Decimal::from_f64(raw)
            .map(|r| r.round_dp(6))
            .ok_or_else(|| PricingError::RateUnavailable(format!("unrepresentable rate {}", raw)))?;

        RateSnapshot::new(from, to, rate, Utc::now())
    }
}

#[async_trait]
impl ExchangeRateProvider for HttpRateProvider {
    async fn current(&self, from_currency: &str, to_currency: &str) -> Result<RateSnapshot, PricingError> {
        if from_currency.eq_ignore_ascii_case(to_currency) {
            return Ok(RateSnapshot::identity(from_currency, Utc::now()));
        }
        let key = (from_currency.to_uppercase(), to_currency.to_uppercase());

        let cached = self.cache.read().await.get(&key).cloned();
        if let Some(snapshot) = &cached {
            if Utc::now() - snapshot.captured_at < self.ttl {
                return Ok(snapshot.clone());
            }
        }

        match self.fetch(&key.0, &key.1).await {
            Ok(snapshot) => {
                tracing::debug!(
                    from = %snapshot.from_currency,
                    to = %snapshot.to_currency,
                    rate = %snapshot.rate,
                    "Refreshed exchange rate"
                );
                self.cache.write().await.insert(key, snapshot.clone());
                Ok(snapshot)
            }
            Err(e) => {
                if let Some(stale) = cached {
                    tracing::warn!(error = %e, captured_at = %stale.captured_at, "Rate refresh failed, serving stale rate");
                    return Ok(stale);
                }
                match &self.fallback {
                    Some(fallback) => {
                        tracing::warn!(error = %e, "Rate refresh failed, using configured fallback rate");
                        fallback.current(&key.0, &key.1).await
                    }
                    None => Err(e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_convert_rounds_to_cents() {
        let snapshot = RateSnapshot::new("usd", "inr", d("83.1234"), Utc::now()).unwrap();
        assert_eq!(snapshot.from_currency, "USD");
        assert_eq!(snapshot.convert(d("10.50"), "USD").unwrap(), d("872.80"));
    }

    #[test]
    fn test_convert_rejects_wrong_currency() {
        let snapshot = RateSnapshot::new("USD", "INR", d("83"), Utc::now()).unwrap();
        assert!(matches!(
            snapshot.convert(d("1"), "EUR"),
            Err(PricingError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_snapshot_rejects_non_positive_rate() {
        assert!(RateSnapshot::new("USD", "INR", Decimal::ZERO, Utc::now()).is_err());
    }

    #[test]
    fn test_snapshot_is_frozen_once_serialized() {
        let captured_at = Utc::now() - Duration::days(30);
        let snapshot = RateSnapshot::new("USD", "INR", d("80"), captured_at).unwrap();
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: RateSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, snapshot);
        assert_eq!(restored.convert(d("60"), "USD").unwrap(), d("4800.00"));
    }

    #[tokio::test]
    async fn test_fixed_provider() {
        let provider = FixedRateProvider::new().with_rate("USD", "INR", d("83"));
        let snapshot = provider.current("usd", "INR").await.unwrap();
        assert_eq!(snapshot.rate, d("83"));

        let same = provider.current("INR", "inr").await.unwrap();
        assert_eq!(same.rate, Decimal::ONE);

        assert!(provider.current("EUR", "INR").await.is_err());
    }

    #[tokio::test]
    async fn test_http_provider_falls_back_when_unreachable() {
        let provider = HttpRateProvider::new(
            "http://127.0.0.1:9/rates",
            Duration::minutes(10),
            Some(FixedRateProvider::new().with_rate("USD", "INR", d("82.5"))),
        );
        let snapshot = provider.current("USD", "INR").await.unwrap();
        assert_eq!(snapshot.rate, d("82.5"));
    }
}
