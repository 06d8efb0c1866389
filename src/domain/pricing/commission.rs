use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

use super::errors::PricingError;

// ============================================================================
// Commission Split
// ============================================================================
//
// profit             = max(0, selling - base)
// creator_commission = round(profit * rate / 100, 2)
// platform_fee       = profit - creator_commission
//
// The platform fee is derived by subtraction so any rounding residue lands on
// the platform side. The creator's share is never reduced by rounding.
//
// ============================================================================

/// Money is carried with two decimal places (cents).
pub const MONEY_DP: u32 = 2;

/// Round a monetary amount to cents, half away from zero.
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a cent count (provider payloads use integer cents) into money.
#[inline]
pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, MONEY_DP)
}

/// Convert money into integer cents for counter storage.
#[inline]
pub fn to_cents(value: Decimal) -> i64 {
    (round_money(value) * Decimal::ONE_HUNDRED)
        .to_i64()
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSplit {
    pub profit: Decimal,
    pub creator_commission: Decimal,
    pub platform_fee: Decimal,
}

impl CommissionSplit {
    pub const ZERO: CommissionSplit = CommissionSplit {
        profit: Decimal::ZERO,
        creator_commission: Decimal::ZERO,
        platform_fee: Decimal::ZERO,
    };
}

/// Split the profit of one sale between creator and platform.
pub fn split(
    selling_price: Decimal,
    base_cost: Decimal,
    commission_rate_percent: Decimal,
) -> Result<CommissionSplit, PricingError> {
    if selling_price.is_sign_negative() {
        return Err(PricingError::NegativeAmount("selling_price", selling_price));
    }
    if base_cost.is_sign_negative() {
        return Err(PricingError::NegativeAmount("base_cost", base_cost));
    }
    if commission_rate_percent.is_sign_negative() || commission_rate_percent > Decimal::ONE_HUNDRED {
        return Err(PricingError::InvalidCommissionRate(commission_rate_percent));
    }

    let profit = round_money((selling_price - base_cost).max(Decimal::ZERO));
    let creator_commission = round_money(profit * commission_rate_percent / Decimal::ONE_HUNDRED);
    let platform_fee = profit - creator_commission;

    Ok(CommissionSplit {
        profit,
        creator_commission,
        platform_fee,
    })
}

/// Split for `quantity` units of the same line.
///
/// Totals are computed on the line amounts rather than per unit so the line
/// is rounded once.
pub fn split_line(
    unit_selling_price: Decimal,
    unit_base_cost: Decimal,
    quantity: u32,
    commission_rate_percent: Decimal,
) -> Result<CommissionSplit, PricingError> {
    let qty = Decimal::from(quantity);
    split(unit_selling_price * qty, unit_base_cost * qty, commission_rate_percent)
}

/// Provider-side retail price, in provider currency cents, for a variant
/// costing `cost_cents`.
pub fn retail_price_cents(cost_cents: i64, markup_percent: Decimal) -> i64 {
    let cost = from_cents(cost_cents);
    let price = cost + cost * markup_percent / Decimal::ONE_HUNDRED;
    // round up to a whole cent so the markup is never shaved
    (price * Decimal::ONE_HUNDRED).ceil().to_i64().unwrap_or(cost_cents)
}
