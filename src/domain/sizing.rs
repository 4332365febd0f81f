//! Position sizing policies.

use std::fmt;

use super::error::TraderError;

#[derive(Debug, Clone, PartialEq)]
pub enum SizingPolicy {
    /// Spend a fraction of buying power at the live price, falling back to a
    /// configured price when no live quote is available.
    PercentOfBuyingPower {
        allocation_fraction: f64,
        minimum_shares: u64,
        fallback_price_per_share: f64,
    },
    /// Always trade the same number of shares.
    FixedQuantity { shares: u64 },
}

impl SizingPolicy {
    pub fn validate(&self) -> Result<(), TraderError> {
        match *self {
            SizingPolicy::PercentOfBuyingPower {
                allocation_fraction,
                minimum_shares,
                fallback_price_per_share,
            } => {
                if !(allocation_fraction > 0.0 && allocation_fraction <= 1.0) {
                    return Err(TraderError::invalid(
                        "sizing",
                        "allocation_fraction",
                        "allocation_fraction must be in (0, 1]",
                    ));
                }
                if minimum_shares < 1 {
                    return Err(TraderError::invalid(
                        "sizing",
                        "minimum_shares",
                        "minimum_shares must be at least 1",
                    ));
                }
                if !(fallback_price_per_share.is_finite() && fallback_price_per_share > 0.0) {
                    return Err(TraderError::invalid(
                        "sizing",
                        "fallback_price_per_share",
                        "fallback_price_per_share must be positive",
                    ));
                }
                Ok(())
            }
            SizingPolicy::FixedQuantity { shares } => {
                if shares < 1 {
                    return Err(TraderError::invalid(
                        "sizing",
                        "fixed_shares",
                        "fixed_shares must be at least 1",
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Largest share count a signed position can hold.
pub const MAX_SHARES: u64 = i64::MAX as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    Live,
    Fallback,
    NotUsed,
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSource::Live => write!(f, "live"),
            PriceSource::Fallback => write!(f, "fallback"),
            PriceSource::NotUsed => write!(f, "not_used"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sizing {
    pub shares: u64,
    pub price_source: PriceSource,
}

/// Target share count for an opening leg. Never zero, never above
/// `MAX_SHARES`.
pub fn size_position(buying_power: f64, live_price: Option<f64>, policy: &SizingPolicy) -> Sizing {
    match *policy {
        SizingPolicy::PercentOfBuyingPower {
            allocation_fraction,
            minimum_shares,
            fallback_price_per_share,
        } => {
            let (price, price_source) = match live_price {
                Some(p) if p.is_finite() && p > 0.0 => (p, PriceSource::Live),
                _ => (fallback_price_per_share, PriceSource::Fallback),
            };
            let budget = buying_power.max(0.0) * allocation_fraction;
            Sizing {
                shares: whole_shares(budget, price)
                    .max(minimum_shares.max(1))
                    .min(MAX_SHARES),
                price_source,
            }
        }
        SizingPolicy::FixedQuantity { shares } => Sizing {
            shares: shares.clamp(1, MAX_SHARES),
            price_source: PriceSource::NotUsed,
        },
    }
}

fn whole_shares(budget: f64, price: f64) -> u64 {
    let raw = (budget / price).floor();
    if raw.is_finite() && raw > 0.0 {
        raw as u64
    } else {
        0
    }
}
