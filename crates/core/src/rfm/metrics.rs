use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::rfm::aggregate::CustomerAggregate;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RfmMetrics {
    pub recency_days: u32,
    pub frequency: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub monetary: Decimal,
}

impl RfmMetrics {
    /// Derives the three metrics for one customer against the run's reference instant.
    ///
    /// Recency is whole elapsed days, truncated and clamped at zero for purchases
    /// stamped after `now`. Monetary is clamped at zero when refunds outweigh sales.
    pub fn from_aggregate(aggregate: &CustomerAggregate, now: DateTime<Utc>) -> Self {
        let elapsed_days = (now - aggregate.last_purchase_at).num_days().max(0);

        Self {
            recency_days: u32::try_from(elapsed_days).unwrap_or(u32::MAX),
            frequency: u32::try_from(aggregate.transaction_count()).unwrap_or(u32::MAX),
            monetary: aggregate.total_spent.max(Decimal::ZERO),
        }
    }
}
