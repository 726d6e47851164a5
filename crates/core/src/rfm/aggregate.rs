//! Customer aggregation: folds a transaction snapshot into per-customer running totals.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::customer::{CustomerKey, CustomerRef};
use crate::domain::transaction::TransactionRecord;

/// How transactions without a resolvable customer identity are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkInPolicy {
    /// Fold every walk-in transaction into one synthetic customer per scope.
    #[default]
    Merge,
    /// Leave walk-in transactions out of segmentation entirely.
    Exclude,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Purchase {
    pub date: DateTime<Utc>,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomerAggregate {
    pub key: CustomerKey,
    /// Identity from the customer's most recent transaction. Always `None` for walk-ins.
    pub profile: Option<CustomerRef>,
    /// Purchases ordered by date, oldest first.
    pub purchases: Vec<Purchase>,
    pub total_spent: Decimal,
    pub last_purchase_at: DateTime<Utc>,
}

impl CustomerAggregate {
    fn opened(key: CustomerKey, profile: Option<&CustomerRef>, purchase: Purchase) -> Self {
        let profile = if key.is_walk_in() { None } else { profile.cloned() };
        Self {
            key,
            profile,
            total_spent: purchase.amount,
            last_purchase_at: purchase.date,
            purchases: vec![purchase],
        }
    }

    fn absorb(mut self, profile: Option<&CustomerRef>, purchase: Purchase) -> Self {
        if purchase.date > self.last_purchase_at {
            self.last_purchase_at = purchase.date;
            if !self.key.is_walk_in() {
                if let Some(profile) = profile {
                    self.profile = Some(profile.clone());
                }
            }
        }
        self.total_spent = self.total_spent.saturating_add(purchase.amount);
        let position = self.purchases.partition_point(|existing| existing.date <= purchase.date);
        self.purchases.insert(position, purchase);
        self
    }

    pub fn transaction_count(&self) -> usize {
        self.purchases.len()
    }
}

/// Counters describing what a run did with the records it was handed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDiagnostics {
    pub transactions_seen: usize,
    pub transactions_aggregated: usize,
    pub excluded_missing_timestamp: usize,
    pub excluded_without_line_items: usize,
    pub excluded_walk_in: usize,
    pub excluded_undecodable: usize,
    pub zeroed_amounts: usize,
}

impl RunDiagnostics {
    pub fn excluded_total(&self) -> usize {
        self.excluded_missing_timestamp
            + self.excluded_without_line_items
            + self.excluded_walk_in
            + self.excluded_undecodable
    }

    /// Accounts for snapshot entries the source could not decode into records.
    pub fn record_undecodable(&mut self, count: usize) {
        self.transactions_seen += count;
        self.excluded_undecodable += count;
    }
}

/// Sums money without panicking; totals past the `Decimal` range clamp to its bounds.
pub fn saturating_total(amounts: impl IntoIterator<Item = Decimal>) -> Decimal {
    amounts.into_iter().fold(Decimal::ZERO, Decimal::saturating_add)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Aggregation {
    pub customers: BTreeMap<CustomerKey, CustomerAggregate>,
    pub diagnostics: RunDiagnostics,
}

impl Aggregation {
    fn absorb(mut self, record: &TransactionRecord, policy: WalkInPolicy) -> Self {
        self.diagnostics.transactions_seen += 1;

        let Some(occurred_at) = record.occurred_at else {
            self.diagnostics.excluded_missing_timestamp += 1;
            debug!(
                event_name = "rfm.record.excluded",
                transaction_id = %record.id.0,
                reason = "missing_timestamp",
                "transaction excluded from aggregation"
            );
            return self;
        };

        if record.line_items.is_empty() {
            self.diagnostics.excluded_without_line_items += 1;
            debug!(
                event_name = "rfm.record.excluded",
                transaction_id = %record.id.0,
                reason = "no_line_items",
                "transaction excluded from aggregation"
            );
            return self;
        }

        let key = CustomerKey::for_ref(record.customer.as_ref());
        if key.is_walk_in() && policy == WalkInPolicy::Exclude {
            self.diagnostics.excluded_walk_in += 1;
            return self;
        }

        let amount = match record.transaction_total() {
            Some(total) => total,
            None => {
                self.diagnostics.zeroed_amounts += 1;
                warn!(
                    event_name = "rfm.amount.zeroed",
                    transaction_id = %record.id.0,
                    customer = %key,
                    "non-finite or overflowing amount, transaction counted with zero value"
                );
                Decimal::ZERO
            }
        };

        let purchase = Purchase { date: occurred_at, amount };
        let profile = record.customer.as_ref();
        let aggregate = match self.customers.remove(&key) {
            Some(existing) => existing.absorb(profile, purchase),
            None => CustomerAggregate::opened(key.clone(), profile, purchase),
        };
        self.customers.insert(key, aggregate);
        self.diagnostics.transactions_aggregated += 1;
        self
    }
}

/// Groups transactions by customer identity.
///
/// Each step takes the accumulated state by value and hands back the next one, so
/// the result is a freshly built mapping with no state shared across calls.
pub fn aggregate_transactions(records: &[TransactionRecord], policy: WalkInPolicy) -> Aggregation {
    let aggregation =
        records.iter().fold(Aggregation::default(), |state, record| state.absorb(record, policy));

    debug!(
        event_name = "rfm.aggregate.completed",
        customers = aggregation.customers.len(),
        transactions_seen = aggregation.diagnostics.transactions_seen,
        excluded = aggregation.diagnostics.excluded_total(),
        zeroed_amounts = aggregation.diagnostics.zeroed_amounts,
        "transactions aggregated by customer"
    );

    aggregation
}
