use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::customer::CustomerRef;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

/// A single monetary line on a transaction.
///
/// Amounts arrive as raw floats from the data collaborator. Non-numeric text or a
/// missing amount decodes to `NaN` so the corruption stays visible to aggregation
/// instead of failing the whole snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "missing_amount", deserialize_with = "lenient_amount")]
    pub amount: f64,
}

impl LineItem {
    pub fn new(amount: f64) -> Self {
        Self { description: None, amount }
    }

    /// Returns `None` when the raw amount is not a finite number.
    pub fn decimal_amount(&self) -> Option<Decimal> {
        if !self.amount.is_finite() {
            return None;
        }
        Decimal::from_f64(self.amount)
    }
}

/// A sale as handed over by the data collaborator.
///
/// An unparseable timestamp decodes to `None` and a `null` line list to an empty
/// one, so both reach aggregation as countable malformed records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    #[serde(default)]
    pub customer: Option<CustomerRef>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_line_items")]
    pub line_items: Vec<LineItem>,
}

impl TransactionRecord {
    pub fn new(id: impl Into<String>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            id: TransactionId(id.into()),
            customer: None,
            occurred_at: Some(occurred_at),
            line_items: Vec::new(),
        }
    }

    pub fn for_customer(mut self, customer: CustomerRef) -> Self {
        self.customer = Some(customer);
        self
    }

    pub fn with_line(mut self, amount: f64) -> Self {
        self.line_items.push(LineItem::new(amount));
        self
    }

    /// Sum of line item amounts, or `None` if any line carries a corrupted amount
    /// or the sum leaves the `Decimal` range.
    pub fn transaction_total(&self) -> Option<Decimal> {
        self.line_items
            .iter()
            .try_fold(Decimal::ZERO, |total, line| total.checked_add(line.decimal_amount()?))
    }
}

fn missing_amount() -> f64 {
    f64::NAN
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Number(f64),
    Text(String),
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawAmount>::deserialize(deserializer)?;
    Ok(match raw {
        Some(RawAmount::Number(value)) => value,
        Some(RawAmount::Text(text)) => text.trim().parse::<f64>().unwrap_or(f64::NAN),
        None => f64::NAN,
    })
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(Value::as_str).and_then(|text| text.trim().parse().ok()))
}

fn lenient_line_items<'de, D>(deserializer: D) -> Result<Vec<LineItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<LineItem>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{LineItem, TransactionRecord};

    #[test]
    fn total_sums_line_items() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let record = TransactionRecord::new("tx-1", at).with_line(19.75).with_line(5.25);

        assert_eq!(record.transaction_total(), Some(Decimal::new(2500, 2)));
    }

    #[test]
    fn corrupted_line_poisons_only_its_transaction_total() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let record = TransactionRecord::new("tx-2", at).with_line(10.0).with_line(f64::INFINITY);

        assert_eq!(record.transaction_total(), None);
        assert_eq!(LineItem::new(f64::NAN).decimal_amount(), None);
    }

    #[test]
    fn decodes_text_and_missing_amounts_leniently() {
        let record: TransactionRecord = serde_json::from_str(
            r#"{
                "id": "tx-3",
                "occurred_at": "2024-03-01T12:00:00Z",
                "line_items": [{"amount": "12.50"}, {"amount": "n/a"}, {}]
            }"#,
        )
        .expect("record should decode");

        assert_eq!(record.line_items[0].decimal_amount(), Some(Decimal::new(1250, 2)));
        assert!(record.line_items[1].amount.is_nan());
        assert!(record.line_items[2].amount.is_nan());
        assert!(record.customer.is_none());
    }

    #[test]
    fn overflowing_total_is_treated_as_corrupted() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let record = TransactionRecord::new("tx-4", at).with_line(5e28).with_line(5e28);

        assert!(record.line_items.iter().all(|line| line.decimal_amount().is_some()));
        assert_eq!(record.transaction_total(), None);
    }

    #[test]
    fn unparseable_timestamp_and_null_lines_decode_as_malformed() {
        let record: TransactionRecord = serde_json::from_str(
            r#"{"id": "tx-5", "occurred_at": "not-a-date", "line_items": null}"#,
        )
        .expect("record should decode");
        let numeric: TransactionRecord =
            serde_json::from_str(r#"{"id": "tx-6", "occurred_at": 1709294400, "line_items": []}"#)
                .expect("record should decode");

        assert_eq!(record.occurred_at, None);
        assert!(record.line_items.is_empty());
        assert_eq!(numeric.occurred_at, None);
    }

    #[test]
    fn timestamps_with_offsets_normalize_to_utc() {
        let record: TransactionRecord = serde_json::from_str(
            r#"{"id": "tx-7", "occurred_at": "2024-03-01T14:00:00+02:00", "line_items": [{"amount": 1}]}"#,
        )
        .expect("record should decode");

        assert_eq!(record.occurred_at, Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()));
    }
}
