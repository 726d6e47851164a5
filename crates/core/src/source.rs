//! Seam to the data-access collaborator that supplies transaction snapshots.
//!
//! Tenant scoping belongs to the source: the segmentation core never filters
//! what it is handed.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::domain::transaction::TransactionRecord;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("could not read transaction snapshot: {0}")]
    Io(String),
    #[error("could not decode transaction snapshot: {0}")]
    Decode(String),
    #[error("transaction source unavailable: {0}")]
    Unavailable(String),
}

/// Which slice of tenant data one analysis run covers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisScope {
    pub organization_id: String,
    #[serde(default)]
    pub store_id: Option<String>,
}

impl AnalysisScope {
    pub fn organization(organization_id: impl Into<String>) -> Self {
        Self { organization_id: organization_id.into(), store_id: None }
    }

    pub fn with_store(mut self, store_id: impl Into<String>) -> Self {
        self.store_id = Some(store_id.into());
        self
    }
}

/// Records fetched for one scope, plus how many entries could not be decoded.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransactionSnapshot {
    pub transactions: Vec<TransactionRecord>,
    pub undecodable: usize,
}

impl From<Vec<TransactionRecord>> for TransactionSnapshot {
    fn from(transactions: Vec<TransactionRecord>) -> Self {
        Self { transactions, undecodable: 0 }
    }
}

#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn fetch_transactions(
        &self,
        scope: &AnalysisScope,
    ) -> Result<TransactionSnapshot, SourceError>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryTransactionSource {
    snapshots: HashMap<AnalysisScope, Vec<TransactionRecord>>,
}

impl InMemoryTransactionSource {
    pub fn insert_snapshot(&mut self, scope: AnalysisScope, transactions: Vec<TransactionRecord>) {
        self.snapshots.insert(scope, transactions);
    }
}

#[async_trait]
impl TransactionSource for InMemoryTransactionSource {
    async fn fetch_transactions(
        &self,
        scope: &AnalysisScope,
    ) -> Result<TransactionSnapshot, SourceError> {
        Ok(self.snapshots.get(scope).cloned().unwrap_or_default().into())
    }
}

/// Decodes a JSON snapshot: either a bare array of transactions or an object
/// with a `transactions` array.
///
/// Only a document of the wrong shape fails. Entries are decoded one at a time
/// and an entry that is not a transaction is skipped and counted.
pub fn decode_snapshot(raw: &str) -> Result<TransactionSnapshot, SourceError> {
    let document: Value =
        serde_json::from_str(raw).map_err(|error| SourceError::Decode(error.to_string()))?;
    let entries = match document {
        Value::Array(entries) => entries,
        Value::Object(mut fields) => match fields.remove("transactions") {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(SourceError::Decode(
                    "expected a `transactions` array in the snapshot object".to_string(),
                ))
            }
        },
        _ => {
            return Err(SourceError::Decode(
                "expected a JSON array of transactions or an object with a `transactions` array"
                    .to_string(),
            ))
        }
    };

    let mut snapshot = TransactionSnapshot::default();
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<TransactionRecord>(entry) {
            Ok(record) => snapshot.transactions.push(record),
            Err(error) => {
                snapshot.undecodable += 1;
                warn!(
                    event_name = "source.entry.undecodable",
                    index,
                    error = %error,
                    "snapshot entry skipped"
                );
            }
        }
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{
        decode_snapshot, AnalysisScope, InMemoryTransactionSource, SourceError, TransactionSnapshot,
        TransactionSource,
    };
    use crate::domain::transaction::TransactionRecord;

    #[tokio::test]
    async fn in_memory_source_returns_only_the_requested_scope() {
        let at = Utc.with_ymd_and_hms(2024, 2, 2, 10, 0, 0).unwrap();
        let mut source = InMemoryTransactionSource::default();
        source.insert_snapshot(
            AnalysisScope::organization("org-a"),
            vec![TransactionRecord::new("t-1", at).with_line(5.0)],
        );
        source.insert_snapshot(
            AnalysisScope::organization("org-a").with_store("store-1"),
            vec![
                TransactionRecord::new("t-2", at).with_line(5.0),
                TransactionRecord::new("t-3", at).with_line(6.0),
            ],
        );

        let org = source.fetch_transactions(&AnalysisScope::organization("org-a")).await;
        let missing = source.fetch_transactions(&AnalysisScope::organization("org-b")).await;

        assert_eq!(org.expect("org snapshot").transactions.len(), 1);
        assert_eq!(missing.expect("empty snapshot"), TransactionSnapshot::default());
    }

    #[test]
    fn decodes_bare_and_wrapped_documents() {
        let bare = r#"[{"id": "t-1", "occurred_at": "2024-02-02T10:00:00Z",
                        "line_items": [{"amount": 3}]}]"#;
        let wrapped = format!(r#"{{"transactions": {bare}}}"#);

        assert_eq!(decode_snapshot(bare).expect("bare").transactions.len(), 1);
        assert_eq!(decode_snapshot(&wrapped).expect("wrapped").transactions.len(), 1);
    }

    #[test]
    fn malformed_entries_do_not_fail_the_snapshot() {
        let raw = r#"[
            {"id": "t-1", "occurred_at": "2024-02-02T10:00:00Z", "line_items": [{"amount": 3}]},
            {"id": "t-2", "occurred_at": "not-a-date", "line_items": [{"amount": 4}]},
            {"id": "t-3", "customer": {"id": "a"}, "occurred_at": "2024-02-03T10:00:00Z",
             "line_items": [{"amount": 5}]},
            {"id": "t-4", "occurred_at": "2024-02-03T10:00:00Z", "line_items": null},
            {"occurred_at": "2024-02-03T10:00:00Z", "line_items": [{"amount": 6}]},
            42
        ]"#;

        let snapshot = decode_snapshot(raw).expect("snapshot should decode");

        assert_eq!(snapshot.transactions.len(), 4);
        assert_eq!(snapshot.undecodable, 2);
        assert_eq!(snapshot.transactions[1].occurred_at, None);
        assert_eq!(snapshot.transactions[2].customer.as_ref().map(|c| c.name.as_str()), Some(""));
        assert!(snapshot.transactions[3].line_items.is_empty());
    }

    #[test]
    fn rejects_documents_that_are_not_snapshots() {
        let error = decode_snapshot(r#"{"rows": 3}"#).expect_err("not a snapshot");
        assert!(matches!(error, SourceError::Decode(ref message) if message.contains("transactions")));
        assert!(matches!(decode_snapshot("[{"), Err(SourceError::Decode(_))));
        assert!(matches!(decode_snapshot("\"text\""), Err(SourceError::Decode(_))));
    }
}
