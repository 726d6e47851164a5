use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::clock::ReferenceClock;
use crate::config::AppConfig;
use crate::domain::transaction::TransactionRecord;
use crate::errors::{ApplicationError, DomainError};
use crate::rfm::aggregate::{
    aggregate_transactions, CustomerAggregate, RunDiagnostics, WalkInPolicy,
};
use crate::rfm::metrics::RfmMetrics;
use crate::rfm::quartile::{Quartiles, RankDirection, RfmScore};
use crate::rfm::report::{assemble_report, ReportOptions, SegmentationReport};
use crate::rfm::rollup::summarize_segments;
use crate::rfm::segment::ScoredCustomer;
use crate::source::{AnalysisScope, TransactionSnapshot, TransactionSource};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SegmentationOptions {
    pub walk_in_policy: WalkInPolicy,
    pub report: ReportOptions,
}

impl SegmentationOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            walk_in_policy: config.segmentation.walk_in_policy,
            report: ReportOptions {
                walk_in_name: config.segmentation.walk_in_name.clone(),
                date_format: config.report.date_format.clone(),
            },
        }
    }
}

/// Result of one run: the report plus what happened to the input records.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationRun {
    pub reference_time: DateTime<Utc>,
    pub report: SegmentationReport,
    pub diagnostics: RunDiagnostics,
}

/// Runs the full pipeline over one point-in-time snapshot.
///
/// Holds only configuration, so one engine can serve concurrent runs.
#[derive(Clone, Debug, Default)]
pub struct SegmentationEngine {
    options: SegmentationOptions,
}

impl SegmentationEngine {
    pub fn new(options: SegmentationOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SegmentationOptions {
        &self.options
    }

    pub fn run(&self, transactions: &[TransactionRecord], now: DateTime<Utc>) -> SegmentationRun {
        self.execute(transactions, 0, now)
    }

    /// Like [`Self::run`], also accounting for entries the source could not decode.
    pub fn run_snapshot(
        &self,
        snapshot: &TransactionSnapshot,
        now: DateTime<Utc>,
    ) -> SegmentationRun {
        self.execute(&snapshot.transactions, snapshot.undecodable, now)
    }

    fn execute(
        &self,
        transactions: &[TransactionRecord],
        undecodable: usize,
        now: DateTime<Utc>,
    ) -> SegmentationRun {
        let aggregation = aggregate_transactions(transactions, self.options.walk_in_policy);
        let mut diagnostics = aggregation.diagnostics;
        diagnostics.record_undecodable(undecodable);

        let measured: Vec<(CustomerAggregate, RfmMetrics)> = aggregation
            .customers
            .into_values()
            .map(|aggregate| {
                let metrics = RfmMetrics::from_aggregate(&aggregate, now);
                (aggregate, metrics)
            })
            .collect();

        let scored = score_population(measured);
        let segments = summarize_segments(&scored);
        let report = assemble_report(scored, segments, &self.options.report);

        info!(
            event_name = "rfm.run.completed",
            reference_time = %now,
            customers = report.stats.total_customers,
            segments = report.segments.len(),
            transactions_seen = diagnostics.transactions_seen,
            excluded = diagnostics.excluded_total(),
            undecodable = diagnostics.excluded_undecodable,
            zeroed_amounts = diagnostics.zeroed_amounts,
            "segmentation run completed"
        );

        SegmentationRun { reference_time: now, report, diagnostics }
    }

    /// Establishes the reference instant first; a clock failure aborts the run.
    /// The finished report is cross-checked before it is returned.
    pub fn run_with_clock(
        &self,
        transactions: &[TransactionRecord],
        clock: &dyn ReferenceClock,
    ) -> Result<SegmentationRun, DomainError> {
        let now = clock.now()?;
        let run = self.run(transactions, now);
        run.report.check_invariants()?;
        Ok(run)
    }

    pub async fn analyze_source(
        &self,
        source: &dyn TransactionSource,
        scope: &AnalysisScope,
        clock: &dyn ReferenceClock,
    ) -> Result<SegmentationRun, ApplicationError> {
        let now = clock.now()?;
        let snapshot = source.fetch_transactions(scope).await?;
        info!(
            event_name = "rfm.snapshot.loaded",
            organization_id = %scope.organization_id,
            store_id = scope.store_id.as_deref().unwrap_or("all"),
            transactions = snapshot.transactions.len(),
            undecodable = snapshot.undecodable,
            "transaction snapshot loaded"
        );
        let run = self.run_snapshot(&snapshot, now);
        run.report.check_invariants()?;
        Ok(run)
    }
}

/// Scores every customer against population-wide quartile boundaries.
///
/// Boundaries need the whole population, so this is the one stage that cannot
/// start until every customer's metrics exist.
fn score_population(measured: Vec<(CustomerAggregate, RfmMetrics)>) -> Vec<ScoredCustomer> {
    let recency: Vec<u32> = measured.iter().map(|(_, metrics)| metrics.recency_days).collect();
    let frequency: Vec<u32> = measured.iter().map(|(_, metrics)| metrics.frequency).collect();
    let monetary: Vec<_> = measured.iter().map(|(_, metrics)| metrics.monetary).collect();

    let (Some(recency), Some(frequency), Some(monetary)) = (
        Quartiles::from_population(&recency, RankDirection::LowerIsBetter),
        Quartiles::from_population(&frequency, RankDirection::HigherIsBetter),
        Quartiles::from_population(&monetary, RankDirection::HigherIsBetter),
    ) else {
        return Vec::new();
    };

    measured
        .into_iter()
        .map(|(aggregate, metrics)| {
            let score = RfmScore::new(
                recency.score(metrics.recency_days),
                frequency.score(metrics.frequency),
                monetary.score(metrics.monetary),
            );
            ScoredCustomer::new(aggregate, metrics, score)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::{SegmentationEngine, SegmentationOptions};
    use crate::clock::{FixedClock, PinnedClock};
    use crate::domain::customer::CustomerRef;
    use crate::domain::transaction::TransactionRecord;
    use crate::errors::{ApplicationError, DomainError};
    use crate::rfm::aggregate::WalkInPolicy;
    use crate::rfm::report::SegmentationReport;
    use crate::rfm::segment::SegmentLabel;
    use crate::source::{decode_snapshot, AnalysisScope, InMemoryTransactionSource};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap()
    }

    fn purchase(id: &str, customer: &str, days_ago: i64, amount: f64) -> TransactionRecord {
        TransactionRecord::new(id, now() - Duration::days(days_ago))
            .for_customer(CustomerRef::new(customer, customer.to_uppercase()))
            .with_line(amount)
    }

    #[test]
    fn empty_snapshot_short_circuits_to_empty_report() {
        let run = SegmentationEngine::default().run(&[], now());
        assert_eq!(run.report, SegmentationReport::empty());
        assert_eq!(run.reference_time, now());
    }

    #[test]
    fn only_malformed_records_still_yield_empty_report() {
        let mut record = purchase("t-1", "a", 1, 10.0);
        record.occurred_at = None;

        let run = SegmentationEngine::default().run(&[record], now());

        assert!(run.report.is_empty());
        assert_eq!(run.diagnostics.excluded_missing_timestamp, 1);
    }

    #[test]
    fn excluded_walk_ins_do_not_enter_the_population() {
        let records = vec![
            purchase("t-1", "a", 3, 10.0),
            TransactionRecord::new("t-2", now()).with_line(999.0),
        ];
        let engine = SegmentationEngine::new(SegmentationOptions {
            walk_in_policy: WalkInPolicy::Exclude,
            ..SegmentationOptions::default()
        });

        let run = engine.run(&records, now());

        assert_eq!(run.report.stats.total_customers, 1);
        assert_eq!(run.report.customers[0].id, "a");
        assert_eq!(run.diagnostics.excluded_walk_in, 1);
    }

    #[test]
    fn merged_walk_ins_appear_as_one_customer() {
        let records = vec![
            purchase("t-1", "a", 3, 10.0),
            TransactionRecord::new("t-2", now()).with_line(5.0),
            TransactionRecord::new("t-3", now() - Duration::days(1)).with_line(7.0),
        ];

        let run = SegmentationEngine::default().run(&records, now());
        let walk_in =
            run.report.customers.iter().find(|row| row.id == "walk-in").expect("walk-in row");

        assert_eq!(run.report.stats.total_customers, 2);
        assert_eq!(walk_in.frequency, 2);
        assert_eq!(walk_in.name, "Walk-in Customer");
    }

    #[test]
    fn corrupted_amounts_do_not_poison_boundaries() {
        let records = vec![
            purchase("t-1", "a", 1, f64::NAN),
            purchase("t-2", "b", 2, 50.0),
            purchase("t-3", "c", 3, 80.0),
        ];

        let run = SegmentationEngine::default().run(&records, now());

        assert_eq!(run.report.stats.total_customers, 3);
        assert_eq!(run.diagnostics.zeroed_amounts, 1);
        assert!(run.report.customers.iter().all(|row| row.rfm_code.len() == 3));
    }

    #[test]
    fn clock_failure_aborts_the_run() {
        let error = SegmentationEngine::default()
            .run_with_clock(&[purchase("t-1", "a", 1, 1.0)], &PinnedClock::new("not-a-time"))
            .expect_err("clock should fail");
        assert!(matches!(error, DomainError::ReferenceTimeUnavailable(_)));
    }

    #[tokio::test]
    async fn analyzes_a_scoped_source_snapshot() {
        let scope = AnalysisScope::organization("org-1");
        let mut source = InMemoryTransactionSource::default();
        source.insert_snapshot(scope.clone(), vec![purchase("t-1", "solo", 5, 42.0)]);

        let run = SegmentationEngine::default()
            .analyze_source(&source, &scope, &FixedClock(now()))
            .await
            .expect("run should succeed");

        assert_eq!(run.report.customers.len(), 1);
        assert_eq!(run.report.customers[0].rfm_code, "444");
        assert_eq!(run.report.customers[0].segment, SegmentLabel::BestCustomer);
    }

    #[tokio::test]
    async fn source_run_surfaces_clock_failure_as_domain_error() {
        let source = InMemoryTransactionSource::default();
        let result = SegmentationEngine::default()
            .analyze_source(&source, &AnalysisScope::organization("org-1"), &PinnedClock::new(""))
            .await;

        assert!(matches!(result, Err(ApplicationError::Domain(_))));
    }

    #[test]
    fn overflowing_line_sums_do_not_abort_the_run() {
        let records = vec![
            TransactionRecord::new("t-1", now())
                .for_customer(CustomerRef::new("a", "A"))
                .with_line(5e28)
                .with_line(5e28),
            purchase("t-2", "b", 4, 30.0),
        ];

        let run = SegmentationEngine::default().run(&records, now());

        assert_eq!(run.report.stats.total_customers, 2);
        assert_eq!(run.diagnostics.zeroed_amounts, 1);
        assert_eq!(run.report.check_invariants(), Ok(()));
    }

    #[test]
    fn partially_malformed_snapshot_still_runs() {
        let snapshot = decode_snapshot(
            r#"[
                {"id": "t-1", "customer": {"id": "a"}, "occurred_at": "2024-08-30T12:00:00Z",
                 "line_items": [{"amount": 10}]},
                {"id": "t-2", "customer": {"id": "b", "name": "B"}, "occurred_at": "soon",
                 "line_items": [{"amount": 20}]},
                {"customer": {"id": "c", "name": "C"}, "line_items": [{"amount": 30}]}
            ]"#,
        )
        .expect("snapshot should decode");

        let run = SegmentationEngine::default().run_snapshot(&snapshot, now());

        assert_eq!(run.report.stats.total_customers, 1);
        assert_eq!(run.report.customers[0].name, "a");
        assert_eq!(run.diagnostics.transactions_seen, 3);
        assert_eq!(run.diagnostics.excluded_missing_timestamp, 1);
        assert_eq!(run.diagnostics.excluded_undecodable, 1);
        assert_eq!(run.diagnostics.excluded_total(), 2);
    }
}
