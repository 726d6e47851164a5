//! RFM (recency, frequency, monetary) customer segmentation.
//!
//! Data flows strictly forward: transactions are folded into per-customer
//! aggregates, reduced to metrics, scored against population quartiles,
//! classified through the ordered rule table, rolled up per segment, and
//! assembled into a report. Every value is rebuilt on each run.

pub mod aggregate;
pub mod engine;
pub mod metrics;
pub mod quartile;
pub mod report;
pub mod rollup;
pub mod segment;

pub use aggregate::{
    aggregate_transactions, saturating_total, Aggregation, CustomerAggregate, Purchase,
    RunDiagnostics, WalkInPolicy,
};
pub use engine::{SegmentationEngine, SegmentationOptions, SegmentationRun};
pub use metrics::RfmMetrics;
pub use quartile::{QuartileScore, Quartiles, RankDirection, RfmScore};
pub use report::{
    assemble_report, CustomerReportRow, ReportOptions, ReportStats, SegmentationReport,
};
pub use rollup::{summarize_segments, SegmentSummary};
pub use segment::{classify, ScoreBound, ScoredCustomer, SegmentLabel, SegmentRule, SEGMENT_RULES};
