use std::fmt::Write;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::errors::DomainError;
use crate::rfm::aggregate::saturating_total;
use crate::rfm::quartile::RfmScore;
use crate::rfm::rollup::SegmentSummary;
use crate::rfm::segment::{classify, ScoredCustomer, SegmentLabel};

/// Presentation settings applied while assembling a report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportOptions {
    pub walk_in_name: String,
    pub date_format: String,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self { walk_in_name: "Walk-in Customer".to_string(), date_format: "%b %-d, %Y".to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerReportRow {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub organization_name: Option<String>,
    pub segment: SegmentLabel,
    pub recency_days: u32,
    pub frequency: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub monetary: Decimal,
    pub rfm_code: String,
    pub last_purchase_formatted: String,
    pub total_orders: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_spent: Decimal,
    #[serde(skip)]
    pub score: RfmScore,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStats {
    pub total_customers: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
    pub avg_frequency: f64,
    pub avg_recency: f64,
}

impl ReportStats {
    pub fn empty() -> Self {
        Self {
            total_customers: 0,
            total_revenue: Decimal::ZERO,
            avg_frequency: 0.0,
            avg_recency: 0.0,
        }
    }
}

/// Output contract of one segmentation run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SegmentationReport {
    pub customers: Vec<CustomerReportRow>,
    pub stats: ReportStats,
    pub segments: Vec<SegmentSummary>,
}

impl SegmentationReport {
    /// The report for a run with no customers.
    pub fn empty() -> Self {
        Self { customers: Vec::new(), stats: ReportStats::empty(), segments: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    pub fn segment(&self, label: SegmentLabel) -> Option<&SegmentSummary> {
        self.segments.iter().find(|summary| summary.segment == label)
    }

    pub fn customers_in(&self, label: SegmentLabel) -> impl Iterator<Item = &CustomerReportRow> {
        self.customers.iter().filter(move |row| row.segment == label)
    }

    /// Cross-checks the segment rollup and labels against the customer rows.
    pub fn check_invariants(&self) -> Result<(), DomainError> {
        let counted: usize = self.segments.iter().map(|summary| summary.count).sum();
        let total = self.stats.total_customers;
        if counted != total || self.customers.len() != total {
            return Err(DomainError::InvariantViolation(format!(
                "segments cover {counted} customers, rows hold {}, stats report {total}",
                self.customers.len()
            )));
        }

        if let Some(row) = self.customers.iter().find(|row| classify(&row.score) != row.segment) {
            return Err(DomainError::InvariantViolation(format!(
                "customer `{}` scored {} but is labelled {}",
                row.id, row.rfm_code, row.segment
            )));
        }

        Ok(())
    }
}

pub fn assemble_report(
    customers: Vec<ScoredCustomer>,
    segments: Vec<SegmentSummary>,
    options: &ReportOptions,
) -> SegmentationReport {
    if customers.is_empty() {
        return SegmentationReport::empty();
    }

    let total_customers = customers.len();
    let total_revenue =
        saturating_total(customers.iter().map(|customer| customer.metrics.monetary));
    let frequency_total: f64 =
        customers.iter().map(|customer| f64::from(customer.metrics.frequency)).sum();
    let recency_total: f64 =
        customers.iter().map(|customer| f64::from(customer.metrics.recency_days)).sum();

    let stats = ReportStats {
        total_customers,
        total_revenue,
        avg_frequency: frequency_total / total_customers as f64,
        avg_recency: recency_total / total_customers as f64,
    };

    let customers =
        customers.into_iter().map(|customer| customer_row(customer, options)).collect();

    SegmentationReport { customers, stats, segments }
}

fn customer_row(customer: ScoredCustomer, options: &ReportOptions) -> CustomerReportRow {
    let ScoredCustomer { aggregate, metrics, score, segment } = customer;
    let id = aggregate.key.to_string();
    let (name, email, organization_name) = match aggregate.profile {
        Some(profile) => {
            let name = if profile.name.trim().is_empty() { id.clone() } else { profile.name };
            (name, profile.email, profile.organization_name)
        }
        None => (options.walk_in_name.clone(), None, None),
    };

    CustomerReportRow {
        id,
        name,
        email,
        organization_name,
        segment,
        recency_days: metrics.recency_days,
        frequency: metrics.frequency,
        monetary: metrics.monetary,
        rfm_code: score.code(),
        last_purchase_formatted: format_date(aggregate.last_purchase_at, &options.date_format),
        total_orders: metrics.frequency,
        total_spent: aggregate.total_spent,
        score,
    }
}

/// Renders with the configured pattern, falling back to ISO dates for a bad pattern.
fn format_date(at: DateTime<Utc>, pattern: &str) -> String {
    let mut formatted = String::new();
    match write!(formatted, "{}", at.format(pattern)) {
        Ok(()) => formatted,
        Err(_) => at.date_naive().to_string(),
    }
}
