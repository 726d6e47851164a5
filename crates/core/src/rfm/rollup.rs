use rust_decimal::Decimal;
use serde::Serialize;

use crate::rfm::aggregate::saturating_total;
use crate::rfm::segment::{ScoredCustomer, SegmentLabel};

/// Segment-level statistics for one populated label.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentSummary {
    pub segment: SegmentLabel,
    pub count: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub revenue: Decimal,
    pub avg_recency: f64,
    pub avg_frequency: f64,
    pub percentage: f64,
    #[serde(skip)]
    pub customer_ids: Vec<String>,
}

/// Rolls classified customers up into segment buckets, largest first.
///
/// Buckets appear in the order their label is first seen and the count sort is
/// stable, so equal counts keep that order. Labels with no members are omitted.
pub fn summarize_segments(customers: &[ScoredCustomer]) -> Vec<SegmentSummary> {
    let population = customers.len();
    if population == 0 {
        return Vec::new();
    }

    let mut buckets: Vec<(SegmentLabel, Vec<&ScoredCustomer>)> = Vec::new();
    for customer in customers {
        match buckets.iter().position(|(label, _)| *label == customer.segment) {
            Some(index) => buckets[index].1.push(customer),
            None => buckets.push((customer.segment, vec![customer])),
        }
    }

    let mut summaries: Vec<SegmentSummary> = buckets
        .into_iter()
        .map(|(label, members)| summarize(label, &members, population))
        .collect();
    summaries.sort_by(|lhs, rhs| rhs.count.cmp(&lhs.count));
    summaries
}

fn summarize(
    label: SegmentLabel,
    members: &[&ScoredCustomer],
    population: usize,
) -> SegmentSummary {
    let count = members.len();
    let revenue = saturating_total(members.iter().map(|member| member.metrics.monetary));
    let recency_total: f64 =
        members.iter().map(|member| f64::from(member.metrics.recency_days)).sum();
    let frequency_total: f64 =
        members.iter().map(|member| f64::from(member.metrics.frequency)).sum();

    SegmentSummary {
        segment: label,
        count,
        revenue,
        avg_recency: recency_total / count as f64,
        avg_frequency: frequency_total / count as f64,
        percentage: 100.0 * count as f64 / population as f64,
        customer_ids: members.iter().map(|member| member.key().to_string()).collect(),
    }
}
