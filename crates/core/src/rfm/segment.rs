//! Segment classification over an ordered rule table.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerKey;
use crate::rfm::aggregate::CustomerAggregate;
use crate::rfm::metrics::RfmMetrics;
use crate::rfm::quartile::{QuartileScore, RfmScore};

use self::ScoreBound::{AtLeast, AtMost};

/// Named customer cohort. Variant order matches rule precedence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SegmentLabel {
    #[serde(rename = "Best Customer")]
    BestCustomer,
    #[serde(rename = "Champion")]
    Champion,
    #[serde(rename = "Loyal Customer")]
    LoyalCustomer,
    #[serde(rename = "Big Spender")]
    BigSpender,
    #[serde(rename = "Potential Loyalist")]
    PotentialLoyalist,
    #[serde(rename = "New Customer")]
    NewCustomer,
    #[serde(rename = "At Risk")]
    AtRisk,
    #[serde(rename = "Nearly Lost")]
    NearlyLost,
    #[serde(rename = "Lost Customer")]
    LostCustomer,
    #[serde(rename = "Lost Cheap Customer")]
    LostCheapCustomer,
    #[serde(rename = "Other")]
    Other,
}

impl SegmentLabel {
    pub const ALL: [SegmentLabel; 11] = [
        Self::BestCustomer,
        Self::Champion,
        Self::LoyalCustomer,
        Self::BigSpender,
        Self::PotentialLoyalist,
        Self::NewCustomer,
        Self::AtRisk,
        Self::NearlyLost,
        Self::LostCustomer,
        Self::LostCheapCustomer,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BestCustomer => "Best Customer",
            Self::Champion => "Champion",
            Self::LoyalCustomer => "Loyal Customer",
            Self::BigSpender => "Big Spender",
            Self::PotentialLoyalist => "Potential Loyalist",
            Self::NewCustomer => "New Customer",
            Self::AtRisk => "At Risk",
            Self::NearlyLost => "Nearly Lost",
            Self::LostCustomer => "Lost Customer",
            Self::LostCheapCustomer => "Lost Cheap Customer",
            Self::Other => "Other",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::BestCustomer => "Bought most recently, most often, and spends the most",
            Self::Champion => "Recent buyers with strong frequency and spend",
            Self::LoyalCustomer => "Buy very often and spend well, still reasonably recent",
            Self::BigSpender => "Top spenders who still shop with some regularity",
            Self::PotentialLoyalist => "Recent customers with average frequency and spend",
            Self::NewCustomer => "Bought recently but not often yet",
            Self::AtRisk => "Used to buy often and spend well but have not returned lately",
            Self::NearlyLost => "Average customers whose visits are slipping",
            Self::LostCustomer => "Valuable customers who have not purchased in a long time",
            Self::LostCheapCustomer => "Low value customers who stopped purchasing",
            Self::Other => "Customers outside every defined cohort",
        }
    }

    pub fn recommended_action(&self) -> &'static str {
        match self {
            Self::BestCustomer => "Reward with early access and VIP perks",
            Self::Champion => "Invite to loyalty program and ask for reviews",
            Self::LoyalCustomer => "Upsell higher value products",
            Self::BigSpender => "Promote premium and bundled offers",
            Self::PotentialLoyalist => "Offer membership or a second-purchase incentive",
            Self::NewCustomer => "Send onboarding and welcome offers",
            Self::AtRisk => "Send personalized win-back campaigns",
            Self::NearlyLost => "Share limited-time discounts to re-engage",
            Self::LostCustomer => "Reach out with a strong comeback offer",
            Self::LostCheapCustomer => "Include in low-cost broad campaigns only",
            Self::Other => "Monitor and gather more purchase history",
        }
    }
}

impl fmt::Display for SegmentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoreBound {
    AtLeast(u8),
    AtMost(u8),
}

impl ScoreBound {
    pub fn admits(self, score: QuartileScore) -> bool {
        match self {
            Self::AtLeast(min) => score.value() >= min,
            Self::AtMost(max) => score.value() <= max,
        }
    }
}

impl fmt::Display for ScoreBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtLeast(min) => write!(f, ">={min}"),
            Self::AtMost(max) => write!(f, "<={max}"),
        }
    }
}

/// One row of the rule table: a label guarded by a bound on each score.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SegmentRule {
    pub label: SegmentLabel,
    pub recency: ScoreBound,
    pub frequency: ScoreBound,
    pub monetary: ScoreBound,
}

impl SegmentRule {
    const fn new(
        label: SegmentLabel,
        recency: ScoreBound,
        frequency: ScoreBound,
        monetary: ScoreBound,
    ) -> Self {
        Self { label, recency, frequency, monetary }
    }

    pub fn matches(&self, score: &RfmScore) -> bool {
        self.recency.admits(score.r_score)
            && self.frequency.admits(score.f_score)
            && self.monetary.admits(score.m_score)
    }
}

/// Evaluated top to bottom; the first matching rule wins. Rules overlap, so
/// the order is part of the contract.
pub const SEGMENT_RULES: [SegmentRule; 10] = [
    SegmentRule::new(SegmentLabel::BestCustomer, AtLeast(4), AtLeast(4), AtLeast(4)),
    SegmentRule::new(SegmentLabel::Champion, AtLeast(4), AtLeast(3), AtLeast(3)),
    SegmentRule::new(SegmentLabel::LoyalCustomer, AtLeast(3), AtLeast(4), AtLeast(3)),
    SegmentRule::new(SegmentLabel::BigSpender, AtLeast(3), AtLeast(3), AtLeast(4)),
    SegmentRule::new(SegmentLabel::PotentialLoyalist, AtLeast(4), AtLeast(2), AtLeast(2)),
    SegmentRule::new(SegmentLabel::NewCustomer, AtLeast(4), AtLeast(1), AtLeast(1)),
    SegmentRule::new(SegmentLabel::AtRisk, AtLeast(2), AtLeast(3), AtLeast(3)),
    SegmentRule::new(SegmentLabel::NearlyLost, AtLeast(2), AtLeast(2), AtLeast(2)),
    SegmentRule::new(SegmentLabel::LostCustomer, AtMost(2), AtLeast(2), AtLeast(3)),
    SegmentRule::new(SegmentLabel::LostCheapCustomer, AtMost(2), AtMost(2), AtMost(2)),
];

/// Maps a score triple to its segment, falling back to [`SegmentLabel::Other`].
pub fn classify(score: &RfmScore) -> SegmentLabel {
    SEGMENT_RULES
        .iter()
        .find(|rule| rule.matches(score))
        .map(|rule| rule.label)
        .unwrap_or(SegmentLabel::Other)
}

/// A customer after scoring and classification, ready for rollup and reporting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoredCustomer {
    pub aggregate: CustomerAggregate,
    pub metrics: RfmMetrics,
    pub score: RfmScore,
    pub segment: SegmentLabel,
}

impl ScoredCustomer {
    pub fn new(aggregate: CustomerAggregate, metrics: RfmMetrics, score: RfmScore) -> Self {
        let segment = classify(&score);
        Self { aggregate, metrics, score, segment }
    }

    pub fn key(&self) -> &CustomerKey {
        &self.aggregate.key
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, ScoreBound, SegmentLabel, SEGMENT_RULES};
    use crate::rfm::quartile::{QuartileScore, RfmScore};

    fn label(r: u8, f: u8, m: u8) -> SegmentLabel {
        classify(&RfmScore::from_digits(r, f, m).expect("valid digits"))
    }

    #[test]
    fn best_customer_requires_top_scores_everywhere() {
        assert_eq!(label(4, 4, 4), SegmentLabel::BestCustomer);
    }

    #[test]
    fn champion_takes_recent_strong_buyers() {
        assert_eq!(label(4, 3, 3), SegmentLabel::Champion);
        assert_eq!(label(4, 4, 3), SegmentLabel::Champion);
    }

    #[test]
    fn loyal_customer_needs_top_frequency() {
        assert_eq!(label(3, 4, 3), SegmentLabel::LoyalCustomer);
        assert_eq!(label(3, 4, 4), SegmentLabel::LoyalCustomer);
    }

    #[test]
    fn big_spender_needs_top_monetary() {
        assert_eq!(label(3, 3, 4), SegmentLabel::BigSpender);
    }

    #[test]
    fn potential_loyalist_and_new_customer_split_on_depth() {
        assert_eq!(label(4, 2, 2), SegmentLabel::PotentialLoyalist);
        assert_eq!(label(4, 4, 2), SegmentLabel::PotentialLoyalist);
        assert_eq!(label(4, 1, 4), SegmentLabel::NewCustomer);
        assert_eq!(label(4, 1, 1), SegmentLabel::NewCustomer);
    }

    #[test]
    fn at_risk_and_nearly_lost_cover_mid_recency() {
        assert_eq!(label(2, 3, 3), SegmentLabel::AtRisk);
        assert_eq!(label(3, 3, 3), SegmentLabel::AtRisk);
        assert_eq!(label(2, 2, 2), SegmentLabel::NearlyLost);
        assert_eq!(label(3, 2, 4), SegmentLabel::NearlyLost);
    }

    #[test]
    fn lost_rules_apply_to_low_recency() {
        assert_eq!(label(1, 2, 3), SegmentLabel::LostCustomer);
        assert_eq!(label(1, 4, 4), SegmentLabel::LostCustomer);
        assert_eq!(label(1, 1, 1), SegmentLabel::LostCheapCustomer);
        assert_eq!(label(2, 1, 2), SegmentLabel::LostCheapCustomer);
    }

    #[test]
    fn uncovered_cells_fall_back_to_other() {
        assert_eq!(label(3, 1, 1), SegmentLabel::Other);
        assert_eq!(label(1, 1, 4), SegmentLabel::Other);
        assert_eq!(label(2, 1, 3), SegmentLabel::Other);
    }

    #[test]
    fn classifier_is_total_over_every_code() {
        for r in 1..=4 {
            for f in 1..=4 {
                for m in 1..=4 {
                    let first = label(r, f, m);
                    assert_eq!(first, label(r, f, m));
                    assert!(!first.as_str().is_empty());
                }
            }
        }
    }

    #[test]
    fn each_rule_admits_its_own_minimum_cell() {
        for rule in SEGMENT_RULES {
            let pick = |bound: ScoreBound| match bound {
                ScoreBound::AtLeast(min) => min,
                ScoreBound::AtMost(max) => max,
            };
            let score = RfmScore::new(
                QuartileScore::new(pick(rule.recency)).expect("score"),
                QuartileScore::new(pick(rule.frequency)).expect("score"),
                QuartileScore::new(pick(rule.monetary)).expect("score"),
            );
            assert!(rule.matches(&score), "{} should admit its boundary cell", rule.label);
        }
    }

    #[test]
    fn labels_serialize_as_display_names() {
        let json = serde_json::to_string(&SegmentLabel::LostCheapCustomer).expect("serialize");
        assert_eq!(json, "\"Lost Cheap Customer\"");
        assert_eq!(SegmentLabel::ALL.len(), SEGMENT_RULES.len() + 1);
    }
}
