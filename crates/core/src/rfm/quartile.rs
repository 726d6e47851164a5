//! Population-relative quartile scoring.
//!
//! Boundaries come from the whole population of one run, so no score can be
//! assigned before every customer's metrics are materialized.

use std::fmt;

use serde::Serialize;

/// Quartile score in `1..=4`; 4 is the best quartile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct QuartileScore(u8);

impl QuartileScore {
    pub const BOTTOM: Self = Self(1);
    pub const TOP: Self = Self(4);

    pub fn new(value: u8) -> Option<Self> {
        (1..=4).contains(&value).then_some(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for QuartileScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RankDirection {
    /// Sorted ascending; values at or below a boundary earn that boundary's score.
    LowerIsBetter,
    /// Sorted descending; values at or above a boundary earn that boundary's score.
    HigherIsBetter,
}

/// Boundary values read from the direction-sorted population at indices
/// `floor(n/4)`, `floor(n/2)` and `floor(3n/4)`.
///
/// The two directions deliberately compare against different ends of the sorted
/// array: ascending checks `q1` first, descending checks `q3` first. Comparisons
/// are inclusive so ties resolve toward the higher score.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quartiles<T> {
    direction: RankDirection,
    q1: T,
    q2: T,
    q3: T,
}

impl<T: Ord + Copy> Quartiles<T> {
    /// Returns `None` for an empty population.
    pub fn from_population(values: &[T], direction: RankDirection) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        match direction {
            RankDirection::LowerIsBetter => sorted.sort_unstable(),
            RankDirection::HigherIsBetter => sorted.sort_unstable_by(|lhs, rhs| rhs.cmp(lhs)),
        }

        let n = sorted.len();
        Some(Self { direction, q1: sorted[n / 4], q2: sorted[n / 2], q3: sorted[(3 * n) / 4] })
    }

    pub fn direction(&self) -> RankDirection {
        self.direction
    }

    pub fn boundaries(&self) -> [T; 3] {
        [self.q1, self.q2, self.q3]
    }

    pub fn score(&self, value: T) -> QuartileScore {
        let score = match self.direction {
            RankDirection::LowerIsBetter => {
                if value <= self.q1 {
                    4
                } else if value <= self.q2 {
                    3
                } else if value <= self.q3 {
                    2
                } else {
                    1
                }
            }
            RankDirection::HigherIsBetter => {
                if value >= self.q3 {
                    4
                } else if value >= self.q2 {
                    3
                } else if value >= self.q1 {
                    2
                } else {
                    1
                }
            }
        };
        QuartileScore(score)
    }
}

/// The three quartile scores of one customer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RfmScore {
    pub r_score: QuartileScore,
    pub f_score: QuartileScore,
    pub m_score: QuartileScore,
}

impl RfmScore {
    pub fn new(r_score: QuartileScore, f_score: QuartileScore, m_score: QuartileScore) -> Self {
        Self { r_score, f_score, m_score }
    }

    /// Builds a score from raw digits, rejecting anything outside `1..=4`.
    pub fn from_digits(r: u8, f: u8, m: u8) -> Option<Self> {
        Some(Self::new(QuartileScore::new(r)?, QuartileScore::new(f)?, QuartileScore::new(m)?))
    }

    /// Three-digit composite code, recency first (e.g. `"434"`).
    pub fn code(&self) -> String {
        format!("{}{}{}", self.r_score, self.f_score, self.m_score)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{QuartileScore, Quartiles, RankDirection, RfmScore};

    fn scores<T: Ord + Copy>(values: &[T], direction: RankDirection) -> Vec<u8> {
        let quartiles = Quartiles::from_population(values, direction).expect("non-empty");
        values.iter().map(|value| quartiles.score(*value).value()).collect()
    }

    #[test]
    fn empty_population_has_no_boundaries() {
        assert!(Quartiles::<u32>::from_population(&[], RankDirection::LowerIsBetter).is_none());
    }

    #[test]
    fn single_customer_scores_top_in_both_directions() {
        assert_eq!(scores(&[17u32], RankDirection::LowerIsBetter), vec![4]);
        assert_eq!(scores(&[17u32], RankDirection::HigherIsBetter), vec![4]);
        assert_eq!(scores(&[Decimal::new(995, 2)], RankDirection::HigherIsBetter), vec![4]);
    }

    #[test]
    fn ascending_ranking_rewards_low_values() {
        // sorted: [1, 15, 30], q1=idx0, q2=idx1, q3=idx2
        assert_eq!(scores(&[30u32, 15, 1], RankDirection::LowerIsBetter), vec![2, 3, 4]);
    }

    #[test]
    fn descending_ranking_compares_against_q3_first() {
        // sorted desc: [300, 200, 100]; q3 boundary is 100 so every value scores 4
        assert_eq!(scores(&[100u32, 200, 300], RankDirection::HigherIsBetter), vec![4, 4, 4]);
    }

    #[test]
    fn eight_customer_population_boundaries() {
        let values: Vec<u32> = (1..=8).collect();
        // asc boundaries: idx2=3, idx4=5, idx6=7
        assert_eq!(scores(&values, RankDirection::LowerIsBetter), vec![4, 4, 4, 3, 3, 2, 2, 1]);
        // desc sorted [8..1]: q3=idx6=2 is checked first, so only the minimum drops out
        assert_eq!(scores(&values, RankDirection::HigherIsBetter), vec![1, 4, 4, 4, 4, 4, 4, 4]);
    }

    #[test]
    fn ties_at_a_boundary_resolve_upward() {
        assert_eq!(scores(&[5u32, 5, 5, 9], RankDirection::LowerIsBetter), vec![4, 4, 4, 2]);
        assert_eq!(scores(&[5u32, 5, 5, 9], RankDirection::HigherIsBetter), vec![4, 4, 4, 4]);
    }

    #[test]
    fn composite_code_is_three_digits_recency_first() {
        let score = RfmScore::from_digits(4, 3, 4).expect("valid digits");
        assert_eq!(score.code(), "434");
        assert!(RfmScore::from_digits(0, 3, 4).is_none());
        assert!(QuartileScore::new(5).is_none());
        assert_eq!(QuartileScore::TOP.value(), 4);
    }
}
