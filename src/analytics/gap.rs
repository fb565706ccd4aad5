//! Rating-gap reduction.
//!
//! Pure function from a stream of rating samples to per-dimension rows
//! comparing self-reported and assessor-reported averages. A dimension is a
//! competency for assessments or a question for appraisals.
//!
//! Contract points that matter to consumers:
//! - an empty side averages to `0.0` with its count at `0`: "no data",
//!   never NaN and never an omitted row;
//! - `gap = assessor_avg - self_avg`;
//! - rows come back sorted by descending absolute gap, ties keeping the
//!   order dimensions first appeared in the input.

use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::RatingSide;

/// One rating observation attributed to a dimension and a side.
#[derive(Debug, Clone, Copy)]
pub struct RatingSample {
    pub dimension_id: Uuid,
    pub side: RatingSide,
    pub rating: i16,
}

impl RatingSample {
    pub fn new(dimension_id: Uuid, side: RatingSide, rating: i16) -> Self {
        Self {
            dimension_id,
            side,
            rating,
        }
    }
}

/// Per-dimension comparison of self and assessor averages.
#[derive(Debug, Clone, Serialize)]
pub struct DimensionGap {
    pub dimension_id: Uuid,
    pub self_avg: f64,
    pub assessor_avg: f64,
    /// `assessor_avg - self_avg`: positive when assessors rate higher than
    /// the employee rated themselves.
    pub gap: f64,
    pub self_count: u32,
    pub assessor_count: u32,
    /// Total contributing ratings. `0` means the averages carry no data.
    pub count: u32,
}

#[derive(Default)]
struct DimensionAcc {
    self_sum: i64,
    self_count: u32,
    assessor_sum: i64,
    assessor_count: u32,
}

impl DimensionAcc {
    fn push(&mut self, side: RatingSide, rating: i16) {
        match side {
            RatingSide::Employee => {
                self.self_sum += i64::from(rating);
                self.self_count += 1;
            }
            RatingSide::Assessor => {
                self.assessor_sum += i64::from(rating);
                self.assessor_count += 1;
            }
        }
    }

    fn finish(&self, dimension_id: Uuid) -> DimensionGap {
        let self_avg = mean(self.self_sum, self.self_count);
        let assessor_avg = mean(self.assessor_sum, self.assessor_count);
        DimensionGap {
            dimension_id,
            self_avg,
            assessor_avg,
            gap: assessor_avg - self_avg,
            self_count: self.self_count,
            assessor_count: self.assessor_count,
            count: self.self_count + self.assessor_count,
        }
    }
}

fn mean(sum: i64, count: u32) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum as f64 / f64::from(count)
    }
}

/// Reduce samples to gap rows, largest disagreement first.
pub fn reduce_gaps(samples: impl IntoIterator<Item = RatingSample>) -> Vec<DimensionGap> {
    // First-seen order doubles as the tie-break order, so accumulate into a
    // Vec with an index map rather than iterating a HashMap.
    let mut order: Vec<Uuid> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    let mut accs: Vec<DimensionAcc> = Vec::new();

    for sample in samples {
        let slot = *index.entry(sample.dimension_id).or_insert_with(|| {
            order.push(sample.dimension_id);
            accs.push(DimensionAcc::default());
            accs.len() - 1
        });
        accs[slot].push(sample.side, sample.rating);
    }

    let mut rows: Vec<DimensionGap> = order
        .iter()
        .zip(accs.iter())
        .map(|(dimension_id, acc)| acc.finish(*dimension_id))
        .collect();

    // Stable sort keeps input order for equal magnitudes.
    rows.sort_by(|a, b| b.gap.abs().total_cmp(&a.gap.abs()));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(dim: Uuid, side: RatingSide, rating: i16) -> RatingSample {
        RatingSample::new(dim, side, rating)
    }

    #[test]
    fn test_gap_is_assessor_minus_self() {
        let dim = Uuid::new_v4();
        let rows = reduce_gaps(vec![
            sample(dim, RatingSide::Employee, 3),
            sample(dim, RatingSide::Assessor, 5),
        ]);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].self_avg, 3.0);
        assert_eq!(rows[0].assessor_avg, 5.0);
        assert_eq!(rows[0].gap, 2.0);
        assert_eq!(rows[0].count, 2);
    }

    #[test]
    fn test_empty_side_is_zero_with_zero_count() {
        let dim = Uuid::new_v4();
        let rows = reduce_gaps(vec![
            sample(dim, RatingSide::Employee, 4),
            sample(dim, RatingSide::Employee, 2),
        ]);

        assert_eq!(rows[0].self_avg, 3.0);
        assert_eq!(rows[0].self_count, 2);
        assert_eq!(rows[0].assessor_avg, 0.0);
        assert_eq!(rows[0].assessor_count, 0);
        assert_eq!(rows[0].gap, -3.0);
    }

    #[test]
    fn test_no_samples_yields_no_rows() {
        assert!(reduce_gaps(Vec::new()).is_empty());
    }

    #[test]
    fn test_rows_sorted_by_descending_absolute_gap() {
        let small = Uuid::new_v4();
        let large = Uuid::new_v4();
        let negative = Uuid::new_v4();
        let rows = reduce_gaps(vec![
            // |gap| = 1
            sample(small, RatingSide::Employee, 3),
            sample(small, RatingSide::Assessor, 4),
            // |gap| = 3
            sample(large, RatingSide::Employee, 2),
            sample(large, RatingSide::Assessor, 5),
            // |gap| = 2, negative direction
            sample(negative, RatingSide::Employee, 5),
            sample(negative, RatingSide::Assessor, 3),
        ]);

        let ids: Vec<Uuid> = rows.iter().map(|r| r.dimension_id).collect();
        assert_eq!(ids, vec![large, negative, small]);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let rows = reduce_gaps(vec![
            sample(first, RatingSide::Employee, 4),
            sample(first, RatingSide::Assessor, 5),
            sample(second, RatingSide::Employee, 2),
            sample(second, RatingSide::Assessor, 3),
        ]);

        assert_eq!(rows[0].dimension_id, first);
        assert_eq!(rows[1].dimension_id, second);
        assert_eq!(rows[0].gap, rows[1].gap);
    }

    #[test]
    fn test_means_average_multiple_ratings() {
        let dim = Uuid::new_v4();
        let rows = reduce_gaps(vec![
            sample(dim, RatingSide::Assessor, 5),
            sample(dim, RatingSide::Assessor, 4),
            sample(dim, RatingSide::Employee, 1),
            sample(dim, RatingSide::Employee, 2),
            sample(dim, RatingSide::Employee, 3),
        ]);

        assert_eq!(rows[0].assessor_avg, 4.5);
        assert_eq!(rows[0].self_avg, 2.0);
        assert_eq!(rows[0].gap, 2.5);
        assert_eq!(rows[0].self_count, 3);
        assert_eq!(rows[0].assessor_count, 2);
    }
}
