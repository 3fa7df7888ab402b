//! Novelty of candidates: distance to the closest measured row

use super::partition::LabelPartition;
use crate::training::gaussian_process_regression::squared_distances;
use ndarray::{Array1, Array2, Axis};

/// Minimum Euclidean distance from each unlabeled row to any labeled row,
/// divided by the largest such minimum.
///
/// Values lie in `[0, 1]` and the most isolated candidate scores exactly 1.
/// When every candidate coincides with a measured row the result is all zeros.
pub fn novelty(features: &Array2<f64>, partition: &LabelPartition) -> Array1<f64> {
    let candidates = features.select(Axis(0), &partition.unlabeled);
    let known = features.select(Axis(0), &partition.labeled);

    let distances = squared_distances(&candidates, &known);
    let min_distances: Array1<f64> = distances
        .axis_iter(Axis(0))
        .map(|row| row.iter().copied().fold(f64::INFINITY, f64::min).sqrt())
        .collect();

    let max_min = min_distances.iter().copied().fold(0.0, f64::max);
    if max_min > 0.0 {
        min_distances / max_min
    } else {
        Array1::zeros(min_distances.len())
    }
}
