//! Explore/exploit ("MLI") utility of unlabeled candidates
//!
//! ```text
//! utility = Σ_fixed w_f · z_f  +  Σ_targets w_t · (ŷ_t − μ_t) / σ_t  +  curiosity · Σ_targets w_t · s_t / σ_t
//! ```
//!
//! where `μ_t`, `σ_t` are the mean and standard deviation of target `t` over
//! the labeled rows, `ŷ_t`, `s_t` the surrogate prediction and uncertainty, and
//! `z_f` the fixed target standardized over all rows. Minimized columns are
//! negated before any statistics are taken so larger is always better.

use super::config::{Direction, ExperimentConfig};
use super::partition::LabelPartition;
use crate::error::{DiscoveryError, Result};
use crate::training::Predictions;
use ndarray::{Array1, Array2, Axis};

/// Mean and guarded standard deviation of one column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub mean: f64,
    /// Sample standard deviation; 1 when it would be zero or undefined
    pub std: f64,
}

impl ColumnStats {
    /// Statistics of the finite values; NaN entries are skipped
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        let n = finite.len();
        if n == 0 {
            return Self { mean: 0.0, std: 1.0 };
        }
        let mean = finite.iter().sum::<f64>() / n as f64;
        let constant = finite.iter().all(|&v| v == finite[0]);
        let std = if n < 2 || constant {
            0.0
        } else {
            (finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
        };
        Self {
            mean,
            std: if std > 0.0 { std } else { 1.0 },
        }
    }

    pub fn standardize(&self, value: f64) -> f64 {
        (value - self.mean) / self.std
    }
}

/// Per-column statistics over the given rows
pub fn column_stats(matrix: &Array2<f64>, rows: &[usize]) -> Vec<ColumnStats> {
    matrix
        .axis_iter(Axis(1))
        .map(|col| ColumnStats::from_values(rows.iter().map(|&i| col[i])))
        .collect()
}

#[derive(Debug, Clone)]
struct Objective {
    weight: f64,
    direction: Direction,
    threshold: Option<f64>,
}

/// Utility computation for one experiment configuration
#[derive(Debug, Clone)]
pub struct UtilityScorer {
    curiosity: f64,
    targets: Vec<Objective>,
    fixed_targets: Vec<Objective>,
}

impl UtilityScorer {
    pub fn from_config(config: &ExperimentConfig) -> Self {
        Self {
            curiosity: config.curiosity,
            targets: config
                .targets
                .iter()
                .map(|t| Objective {
                    weight: t.weight,
                    direction: t.direction,
                    threshold: t.threshold,
                })
                .collect(),
            fixed_targets: config
                .fixed_targets
                .iter()
                .map(|t| Objective {
                    weight: t.weight,
                    direction: t.direction,
                    threshold: None,
                })
                .collect(),
        }
    }

    /// Scorer from parallel weight / direction lists
    pub fn new(
        curiosity: f64,
        weights: &[f64],
        directions: &[Direction],
        fixed_weights: &[f64],
        fixed_directions: &[Direction],
    ) -> Result<Self> {
        if weights.len() != directions.len() || fixed_weights.len() != fixed_directions.len() {
            return Err(DiscoveryError::InvalidConfiguration(
                "weights and directions differ in length".to_string(),
            ));
        }
        let objectives = |w: &[f64], d: &[Direction]| -> Vec<Objective> {
            w.iter()
                .zip(d)
                .map(|(&weight, &direction)| Objective {
                    weight,
                    direction,
                    threshold: None,
                })
                .collect()
        };
        Ok(Self {
            curiosity,
            targets: objectives(weights, directions),
            fixed_targets: objectives(fixed_weights, fixed_directions),
        })
    }

    /// Set a clipping threshold on the prediction of target `index`
    pub fn with_threshold(mut self, index: usize, threshold: f64) -> Self {
        if let Some(t) = self.targets.get_mut(index) {
            t.threshold = Some(threshold);
        }
        self
    }

    /// Utility of every unlabeled row, in `partition.unlabeled` order.
    ///
    /// `targets` and `fixed` hold all dataset rows, one column per primary
    /// and fixed target respectively.
    pub fn score(
        &self,
        predictions: &Predictions,
        targets: &Array2<f64>,
        fixed: &Array2<f64>,
        partition: &LabelPartition,
    ) -> Result<Array1<f64>> {
        let n_candidates = partition.unlabeled.len();
        check_shape("prediction", predictions.mean.dim(), (n_candidates, self.targets.len()))?;
        check_shape("uncertainty", predictions.uncertainty.dim(), (n_candidates, self.targets.len()))?;
        check_shape("target", targets.dim(), (partition.n_rows(), self.targets.len()))?;
        check_shape("fixed target", fixed.dim(), (partition.n_rows(), self.fixed_targets.len()))?;

        // 1. orient: larger is better everywhere
        let oriented_targets = orient(targets, &self.targets);
        let mut clipped = predictions.mean.clone();
        for (j, objective) in self.targets.iter().enumerate() {
            if let Some(threshold) = objective.threshold {
                clipped.column_mut(j).mapv_inplace(|p| match objective.direction {
                    Direction::Maximize => p.min(threshold),
                    Direction::Minimize => p.max(threshold),
                });
            }
        }
        let oriented_predictions = orient(&clipped, &self.targets);

        // 2. labeled-row statistics
        let stats = column_stats(&oriented_targets, &partition.labeled);

        let mut exploit = Array1::<f64>::zeros(n_candidates);
        let mut explore = Array1::<f64>::zeros(n_candidates);
        for (j, (objective, stat)) in self.targets.iter().zip(&stats).enumerate() {
            // 3.-5. standardize predictions, scale uncertainty, weight both
            let prediction_norm = oriented_predictions.column(j).mapv(|p| stat.standardize(p));
            let uncertainty_norm = predictions.uncertainty.column(j).mapv(|u| u / stat.std);
            exploit.scaled_add(objective.weight, &prediction_norm);
            explore.scaled_add(objective.weight, &uncertainty_norm);
        }

        // 6.
        let apriori = self.apriori_contribution(fixed, partition);

        // 7.
        Ok(apriori + exploit + explore * self.curiosity)
    }

    /// Weighted, standardized fixed-target values summed per unlabeled row
    fn apriori_contribution(&self, fixed: &Array2<f64>, partition: &LabelPartition) -> Array1<f64> {
        let mut total = Array1::<f64>::zeros(partition.unlabeled.len());
        if self.fixed_targets.is_empty() {
            return total;
        }

        let oriented = orient(fixed, &self.fixed_targets);
        let all_rows: Vec<usize> = (0..oriented.nrows()).collect();
        let stats = column_stats(&oriented, &all_rows);

        for (j, (objective, stat)) in self.fixed_targets.iter().zip(&stats).enumerate() {
            let column = oriented.column(j);
            for (k, &row) in partition.unlabeled.iter().enumerate() {
                let value = column[row];
                if value.is_finite() {
                    total[k] += objective.weight * stat.standardize(value);
                }
            }
        }
        total
    }
}

fn orient(matrix: &Array2<f64>, objectives: &[Objective]) -> Array2<f64> {
    let mut oriented = matrix.clone();
    for (mut column, objective) in oriented.axis_iter_mut(Axis(1)).zip(objectives) {
        let sign = objective.direction.sign();
        column.mapv_inplace(|v| sign * v);
    }
    oriented
}

fn check_shape(what: &str, actual: (usize, usize), expected: (usize, usize)) -> Result<()> {
    if actual != expected {
        return Err(DiscoveryError::ShapeError {
            expected: format!("{} matrix {:?}", what, expected),
            actual: format!("{:?}", actual),
        });
    }
    Ok(())
}
