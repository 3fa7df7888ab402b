//! Random forest regressor with jackknife variance estimates
//!
//! Each tree is grown on a bootstrap sample; the in-bag counts are kept so
//! the spread of the tree predictions can be turned into a variance with the
//! bias-corrected jackknife-after-bootstrap and infinitesimal jackknife
//! estimators (Wager, Hastie & Efron, 2014). The reported variance is the
//! mean of the two, clamped at zero.

use super::decision_tree::DecisionTree;
use super::Surrogate;
use crate::error::{DiscoveryError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Smallest training set the jackknife estimators accept
pub const JACKKNIFE_MIN_ROWS: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 128,
            max_depth: None,
            min_samples_leaf: 1,
        }
    }
}

impl ForestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators < 2 {
            return Err(DiscoveryError::InvalidConfiguration(format!(
                "random forest needs at least 2 trees, got {}",
                self.n_estimators
            )));
        }
        if self.min_samples_leaf == 0 {
            return Err(DiscoveryError::InvalidConfiguration(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub config: ForestConfig,
    /// Base seed; tree `b` uses `random_state + b`
    pub random_state: u64,
    trees: Vec<DecisionTree>,
    /// In-bag counts, one row per tree, one column per training row
    inbag: Option<Array2<f64>>,
}

impl RandomForest {
    pub fn new(config: ForestConfig, random_state: u64) -> Self {
        Self {
            config,
            random_state,
            trees: Vec::new(),
            inbag: None,
        }
    }

    /// Fit the forest to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(DiscoveryError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples < JACKKNIFE_MIN_ROWS {
            return Err(DiscoveryError::TrainingError(format!(
                "jackknife variance needs at least {} training rows, got {}",
                JACKKNIFE_MIN_ROWS, n_samples
            )));
        }

        let base_seed = self.random_state;
        let config = &self.config;

        let fitted: Vec<(DecisionTree, Vec<usize>)> = (0..config.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<(DecisionTree, Vec<usize>)> {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));
                let sample_indices: Vec<usize> =
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();

                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot = y.select(Axis(0), &sample_indices);

                let mut tree = DecisionTree::new_regressor()
                    .with_max_depth(config.max_depth)
                    .with_min_samples_leaf(config.min_samples_leaf);
                tree.fit(&x_boot, &y_boot)?;
                Ok((tree, sample_indices))
            })
            .collect::<Result<_>>()?;

        let mut inbag = Array2::zeros((fitted.len(), n_samples));
        let mut trees = Vec::with_capacity(fitted.len());
        for (b, (tree, sample_indices)) in fitted.into_iter().enumerate() {
            for i in sample_indices {
                inbag[[b, i]] += 1.0;
            }
            trees.push(tree);
        }

        self.trees = trees;
        self.inbag = Some(inbag);
        Ok(self)
    }

    /// Per-tree predictions, one row per tree
    fn tree_predictions(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(DiscoveryError::ModelNotFitted);
        }
        let rows: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<_>>()?;

        let mut preds = Array2::zeros((rows.len(), x.nrows()));
        for (b, row) in rows.into_iter().enumerate() {
            preds.row_mut(b).assign(&row);
        }
        Ok(preds)
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let preds = self.tree_predictions(x)?;
        preds
            .mean_axis(Axis(0))
            .ok_or_else(|| DiscoveryError::TrainingError("forest has no trees".into()))
    }

    /// Mean prediction and jackknife standard deviation
    pub fn predict_with_std(&self, x: &Array2<f64>) -> Result<(Array1<f64>, Array1<f64>)> {
        let inbag = self.inbag.as_ref().ok_or(DiscoveryError::ModelNotFitted)?;
        let preds = self.tree_predictions(x)?;
        let variance = jackknife_variance(inbag, &preds);
        let mean = preds
            .mean_axis(Axis(0))
            .ok_or_else(|| DiscoveryError::TrainingError("forest has no trees".into()))?;
        Ok((mean, variance.mapv(f64::sqrt)))
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Surrogate for RandomForest {
    fn name(&self) -> &'static str {
        "random_forest_jackknife"
    }

    fn min_training_rows(&self) -> Option<usize> {
        Some(JACKKNIFE_MIN_ROWS)
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        RandomForest::fit(self, x, y).map(|_| ())
    }

    fn predict_with_uncertainty(&self, x: &Array2<f64>) -> Result<(Array1<f64>, Array1<f64>)> {
        self.predict_with_std(x)
    }
}

/// Variance of the bagged mean at each prediction point.
///
/// `inbag` is trees × training rows, `preds` is trees × prediction points.
fn jackknife_variance(inbag: &Array2<f64>, preds: &Array2<f64>) -> Array1<f64> {
    let n_trees = preds.nrows() as f64;
    let n_train = inbag.ncols() as f64;

    let mean_pred = preds.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(preds.ncols()));
    let centered_preds = preds - &mean_pred;
    let mean_counts = inbag.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(inbag.ncols()));
    let centered_counts = inbag - &mean_counts;

    // Monte Carlo noise of the bagged estimate, sum over trees of (t_b - t̄)²
    let spread = centered_preds.mapv(|v| v * v).sum_axis(Axis(0));

    // Infinitesimal jackknife: Σ_i Cov_b(N_bi, t_b)²
    let cov = centered_counts.t().dot(&centered_preds) / n_trees;
    let v_ij = cov.mapv(|v| v * v).sum_axis(Axis(0));
    let v_ij_unbiased = &v_ij - &(&spread * (n_train / (n_trees * n_trees)));

    // Jackknife-after-bootstrap over trees that left row i out
    let oob = inbag.mapv(|c| if c == 0.0 { 1.0 } else { 0.0 });
    let oob_counts = oob.sum_axis(Axis(0));
    let oob_sums = oob.t().dot(preds);
    let mut v_j = Array1::<f64>::zeros(preds.ncols());
    for (i, &count) in oob_counts.iter().enumerate() {
        if count == 0.0 {
            continue;
        }
        for k in 0..preds.ncols() {
            let diff = oob_sums[[i, k]] / count - mean_pred[k];
            v_j[k] += diff * diff;
        }
    }
    v_j *= (n_train - 1.0) / n_train;
    let v_j_unbiased =
        &v_j - &(&spread * ((std::f64::consts::E - 1.0) * n_train / (n_trees * n_trees)));

    ((v_ij_unbiased + v_j_unbiased) * 0.5).mapv(|v| v.max(0.0))
}
