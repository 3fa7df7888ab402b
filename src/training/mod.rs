//! Surrogate model fitting
//!
//! Two interchangeable backends implement [`Surrogate`]:
//! - Gaussian Process Regression (posterior mean and standard deviation)
//! - Random Forest with jackknife variance estimates
//!
//! [`SurrogateFitter`] trains one fresh model per primary target on the
//! labeled rows and collects predictions for the unlabeled rows into
//! pre-sized matrices, one column per target in target order.

pub mod decision_tree;
pub mod gaussian_process_regression;
pub mod random_forest;

pub use decision_tree::{DecisionTree, TreeNode};
pub use gaussian_process_regression::{GPConfig, GaussianProcessRegressor};
pub use random_forest::{ForestConfig, RandomForest, JACKKNIFE_MIN_ROWS};

use crate::discovery::config::{ExperimentConfig, ModelBackend};
use crate::discovery::partition::LabelPartition;
use crate::error::{DiscoveryError, Result};
use ndarray::{Array1, Array2, Axis};
use tracing::{debug, info, warn};

/// Replication factor applied to training sets below a backend's minimum size
pub const SMALL_SAMPLE_REPLICATION: usize = 4;

/// A regression model that reports its own predictive uncertainty
pub trait Surrogate: Send {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Smallest training set the model's uncertainty estimate supports
    fn min_training_rows(&self) -> Option<usize> {
        None
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Mean and standard deviation per row of `x`
    fn predict_with_uncertainty(&self, x: &Array2<f64>) -> Result<(Array1<f64>, Array1<f64>)>;
}

/// Predictions for the unlabeled rows, one column per primary target
#[derive(Debug, Clone)]
pub struct Predictions {
    pub mean: Array2<f64>,
    pub uncertainty: Array2<f64>,
}

/// Builds and trains per-target surrogate models
#[derive(Debug, Clone)]
pub struct SurrogateFitter {
    backend: ModelBackend,
    gp_config: GPConfig,
    forest_config: ForestConfig,
    random_state: u64,
}

impl SurrogateFitter {
    pub fn new(backend: ModelBackend, random_state: u64) -> Self {
        Self {
            backend,
            gp_config: GPConfig::default(),
            forest_config: ForestConfig::default(),
            random_state,
        }
    }

    pub fn from_config(config: &ExperimentConfig) -> Self {
        Self {
            backend: config.model,
            gp_config: config.gaussian_process.clone(),
            forest_config: config.random_forest.clone(),
            random_state: config.random_state,
        }
    }

    /// Fresh, unfitted model for one target
    pub fn build(&self) -> Box<dyn Surrogate> {
        match self.backend {
            ModelBackend::GaussianProcess => Box::new(GaussianProcessRegressor::new(
                self.gp_config.clone(),
                self.random_state,
            )),
            ModelBackend::RandomForestJackknife => Box::new(RandomForest::new(
                self.forest_config.clone(),
                self.random_state,
            )),
        }
    }

    /// Train on the labeled rows and predict the unlabeled ones, per target.
    ///
    /// `features` and `targets` are row-indexed like the dataset; `targets`
    /// has one column per name in `target_names`.
    pub fn fit_and_predict(
        &self,
        features: &Array2<f64>,
        targets: &Array2<f64>,
        partition: &LabelPartition,
        target_names: &[String],
    ) -> Result<Predictions> {
        if targets.ncols() != target_names.len() {
            return Err(DiscoveryError::ShapeError {
                expected: format!("{} target columns", target_names.len()),
                actual: format!("{} target columns", targets.ncols()),
            });
        }

        let n_rows = features.nrows();
        let x_train = features.select(Axis(0), &partition.labeled);
        let x_predict = features.select(Axis(0), &partition.unlabeled);

        let mut mean = Array2::zeros((partition.unlabeled.len(), target_names.len()));
        let mut uncertainty = Array2::zeros((partition.unlabeled.len(), target_names.len()));

        for (j, name) in target_names.iter().enumerate() {
            let y_train = targets.column(j).select(Axis(0), &partition.labeled);

            if y_train.is_empty() || y_train.len() >= n_rows {
                return Err(DiscoveryError::InvalidData(format!(
                    "target '{}' has {} labelled rows out of {}; need at least one labelled and one unlabelled row",
                    name,
                    y_train.len(),
                    n_rows
                )));
            }
            if y_train.iter().any(|v| !v.is_finite()) {
                return Err(DiscoveryError::InvalidData(format!(
                    "targets used are labelled for differing rows: '{}' is missing values on labelled rows",
                    name
                )));
            }

            let mut model = self.build();
            let (x_fit, y_fit) = match model.min_training_rows() {
                Some(min_rows) if y_train.len() < min_rows => {
                    warn!(
                        target = %name,
                        rows = y_train.len(),
                        min_rows,
                        factor = SMALL_SAMPLE_REPLICATION,
                        "Replicating small training set for the variance estimator"
                    );
                    replicate_small_training_set(&x_train, &y_train, SMALL_SAMPLE_REPLICATION)
                }
                _ => (x_train.clone(), y_train),
            };

            model.fit(&x_fit, &y_fit).map_err(|e| DiscoveryError::ModelFit {
                target: name.clone(),
                reason: e.to_string(),
            })?;
            let (m, s) = model
                .predict_with_uncertainty(&x_predict)
                .map_err(|e| DiscoveryError::ModelFit {
                    target: name.clone(),
                    reason: e.to_string(),
                })?;

            mean.column_mut(j).assign(&m);
            uncertainty.column_mut(j).assign(&s);
            debug!(target = %name, backend = model.name(), rows = y_fit.len(), "Surrogate fitted");
        }

        info!(
            backend = %self.backend,
            targets = target_names.len(),
            predicted_rows = partition.unlabeled.len(),
            "Surrogate predictions complete"
        );
        Ok(Predictions { mean, uncertainty })
    }
}

/// Tile the training rows and labels `factor` times.
///
/// A numerical workaround for variance estimators that refuse small training
/// sets: it changes only the cardinality of the data handed to the model,
/// not the information it contains.
pub fn replicate_small_training_set(
    x: &Array2<f64>,
    y: &Array1<f64>,
    factor: usize,
) -> (Array2<f64>, Array1<f64>) {
    let indices: Vec<usize> = (0..factor).flat_map(|_| 0..x.nrows()).collect();
    (x.select(Axis(0), &indices), y.select(Axis(0), &indices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn partition(labeled: Vec<usize>, unlabeled: Vec<usize>) -> LabelPartition {
        LabelPartition { labeled, unlabeled }
    }

    #[test]
    fn test_replicate_small_training_set() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let y = array![10.0, 20.0];
        let (xr, yr) = replicate_small_training_set(&x, &y, 4);
        assert_eq!(xr.nrows(), 8);
        assert_eq!(yr.to_vec(), vec![10.0, 20.0, 10.0, 20.0, 10.0, 20.0, 10.0, 20.0]);
        assert_eq!(xr.row(6).to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_fit_and_predict_shapes_gp() {
        let features = Array2::from_shape_fn((6, 1), |(i, _)| i as f64);
        let targets = array![
            [1.0, 5.0],
            [2.0, 4.0],
            [3.0, 3.0],
            [4.0, 2.0],
            [f64::NAN, f64::NAN],
            [f64::NAN, f64::NAN]
        ];
        let names = vec!["a".to_string(), "b".to_string()];
        let fitter = SurrogateFitter::new(ModelBackend::GaussianProcess, 42);
        let preds = fitter
            .fit_and_predict(&features, &targets, &partition(vec![0, 1, 2, 3], vec![4, 5]), &names)
            .unwrap();
        assert_eq!(preds.mean.dim(), (2, 2));
        assert_eq!(preds.uncertainty.dim(), (2, 2));
        assert!(preds.uncertainty.iter().all(|&s| s >= 0.0));
    }

    #[test]
    fn test_forest_replication_fallback() {
        let features = Array2::from_shape_fn((9, 1), |(i, _)| i as f64);
        let mut targets = Array2::from_elem((9, 1), f64::NAN);
        for i in 0..7 {
            targets[[i, 0]] = i as f64 * 1.5;
        }
        let names = vec!["y".to_string()];
        let fitter = SurrogateFitter::new(ModelBackend::RandomForestJackknife, 42);
        let preds = fitter
            .fit_and_predict(&features, &targets, &partition((0..7).collect(), vec![7, 8]), &names)
            .unwrap();
        assert!(preds.uncertainty.iter().all(|&s| s >= 0.0 && s.is_finite()));
    }

    #[test]
    fn test_forest_single_label_still_insufficient() {
        let features = Array2::from_shape_fn((3, 1), |(i, _)| i as f64);
        let targets = array![[1.0], [f64::NAN], [f64::NAN]];
        let names = vec!["y".to_string()];
        let fitter = SurrogateFitter::new(ModelBackend::RandomForestJackknife, 42);
        let err = fitter
            .fit_and_predict(&features, &targets, &partition(vec![0], vec![1, 2]), &names)
            .unwrap_err();
        match err {
            DiscoveryError::ModelFit { target, .. } => assert_eq!(target, "y"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_secondary_labels_rejected() {
        let features = Array2::from_shape_fn((4, 1), |(i, _)| i as f64);
        let targets = array![[1.0, 1.0], [2.0, f64::NAN], [f64::NAN, 3.0], [f64::NAN, f64::NAN]];
        let names = vec!["a".to_string(), "b".to_string()];
        let fitter = SurrogateFitter::new(ModelBackend::GaussianProcess, 42);
        let err = fitter
            .fit_and_predict(&features, &targets, &partition(vec![0, 1], vec![2, 3]), &names)
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidData(_)));
    }
}
