//! Gaussian Process Regression
//!
//! Constant × RBF kernel, `k(a, b) = c · exp(-‖a − b‖² / 2ℓ²)`, with zero prior
//! mean. The hyperparameters `(c, ℓ)` maximize the log marginal likelihood
//! inside their bounds; the search runs in log space from the configured
//! initial values plus a number of seeded random restarts.

use super::Surrogate;
use crate::error::{DiscoveryError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GPConfig {
    /// Initial constant (signal variance) factor
    pub constant_value: f64,
    pub constant_bounds: (f64, f64),
    /// Initial RBF length scale
    pub length_scale: f64,
    pub length_scale_bounds: (f64, f64),
    /// Value added to the kernel diagonal
    pub alpha: f64,
    /// Random restarts on top of the initial start
    pub n_restarts_optimizer: usize,
    /// Iteration cap of a single optimizer start
    pub max_iter: usize,
}

impl Default for GPConfig {
    fn default() -> Self {
        Self {
            constant_value: 1.0,
            constant_bounds: (1e-3, 1e3),
            length_scale: 10.0,
            length_scale_bounds: (1e-2, 1e2),
            alpha: 1e-10,
            n_restarts_optimizer: 9,
            max_iter: 200,
        }
    }
}

impl GPConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value, (lo, hi)) in [
            ("constant_value", self.constant_value, self.constant_bounds),
            ("length_scale", self.length_scale, self.length_scale_bounds),
        ] {
            if !(lo > 0.0 && lo <= hi && hi.is_finite()) {
                return Err(DiscoveryError::InvalidConfiguration(format!(
                    "bounds of {} must satisfy 0 < low <= high, got ({}, {})",
                    name, lo, hi
                )));
            }
            if !(lo..=hi).contains(&value) {
                return Err(DiscoveryError::InvalidConfiguration(format!(
                    "{} = {} lies outside its bounds ({}, {})",
                    name, value, lo, hi
                )));
            }
        }
        if !(self.alpha >= 0.0 && self.alpha.is_finite()) {
            return Err(DiscoveryError::InvalidConfiguration(format!(
                "alpha must be a non-negative number, got {}",
                self.alpha
            )));
        }
        Ok(())
    }

    fn log_bounds(&self) -> [(f64, f64); 2] {
        [
            (self.constant_bounds.0.ln(), self.constant_bounds.1.ln()),
            (self.length_scale_bounds.0.ln(), self.length_scale_bounds.1.ln()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianProcessRegressor {
    pub config: GPConfig,
    random_state: u64,
    constant: f64,
    length_scale: f64,
    x_train: Option<Array2<f64>>,
    alpha: Option<Array1<f64>>,      // K^-1 y
    cholesky_l: Option<Array2<f64>>, // K = L L^T
}

impl GaussianProcessRegressor {
    pub fn new(config: GPConfig, random_state: u64) -> Self {
        Self {
            constant: config.constant_value,
            length_scale: config.length_scale,
            config,
            random_state,
            x_train: None,
            alpha: None,
            cholesky_l: None,
        }
    }

    /// Fitted `(constant, length_scale)`
    pub fn kernel_params(&self) -> (f64, f64) {
        (self.constant, self.length_scale)
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n = x.nrows();
        if n == 0 {
            return Err(DiscoveryError::TrainingError("Empty dataset".into()));
        }
        if n != y.len() {
            return Err(DiscoveryError::ShapeError {
                expected: format!("y length = {}", n),
                actual: format!("y length = {}", y.len()),
            });
        }

        let sq_dist = squared_distances(x, x);
        let bounds = self.config.log_bounds();

        let mut starts = vec![[self.config.constant_value.ln(), self.config.length_scale.ln()]];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.random_state);
        for _ in 0..self.config.n_restarts_optimizer {
            starts.push([
                rng.gen_range(bounds[0].0..=bounds[0].1),
                rng.gen_range(bounds[1].0..=bounds[1].1),
            ]);
        }

        let noise = self.config.alpha;
        let max_iter = self.config.max_iter;
        let results: Vec<Option<([f64; 2], f64)>> = starts
            .par_iter()
            .map(|start| maximize_lml(*start, &bounds, &sq_dist, y, noise, max_iter))
            .collect();

        let mut best: Option<([f64; 2], f64)> = None;
        for (i, result) in results.into_iter().enumerate() {
            match result {
                Some((theta, lml)) => {
                    debug!(
                        start = i,
                        constant = theta[0].exp(),
                        length_scale = theta[1].exp(),
                        lml,
                        "GP optimizer start finished"
                    );
                    if best.map_or(true, |(_, b)| lml > b) {
                        best = Some((theta, lml));
                    }
                }
                None => debug!(start = i, "GP optimizer start failed"),
            }
        }

        let (theta, lml) = best.ok_or_else(|| {
            DiscoveryError::TrainingError(
                "log marginal likelihood could not be evaluated from any starting point".into(),
            )
        })?;

        self.constant = theta[0].exp();
        self.length_scale = theta[1].exp();

        let k = kernel_from_sq_dist(&sq_dist, self.constant, self.length_scale, noise);
        let l = cholesky(&k).ok_or_else(|| {
            DiscoveryError::TrainingError("Kernel matrix not positive definite".into())
        })?;
        let alpha = back_substitute(&l, &forward_substitute(&l, y));

        debug!(
            constant = self.constant,
            length_scale = self.length_scale,
            lml,
            "GP hyperparameters selected"
        );
        self.x_train = Some(x.clone());
        self.alpha = Some(alpha);
        self.cholesky_l = Some(l);
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let x_train = self.x_train.as_ref().ok_or(DiscoveryError::ModelNotFitted)?;
        let alpha = self.alpha.as_ref().ok_or(DiscoveryError::ModelNotFitted)?;
        let k_star = kernel_from_sq_dist(&squared_distances(x, x_train), self.constant, self.length_scale, 0.0);
        Ok(k_star.dot(alpha))
    }

    /// Posterior mean and standard deviation
    pub fn predict_with_std(&self, x: &Array2<f64>) -> Result<(Array1<f64>, Array1<f64>)> {
        let x_train = self.x_train.as_ref().ok_or(DiscoveryError::ModelNotFitted)?;
        let alpha = self.alpha.as_ref().ok_or(DiscoveryError::ModelNotFitted)?;
        let l = self.cholesky_l.as_ref().ok_or(DiscoveryError::ModelNotFitted)?;

        let k_star = kernel_from_sq_dist(&squared_distances(x, x_train), self.constant, self.length_scale, 0.0);
        let means = k_star.dot(alpha);

        let stds = k_star
            .rows()
            .into_iter()
            .map(|k_row| {
                // Variance = k(x*, x*) - v^T v with v = L^{-1} k*
                let v = forward_substitute(l, &k_row.to_owned());
                (self.constant - v.dot(&v)).max(0.0).sqrt()
            })
            .collect();

        Ok((means, stds))
    }
}

impl Surrogate for GaussianProcessRegressor {
    fn name(&self) -> &'static str {
        "gaussian_process"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        GaussianProcessRegressor::fit(self, x, y)
    }

    fn predict_with_uncertainty(&self, x: &Array2<f64>) -> Result<(Array1<f64>, Array1<f64>)> {
        self.predict_with_std(x)
    }
}

/// Log marginal likelihood and its gradient with respect to `(ln c, ln ℓ)`.
/// `None` when the kernel matrix cannot be factorized.
fn lml_with_gradient(
    theta: [f64; 2],
    sq_dist: &Array2<f64>,
    y: &Array1<f64>,
    noise: f64,
) -> Option<(f64, [f64; 2])> {
    let n = y.len();
    let c = theta[0].exp();
    let ls = theta[1].exp();

    let k_signal = kernel_from_sq_dist(sq_dist, c, ls, 0.0);
    let mut k = k_signal.clone();
    k.diag_mut().mapv_inplace(|v| v + noise);

    let l = cholesky(&k)?;
    let alpha = back_substitute(&l, &forward_substitute(&l, y));

    let lml = -0.5 * y.dot(&alpha)
        - l.diag().iter().map(|d| d.ln()).sum::<f64>()
        - 0.5 * n as f64 * (2.0 * PI).ln();
    if !lml.is_finite() {
        return None;
    }

    // dLML/dθ = ½ tr((ααᵀ − K⁻¹) ∂K/∂θ)
    let k_inv = cholesky_inverse(&l);
    let mut grad = [0.0; 2];
    for i in 0..n {
        for j in 0..n {
            let w = alpha[i] * alpha[j] - k_inv[[i, j]];
            let dk_dc = k_signal[[i, j]];
            grad[0] += w * dk_dc;
            grad[1] += w * dk_dc * sq_dist[[i, j]] / (ls * ls);
        }
    }
    grad[0] *= 0.5;
    grad[1] *= 0.5;

    Some((lml, grad))
}

/// Projected gradient ascent with backtracking inside box bounds
fn maximize_lml(
    start: [f64; 2],
    bounds: &[(f64, f64); 2],
    sq_dist: &Array2<f64>,
    y: &Array1<f64>,
    noise: f64,
    max_iter: usize,
) -> Option<([f64; 2], f64)> {
    let project = |t: [f64; 2]| {
        [
            t[0].clamp(bounds[0].0, bounds[0].1),
            t[1].clamp(bounds[1].0, bounds[1].1),
        ]
    };

    let mut theta = project(start);
    let (mut f, mut grad) = lml_with_gradient(theta, sq_dist, y, noise)?;
    let mut step = 1.0;

    for _ in 0..max_iter {
        let mut t = step;
        let mut moved = None;
        while t > 1e-12 {
            let candidate = project([theta[0] + t * grad[0], theta[1] + t * grad[1]]);
            let delta = [candidate[0] - theta[0], candidate[1] - theta[1]];
            if let Some((fc, gc)) = lml_with_gradient(candidate, sq_dist, y, noise) {
                // Armijo condition on the projected step
                if fc >= f + 1e-4 * (grad[0] * delta[0] + grad[1] * delta[1]) {
                    moved = Some((candidate, delta, fc, gc, t));
                    break;
                }
            }
            t *= 0.5;
        }

        let Some((candidate, delta, fc, gc, t_used)) = moved else {
            break;
        };
        let improvement = fc - f;
        theta = candidate;
        f = fc;
        grad = gc;
        step = (t_used * 2.0).min(1e4);

        if delta[0].abs().max(delta[1].abs()) < 1e-9 || improvement.abs() < 1e-10 * f.abs().max(1.0) {
            break;
        }
    }

    Some((theta, f))
}

/// Pairwise squared Euclidean distances between the rows of `a` and `b`
pub(crate) fn squared_distances(a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    let mut d = Array2::zeros((a.nrows(), b.nrows()));
    for (i, row_a) in a.axis_iter(Axis(0)).enumerate() {
        for (j, row_b) in b.axis_iter(Axis(0)).enumerate() {
            d[[i, j]] = row_a
                .iter()
                .zip(row_b.iter())
                .map(|(&p, &q)| (p - q).powi(2))
                .sum();
        }
    }
    d
}

fn kernel_from_sq_dist(sq_dist: &Array2<f64>, constant: f64, length_scale: f64, noise: f64) -> Array2<f64> {
    let mut k = sq_dist.mapv(|d| constant * (-d / (2.0 * length_scale * length_scale)).exp());
    if noise > 0.0 {
        k.diag_mut().mapv_inplace(|v| v + noise);
    }
    k
}

/// Cholesky factor `L` with `A = L Lᵀ`; `None` if `A` is not positive definite
fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let val = a[[i, i]] - sum;
                if !(val > 0.0) {
                    return None;
                }
                l[[i, j]] = val.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Solve `L y = b`
fn forward_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = b.len();
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
        y[i] = (b[i] - sum) / l[[i, i]];
    }
    y
}

/// Solve `Lᵀ x = y`
fn back_substitute(l: &Array2<f64>, y: &Array1<f64>) -> Array1<f64> {
    let n = y.len();
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = (i + 1..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (y[i] - sum) / l[[i, i]];
    }
    x
}

/// `(L Lᵀ)⁻¹` column by column
fn cholesky_inverse(l: &Array2<f64>) -> Array2<f64> {
    let n = l.nrows();
    let mut inv = Array2::zeros((n, n));
    for j in 0..n {
        let mut e = Array1::zeros(n);
        e[j] = 1.0;
        let col = back_substitute(l, &forward_substitute(l, &e));
        inv.column_mut(j).assign(&col);
    }
    inv
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sine_data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 1), |(i, _)| i as f64 / 2.0);
        let y = x.column(0).mapv(|v| v.sin());
        (x, y)
    }

    #[test]
    fn test_gp_interpolates_training_points() {
        let (x, y) = sine_data(12);
        let mut model = GaussianProcessRegressor::new(GPConfig::default(), 42);
        model.fit(&x, &y).unwrap();
        let (means, stds) = model.predict_with_std(&x).unwrap();
        for i in 0..y.len() {
            assert!((means[i] - y[i]).abs() < 1e-3, "row {}: {} vs {}", i, means[i], y[i]);
            assert!(stds[i] < 1e-2);
        }
    }

    #[test]
    fn test_gp_uncertainty_grows_away_from_data() {
        let (x, y) = sine_data(10);
        let mut model = GaussianProcessRegressor::new(GPConfig::default(), 42);
        model.fit(&x, &y).unwrap();
        let x_test = array![[2.25], [40.0]];
        let (_, stds) = model.predict_with_std(&x_test).unwrap();
        assert!(stds.iter().all(|&s| s >= 0.0));
        assert!(stds[1] > stds[0]);
    }

    #[test]
    fn test_gp_params_within_bounds() {
        let (x, y) = sine_data(8);
        let config = GPConfig::default();
        let mut model = GaussianProcessRegressor::new(config.clone(), 7);
        model.fit(&x, &y).unwrap();
        let (c, ls) = model.kernel_params();
        assert!(c >= config.constant_bounds.0 * 0.999 && c <= config.constant_bounds.1 * 1.001);
        assert!(ls >= config.length_scale_bounds.0 * 0.999 && ls <= config.length_scale_bounds.1 * 1.001);
    }

    #[test]
    fn test_gp_deterministic_for_seed() {
        let (x, y) = sine_data(9);
        let x_test = array![[0.3], [5.1]];
        let run = || {
            let mut model = GaussianProcessRegressor::new(GPConfig::default(), 42);
            model.fit(&x, &y).unwrap();
            model.predict_with_std(&x_test).unwrap()
        };
        let (m1, s1) = run();
        let (m2, s2) = run();
        assert_eq!(m1, m2);
        assert_eq!(s1, s2);
    }

    #[test]
    fn test_gp_sign_equivariant() {
        let (x, y) = sine_data(8);
        let x_test = array![[0.75], [3.3]];
        let mut pos = GaussianProcessRegressor::new(GPConfig::default(), 42);
        pos.fit(&x, &y).unwrap();
        let mut neg = GaussianProcessRegressor::new(GPConfig::default(), 42);
        neg.fit(&x, &y.mapv(|v| -v)).unwrap();
        let (mp, sp) = pos.predict_with_std(&x_test).unwrap();
        let (mn, sn) = neg.predict_with_std(&x_test).unwrap();
        for i in 0..2 {
            assert!((mp[i] + mn[i]).abs() < 1e-9);
            assert!((sp[i] - sn[i]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_gp_predict_unfitted() {
        let model = GaussianProcessRegressor::new(GPConfig::default(), 42);
        assert!(matches!(
            model.predict(&array![[1.0]]),
            Err(DiscoveryError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_gp_config_validation() {
        let bad = GPConfig { length_scale: 500.0, ..Default::default() };
        assert!(bad.validate().is_err());
        assert!(GPConfig::default().validate().is_ok());
    }

    #[test]
    fn test_gp_cholesky() {
        let a = array![[4.0, 2.0, 1.0], [2.0, 5.0, 3.0], [1.0, 3.0, 6.0]];
        let b = array![1.0, 2.0, 3.0];
        let l = cholesky(&a).unwrap();
        let x = back_substitute(&l, &forward_substitute(&l, &b));
        let result = a.dot(&x);
        for i in 0..3 {
            assert!((result[i] - b[i]).abs() < 1e-10);
        }
        let inv = cholesky_inverse(&l);
        let eye = a.dot(&inv);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((eye[[i, j]] - expected).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn test_gp_lml_gradient_matches_finite_difference() {
        let (x, y) = sine_data(6);
        let d = squared_distances(&x, &x);
        let theta = [0.3_f64, 0.2_f64];
        let (_, grad) = lml_with_gradient(theta, &d, &y, 1e-2).unwrap();
        let h = 1e-5;
        for k in 0..2 {
            let mut up = theta;
            let mut down = theta;
            up[k] += h;
            down[k] -= h;
            let fu = lml_with_gradient(up, &d, &y, 1e-2).unwrap().0;
            let fd = lml_with_gradient(down, &d, &y, 1e-2).unwrap().0;
            let numeric = (fu - fd) / (2.0 * h);
            assert!((numeric - grad[k]).abs() < 1e-3 * numeric.abs().max(1.0), "{} vs {}", numeric, grad[k]);
        }
    }
}
