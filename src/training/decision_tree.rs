//! Regression tree used as the forest base learner

use crate::error::{DiscoveryError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// Variance-reduction regression tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_regressor()
    }
}

impl DecisionTree {
    pub fn new_regressor() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(DiscoveryError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(DiscoveryError::TrainingError("Empty dataset".into()));
        }

        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0));
        Ok(self)
    }

    fn build_tree(&self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize], depth: usize) -> TreeNode {
        let n_samples = indices.len();
        let leaf = || TreeNode::Leaf {
            value: indices.iter().map(|&i| y[i]).sum::<f64>() / n_samples as f64,
            n_samples,
        };

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_constant(indices.iter().map(|&i| y[i]));
        if should_stop {
            return leaf();
        }

        match self.find_best_split(x, y, indices) {
            Some((feature_idx, threshold)) => {
                let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| x[[i, feature_idx]] <= threshold);

                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left: Box::new(self.build_tree(x, y, &left_indices, depth + 1)),
                    right: Box::new(self.build_tree(x, y, &right_indices, depth + 1)),
                    n_samples,
                }
            }
            None => leaf(),
        }
    }

    /// Split with the largest reduction in summed squared error.
    /// Ties keep the lowest feature index and threshold.
    fn find_best_split(&self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> Option<(usize, f64)> {
        let n = indices.len();
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let parent_sse_term = total_sum * total_sum / n as f64;

        let mut best: Option<(usize, f64, f64)> = None;
        let mut order: Vec<usize> = indices.to_vec();

        for feature_idx in 0..x.ncols() {
            order.sort_by(|&a, &b| {
                x[[a, feature_idx]]
                    .partial_cmp(&x[[b, feature_idx]])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            // Sweep sorted values keeping running left sums
            let mut left_sum = 0.0;
            for k in 0..n - 1 {
                left_sum += y[order[k]];
                let left_count = k + 1;
                let right_count = n - left_count;

                let here = x[[order[k], feature_idx]];
                let next = x[[order[k + 1], feature_idx]];
                if next <= here {
                    continue;
                }
                if left_count < self.min_samples_leaf || right_count < self.min_samples_leaf {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let gain = left_sum * left_sum / left_count as f64
                    + right_sum * right_sum / right_count as f64
                    - parent_sse_term;

                if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature_idx, (here + next) / 2.0, gain));
                }
            }
        }

        best.map(|(f, t, _)| (f, t))
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(DiscoveryError::ModelNotFitted)?;
        Ok(x.rows().into_iter().map(|row| predict_sample(root, &row.to_vec())).collect())
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        self.root.as_ref().map_or(0, node_depth)
    }
}

fn predict_sample(node: &TreeNode, sample: &[f64]) -> f64 {
    match node {
        TreeNode::Leaf { value, .. } => *value,
        TreeNode::Split { feature_idx, threshold, left, right, .. } => {
            if sample[*feature_idx] <= *threshold {
                predict_sample(left, sample)
            } else {
                predict_sample(right, sample)
            }
        }
    }
}

fn node_depth(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 1,
        TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
    }
}

fn is_constant(mut values: impl Iterator<Item = f64>) -> bool {
    match values.next() {
        Some(first) => values.all(|v| (v - first).abs() < 1e-12),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regressor_fits_training_data() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();
        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_picks_informative_feature() {
        let x = array![[0.0, 1.0], [0.0, 2.0], [0.0, 3.0], [0.0, 4.0]];
        let y = array![0.0, 0.0, 10.0, 10.0];

        let mut tree = DecisionTree::new_regressor().with_max_depth(Some(1));
        tree.fit(&x, &y).unwrap();
        let predictions = tree.predict(&array![[0.0, 1.5], [0.0, 3.5]]).unwrap();
        assert_eq!(predictions, array![0.0, 10.0]);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![1.0, 4.0, 2.0, 8.0, 3.0, 9.0];

        let mut tree = DecisionTree::new_regressor().with_max_depth(Some(2));
        tree.fit(&x, &y).unwrap();
        assert!(tree.get_depth() <= 3);
    }

    #[test]
    fn test_constant_features_give_mean_leaf() {
        let x = array![[1.0], [1.0], [1.0]];
        let y = array![1.0, 2.0, 6.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.get_depth(), 1);
        assert_eq!(tree.predict(&array![[7.0]]).unwrap()[0], 3.0);
    }

    #[test]
    fn test_unfitted() {
        let tree = DecisionTree::new_regressor();
        assert!(tree.predict(&array![[1.0]]).is_err());
    }
}
