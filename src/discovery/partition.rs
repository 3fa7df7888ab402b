//! Split dataset rows into labeled and unlabeled sets

use super::preprocessing::numeric_column;
use crate::error::{DiscoveryError, Result};
use ndarray::Array2;
use polars::prelude::*;

/// Row indices (into the dataset) of measured and to-be-predicted rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPartition {
    /// Rows with a value for the first target, ascending
    pub labeled: Vec<usize>,
    /// Rows without one, ascending
    pub unlabeled: Vec<usize>,
}

impl LabelPartition {
    pub fn n_rows(&self) -> usize {
        self.labeled.len() + self.unlabeled.len()
    }
}

/// Partition rows by whether the first primary target is populated.
///
/// Every further target must be labeled on exactly the same rows.
pub fn partition(dataset: &DataFrame, targets: &[String]) -> Result<LabelPartition> {
    let first = targets.first().ok_or_else(|| {
        DiscoveryError::InvalidConfiguration("no targets were specified".to_string())
    })?;

    let values = numeric_column(dataset, first)?;
    let (labeled, unlabeled): (Vec<usize>, Vec<usize>) =
        (0..values.len()).partition(|&i| values[i].is_some());

    if labeled.is_empty() {
        return Err(DiscoveryError::InvalidData(format!(
            "no labels exist for target '{}'",
            first
        )));
    }
    if unlabeled.is_empty() {
        return Err(DiscoveryError::InvalidData(format!(
            "all data is already labelled for target '{}'",
            first
        )));
    }

    for target in &targets[1..] {
        let other = numeric_column(dataset, target)?;
        let mismatch = values
            .iter()
            .zip(&other)
            .position(|(a, b)| a.is_some() != b.is_some());
        if let Some(row) = mismatch {
            return Err(DiscoveryError::InvalidData(format!(
                "targets used are labelled for differing rows: '{}' and '{}' disagree at row {}",
                first, target, row
            )));
        }
    }

    Ok(LabelPartition { labeled, unlabeled })
}

/// Numeric target matrix (rows = dataset rows, columns = `columns`).
/// Missing cells are NaN.
pub fn value_matrix(dataset: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
    let n_rows = dataset.height();
    let mut matrix = Array2::from_elem((n_rows, columns.len()), f64::NAN);
    for (j, name) in columns.iter().enumerate() {
        for (i, v) in numeric_column(dataset, name)?.into_iter().enumerate() {
            if let Some(v) = v {
                matrix[[i, j]] = v;
            }
        }
    }
    Ok(matrix)
}
