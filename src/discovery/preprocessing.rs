//! Feature preprocessing: ordinal encoding of categorical columns and
//! removal of empty columns

use crate::error::{DiscoveryError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Numeric view of the feature columns, row-indexed like the dataset
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// Names of the columns that survived preprocessing, in matrix column order
    pub names: Vec<String>,
    /// One row per dataset row
    pub values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }
}

/// Ordinal encoder for string columns.
///
/// Codes follow the sorted order of the distinct values, so the same set of
/// categories always maps to the same integers regardless of row order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrdinalEncoder {
    // column name -> (category -> code)
    mappings: HashMap<String, HashMap<String, usize>>,
}

impl OrdinalEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn the category codes of a string column
    pub fn fit_column(&mut self, name: &str, series: &Series) -> Result<&mut Self> {
        let mapping = Self::build_mapping(series)?;
        self.mappings.insert(name.to_string(), mapping);
        Ok(self)
    }

    /// Encode a string column, keeping nulls as nulls
    pub fn transform_column(&self, name: &str, series: &Series) -> Result<Vec<Option<f64>>> {
        let mapping = self
            .mappings
            .get(name)
            .ok_or(DiscoveryError::ModelNotFitted)?;
        let ca = series.str()?;
        Ok(ca
            .into_iter()
            .map(|v| v.and_then(|s| mapping.get(s).map(|&code| code as f64)))
            .collect())
    }

    fn build_mapping(series: &Series) -> Result<HashMap<String, usize>> {
        let ca = series.str()?;
        let categories: BTreeSet<&str> = ca.into_iter().flatten().collect();
        Ok(categories
            .into_iter()
            .enumerate()
            .map(|(code, value)| (value.to_string(), code))
            .collect())
    }
}

/// Encode categorical features and drop columns that carry no values.
///
/// Reads `dataset` without modifying it.
pub fn preprocess(dataset: &DataFrame, feature_columns: &[String]) -> Result<FeatureMatrix> {
    let mut encoder = OrdinalEncoder::new();
    let mut names = Vec::with_capacity(feature_columns.len());
    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(feature_columns.len());

    for name in feature_columns {
        let series = column_series(dataset, name)?;

        let values = if matches!(series.dtype(), DataType::String) {
            encoder.fit_column(name, series)?;
            encoder.transform_column(name, series)?
        } else {
            numeric_values(name, series)?
        };

        let missing = values.iter().filter(|v| v.is_none()).count();
        if missing == values.len() {
            debug!(column = %name, "Dropping empty feature column");
            continue;
        }
        if missing > 0 {
            return Err(DiscoveryError::InvalidData(format!(
                "feature column '{}' has missing values in {} of {} rows",
                name,
                missing,
                values.len()
            )));
        }

        names.push(name.clone());
        columns.push(values.into_iter().flatten().collect());
    }

    if names.is_empty() {
        return Err(DiscoveryError::InvalidData(
            "every feature column is empty".to_string(),
        ));
    }

    let n_rows = dataset.height();
    let values = Array2::from_shape_fn((n_rows, columns.len()), |(i, j)| columns[j][i]);

    Ok(FeatureMatrix { names, values })
}

/// Look up a column by name and materialize it as a series
pub(crate) fn column_series<'a>(dataset: &'a DataFrame, name: &str) -> Result<&'a Series> {
    dataset
        .column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| DiscoveryError::ColumnNotFound(name.to_string()))
}

/// Values of a numeric column as `f64`; nulls and NaN both become `None`
pub(crate) fn numeric_values(name: &str, series: &Series) -> Result<Vec<Option<f64>>> {
    let cast = series.cast(&DataType::Float64).map_err(|e| {
        DiscoveryError::InvalidData(format!("column '{}' is not numeric: {}", name, e))
    })?;
    let ca = cast.f64()?;
    Ok(ca
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Numeric values of a named column
pub(crate) fn numeric_column(dataset: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = column_series(dataset, name)?;
    numeric_values(name, series)
}
