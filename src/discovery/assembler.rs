//! Ranked result table and plot-ready sub-tables

use super::partition::LabelPartition;
use super::preprocessing::FeatureMatrix;
use crate::error::{DiscoveryError, Result};
use crate::training::Predictions;
use ndarray::{Array1, ArrayView1};
use polars::prelude::*;

pub const UTILITY_COLUMN: &str = "Utility";
pub const NOVELTY_COLUMN: &str = "Novelty";
pub const ROW_NUMBER_COLUMN: &str = "Row number";
pub const TYPE_COLUMN: &str = "Type";

/// Decimal places of predicted target and uncertainty columns
pub const TARGET_DECIMALS: i32 = 5;
/// Decimal places of the utility and novelty columns
pub const SCORE_DECIMALS: i32 = 6;

/// Name of the uncertainty column added for `target`
pub fn uncertainty_column(target: &str) -> String {
    format!("Uncertainty ({})", target)
}

/// Candidates ranked by utility.
///
/// The result holds the unlabeled rows of `dataset` with every original
/// column, predicted values written into the target columns, the `Utility`,
/// `Novelty` and per-target uncertainty columns appended, sorted by utility
/// (descending, ties in dataset order) and numbered from 1 in column 0.
pub fn assemble(
    dataset: &DataFrame,
    partition: &LabelPartition,
    predictions: &Predictions,
    utility: &Array1<f64>,
    novelty: &Array1<f64>,
    targets: &[String],
) -> Result<DataFrame> {
    let n = partition.unlabeled.len();
    if utility.len() != n || novelty.len() != n || predictions.mean.dim() != (n, targets.len()) {
        return Err(DiscoveryError::ShapeError {
            expected: format!("{} candidates x {} targets", n, targets.len()),
            actual: format!(
                "utility {}, novelty {}, predictions {:?}",
                utility.len(),
                novelty.len(),
                predictions.mean.dim()
            ),
        });
    }

    let mut ranked = dataset.take(&row_indices(&partition.unlabeled))?;

    for (j, target) in targets.iter().enumerate() {
        let predicted = rounded(predictions.mean.column(j), TARGET_DECIMALS);
        ranked.with_column(Series::new(target.as_str().into(), predicted))?;
    }

    let utility = rounded(utility.view(), SCORE_DECIMALS);
    ranked.with_column(Series::new(UTILITY_COLUMN.into(), utility.clone()))?;
    ranked.with_column(Series::new(
        NOVELTY_COLUMN.into(),
        rounded(novelty.view(), SCORE_DECIMALS),
    ))?;
    for (j, target) in targets.iter().enumerate() {
        let uncertainty = rounded(predictions.uncertainty.column(j), TARGET_DECIMALS);
        ranked.with_column(Series::new(uncertainty_column(target).into(), uncertainty))?;
    }

    // sort_by is stable, so equal utilities keep dataset order
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| utility[b].total_cmp(&utility[a]));
    let mut ranked = ranked.take(&row_indices(&order))?;

    let row_numbers: Vec<u32> = (1..=n as u32).collect();
    ranked.insert_column(0, Series::new(ROW_NUMBER_COLUMN.into(), row_numbers))?;

    Ok(ranked)
}

/// Targets, utility, row number and fixed targets of the ranked table
pub fn scatter_input(
    ranked: &DataFrame,
    targets: &[String],
    fixed_targets: &[String],
) -> Result<DataFrame> {
    let columns = targets
        .iter()
        .map(String::as_str)
        .chain([UTILITY_COLUMN, ROW_NUMBER_COLUMN])
        .chain(fixed_targets.iter().map(String::as_str));
    Ok(ranked.select(columns)?)
}

/// Preprocessed features of every row, tagged `candidate` or `target`
pub fn projection_input(features: &FeatureMatrix, partition: &LabelPartition) -> Result<DataFrame> {
    let mut columns: Vec<Column> = features
        .names
        .iter()
        .enumerate()
        .map(|(j, name)| Series::new(name.as_str().into(), features.values.column(j).to_vec()).into())
        .collect();

    let mut kinds = vec!["candidate"; features.nrows()];
    for &i in &partition.labeled {
        kinds[i] = "target";
    }
    columns.push(Series::new(TYPE_COLUMN.into(), kinds).into());

    Ok(DataFrame::new(columns)?)
}

fn row_indices(rows: &[usize]) -> IdxCa {
    IdxCa::from_vec("rows".into(), rows.iter().map(|&i| i as IdxSize).collect())
}

fn rounded(values: ArrayView1<f64>, decimals: i32) -> Vec<f64> {
    let scale = 10f64.powi(decimals);
    values.iter().map(|v| (v * scale).round() / scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn f64_column(df: &DataFrame, name: &str) -> Vec<f64> {
        df.column(name)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    fn fixture() -> (DataFrame, LabelPartition, Predictions) {
        let df = df!(
            "x" => &[1.0, 2.0, 3.0, 4.0, 5.0],
            "y" => &[Some(1.0), None, Some(2.0), None, None],
            "cost" => &[10.0, 20.0, 30.0, 40.0, 50.0],
        )
        .unwrap();
        let partition = LabelPartition {
            labeled: vec![0, 2],
            unlabeled: vec![1, 3, 4],
        };
        let predictions = Predictions {
            mean: array![[1.1234567], [2.5], [0.5]],
            uncertainty: array![[0.1], [0.2], [0.3333333333]],
        };
        (df, partition, predictions)
    }

    #[test]
    fn test_assemble_ranks_and_rounds() {
        let (df, partition, predictions) = fixture();
        let utility = array![0.5, 2.0, -1.23456789];
        let novelty = array![1.0, 0.5, 0.25];
        let ranked = assemble(
            &df,
            &partition,
            &predictions,
            &utility,
            &novelty,
            &["y".to_string()],
        )
        .unwrap();

        assert_eq!(ranked.height(), 3);
        assert_eq!(ranked.get_column_names()[0].as_str(), ROW_NUMBER_COLUMN);
        assert_eq!(f64_column(&ranked, "x"), vec![4.0, 2.0, 5.0]);
        assert_eq!(f64_column(&ranked, "y"), vec![2.5, 1.12346, 0.5]);
        assert_eq!(f64_column(&ranked, UTILITY_COLUMN), vec![2.0, 0.5, -1.234568]);
        assert_eq!(f64_column(&ranked, NOVELTY_COLUMN), vec![0.5, 1.0, 0.25]);
        assert_eq!(f64_column(&ranked, "Uncertainty (y)"), vec![0.2, 0.1, 0.33333]);

        let rows: Vec<u32> = ranked
            .column(ROW_NUMBER_COLUMN)
            .unwrap()
            .as_materialized_series()
            .u32()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(rows, vec![1, 2, 3]);
    }

    #[test]
    fn test_ties_keep_dataset_order() {
        let (df, partition, predictions) = fixture();
        let utility = array![1.0, 1.0, 1.0];
        let novelty = array![0.0, 0.0, 0.0];
        let ranked = assemble(
            &df,
            &partition,
            &predictions,
            &utility,
            &novelty,
            &["y".to_string()],
        )
        .unwrap();
        assert_eq!(f64_column(&ranked, "x"), vec![2.0, 4.0, 5.0]);
    }

    #[test]
    fn test_input_not_modified() {
        let (df, partition, predictions) = fixture();
        let before = df.clone();
        assemble(
            &df,
            &partition,
            &predictions,
            &array![0.0, 1.0, 2.0],
            &array![0.0, 0.0, 0.0],
            &["y".to_string()],
        )
        .unwrap();
        assert!(df.equals_missing(&before));
    }

    #[test]
    fn test_scatter_input_columns() {
        let (df, partition, predictions) = fixture();
        let ranked = assemble(
            &df,
            &partition,
            &predictions,
            &array![0.0, 1.0, 2.0],
            &array![0.0, 0.0, 0.0],
            &["y".to_string()],
        )
        .unwrap();
        let scatter = scatter_input(&ranked, &["y".to_string()], &["cost".to_string()]).unwrap();
        let names: Vec<&str> = scatter.get_column_names().into_iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["y", UTILITY_COLUMN, ROW_NUMBER_COLUMN, "cost"]);
        assert_eq!(f64_column(&scatter, "cost"), vec![50.0, 40.0, 20.0]);
    }

    #[test]
    fn test_projection_input_tags_rows() {
        let features = FeatureMatrix {
            names: vec!["x".to_string()],
            values: array![[1.0], [2.0], [3.0]],
        };
        let partition = LabelPartition {
            labeled: vec![1],
            unlabeled: vec![0, 2],
        };
        let projection = projection_input(&features, &partition).unwrap();
        let kinds: Vec<&str> = projection
            .column(TYPE_COLUMN)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(kinds, vec!["candidate", "target", "candidate"]);
        assert_eq!(f64_column(&projection, "x"), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_shape_mismatch() {
        let (df, partition, predictions) = fixture();
        let err = assemble(
            &df,
            &partition,
            &predictions,
            &array![0.0],
            &array![0.0, 0.0, 0.0],
            &["y".to_string()],
        )
        .unwrap_err();
        assert!(matches!(err, DiscoveryError::ShapeError { .. }));
    }
}
