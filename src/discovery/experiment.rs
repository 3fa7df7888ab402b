//! End-to-end discovery run

use super::assembler::{assemble, projection_input, scatter_input};
use super::config::ExperimentConfig;
use super::novelty::novelty;
use super::partition::{partition, value_matrix, LabelPartition};
use super::preprocessing::preprocess;
use super::utility::UtilityScorer;
use crate::error::{DiscoveryError, Result};
use crate::training::SurrogateFitter;
use polars::prelude::*;
use std::time::Instant;
use tracing::info;

/// Tables produced by one run
#[derive(Debug, Clone)]
pub struct DiscoveryResult {
    /// Unlabeled rows ranked by utility
    pub ranked: DataFrame,
    /// Targets, utility, row number and fixed targets, for a scatter plot
    pub scatter_input: DataFrame,
    /// Preprocessed features with a candidate / target tag, for a projection plot
    pub projection_input: DataFrame,
}

/// Sequential-learning recommendation engine.
///
/// Owns only its configuration; every call to [`run`](Self::run) works on
/// its own matrices and never writes to the input table.
#[derive(Debug, Clone)]
pub struct DiscoveryExperiment {
    config: ExperimentConfig,
}

impl DiscoveryExperiment {
    /// Validate the configuration and build the engine
    pub fn new(config: ExperimentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Column and labeling checks without fitting any model
    pub fn check(&self, dataset: &DataFrame) -> Result<LabelPartition> {
        self.check_columns(dataset)?;
        preprocess(dataset, &self.config.features)?;
        partition(dataset, &self.config.target_names())
    }

    /// Rank the unlabeled rows of `dataset`
    pub fn run(&self, dataset: &DataFrame) -> Result<DiscoveryResult> {
        let start = Instant::now();
        let targets = self.config.target_names();
        let fixed_targets = self.config.fixed_target_names();

        self.check_columns(dataset)?;
        let features = preprocess(dataset, &self.config.features)?;
        let labels = partition(dataset, &targets)?;

        info!(
            rows = labels.n_rows(),
            labeled = labels.labeled.len(),
            unlabeled = labels.unlabeled.len(),
            features = features.ncols(),
            backend = %self.config.model,
            "Starting discovery run"
        );

        let target_values = value_matrix(dataset, &targets)?;
        let fixed_values = value_matrix(dataset, &fixed_targets)?;

        let predictions = SurrogateFitter::from_config(&self.config).fit_and_predict(
            &features.values,
            &target_values,
            &labels,
            &targets,
        )?;

        let utility = UtilityScorer::from_config(&self.config).score(
            &predictions,
            &target_values,
            &fixed_values,
            &labels,
        )?;
        let novelty = novelty(&features.values, &labels);

        let ranked = assemble(dataset, &labels, &predictions, &utility, &novelty, &targets)?;
        let scatter_input = scatter_input(&ranked, &targets, &fixed_targets)?;
        let projection_input = projection_input(&features, &labels)?;

        info!(
            candidates = ranked.height(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Discovery run complete"
        );

        Ok(DiscoveryResult {
            ranked,
            scatter_input,
            projection_input,
        })
    }

    fn check_columns(&self, dataset: &DataFrame) -> Result<()> {
        let missing: Vec<&str> = self
            .config
            .features
            .iter()
            .chain(self.config.targets.iter().map(|t| &t.name))
            .chain(self.config.fixed_targets.iter().map(|t| &t.name))
            .map(String::as_str)
            .filter(|name| dataset.column(name).is_err())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DiscoveryError::ColumnNotFound(missing.join(", ")))
        }
    }
}
