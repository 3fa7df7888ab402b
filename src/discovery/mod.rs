//! Sequential-learning discovery
//!
//! Given a table of candidate experiments where some rows carry measured
//! targets, a discovery run:
//! - encodes the feature columns ([`preprocessing`])
//! - splits rows into labeled and unlabeled ([`partition`])
//! - fits one surrogate per target and predicts the unlabeled rows
//!   ([`crate::training`])
//! - scores candidates by explore/exploit utility ([`utility`]) and by
//!   distance to measured rows ([`novelty`])
//! - returns the ranked table and plot inputs ([`assembler`])
//!
//! [`DiscoveryExperiment`] ties the steps together.

pub mod assembler;
pub mod config;
pub mod experiment;
pub mod novelty;
pub mod partition;
pub mod preprocessing;
pub mod utility;

pub use assembler::{uncertainty_column, NOVELTY_COLUMN, ROW_NUMBER_COLUMN, TYPE_COLUMN, UTILITY_COLUMN};
pub use config::{Direction, ExperimentConfig, FixedTargetSpec, ModelBackend, TargetSpec};
pub use experiment::{DiscoveryExperiment, DiscoveryResult};
pub use partition::LabelPartition;
pub use preprocessing::{FeatureMatrix, OrdinalEncoder};
pub use utility::{ColumnStats, UtilityScorer};
