//! Experiment configuration

use crate::error::{DiscoveryError, Result};
use crate::training::{ForestConfig, GPConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Surrogate model backend.
///
/// Serialized as its snake_case name; deserialization accepts every alias
/// `FromStr` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModelBackend {
    /// Gaussian process regression with a constant × RBF kernel
    GaussianProcess,
    /// Random forest with jackknife variance estimates
    RandomForestJackknife,
}

impl fmt::Display for ModelBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelBackend::GaussianProcess => write!(f, "gaussian_process"),
            ModelBackend::RandomForestJackknife => write!(f, "random_forest_jackknife"),
        }
    }
}

impl FromStr for ModelBackend {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "gaussian_process" | "gp" | "gpr"
            | "Statistics-based model (Gaussian Process Regression)" => {
                Ok(ModelBackend::GaussianProcess)
            }
            "random_forest_jackknife" | "random_forest" | "rf"
            | "AI Model (lolo Random Forest)" => Ok(ModelBackend::RandomForestJackknife),
            other => Err(DiscoveryError::ValueNotSupported(format!(
                "Model {} value not supported",
                other
            ))),
        }
    }
}

impl TryFrom<String> for ModelBackend {
    type Error = DiscoveryError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ModelBackend> for String {
    fn from(backend: ModelBackend) -> Self {
        backend.to_string()
    }
}

/// Optimization direction of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Maximize,
    Minimize,
}

impl Direction {
    /// Multiplier that makes "larger is better" hold for this direction
    pub fn sign(self) -> f64 {
        match self {
            Direction::Maximize => 1.0,
            Direction::Minimize => -1.0,
        }
    }
}

impl FromStr for Direction {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "max" | "maximize" => Ok(Direction::Maximize),
            "min" | "minimize" => Ok(Direction::Minimize),
            other => Err(DiscoveryError::InvalidConfiguration(format!(
                "invalid value for max_or_min, got {}",
                other
            ))),
        }
    }
}

/// A primary target: modeled, predicted and scored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub direction: Direction,
    /// Predictions beyond this value earn no extra utility
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl TargetSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weight: 1.0,
            direction: Direction::Maximize,
            threshold: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// A fixed (apriori) target: observed values folded into utility without modeling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedTargetSpec {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub direction: Direction,
}

impl FixedTargetSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weight: 1.0,
            direction: Direction::Maximize,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }
}

fn default_weight() -> f64 {
    1.0
}

fn default_random_state() -> u64 {
    42
}

/// Configuration of a single discovery run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Surrogate backend
    pub model: ModelBackend,

    /// Weight on predictive uncertainty (exploration)
    #[serde(default)]
    pub curiosity: f64,

    /// Feature column names
    pub features: Vec<String>,

    /// Primary targets; the first one decides which rows are labeled
    pub targets: Vec<TargetSpec>,

    /// Fixed / apriori targets
    #[serde(default)]
    pub fixed_targets: Vec<FixedTargetSpec>,

    /// Seed for optimizer restarts and bootstrap sampling
    #[serde(default = "default_random_state")]
    pub random_state: u64,

    #[serde(default)]
    pub gaussian_process: GPConfig,

    #[serde(default)]
    pub random_forest: ForestConfig,
}

impl ExperimentConfig {
    /// Create a configuration with no targets or features yet
    pub fn new(model: ModelBackend) -> Self {
        Self {
            model,
            curiosity: 0.0,
            features: Vec::new(),
            targets: Vec::new(),
            fixed_targets: Vec::new(),
            random_state: default_random_state(),
            gaussian_process: GPConfig::default(),
            random_forest: ForestConfig::default(),
        }
    }

    /// Build from the parallel lists a form layer hands over
    #[allow(clippy::too_many_arguments)]
    pub fn from_columns(
        model: &str,
        curiosity: f64,
        features: &[&str],
        targets: &[&str],
        target_weights: &[f64],
        target_directions: &[&str],
        fixed_targets: &[&str],
        fixed_weights: &[f64],
        fixed_directions: &[&str],
    ) -> Result<Self> {
        let model = ModelBackend::from_str(model)?;
        check_lengths("target", targets.len(), target_weights.len(), target_directions.len())?;
        check_lengths(
            "fixed target",
            fixed_targets.len(),
            fixed_weights.len(),
            fixed_directions.len(),
        )?;

        let mut config = Self::new(model).with_curiosity(curiosity);
        config.features = features.iter().map(|s| s.to_string()).collect();
        for ((name, &weight), direction) in targets.iter().zip(target_weights).zip(target_directions) {
            config.targets.push(
                TargetSpec::new(*name)
                    .with_weight(weight)
                    .with_direction(direction.parse()?),
            );
        }
        for ((name, &weight), direction) in fixed_targets.iter().zip(fixed_weights).zip(fixed_directions) {
            config.fixed_targets.push(
                FixedTargetSpec::new(*name)
                    .with_weight(weight)
                    .with_direction(direction.parse()?),
            );
        }
        Ok(config)
    }

    /// Load from a JSON document.
    ///
    /// An unknown `model` name is reported as `ValueNotSupported` rather
    /// than as a serialization error.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: serde_json::Value = serde_json::from_str(json)?;
        if let Some(model) = document.get("model").and_then(serde_json::Value::as_str) {
            ModelBackend::from_str(model)?;
        }
        Ok(serde_json::from_value(document)?)
    }

    pub fn with_curiosity(mut self, curiosity: f64) -> Self {
        self.curiosity = curiosity;
        self
    }

    pub fn with_features<S: Into<String>>(mut self, features: impl IntoIterator<Item = S>) -> Self {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_target(mut self, target: TargetSpec) -> Self {
        self.targets.push(target);
        self
    }

    pub fn with_fixed_target(mut self, target: FixedTargetSpec) -> Self {
        self.fixed_targets.push(target);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_gaussian_process(mut self, config: GPConfig) -> Self {
        self.gaussian_process = config;
        self
    }

    pub fn with_random_forest(mut self, config: ForestConfig) -> Self {
        self.random_forest = config;
        self
    }

    pub fn target_names(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.name.clone()).collect()
    }

    pub fn fixed_target_names(&self) -> Vec<String> {
        self.fixed_targets.iter().map(|t| t.name.clone()).collect()
    }

    /// Reject configurations that cannot start a run
    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(DiscoveryError::InvalidConfiguration(
                "no targets were specified".to_string(),
            ));
        }
        if self.features.is_empty() {
            return Err(DiscoveryError::InvalidConfiguration(
                "no feature columns were specified".to_string(),
            ));
        }
        if !self.curiosity.is_finite() || self.curiosity < 0.0 {
            return Err(DiscoveryError::InvalidConfiguration(format!(
                "curiosity must be a non-negative number, got {}",
                self.curiosity
            )));
        }
        for t in &self.targets {
            if !t.weight.is_finite() {
                return Err(DiscoveryError::InvalidConfiguration(format!(
                    "weight of target '{}' must be finite",
                    t.name
                )));
            }
            if matches!(t.threshold, Some(v) if !v.is_finite()) {
                return Err(DiscoveryError::InvalidConfiguration(format!(
                    "threshold of target '{}' must be finite",
                    t.name
                )));
            }
        }
        for t in &self.fixed_targets {
            if !t.weight.is_finite() {
                return Err(DiscoveryError::InvalidConfiguration(format!(
                    "weight of fixed target '{}' must be finite",
                    t.name
                )));
            }
        }

        let mut seen = HashSet::new();
        let names = self
            .features
            .iter()
            .chain(self.targets.iter().map(|t| &t.name))
            .chain(self.fixed_targets.iter().map(|t| &t.name));
        for name in names {
            if !seen.insert(name.as_str()) {
                return Err(DiscoveryError::InvalidConfiguration(format!(
                    "column '{}' is used more than once",
                    name
                )));
            }
        }

        self.gaussian_process.validate()?;
        self.random_forest.validate()?;
        Ok(())
    }
}

fn check_lengths(kind: &str, names: usize, weights: usize, directions: usize) -> Result<()> {
    if names != weights || names != directions {
        return Err(DiscoveryError::InvalidConfiguration(format!(
            "{} names, weights and directions differ in length ({}, {}, {})",
            kind, names, weights, directions
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ExperimentConfig {
        ExperimentConfig::new(ModelBackend::GaussianProcess)
            .with_features(["x"])
            .with_target(TargetSpec::new("y"))
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("gp".parse::<ModelBackend>().unwrap(), ModelBackend::GaussianProcess);
        assert_eq!(
            "AI Model (lolo Random Forest)".parse::<ModelBackend>().unwrap(),
            ModelBackend::RandomForestJackknife
        );
        let err = "svm".parse::<ModelBackend>().unwrap_err();
        assert!(matches!(err, DiscoveryError::ValueNotSupported(_)));
    }

    #[test]
    fn test_direction_from_str() {
        assert_eq!("min".parse::<Direction>().unwrap(), Direction::Minimize);
        assert_eq!("Maximize".parse::<Direction>().unwrap(), Direction::Maximize);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_validate_ok() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_targets() {
        let config = ExperimentConfig::new(ModelBackend::GaussianProcess).with_features(["x"]);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_validate_rejects_negative_curiosity() {
        assert!(base().with_curiosity(-0.5).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_overlapping_columns() {
        let config = base().with_fixed_target(FixedTargetSpec::new("x"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("'x'"));
    }

    #[test]
    fn test_from_columns_length_mismatch() {
        let err = ExperimentConfig::from_columns(
            "gp",
            1.0,
            &["x"],
            &["a", "b"],
            &[1.0],
            &["max", "max"],
            &[],
            &[],
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_from_columns() {
        let config = ExperimentConfig::from_columns(
            "random_forest",
            2.0,
            &["x1", "x2"],
            &["strength"],
            &[1.0],
            &["max"],
            &["co2"],
            &[0.5],
            &["min"],
        )
        .unwrap();
        assert_eq!(config.model, ModelBackend::RandomForestJackknife);
        assert_eq!(config.fixed_targets[0].direction, Direction::Minimize);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_defaults() {
        let config = ExperimentConfig::from_json(
            r#"{
                "model": "gaussian_process",
                "curiosity": 1.5,
                "features": ["x"],
                "targets": [{"name": "y", "direction": "minimize", "threshold": 3.0}]
            }"#,
        )
        .unwrap();
        assert_eq!(config.random_state, 42);
        assert_eq!(config.targets[0].weight, 1.0);
        assert_eq!(config.targets[0].direction, Direction::Minimize);
        assert_eq!(config.targets[0].threshold, Some(3.0));
        assert_eq!(config.gaussian_process.n_restarts_optimizer, 9);
    }

    #[test]
    fn test_from_json_accepts_backend_aliases() {
        for (name, expected) in [
            ("gp", ModelBackend::GaussianProcess),
            (
                "Statistics-based model (Gaussian Process Regression)",
                ModelBackend::GaussianProcess,
            ),
            ("rf", ModelBackend::RandomForestJackknife),
            ("AI Model (lolo Random Forest)", ModelBackend::RandomForestJackknife),
        ] {
            let json = format!(
                r#"{{"model": "{}", "features": ["x"], "targets": [{{"name": "y"}}]}}"#,
                name
            );
            assert_eq!(ExperimentConfig::from_json(&json).unwrap().model, expected);
        }
    }

    #[test]
    fn test_from_json_unknown_backend() {
        let err = ExperimentConfig::from_json(
            r#"{"model": "svm", "features": ["x"], "targets": [{"name": "y"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DiscoveryError::ValueNotSupported(_)));
        assert!(err.to_string().contains("svm"));
    }

    #[test]
    fn test_backend_serializes_canonical_name() {
        let json = serde_json::to_string(&base()).unwrap();
        assert!(json.contains(r#""model":"gaussian_process""#));
        let back = ExperimentConfig::from_json(&json).unwrap();
        assert_eq!(back.model, ModelBackend::GaussianProcess);
    }
}
