//! SLAMD Discovery - sequential-learning recommendation engine
//!
//! Ranks candidate experiments for materials design: surrogate models are
//! trained on the measured rows of a table, every unmeasured row is scored
//! by an explore/exploit utility, and the candidates come back ranked so the
//! experimenter can pick what to try next.
//!
//! # Modules
//!
//! - [`discovery`] - Preprocessing, labeling, utility, novelty, ranking
//! - [`training`] - Surrogate models (Gaussian Process, jackknife Random Forest)
//! - [`utils`] - Table loading and saving
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use polars::prelude::*;
//! use slamd_discovery::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let dataset = df!(
//!     "water" => &[0.40, 0.45, 0.50, 0.55],
//!     "strength" => &[Some(41.0), Some(38.5), None, None],
//! )?;
//!
//! let config = ExperimentConfig::new(ModelBackend::GaussianProcess)
//!     .with_curiosity(1.0)
//!     .with_features(["water"])
//!     .with_target(TargetSpec::new("strength"));
//!
//! let result = DiscoveryExperiment::new(config)?.run(&dataset)?;
//! println!("{}", result.ranked);
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Discovery engine
pub mod discovery;
pub mod training;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{DiscoveryError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{DiscoveryError, ErrorCategory, Result};

    // Discovery
    pub use crate::discovery::{
        Direction, DiscoveryExperiment, DiscoveryResult, ExperimentConfig, FixedTargetSpec,
        ModelBackend, TargetSpec,
    };

    // Training
    pub use crate::training::{ForestConfig, GPConfig, Surrogate, SurrogateFitter};

    // Loading
    pub use crate::utils::{DataLoader, DataSaver};
}
