//! The partial-pooling hierarchical model.
//!
//! One fixed structure, three random-variable families:
//!
//! ```text
//! population_effect          ~ Normal(0, 0.5)
//! individual_effect[i]       ~ Normal(population_effect, 0.2)
//! observed[i]                ~ Normal(individual_effect[i], se_i)   (fixed to data)
//! ```
//!
//! Per-study effects cluster around the population mean (partial
//! pooling); each study's reported standard error sets its likelihood
//! noise scale. The per-study dimension is set by the bound batch, so the
//! sweep harness rebuilds the model per trial at whatever study count the
//! trial produced — construction is pure and cheap, there is no mutable
//! model state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::study::StudyPoint;

/// Prior scales of the hierarchical model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Scale of the weakly-informative `Normal(0, ·)` prior on the
    /// population-level effect. Default: 0.5.
    pub population_prior_sd: f64,

    /// Scale of the conditional `Normal(population_effect, ·)` prior on
    /// each study's latent effect — the assumed between-study spread.
    /// Default: 0.2.
    pub between_study_sd: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            population_prior_sd: 0.5,
            between_study_sd: 0.2,
        }
    }
}

/// Error from model construction.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// The study batch has zero rows; a zero-dimensional model is not
    /// fittable.
    EmptyBatch,

    /// A study reports a standard error that is zero or negative. The
    /// likelihood scale must be strictly positive.
    NonPositiveStandardError {
        /// Identifier of the offending study.
        study_id: u32,
        /// The reported standard error.
        std_error: f64,
    },

    /// A study carries a non-finite effect estimate or standard error.
    NonFiniteObservation {
        /// Identifier of the offending study.
        study_id: u32,
    },

    /// A prior scale in [`ModelConfig`] is zero, negative, or non-finite.
    InvalidPrior {
        /// Name of the offending configuration field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::EmptyBatch => {
                write!(f, "cannot build a model over an empty study batch")
            }
            ModelError::NonPositiveStandardError {
                study_id,
                std_error,
            } => write!(
                f,
                "study {}: standard error {} is not strictly positive",
                study_id, std_error
            ),
            ModelError::NonFiniteObservation { study_id } => {
                write!(f, "study {}: non-finite effect or standard error", study_id)
            }
            ModelError::InvalidPrior { field, value } => {
                write!(f, "prior scale '{}' must be positive, got {}", field, value)
            }
        }
    }
}

impl std::error::Error for ModelError {}

/// A validated hierarchical model, ready to sample.
///
/// Construction is a pure function of the study batch and prior
/// configuration: the same inputs always yield a structurally identical
/// model. The observed node's length and index order are exactly those of
/// the batch passed in.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchicalModel {
    config: ModelConfig,
    observations: Vec<StudyPoint>,
}

impl HierarchicalModel {
    /// Build the model with default priors.
    pub fn new(studies: &[StudyPoint]) -> Result<Self, ModelError> {
        Self::with_config(studies, ModelConfig::default())
    }

    /// Build the model with explicit prior scales.
    pub fn with_config(
        studies: &[StudyPoint],
        config: ModelConfig,
    ) -> Result<Self, ModelError> {
        if !(config.population_prior_sd.is_finite() && config.population_prior_sd > 0.0) {
            return Err(ModelError::InvalidPrior {
                field: "population_prior_sd",
                value: config.population_prior_sd,
            });
        }
        if !(config.between_study_sd.is_finite() && config.between_study_sd > 0.0) {
            return Err(ModelError::InvalidPrior {
                field: "between_study_sd",
                value: config.between_study_sd,
            });
        }
        if studies.is_empty() {
            return Err(ModelError::EmptyBatch);
        }
        for s in studies {
            if !(s.effect.is_finite() && s.std_error.is_finite()) {
                return Err(ModelError::NonFiniteObservation {
                    study_id: s.study_id,
                });
            }
            if s.std_error <= 0.0 {
                return Err(ModelError::NonPositiveStandardError {
                    study_id: s.study_id,
                    std_error: s.std_error,
                });
            }
        }
        Ok(Self {
            config,
            observations: studies.to_vec(),
        })
    }

    /// Number of studies bound into the model (the size of the per-study
    /// latent dimension).
    pub fn n_studies(&self) -> usize {
        self.observations.len()
    }

    /// The bound observations, in index order.
    pub fn observations(&self) -> &[StudyPoint] {
        &self.observations
    }

    /// The prior configuration.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }
}
