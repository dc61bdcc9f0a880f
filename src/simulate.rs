//! Synthetic study generation with known ground truth.
//!
//! Each simulated study draws a participant count and a true mean effect,
//! then generates per-participant outcomes and reports only the summary
//! statistics a real study would publish: the sample mean, its standard
//! error, and a 95% normal-approximation significance flag. The
//! publication-bias filter then decides which studies "get published",
//! preferring significant results.
//!
//! Every function takes an explicit RNG so sweeps are reproducible and
//! trials can run on independent streams.

use std::fmt;

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::study::StudyPoint;

/// Ground-truth parameters of the study generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of studies per batch. Default: 100.
    pub n_studies: usize,
    /// Mean of the per-study participant-count distribution. Default: 20.
    pub participants_mean: f64,
    /// SD of the per-study participant-count distribution. Default: 10.
    pub participants_sd: f64,
    /// Floor applied to drawn participant counts. Default: 10.
    pub min_participants: u32,
    /// Mean of the per-study true effect (the simulated ground truth the
    /// sweeps recover). Default: 0.4.
    pub effect_mean: f64,
    /// SD of the per-study true effect — genuine between-study
    /// heterogeneity. Default: 0.4.
    pub effect_sd: f64,
    /// Within-study outcome noise scale. Default: 0.8.
    pub outcome_sd: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n_studies: 100,
            participants_mean: 20.0,
            participants_sd: 10.0,
            min_participants: 10,
            effect_mean: 0.4,
            effect_sd: 0.4,
            outcome_sd: 0.8,
        }
    }
}

impl SimulationConfig {
    /// Same configuration with a different batch size.
    pub fn with_n_studies(self, n_studies: usize) -> Self {
        Self { n_studies, ..self }
    }
}

/// Error from the simulation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// A scale parameter is negative or non-finite.
    InvalidScale {
        /// Name of the offending configuration field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// Publication bias outside `[0, 1]`.
    InvalidBias {
        /// The rejected value.
        bias: f64,
    },
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::InvalidScale { field, value } => {
                write!(f, "scale '{}' must be a non-negative finite number, got {}", field, value)
            }
            SimulationError::InvalidBias { bias } => {
                write!(f, "publication bias must lie in [0, 1], got {}", bias)
            }
        }
    }
}

impl std::error::Error for SimulationError {}

/// One simulated study's reported summary statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulatedStudy {
    /// Batch-local identifier, 0-based in generation order.
    pub study_id: u32,
    /// Number of simulated participants.
    pub n_participants: u32,
    /// Sample mean of the simulated outcomes.
    pub mean_effect: f64,
    /// Standard error of the sample mean (`sample SD / sqrt(n)`).
    pub standard_error: f64,
    /// Whether the 95% interval `mean ± 1.96·se` excludes zero.
    pub significance: bool,
}

impl SimulatedStudy {
    /// Project onto the observation pair the model consumes.
    pub fn point(&self) -> StudyPoint {
        StudyPoint {
            study_id: self.study_id,
            effect: self.mean_effect,
            std_error: self.standard_error,
        }
    }
}

fn check_scale(field: &'static str, value: f64) -> Result<(), SimulationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SimulationError::InvalidScale { field, value })
    }
}

/// Generate a batch of independent synthetic studies.
///
/// Each study draws its participant count from
/// `Normal(participants_mean, participants_sd)` floored at
/// `min_participants` and truncated to an integer, its true effect from
/// `Normal(effect_mean, effect_sd)`, and `n` outcomes from
/// `Normal(true effect, outcome_sd)`; only the summary statistics are
/// reported.
pub fn simulate_studies<R: Rng + ?Sized>(
    config: &SimulationConfig,
    rng: &mut R,
) -> Result<Vec<SimulatedStudy>, SimulationError> {
    check_scale("participants_sd", config.participants_sd)?;
    check_scale("effect_sd", config.effect_sd)?;
    check_scale("outcome_sd", config.outcome_sd)?;

    // Scales checked above; Normal::new only fails on negative/NaN.
    let participants = Normal::new(config.participants_mean, config.participants_sd)
        .expect("invalid participant-count distribution");
    let true_effect =
        Normal::new(config.effect_mean, config.effect_sd).expect("invalid effect distribution");

    let mut studies = Vec::with_capacity(config.n_studies);
    for study_id in 0..config.n_studies {
        let n = participants
            .sample(rng)
            .max(f64::from(config.min_participants)) as u32;
        let mu = true_effect.sample(rng);
        let outcomes =
            Normal::new(mu, config.outcome_sd).expect("invalid outcome distribution");

        let mut sum = 0.0;
        let mut draws = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let x = outcomes.sample(rng);
            sum += x;
            draws.push(x);
        }
        let mean_effect = sum / f64::from(n);
        let sd = (draws
            .iter()
            .map(|x| (x - mean_effect).powi(2))
            .sum::<f64>()
            / f64::from(n))
        .sqrt();
        let standard_error = sd / f64::from(n).sqrt();

        let confidence = 1.96 * standard_error;
        let (low, high) = (mean_effect - confidence, mean_effect + confidence);
        let significance = !(low < 0.0 && high > 0.0);

        studies.push(SimulatedStudy {
            study_id: study_id as u32,
            n_participants: n,
            mean_effect,
            standard_error,
            significance,
        });
    }
    Ok(studies)
}

/// Decide which studies get published under selection bias.
///
/// Every significant study is published; every non-significant study is
/// published independently with probability `1 - bias`. `bias = 0` keeps
/// the whole batch, `bias = 1` keeps exactly the significant studies.
pub fn simulate_publications<R: Rng + ?Sized>(
    significance: &[bool],
    bias: f64,
    rng: &mut R,
) -> Result<Vec<bool>, SimulationError> {
    if !(0.0..=1.0).contains(&bias) {
        return Err(SimulationError::InvalidBias { bias });
    }
    Ok(significance
        .iter()
        .map(|&significant| significant || rng.random_bool(1.0 - bias))
        .collect())
}
