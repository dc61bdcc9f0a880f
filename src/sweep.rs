//! Power and publication-bias sweeps.
//!
//! Both sweeps walk a grid of conditions, running `n_trials` independent
//! simulate → fit → summarize cycles per condition and collecting one
//! result row per (condition, trial) cell:
//!
//! - **Power analysis** varies the number of simulated studies per batch,
//!   characterizing how reliably the model recovers the true population
//!   effect as the literature grows.
//! - **Bias analysis** fixes the batch size, filters each batch through
//!   the publication-bias model at a grid of bias levels, and fits on the
//!   published subset only.
//!
//! Cells are independent: each owns its simulated data, its model, and an
//! independently seeded RNG stream derived from the sweep seed by cell
//! counter. A failed cell (degenerate batch, model rejection,
//! non-convergence) is recorded in its row and never aborts the sweep.
//! With the `parallel` feature the cells of a sweep run on a rayon pool;
//! record order is (condition, trial) either way.

use log::{debug, warn};
use rand::RngCore;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::inference::{sample, ParameterSummary, SamplerConfig, SamplerError};
use crate::model::{HierarchicalModel, ModelError};
use crate::simulate::{
    simulate_publications, simulate_studies, SimulatedStudy, SimulationConfig, SimulationError,
};
use crate::study::StudyPoint;

/// Shared knobs of both sweep harnesses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Trials per grid condition. Default: 10.
    pub n_trials: usize,
    /// Base seed; cell `(condition, trial)` runs on an independent stream
    /// derived from it.
    pub seed: u64,
    /// Study generator parameters. `n_studies` is overridden per
    /// condition by the power sweep and by `bias_batch_size` in the bias
    /// sweep.
    pub simulation: SimulationConfig,
    /// Sampler dimensions; the per-cell seed replaces `sampler.seed`.
    pub sampler: SamplerConfig,
    /// Batch size simulated per bias-sweep trial before filtering.
    /// Default: 200.
    pub bias_batch_size: usize,
    /// Smallest published batch worth fitting; smaller batches are
    /// recorded as skipped. Default: 2.
    pub min_studies: usize,
    /// Split-R̂ threshold above which a fit is flagged as non-converged.
    /// Default: 1.01.
    pub max_rhat: f64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            n_trials: 10,
            seed: 42,
            simulation: SimulationConfig::default(),
            sampler: SamplerConfig::default(),
            bias_batch_size: 200,
            min_studies: 2,
            max_rhat: 1.01,
        }
    }
}

/// The study-count grid used by the reference power analysis.
pub fn default_sample_sizes() -> Vec<usize> {
    vec![10, 15, 20, 30, 50, 75, 100, 200]
}

/// The bias grid used by the reference bias analysis: 0.0 to 0.9 in steps
/// of 0.1.
pub fn default_bias_grid() -> Vec<f64> {
    (0..10).map(|i| f64::from(i) / 10.0).collect()
}

/// Why a cell was recorded without a fitted summary.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The publication filter eliminated every study in the batch.
    EmptyBatch,
    /// The published batch is below [`SweepConfig::min_studies`].
    BatchTooSmall {
        /// Studies left after filtering.
        n_studies: usize,
        /// The configured minimum.
        min: usize,
    },
    /// The study generator or publication filter rejected its inputs.
    Simulation(SimulationError),
    /// The model builder rejected the batch.
    Model(ModelError),
    /// The sampler rejected its configuration.
    Sampler(SamplerError),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::EmptyBatch => write!(f, "publication filter left no studies"),
            SkipReason::BatchTooSmall { n_studies, min } => {
                write!(f, "published batch of {} is below the minimum of {}", n_studies, min)
            }
            SkipReason::Simulation(e) => write!(f, "simulation failed: {}", e),
            SkipReason::Model(e) => write!(f, "model construction failed: {}", e),
            SkipReason::Sampler(e) => write!(f, "sampler rejected configuration: {}", e),
        }
    }
}

/// Result of one (condition, trial) cell.
#[derive(Debug, Clone, PartialEq)]
pub enum TrialOutcome {
    /// The model was fit; the summary row is for `population_effect`.
    Fit {
        /// Posterior summary of the population-level effect.
        summary: ParameterSummary,
        /// Whether split-R̂ stayed within [`SweepConfig::max_rhat`].
        converged: bool,
    },
    /// The cell was recorded without fitting.
    Skipped(SkipReason),
}

impl TrialOutcome {
    /// The fitted summary, if any.
    pub fn summary(&self) -> Option<&ParameterSummary> {
        match self {
            TrialOutcome::Fit { summary, .. } => Some(summary),
            TrialOutcome::Skipped(_) => None,
        }
    }

    /// Whether the cell produced a converged fit.
    pub fn is_converged_fit(&self) -> bool {
        matches!(self, TrialOutcome::Fit { converged: true, .. })
    }

    /// Short machine-readable status for result tables.
    pub fn status_label(&self) -> &'static str {
        match self {
            TrialOutcome::Fit { converged: true, .. } => "ok",
            TrialOutcome::Fit { converged: false, .. } => "non_converged",
            TrialOutcome::Skipped(SkipReason::EmptyBatch) => "empty_batch",
            TrialOutcome::Skipped(SkipReason::BatchTooSmall { .. }) => "batch_too_small",
            TrialOutcome::Skipped(SkipReason::Simulation(_)) => "simulation_error",
            TrialOutcome::Skipped(SkipReason::Model(_)) => "model_error",
            TrialOutcome::Skipped(SkipReason::Sampler(_)) => "sampler_error",
        }
    }
}

/// One power-analysis row.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerRecord {
    /// Trial index within the condition, 0-based.
    pub trial: usize,
    /// Number of studies simulated for this cell.
    pub n_studies: usize,
    /// Fit result or skip reason.
    pub outcome: TrialOutcome,
}

/// One bias-analysis row.
#[derive(Debug, Clone, PartialEq)]
pub struct BiasRecord {
    /// Trial index within the condition, 0-based.
    pub trial: usize,
    /// Publication-bias level of this cell's condition.
    pub bias: f64,
    /// Batch size before the publication filter.
    pub n_simulated: usize,
    /// Studies surviving the publication filter (the fitted batch size).
    pub n_published: usize,
    /// Fit result or skip reason.
    pub outcome: TrialOutcome,
}

/// Run the cells of a sweep, sequentially or on the rayon pool.
fn run_cells<C, R, W, P>(cells: Vec<C>, work: W, progress: &P) -> Vec<R>
where
    C: Send + Sync,
    R: Send,
    W: Fn(&C) -> R + Sync,
    P: Fn(usize, usize) + Sync,
{
    let total = cells.len();
    let completed = AtomicUsize::new(0);
    let step = |cell: &C| {
        let record = work(cell);
        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
        progress(done, total);
        record
    };

    #[cfg(feature = "parallel")]
    let records: Vec<R> = cells.par_iter().map(step).collect();
    #[cfg(not(feature = "parallel"))]
    let records: Vec<R> = cells.iter().map(step).collect();
    records
}

/// Build and fit one batch, mapping every failure to a recorded outcome.
fn fit_batch<F>(
    points: &[StudyPoint],
    build_model: &F,
    config: &SweepConfig,
    rng: &mut Xoshiro256PlusPlus,
) -> TrialOutcome
where
    F: Fn(&[StudyPoint]) -> Result<HierarchicalModel, ModelError>,
{
    if points.is_empty() {
        return TrialOutcome::Skipped(SkipReason::EmptyBatch);
    }
    if points.len() < config.min_studies {
        return TrialOutcome::Skipped(SkipReason::BatchTooSmall {
            n_studies: points.len(),
            min: config.min_studies,
        });
    }

    let model = match build_model(points) {
        Ok(model) => model,
        Err(e) => return TrialOutcome::Skipped(SkipReason::Model(e)),
    };

    let sampler = config.sampler.with_seed(rng.next_u64());
    match sample(&model, &sampler) {
        Ok(trace) => {
            let summary = trace.population_summary();
            let converged = summary.r_hat <= config.max_rhat;
            if !converged {
                warn!(
                    "fit on {} studies flagged non-converged (r_hat = {:.4})",
                    points.len(),
                    summary.r_hat
                );
            }
            TrialOutcome::Fit { summary, converged }
        }
        Err(e) => TrialOutcome::Skipped(SkipReason::Sampler(e)),
    }
}

/// Power analysis: fit simulated batches across a grid of study counts.
///
/// Returns one record per (condition, trial) cell in grid order.
/// `build_model` is the model-construction capability under test; pass
/// `HierarchicalModel::new` for the standard model.
pub fn power_analysis<F>(
    sample_sizes: &[usize],
    build_model: F,
    config: &SweepConfig,
) -> Vec<PowerRecord>
where
    F: Fn(&[StudyPoint]) -> Result<HierarchicalModel, ModelError> + Sync,
{
    power_analysis_with_progress(sample_sizes, build_model, config, |_, _| {})
}

/// [`power_analysis`] with a per-cell progress callback `(done, total)`.
pub fn power_analysis_with_progress<F, P>(
    sample_sizes: &[usize],
    build_model: F,
    config: &SweepConfig,
    progress: P,
) -> Vec<PowerRecord>
where
    F: Fn(&[StudyPoint]) -> Result<HierarchicalModel, ModelError> + Sync,
    P: Fn(usize, usize) + Sync,
{
    let cells: Vec<(usize, usize, usize)> = sample_sizes
        .iter()
        .enumerate()
        .flat_map(|(ci, &n)| (0..config.n_trials).map(move |trial| (ci, trial, n)))
        .collect();
    debug!(
        "power analysis: {} study counts x {} trials",
        sample_sizes.len(),
        config.n_trials
    );

    run_cells(
        cells,
        |&(ci, trial, n_studies)| {
            let cell = ci * config.n_trials + trial;
            let mut rng =
                Xoshiro256PlusPlus::seed_from_u64(config.seed.wrapping_add(cell as u64));

            let simulation = config.simulation.with_n_studies(n_studies);
            let outcome = match simulate_studies(&simulation, &mut rng) {
                Ok(studies) => {
                    let points: Vec<StudyPoint> =
                        studies.iter().map(SimulatedStudy::point).collect();
                    fit_batch(&points, &build_model, config, &mut rng)
                }
                Err(e) => TrialOutcome::Skipped(SkipReason::Simulation(e)),
            };
            if let TrialOutcome::Skipped(reason) = &outcome {
                warn!("power cell (n_studies={}, trial={}) skipped: {}", n_studies, trial, reason);
            }
            PowerRecord {
                trial,
                n_studies,
                outcome,
            }
        },
        &progress,
    )
}

/// Bias analysis: fit publication-filtered batches across a bias grid.
///
/// Each cell simulates [`SweepConfig::bias_batch_size`] studies, keeps
/// the published subset at the cell's bias level, and fits on whatever
/// survives. Returns one record per (condition, trial) cell in grid
/// order.
pub fn bias_analysis<F>(
    bias_values: &[f64],
    build_model: F,
    config: &SweepConfig,
) -> Vec<BiasRecord>
where
    F: Fn(&[StudyPoint]) -> Result<HierarchicalModel, ModelError> + Sync,
{
    bias_analysis_with_progress(bias_values, build_model, config, |_, _| {})
}

/// [`bias_analysis`] with a per-cell progress callback `(done, total)`.
pub fn bias_analysis_with_progress<F, P>(
    bias_values: &[f64],
    build_model: F,
    config: &SweepConfig,
    progress: P,
) -> Vec<BiasRecord>
where
    F: Fn(&[StudyPoint]) -> Result<HierarchicalModel, ModelError> + Sync,
    P: Fn(usize, usize) + Sync,
{
    let cells: Vec<(usize, usize, f64)> = bias_values
        .iter()
        .enumerate()
        .flat_map(|(ci, &bias)| (0..config.n_trials).map(move |trial| (ci, trial, bias)))
        .collect();
    debug!(
        "bias analysis: {} bias levels x {} trials, batches of {}",
        bias_values.len(),
        config.n_trials,
        config.bias_batch_size
    );

    run_cells(
        cells,
        |&(ci, trial, bias)| {
            let cell = ci * config.n_trials + trial;
            let mut rng =
                Xoshiro256PlusPlus::seed_from_u64(config.seed.wrapping_add(cell as u64));

            let simulation = config.simulation.with_n_studies(config.bias_batch_size);
            let (n_simulated, n_published, outcome) =
                match simulate_studies(&simulation, &mut rng) {
                    Ok(studies) => {
                        let significance: Vec<bool> =
                            studies.iter().map(|s| s.significance).collect();
                        match simulate_publications(&significance, bias, &mut rng) {
                            Ok(published) => {
                                let points: Vec<StudyPoint> = studies
                                    .iter()
                                    .zip(&published)
                                    .filter(|(_, &keep)| keep)
                                    .map(|(s, _)| s.point())
                                    .collect();
                                let n_published = points.len();
                                let outcome =
                                    fit_batch(&points, &build_model, config, &mut rng);
                                (studies.len(), n_published, outcome)
                            }
                            Err(e) => (
                                studies.len(),
                                0,
                                TrialOutcome::Skipped(SkipReason::Simulation(e)),
                            ),
                        }
                    }
                    Err(e) => (0, 0, TrialOutcome::Skipped(SkipReason::Simulation(e))),
                };
            if let TrialOutcome::Skipped(reason) = &outcome {
                warn!("bias cell (bias={}, trial={}) skipped: {}", bias, trial, reason);
            }
            BiasRecord {
                trial,
                bias,
                n_simulated,
                n_published,
                outcome,
            }
        },
        &progress,
    )
}
