//! Effect-size statistics over study summary data.
//!
//! Three elementwise functions computed per study from two-arm summary
//! statistics:
//!
//! - `cohens_d`: standardized mean difference, normalized by the pooled
//!   standard deviation `sqrt((sd_1² + sd_2²) / 2)`
//! - `se_cohens_d`: standard error of Cohen's d from the two arm sizes
//! - `se_effect`: standard error of a raw mean difference
//!
//! All inputs are column slices aligned by study; a length mismatch or a
//! degenerate denominator (zero pooled SD, `n_1 + n_2 = 2`, an empty arm)
//! is rejected with the offending study index instead of propagating
//! NaN/Inf into the model.

use std::fmt;

use crate::study::{DerivedStudy, RawStudy};

/// Error from an effect-size computation.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectError {
    /// Two input columns have different lengths.
    LengthMismatch {
        /// Name of the offending column.
        column: &'static str,
        /// Length of the first column.
        expected: usize,
        /// Length of the offending column.
        got: usize,
    },

    /// Both arms report zero variance, so the pooled SD is zero and
    /// Cohen's d is undefined.
    ZeroPooledSd {
        /// Index of the offending study.
        index: usize,
    },

    /// `n_1 + n_2 = 2`, which zeroes the `n - 2` denominator in the
    /// standard error of Cohen's d.
    DegenerateSampleSize {
        /// Index of the offending study.
        index: usize,
        /// Size of the first arm.
        n_1: u32,
        /// Size of the second arm.
        n_2: u32,
    },

    /// An arm has zero participants.
    EmptyArm {
        /// Index of the offending study.
        index: usize,
    },
}

impl fmt::Display for EffectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectError::LengthMismatch {
                column,
                expected,
                got,
            } => write!(
                f,
                "column '{}' has {} rows, expected {}",
                column, got, expected
            ),
            EffectError::ZeroPooledSd { index } => write!(
                f,
                "study {}: both arms have zero variance, Cohen's d is undefined",
                index
            ),
            EffectError::DegenerateSampleSize { index, n_1, n_2 } => write!(
                f,
                "study {}: combined sample size {} + {} leaves no degrees of freedom",
                index, n_1, n_2
            ),
            EffectError::EmptyArm { index } => {
                write!(f, "study {}: an arm has zero participants", index)
            }
        }
    }
}

impl std::error::Error for EffectError {}

fn check_len(
    column: &'static str,
    expected: usize,
    got: usize,
) -> Result<(), EffectError> {
    if expected == got {
        Ok(())
    } else {
        Err(EffectError::LengthMismatch {
            column,
            expected,
            got,
        })
    }
}

/// Compute Cohen's d per study: `(mu_2 - mu_1) / sqrt((sd_1² + sd_2²) / 2)`.
///
/// Returns `EffectError::ZeroPooledSd` when both arms of a study report
/// zero variance.
pub fn cohens_d(
    mu_1: &[f64],
    mu_2: &[f64],
    sd_1: &[f64],
    sd_2: &[f64],
) -> Result<Vec<f64>, EffectError> {
    check_len("mu_2", mu_1.len(), mu_2.len())?;
    check_len("sd_1", mu_1.len(), sd_1.len())?;
    check_len("sd_2", mu_1.len(), sd_2.len())?;

    let mut out = Vec::with_capacity(mu_1.len());
    for i in 0..mu_1.len() {
        let pooled_sd = ((sd_1[i].powi(2) + sd_2[i].powi(2)) / 2.0).sqrt();
        if pooled_sd == 0.0 {
            return Err(EffectError::ZeroPooledSd { index: i });
        }
        out.push((mu_2[i] - mu_1[i]) / pooled_sd);
    }
    Ok(out)
}

/// Compute the standard error of Cohen's d per study.
///
/// With `n = n_1 + n_2`: `se = (n/(n_1·n_2) + d²/(2(n-2))) · n/(n-2)`.
/// Requires at least one arm non-empty and `n > 2`.
pub fn se_cohens_d(d: &[f64], n_1: &[u32], n_2: &[u32]) -> Result<Vec<f64>, EffectError> {
    check_len("n_1", d.len(), n_1.len())?;
    check_len("n_2", d.len(), n_2.len())?;

    let mut out = Vec::with_capacity(d.len());
    for i in 0..d.len() {
        if n_1[i] == 0 || n_2[i] == 0 {
            return Err(EffectError::EmptyArm { index: i });
        }
        let n = f64::from(n_1[i]) + f64::from(n_2[i]);
        if n <= 2.0 {
            return Err(EffectError::DegenerateSampleSize {
                index: i,
                n_1: n_1[i],
                n_2: n_2[i],
            });
        }
        let a = n / (f64::from(n_1[i]) * f64::from(n_2[i]));
        let b = d[i].powi(2) / (2.0 * (n - 2.0));
        out.push((a + b) * (n / (n - 2.0)));
    }
    Ok(out)
}

/// Compute the standard error of a raw mean difference per study:
/// `sqrt(sd_1²/n_1 + sd_2²/n_2)`.
///
/// Symmetric under swapping the two arms; requires both arms non-empty.
pub fn se_effect(
    sd_1: &[f64],
    sd_2: &[f64],
    n_1: &[u32],
    n_2: &[u32],
) -> Result<Vec<f64>, EffectError> {
    check_len("sd_2", sd_1.len(), sd_2.len())?;
    check_len("n_1", sd_1.len(), n_1.len())?;
    check_len("n_2", sd_1.len(), n_2.len())?;

    let mut out = Vec::with_capacity(sd_1.len());
    for i in 0..sd_1.len() {
        if n_1[i] == 0 || n_2[i] == 0 {
            return Err(EffectError::EmptyArm { index: i });
        }
        let v = sd_1[i].powi(2) / f64::from(n_1[i]) + sd_2[i].powi(2) / f64::from(n_2[i]);
        out.push(v.sqrt());
    }
    Ok(out)
}

/// Derive the effect-size columns for a batch of raw two-arm studies.
///
/// Computes `cohens_d`, `se_cohens_d`, and the raw mean difference
/// `effect` / `se_effect` for every row, keeping row order. This is the
/// step between the cleaned input table and model construction; either
/// derived (estimate, standard error) pair can then feed the model via
/// [`EffectMeasure`](crate::study::EffectMeasure).
pub fn derive_effects(studies: &[RawStudy]) -> Result<Vec<DerivedStudy>, EffectError> {
    let control_mean: Vec<f64> = studies.iter().map(|s| s.control.mean).collect();
    let case_mean: Vec<f64> = studies.iter().map(|s| s.case.mean).collect();
    let control_sd: Vec<f64> = studies.iter().map(|s| s.control.sd).collect();
    let case_sd: Vec<f64> = studies.iter().map(|s| s.case.sd).collect();
    let n_control: Vec<u32> = studies.iter().map(|s| s.control.n).collect();
    let n_case: Vec<u32> = studies.iter().map(|s| s.case.n).collect();

    let d = cohens_d(&control_mean, &case_mean, &control_sd, &case_sd)?;
    let se_d = se_cohens_d(&d, &n_control, &n_case)?;
    let se_raw = se_effect(&control_sd, &case_sd, &n_control, &n_case)?;

    Ok(studies
        .iter()
        .enumerate()
        .map(|(i, s)| DerivedStudy {
            study_id: s.study_id,
            task: s.task.clone(),
            control: s.control,
            case: s.case,
            cohens_d: d[i],
            se_cohens_d: se_d[i],
            effect: case_mean[i] - control_mean[i],
            se_effect: se_raw[i],
        })
        .collect())
}
