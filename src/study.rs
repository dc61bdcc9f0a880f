//! Study records and the typed input-table contract.
//!
//! A meta-analysis consumes one row per independent study. Raw rows carry
//! two-arm summary statistics (control arm and case arm); derived rows add
//! the effect-size columns; [`StudyPoint`] is the minimal
//! (estimate, standard error) pair the hierarchical model binds to.
//!
//! Row order is load-bearing: the model indexes its per-study latent
//! effects by position, so a batch must keep its order between model
//! construction and result interpretation.

use serde::{Deserialize, Serialize};

/// Summary statistics for one arm of a study.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmSummary {
    /// Sample mean of the arm's outcome measure.
    pub mean: f64,
    /// Sample standard deviation of the arm's outcome measure.
    pub sd: f64,
    /// Number of participants in the arm.
    pub n: u32,
}

/// One cleaned input row: two-arm summary statistics for a single study.
///
/// Matches the input-table contract of the data-cleaning collaborator
/// (`control_mean, control_sd, schizo_mean, schizo_sd, study_id,
/// n_schizo, n_control, task`); the `schizo_*` columns map onto the case
/// arm at the CSV boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStudy {
    /// Stable identifier from the source dataset.
    pub study_id: u32,
    /// Label of the task the study measured its outcome on.
    pub task: String,
    /// Control arm.
    pub control: ArmSummary,
    /// Case arm.
    pub case: ArmSummary,
}

/// A raw study with its derived effect-size columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedStudy {
    /// Stable identifier from the source dataset.
    pub study_id: u32,
    /// Label of the task the study measured its outcome on.
    pub task: String,
    /// Control arm.
    pub control: ArmSummary,
    /// Case arm.
    pub case: ArmSummary,
    /// Standardized mean difference (case minus control).
    pub cohens_d: f64,
    /// Standard error of `cohens_d`.
    pub se_cohens_d: f64,
    /// Raw mean difference (case minus control).
    pub effect: f64,
    /// Standard error of `effect`.
    pub se_effect: f64,
}

/// Which derived (estimate, standard error) pair feeds the model.
///
/// The model itself is agnostic to the effect scale; this selector lets
/// the same hierarchical structure fit standardized effect sizes or raw
/// mean differences interchangeably.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EffectMeasure {
    /// Fit on `cohens_d` / `se_cohens_d`.
    #[default]
    CohensD,
    /// Fit on `effect` / `se_effect`.
    MeanDifference,
}

impl std::fmt::Display for EffectMeasure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EffectMeasure::CohensD => write!(f, "cohens_d"),
            EffectMeasure::MeanDifference => write!(f, "effect"),
        }
    }
}

/// The per-study observation the hierarchical model consumes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StudyPoint {
    /// Identifier carried through for error reporting and summaries.
    pub study_id: u32,
    /// Reported effect estimate.
    pub effect: f64,
    /// Reported standard error of the estimate.
    pub std_error: f64,
}

impl DerivedStudy {
    /// Project this row onto the (estimate, standard error) pair selected
    /// by `measure`.
    pub fn point(&self, measure: EffectMeasure) -> StudyPoint {
        match measure {
            EffectMeasure::CohensD => StudyPoint {
                study_id: self.study_id,
                effect: self.cohens_d,
                std_error: self.se_cohens_d,
            },
            EffectMeasure::MeanDifference => StudyPoint {
                study_id: self.study_id,
                effect: self.effect,
                std_error: self.se_effect,
            },
        }
    }
}

/// Project a batch of derived rows onto model observations, keeping order.
pub fn points_for(studies: &[DerivedStudy], measure: EffectMeasure) -> Vec<StudyPoint> {
    studies.iter().map(|s| s.point(measure)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derived() -> DerivedStudy {
        DerivedStudy {
            study_id: 3,
            task: "constrained".to_string(),
            control: ArmSummary {
                mean: 1.0,
                sd: 1.0,
                n: 10,
            },
            case: ArmSummary {
                mean: 1.5,
                sd: 1.0,
                n: 10,
            },
            cohens_d: 0.5,
            se_cohens_d: 0.21,
            effect: 0.5,
            se_effect: 0.45,
        }
    }

    #[test]
    fn point_selects_the_requested_columns() {
        let s = derived();
        let d = s.point(EffectMeasure::CohensD);
        assert_eq!((d.effect, d.std_error), (0.5, 0.21));
        let raw = s.point(EffectMeasure::MeanDifference);
        assert_eq!((raw.effect, raw.std_error), (0.5, 0.45));
        assert_eq!(d.study_id, 3);
    }

    #[test]
    fn points_for_preserves_row_order() {
        let mut a = derived();
        a.study_id = 1;
        let mut b = derived();
        b.study_id = 2;
        let points = points_for(&[a, b], EffectMeasure::CohensD);
        assert_eq!(points[0].study_id, 1);
        assert_eq!(points[1].study_id, 2);
    }
}
