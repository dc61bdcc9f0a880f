//! Posterior draw storage and predictive re-sampling.
//!
//! A [`Trace`] holds every retained draw of every model variable,
//! chain-major. Summaries and name-based extraction cover the scalar
//! `population_effect` and the per-study `individual_effect[i]` family;
//! predictive sampling simulates observed effect estimates either from
//! the priors alone or conditional on the fitted posterior.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::inference::summary::{summarize, ParameterSummary};
use crate::model::HierarchicalModel;

/// Name of the population-level variable in summaries and extraction.
pub const POPULATION_EFFECT: &str = "population_effect";

/// Retained posterior draws for every model variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    /// `population_effect` draws, `[chain][draw]`.
    pub(crate) population: Vec<Vec<f64>>,
    /// `individual_effect` draws, `[chain][draw][study]`.
    pub(crate) individual: Vec<Vec<Vec<f64>>>,
    pub(crate) n_studies: usize,
}

impl Trace {
    /// Number of chains.
    pub fn n_chains(&self) -> usize {
        self.population.len()
    }

    /// Retained draws per chain.
    pub fn n_draws(&self) -> usize {
        self.population.first().map_or(0, Vec::len)
    }

    /// Size of the per-study dimension the model was fit with.
    pub fn n_studies(&self) -> usize {
        self.n_studies
    }

    /// All `population_effect` draws pooled across chains.
    pub fn population_draws(&self) -> Vec<f64> {
        self.population.iter().flatten().copied().collect()
    }

    /// Pooled draws of one variable by name: `population_effect` or
    /// `individual_effect[i]`. Returns `None` for unknown names or an
    /// out-of-range study index.
    pub fn draws(&self, name: &str) -> Option<Vec<f64>> {
        if name == POPULATION_EFFECT {
            return Some(self.population_draws());
        }
        let index = name
            .strip_prefix("individual_effect[")?
            .strip_suffix(']')?
            .parse::<usize>()
            .ok()?;
        if index >= self.n_studies {
            return None;
        }
        Some(
            self.individual
                .iter()
                .flatten()
                .map(|draw| draw[index])
                .collect(),
        )
    }

    /// Summary row for `population_effect`.
    pub fn population_summary(&self) -> ParameterSummary {
        summarize(POPULATION_EFFECT, &self.population)
    }

    /// Summary rows for every variable: `population_effect` first, then
    /// each `individual_effect[i]` in study order.
    pub fn summary(&self) -> Vec<ParameterSummary> {
        let mut rows = Vec::with_capacity(1 + self.n_studies);
        rows.push(self.population_summary());
        for i in 0..self.n_studies {
            let chains: Vec<Vec<f64>> = self
                .individual
                .iter()
                .map(|chain| chain.iter().map(|draw| draw[i]).collect())
                .collect();
            rows.push(summarize(&format!("individual_effect[{}]", i), &chains));
        }
        rows
    }

    /// Posterior predictive draws of the observed effect estimates.
    ///
    /// For every retained posterior draw, simulates one observation per
    /// study from `Normal(individual_effect[i], se_i)`. Rows are pooled
    /// chain-major draws, columns are studies in index order.
    pub fn posterior_predictive<R: Rng + ?Sized>(
        &self,
        model: &HierarchicalModel,
        rng: &mut R,
    ) -> Vec<Vec<f64>> {
        let points = model.observations();
        debug_assert_eq!(points.len(), self.n_studies);
        self.individual
            .iter()
            .flatten()
            .map(|draw| {
                draw.iter()
                    .zip(points)
                    .map(|(&ind, point)| {
                        // Validated at model construction: std_error > 0.
                        let noise = Normal::new(ind, point.std_error)
                            .expect("invalid observation noise scale");
                        noise.sample(rng)
                    })
                    .collect()
            })
            .collect()
    }
}

/// Prior predictive draws of the observed effect estimates.
///
/// Ancestral sampling through the three model levels: population draw,
/// per-study latent draw, then one observation per study at that study's
/// reported noise scale. Rows are draws, columns are studies.
pub fn prior_predictive<R: Rng + ?Sized>(
    model: &HierarchicalModel,
    draws: usize,
    rng: &mut R,
) -> Vec<Vec<f64>> {
    let config = model.config();
    // Scales validated at model construction.
    let population =
        Normal::new(0.0, config.population_prior_sd).expect("invalid population prior scale");
    (0..draws)
        .map(|_| {
            let pop = population.sample(rng);
            let between =
                Normal::new(pop, config.between_study_sd).expect("invalid between-study scale");
            model
                .observations()
                .iter()
                .map(|point| {
                    let individual = between.sample(rng);
                    Normal::new(individual, point.std_error)
                        .expect("invalid observation noise scale")
                        .sample(rng)
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::study::StudyPoint;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn fixture_trace() -> Trace {
        Trace {
            population: vec![vec![0.1, 0.2], vec![0.3, 0.4]],
            individual: vec![
                vec![vec![1.0, 2.0], vec![3.0, 4.0]],
                vec![vec![5.0, 6.0], vec![7.0, 8.0]],
            ],
            n_studies: 2,
        }
    }

    fn fixture_model(n: u32) -> HierarchicalModel {
        let points: Vec<StudyPoint> = (0..n)
            .map(|i| StudyPoint {
                study_id: i,
                effect: 0.1,
                std_error: 0.1,
            })
            .collect();
        HierarchicalModel::new(&points).unwrap()
    }

    #[test]
    fn draws_by_name() {
        let trace = fixture_trace();
        assert_eq!(
            trace.draws("population_effect").unwrap(),
            vec![0.1, 0.2, 0.3, 0.4]
        );
        assert_eq!(
            trace.draws("individual_effect[1]").unwrap(),
            vec![2.0, 4.0, 6.0, 8.0]
        );
        assert!(trace.draws("individual_effect[2]").is_none());
        assert!(trace.draws("something_else").is_none());
    }

    #[test]
    fn summary_covers_every_variable() {
        let trace = fixture_trace();
        let rows = trace.summary();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].name, "population_effect");
        assert_eq!(rows[1].name, "individual_effect[0]");
        assert_eq!(rows[2].name, "individual_effect[1]");
    }

    #[test]
    fn posterior_predictive_shape_is_draws_by_studies() {
        let trace = fixture_trace();
        let model = fixture_model(2);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let predicted = trace.posterior_predictive(&model, &mut rng);
        assert_eq!(predicted.len(), 4);
        assert!(predicted.iter().all(|row| row.len() == 2));
    }

    #[test]
    fn prior_predictive_shape_is_draws_by_studies() {
        let model = fixture_model(3);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let predicted = prior_predictive(&model, 50, &mut rng);
        assert_eq!(predicted.len(), 50);
        assert!(predicted.iter().all(|row| row.len() == 3));
    }
}
