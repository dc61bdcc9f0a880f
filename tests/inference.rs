//! End-to-end inference checks on fixed study tables.

use metapool::{sample, HierarchicalModel, SamplerConfig, StudyPoint};

fn fixture_points(effects: &[f64], se: f64) -> Vec<StudyPoint> {
    effects
        .iter()
        .enumerate()
        .map(|(i, &effect)| StudyPoint {
            study_id: i as u32,
            effect,
            std_error: se,
        })
        .collect()
}

#[test]
fn five_study_fixture_recovers_the_pooled_effect() {
    // Five studies around a mean of 0.1 with tight, equal standard errors.
    let points = fixture_points(&[0.1, 0.2, -0.1, 0.3, 0.0], 0.1);
    let model = HierarchicalModel::new(&points).unwrap();

    for seed in [1, 2, 3] {
        let trace = sample(&model, &SamplerConfig::default().with_seed(seed)).unwrap();
        let summary = trace.population_summary();

        assert!(
            summary.mean > -0.2 && summary.mean < 0.4,
            "seed {}: population mean {} outside sanity bounds",
            seed,
            summary.mean
        );
        assert!(
            summary.hdi_low < 0.1 && summary.hdi_high > 0.1,
            "seed {}: HDI ({}, {}) should contain the unweighted mean 0.1",
            seed,
            summary.hdi_low,
            summary.hdi_high
        );
        assert!(summary.r_hat < 1.01, "seed {}: r_hat {}", seed, summary.r_hat);
        assert!(summary.ess > 100.0, "seed {}: ess {}", seed, summary.ess);
    }
}

#[test]
fn posterior_matches_the_closed_form_population_marginal() {
    // Marginalizing the latent effects gives y_i ~ Normal(pop, tau^2 + se_i^2),
    // so the population posterior is available exactly: precision
    // 1/0.5^2 + 5/(0.2^2 + 0.1^2) = 104, mean (sum(y)/0.05)/104.
    let points = fixture_points(&[0.1, 0.2, -0.1, 0.3, 0.0], 0.1);
    let model = HierarchicalModel::new(&points).unwrap();
    let trace = sample(&model, &SamplerConfig::default()).unwrap();
    let summary = trace.population_summary();

    let expected_mean = (0.5 / 0.05) / 104.0;
    let expected_sd = (1.0 / 104.0_f64).sqrt();
    assert!(
        (summary.mean - expected_mean).abs() < 0.02,
        "posterior mean {} should be near {}",
        summary.mean,
        expected_mean
    );
    assert!(
        (summary.sd - expected_sd).abs() < 0.02,
        "posterior sd {} should be near {}",
        summary.sd,
        expected_sd
    );
}

#[test]
fn model_rebuilds_across_batch_sizes_without_structural_errors() {
    // The sweep harness rebuilds the model at whatever size the filtered
    // batch came out to; only the data changes.
    for n in [1, 2, 5, 40, 150] {
        let points = fixture_points(&vec![0.2; n], 0.15);
        let model = HierarchicalModel::new(&points).unwrap();
        assert_eq!(model.n_studies(), n);
        let trace = sample(
            &model,
            &SamplerConfig {
                chains: 2,
                draws: 50,
                tune: 50,
                seed: 5,
            },
        )
        .unwrap();
        assert_eq!(trace.n_studies(), n);
        assert_eq!(trace.summary().len(), n + 1);
    }
}

#[test]
fn trace_supports_extraction_by_variable_name() {
    let points = fixture_points(&[0.1, 0.5], 0.1);
    let model = HierarchicalModel::new(&points).unwrap();
    let trace = sample(&model, &SamplerConfig::default()).unwrap();

    let pop = trace.draws("population_effect").unwrap();
    assert_eq!(pop.len(), 4000);

    let second = trace.draws("individual_effect[1]").unwrap();
    assert_eq!(second.len(), 4000);
    // The study reporting 0.5 should keep a higher latent effect than the
    // one reporting 0.1.
    let first = trace.draws("individual_effect[0]").unwrap();
    let mean = |xs: &[f64]| xs.iter().sum::<f64>() / xs.len() as f64;
    assert!(mean(&second) > mean(&first));
}

#[test]
fn predictive_draws_have_draw_by_study_shape() {
    let points = fixture_points(&[0.1, 0.2, 0.3], 0.1);
    let model = HierarchicalModel::new(&points).unwrap();
    let trace = sample(
        &model,
        &SamplerConfig {
            chains: 2,
            draws: 100,
            tune: 100,
            seed: 8,
        },
    )
    .unwrap();

    use rand::SeedableRng;
    let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(21);

    let prior = metapool::prior_predictive(&model, 200, &mut rng);
    assert_eq!(prior.len(), 200);
    assert!(prior.iter().all(|row| row.len() == 3));

    let posterior = trace.posterior_predictive(&model, &mut rng);
    assert_eq!(posterior.len(), 200);
    assert!(posterior.iter().all(|row| row.len() == 3));
}
