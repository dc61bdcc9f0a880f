//! Posterior summarization and convergence diagnostics.
//!
//! Produces one summary row per model variable: posterior mean, standard
//! deviation, 94% highest-density interval (reported as the `hdi_3%` /
//! `hdi_97%` bounds), effective sample size, and split-R̂.
//!
//! Diagnostics follow the standard recipes: split-R̂ halves every chain
//! and compares between- to within-chain variance; ESS sums paired
//! autocorrelations (Geyer's initial positive sequence) over the split
//! chains.

use serde::{Deserialize, Serialize};

/// Probability mass of the reported highest-density interval.
pub const HDI_PROB: f64 = 0.94;

/// Posterior summary row for a single model variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSummary {
    /// Variable name, e.g. `population_effect` or `individual_effect[3]`.
    pub name: String,
    /// Posterior mean over all chains and draws.
    pub mean: f64,
    /// Posterior standard deviation.
    pub sd: f64,
    /// Lower bound of the 94% highest-density interval.
    pub hdi_low: f64,
    /// Upper bound of the 94% highest-density interval.
    pub hdi_high: f64,
    /// Effective sample size of the pooled draws.
    pub ess: f64,
    /// Split-R̂ convergence diagnostic (≈ 1 at convergence).
    pub r_hat: f64,
}

/// Summarize one variable from its per-chain draws.
///
/// `chains` must be non-empty and rectangular (equal draw counts); the
/// sampler guarantees both.
pub fn summarize(name: &str, chains: &[Vec<f64>]) -> ParameterSummary {
    let pooled: Vec<f64> = chains.iter().flatten().copied().collect();
    let n = pooled.len();
    let mean = pooled.iter().sum::<f64>() / n as f64;
    let sd = if n > 1 {
        (pooled.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
    } else {
        0.0
    };

    let mut sorted = pooled;
    sorted.sort_by(|a, b| a.total_cmp(b));
    let (hdi_low, hdi_high) = hdi_bounds(&sorted, HDI_PROB);

    let split = split_chains(chains);
    ParameterSummary {
        name: name.to_string(),
        mean,
        sd,
        hdi_low,
        hdi_high,
        ess: effective_sample_size(&split),
        r_hat: split_rhat(&split),
    }
}

/// Smallest interval containing `prob` of the sorted draws.
///
/// Scans every window of the required width over the sorted sample and
/// keeps the narrowest, the usual empirical HDI for unimodal posteriors.
pub(crate) fn hdi_bounds(sorted: &[f64], prob: f64) -> (f64, f64) {
    let n = sorted.len();
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }
    let window = ((prob * n as f64).floor() as usize).max(1).min(n - 1).max(1);
    if window >= n {
        return (sorted[0], sorted[n - 1]);
    }
    let mut best = 0;
    let mut best_width = f64::INFINITY;
    for i in 0..(n - window) {
        let width = sorted[i + window] - sorted[i];
        if width < best_width {
            best_width = width;
            best = i;
        }
    }
    (sorted[best], sorted[best + window])
}

/// Halve every chain, dropping a trailing odd draw.
fn split_chains(chains: &[Vec<f64>]) -> Vec<&[f64]> {
    let mut split = Vec::with_capacity(chains.len() * 2);
    for chain in chains {
        let half = chain.len() / 2;
        if half == 0 {
            split.push(chain.as_slice());
        } else {
            split.push(&chain[..half]);
            split.push(&chain[half..half * 2]);
        }
    }
    split
}

fn chain_mean(chain: &[f64]) -> f64 {
    chain.iter().sum::<f64>() / chain.len() as f64
}

fn chain_variance(chain: &[f64], mean: f64) -> f64 {
    if chain.len() < 2 {
        return 0.0;
    }
    chain.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (chain.len() - 1) as f64
}

/// Split-R̂ over pre-split chains.
pub(crate) fn split_rhat(split: &[&[f64]]) -> f64 {
    let m = split.len();
    let n = split.iter().map(|c| c.len()).min().unwrap_or(0);
    if m < 2 || n < 4 {
        // Not enough draws to estimate anything; report neutral.
        return 1.0;
    }

    let means: Vec<f64> = split.iter().map(|c| chain_mean(&c[..n])).collect();
    let variances: Vec<f64> = split
        .iter()
        .zip(&means)
        .map(|(c, &mu)| chain_variance(&c[..n], mu))
        .collect();

    let w = variances.iter().sum::<f64>() / m as f64;
    let grand_mean = means.iter().sum::<f64>() / m as f64;
    let b = n as f64 * means.iter().map(|mu| (mu - grand_mean).powi(2)).sum::<f64>()
        / (m - 1) as f64;

    if w <= 0.0 {
        return 1.0;
    }
    let var_hat = ((n - 1) as f64 * w + b) / n as f64;
    (var_hat / w).sqrt()
}

/// Biased autocovariance at `lag` (normalized by chain length).
fn autocovariance(chain: &[f64], mean: f64, lag: usize) -> f64 {
    let n = chain.len();
    chain[..n - lag]
        .iter()
        .zip(&chain[lag..])
        .map(|(a, b)| (a - mean) * (b - mean))
        .sum::<f64>()
        / n as f64
}

/// Effective sample size over pre-split chains.
///
/// Combined-chain autocorrelations are accumulated in Geyer pairs and
/// truncated at the first non-positive pair sum.
pub(crate) fn effective_sample_size(split: &[&[f64]]) -> f64 {
    let m = split.len();
    let n = split.iter().map(|c| c.len()).min().unwrap_or(0);
    let total = split.iter().map(|c| c.len()).sum::<usize>() as f64;
    if m == 0 || n < 4 {
        return total;
    }

    let means: Vec<f64> = split.iter().map(|c| chain_mean(&c[..n])).collect();
    let variances: Vec<f64> = split
        .iter()
        .zip(&means)
        .map(|(c, &mu)| chain_variance(&c[..n], mu))
        .collect();
    let w = variances.iter().sum::<f64>() / m as f64;

    let grand_mean = means.iter().sum::<f64>() / m as f64;
    let b_over_n = means.iter().map(|mu| (mu - grand_mean).powi(2)).sum::<f64>()
        / (m as f64 - 1.0).max(1.0);
    let var_hat = (n - 1) as f64 / n as f64 * w + b_over_n;
    if var_hat <= 0.0 {
        return total;
    }

    let rho = |lag: usize| -> f64 {
        let mean_acov = split
            .iter()
            .zip(&means)
            .map(|(c, &mu)| autocovariance(&c[..n], mu, lag))
            .sum::<f64>()
            / m as f64;
        1.0 - (w - mean_acov) / var_hat
    };

    // tau = 1 + 2 * sum(rho_t); accumulated as Geyer pairs starting at
    // (rho_1, rho_2) and stopping at the first non-positive pair.
    let mut tau = 1.0;
    let mut lag = 1;
    while lag + 1 < n {
        let pair = rho(lag) + rho(lag + 1);
        if pair <= 0.0 {
            break;
        }
        tau += 2.0 * pair;
        lag += 2;
    }

    (total / tau).clamp(1.0, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn iid_chains(n_chains: usize, n_draws: usize, seed: u64) -> Vec<Vec<f64>> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        (0..n_chains)
            .map(|_| (0..n_draws).map(|_| rng.random::<f64>() - 0.5).collect())
            .collect()
    }

    #[test]
    fn hdi_covers_the_requested_mass() {
        let sorted: Vec<f64> = (0..1000).map(|i| i as f64 / 1000.0).collect();
        let (low, high) = hdi_bounds(&sorted, 0.94);
        assert!(low <= 0.06);
        assert!(high >= 0.93);
        assert!(high - low <= 0.95);
    }

    #[test]
    fn hdi_is_ordered() {
        let mut draws: Vec<f64> = iid_chains(1, 500, 3)[0].clone();
        draws.sort_by(|a, b| a.total_cmp(b));
        let (low, high) = hdi_bounds(&draws, HDI_PROB);
        assert!(low < high);
    }

    #[test]
    fn rhat_near_one_for_iid_chains() {
        let chains = iid_chains(4, 1000, 11);
        let summary = summarize("x", &chains);
        assert!(
            (summary.r_hat - 1.0).abs() < 0.02,
            "iid chains should have r_hat ~ 1, got {}",
            summary.r_hat
        );
    }

    #[test]
    fn rhat_detects_disagreeing_chains() {
        let mut chains = iid_chains(4, 1000, 7);
        for x in &mut chains[0] {
            *x += 10.0;
        }
        let summary = summarize("x", &chains);
        assert!(
            summary.r_hat > 1.5,
            "shifted chain should inflate r_hat, got {}",
            summary.r_hat
        );
    }

    #[test]
    fn ess_close_to_sample_size_for_iid_draws() {
        let chains = iid_chains(4, 1000, 19);
        let summary = summarize("x", &chains);
        assert!(
            summary.ess > 2000.0,
            "iid draws should keep most of the sample, got ess {}",
            summary.ess
        );
        assert!(summary.ess <= 4000.0);
    }

    #[test]
    fn ess_shrinks_for_autocorrelated_draws() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(23);
        let chains: Vec<Vec<f64>> = (0..4)
            .map(|_| {
                let mut prev = 0.0_f64;
                (0..1000)
                    .map(|_| {
                        prev = 0.95 * prev + (rng.random::<f64>() - 0.5);
                        prev
                    })
                    .collect()
            })
            .collect();
        let summary = summarize("x", &chains);
        assert!(
            summary.ess < 1000.0,
            "AR(0.95) draws should lose most of the sample, got ess {}",
            summary.ess
        );
    }

    #[test]
    fn summary_mean_and_sd_match_pooled_draws() {
        let chains = vec![vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]];
        let summary = summarize("x", &chains);
        assert!((summary.mean - 4.5).abs() < 1e-12);
        assert!(summary.sd > 0.0);
        assert_eq!(summary.name, "x");
    }
}
