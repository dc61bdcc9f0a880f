//! CLI driver for meta-analysis sweeps and single fits.
//!
//! # Usage
//!
//! ```bash
//! # Power analysis over the reference study-count grid
//! cargo run --bin metapool -- power --output results/power_analysis.csv
//!
//! # Bias analysis at a custom grid with smaller batches
//! cargo run --bin metapool -- bias --bias-values "0,0.3,0.6,0.9" --batch-size 100
//!
//! # Fit the cleaned input table on Cohen's d and print the summary
//! cargo run --bin metapool -- fit --input clean_data.csv --measure cohens-d
//! ```

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use metapool::output::{write_bias_csv, write_power_csv, write_summary_csv};
use metapool::study::points_for;
use metapool::sweep::{
    bias_analysis_with_progress, default_bias_grid, default_sample_sizes,
    power_analysis_with_progress,
};
use metapool::{
    derive_effects, load_study_csv, sample, EffectMeasure, HierarchicalModel, SamplerConfig,
    SweepConfig,
};

/// Bayesian hierarchical meta-analysis: sweeps and fits.
#[derive(Parser, Debug)]
#[command(name = "metapool")]
#[command(about = "Run power/bias sweeps or fit the hierarchical model on a study table")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Power analysis: simulate and fit across a grid of study counts.
    Power {
        /// Comma-separated study counts (default: 10,15,20,30,50,75,100,200)
        #[arg(long)]
        sample_sizes: Option<String>,

        /// Trials per grid condition
        #[arg(long, default_value_t = 10)]
        trials: usize,

        /// Base seed for the sweep's RNG streams
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Output CSV path
        #[arg(short, long, default_value = "power_analysis.csv")]
        output: PathBuf,

        #[command(flatten)]
        sampler: SamplerArgs,
    },

    /// Bias analysis: publication-filter simulated batches across a bias grid.
    Bias {
        /// Comma-separated bias levels in [0,1] (default: 0.0 to 0.9 by 0.1)
        #[arg(long)]
        bias_values: Option<String>,

        /// Studies simulated per trial before filtering
        #[arg(long, default_value_t = 200)]
        batch_size: usize,

        /// Trials per grid condition
        #[arg(long, default_value_t = 10)]
        trials: usize,

        /// Base seed for the sweep's RNG streams
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Output CSV path
        #[arg(short, long, default_value = "bias_analysis.csv")]
        output: PathBuf,

        #[command(flatten)]
        sampler: SamplerArgs,
    },

    /// Fit the model on a cleaned study table and print the posterior summary.
    Fit {
        /// Cleaned study table CSV (data-cleaning collaborator's output)
        #[arg(short, long)]
        input: PathBuf,

        /// Which derived effect columns to fit on
        #[arg(long, value_enum, default_value_t = MeasureArg::CohensD)]
        measure: MeasureArg,

        /// Optional CSV path for the summary table
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Sampler seed
        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[command(flatten)]
        sampler: SamplerArgs,
    },
}

#[derive(clap::Args, Debug)]
struct SamplerArgs {
    /// Number of chains
    #[arg(long, default_value_t = 4)]
    chains: usize,

    /// Retained draws per chain
    #[arg(long, default_value_t = 1000)]
    draws: usize,

    /// Warmup iterations per chain
    #[arg(long, default_value_t = 1000)]
    tune: usize,
}

impl SamplerArgs {
    fn to_config(&self, seed: u64) -> SamplerConfig {
        SamplerConfig {
            chains: self.chains,
            draws: self.draws,
            tune: self.tune,
            seed,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MeasureArg {
    /// Standardized mean difference
    CohensD,
    /// Raw mean difference
    MeanDifference,
}

impl std::fmt::Display for MeasureArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeasureArg::CohensD => write!(f, "cohens-d"),
            MeasureArg::MeanDifference => write!(f, "mean-difference"),
        }
    }
}

impl From<MeasureArg> for EffectMeasure {
    fn from(arg: MeasureArg) -> Self {
        match arg {
            MeasureArg::CohensD => EffectMeasure::CohensD,
            MeasureArg::MeanDifference => EffectMeasure::MeanDifference,
        }
    }
}

fn parse_usize_list(raw: &str) -> Result<Vec<usize>, String> {
    raw.split(',')
        .map(|s| {
            s.trim()
                .parse()
                .map_err(|_| format!("invalid study count '{}'", s.trim()))
        })
        .collect()
}

fn parse_f64_list(raw: &str) -> Result<Vec<f64>, String> {
    raw.split(',')
        .map(|s| {
            s.trim()
                .parse()
                .map_err(|_| format!("invalid bias level '{}'", s.trim()))
        })
        .collect()
}

fn sweep_progress(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} cells {msg}")
            .expect("static template"),
    );
    bar
}

fn print_summary_table(rows: &[metapool::ParameterSummary]) {
    println!(
        "{:<24} {:>9} {:>9} {:>9} {:>9} {:>9} {:>7}",
        "variable", "mean", "sd", "hdi_3%", "hdi_97%", "ess", "r_hat"
    );
    for row in rows {
        println!(
            "{:<24} {:>9.3} {:>9.3} {:>9.3} {:>9.3} {:>9.0} {:>7.3}",
            row.name, row.mean, row.sd, row.hdi_low, row.hdi_high, row.ess, row.r_hat
        );
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    match args.command {
        Command::Power {
            sample_sizes,
            trials,
            seed,
            output,
            sampler,
        } => {
            let sizes = match sample_sizes {
                Some(raw) => parse_usize_list(&raw)?,
                None => default_sample_sizes(),
            };
            let config = SweepConfig {
                n_trials: trials,
                seed,
                sampler: sampler.to_config(seed),
                ..SweepConfig::default()
            };

            let bar = sweep_progress(sizes.len() * trials);
            let records = power_analysis_with_progress(
                &sizes,
                HierarchicalModel::new,
                &config,
                |done, _| bar.set_position(done as u64),
            );
            bar.finish_with_message("done");

            write_power_csv(&records, &output)?;
            let fitted = records.iter().filter(|r| r.outcome.summary().is_some()).count();
            println!(
                "power analysis: {} cells ({} fitted) -> {}",
                records.len(),
                fitted,
                output.display()
            );
        }

        Command::Bias {
            bias_values,
            batch_size,
            trials,
            seed,
            output,
            sampler,
        } => {
            let grid = match bias_values {
                Some(raw) => parse_f64_list(&raw)?,
                None => default_bias_grid(),
            };
            let config = SweepConfig {
                n_trials: trials,
                seed,
                sampler: sampler.to_config(seed),
                bias_batch_size: batch_size,
                ..SweepConfig::default()
            };

            let bar = sweep_progress(grid.len() * trials);
            let records = bias_analysis_with_progress(
                &grid,
                HierarchicalModel::new,
                &config,
                |done, _| bar.set_position(done as u64),
            );
            bar.finish_with_message("done");

            write_bias_csv(&records, &output)?;
            let fitted = records.iter().filter(|r| r.outcome.summary().is_some()).count();
            println!(
                "bias analysis: {} cells ({} fitted) -> {}",
                records.len(),
                fitted,
                output.display()
            );
        }

        Command::Fit {
            input,
            measure,
            output,
            seed,
            sampler,
        } => {
            let raw = load_study_csv(&input)?;
            let derived = derive_effects(&raw)?;
            let points = points_for(&derived, measure.into());
            let model = HierarchicalModel::new(&points)?;
            let trace = sample(&model, &sampler.to_config(seed))?;

            let rows = trace.summary();
            print_summary_table(&rows);
            if let Some(path) = output {
                write_summary_csv(&rows, &path)?;
                println!("summary written to {}", path.display());
            }
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(e) = run(Args::parse()) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
