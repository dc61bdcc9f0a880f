//! CSV export of sweep results and simulated study tables.
//!
//! One row per (condition, trial) cell; summary fields are left blank for
//! skipped cells so downstream tooling can distinguish "no fit" from a
//! zero. Files are written whole, header first.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::inference::ParameterSummary;
use crate::simulate::SimulatedStudy;
use crate::sweep::{BiasRecord, PowerRecord, TrialOutcome};

fn summary_fields(outcome: &TrialOutcome) -> String {
    match outcome.summary() {
        Some(s) => format!(
            "{:.6},{:.6},{:.6},{:.6},{:.1},{:.4}",
            s.mean, s.sd, s.hdi_low, s.hdi_high, s.ess, s.r_hat
        ),
        None => ",,,,,".to_string(),
    }
}

fn converged_field(outcome: &TrialOutcome) -> &'static str {
    match outcome {
        TrialOutcome::Fit { converged, .. } => {
            if *converged {
                "true"
            } else {
                "false"
            }
        }
        TrialOutcome::Skipped(_) => "",
    }
}

/// Write power-analysis records to CSV.
pub fn write_power_csv(records: &[PowerRecord], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(
        writer,
        "trial,n_studies,mean,sd,hdi_3%,hdi_97%,ess,r_hat,converged,status"
    )?;
    for r in records {
        writeln!(
            writer,
            "{},{},{},{},{}",
            r.trial,
            r.n_studies,
            summary_fields(&r.outcome),
            converged_field(&r.outcome),
            r.outcome.status_label(),
        )?;
    }
    writer.flush()
}

/// Write bias-analysis records to CSV.
pub fn write_bias_csv(records: &[BiasRecord], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(
        writer,
        "trial,bias,n_simulated,n_published,mean,sd,hdi_3%,hdi_97%,ess,r_hat,converged,status"
    )?;
    for r in records {
        writeln!(
            writer,
            "{},{},{},{},{},{},{}",
            r.trial,
            r.bias,
            r.n_simulated,
            r.n_published,
            summary_fields(&r.outcome),
            converged_field(&r.outcome),
            r.outcome.status_label(),
        )?;
    }
    writer.flush()
}

/// Write a simulated study batch to CSV, one row per study in batch
/// order, for the plotting collaborator.
pub fn write_studies_csv(studies: &[SimulatedStudy], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(
        writer,
        "study_id,n_participants,mean_effect,standard_error,significance"
    )?;
    for s in studies {
        writeln!(
            writer,
            "{},{},{:.6},{:.6},{}",
            s.study_id, s.n_participants, s.mean_effect, s.standard_error, s.significance
        )?;
    }
    writer.flush()
}

/// Write posterior summary rows to CSV, one row per variable.
pub fn write_summary_csv(rows: &[ParameterSummary], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "variable,mean,sd,hdi_3%,hdi_97%,ess,r_hat")?;
    for s in rows {
        writeln!(
            writer,
            "{},{:.6},{:.6},{:.6},{:.6},{:.1},{:.4}",
            s.name, s.mean, s.sd, s.hdi_low, s.hdi_high, s.ess, s.r_hat
        )?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::SkipReason;

    fn summary(mean: f64) -> ParameterSummary {
        ParameterSummary {
            name: "population_effect".to_string(),
            mean,
            sd: 0.05,
            hdi_low: mean - 0.1,
            hdi_high: mean + 0.1,
            ess: 3500.0,
            r_hat: 1.001,
        }
    }

    #[test]
    fn power_csv_round_trip() {
        let records = vec![
            PowerRecord {
                trial: 0,
                n_studies: 10,
                outcome: TrialOutcome::Fit {
                    summary: summary(0.38),
                    converged: true,
                },
            },
            PowerRecord {
                trial: 1,
                n_studies: 10,
                outcome: TrialOutcome::Skipped(SkipReason::EmptyBatch),
            },
        ];

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("power.csv");
        write_power_csv(&records, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "trial,n_studies,mean,sd,hdi_3%,hdi_97%,ess,r_hat,converged,status"
        );
        assert!(lines[1].starts_with("0,10,0.380000,"));
        assert!(lines[1].ends_with("true,ok"));
        assert_eq!(lines[2], "1,10,,,,,,,,empty_batch");
    }

    #[test]
    fn bias_csv_carries_batch_counts() {
        let records = vec![BiasRecord {
            trial: 0,
            bias: 0.5,
            n_simulated: 100,
            n_published: 73,
            outcome: TrialOutcome::Fit {
                summary: summary(0.41),
                converged: false,
            },
        }];

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bias.csv");
        write_bias_csv(&records, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let line = content.lines().nth(1).unwrap();
        assert!(line.starts_with("0,0.5,100,73,"));
        assert!(line.ends_with("false,non_converged"));
    }

    #[test]
    fn studies_csv_has_one_row_per_study() {
        let studies = vec![SimulatedStudy {
            study_id: 0,
            n_participants: 17,
            mean_effect: 0.52,
            standard_error: 0.21,
            significance: true,
        }];

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("studies.csv");
        write_studies_csv(&studies, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(
            "study_id,n_participants,mean_effect,standard_error,significance\n"
        ));
        assert!(content.contains("0,17,0.520000,0.210000,true"));
    }
}
