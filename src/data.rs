//! Loading the cleaned study table from CSV.
//!
//! The data-cleaning collaborator hands over one row per study with the
//! columns `control_mean, control_sd, schizo_mean, schizo_sd, study_id,
//! n_schizo, n_control, task` (any column order, fully non-null). The
//! `schizo_*` / `n_schizo` columns populate the case arm of
//! [`RawStudy`](crate::study::RawStudy).

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::study::{ArmSummary, RawStudy};

/// Errors that can occur while loading the study table.
#[derive(Debug)]
pub enum DataError {
    /// IO error reading the file.
    Io(std::io::Error),

    /// Structural problem at a specific line (1-indexed).
    Parse {
        /// Line number where the error occurred.
        line: usize,
        /// Description of the parse error.
        message: String,
    },

    /// A required column is absent from the header.
    MissingColumn {
        /// Name of the missing column.
        name: &'static str,
    },

    /// A cell failed to parse as its expected type.
    InvalidValue {
        /// Line number where the invalid value was found (1-indexed).
        line: usize,
        /// Column the value belongs to.
        column: &'static str,
        /// The offending cell content.
        value: String,
    },
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::Io(e) => write!(f, "IO error: {}", e),
            DataError::Parse { line, message } => {
                write!(f, "parse error at line {}: {}", line, message)
            }
            DataError::MissingColumn { name } => {
                write!(f, "missing required column '{}'", name)
            }
            DataError::InvalidValue {
                line,
                column,
                value,
            } => write!(
                f,
                "invalid value for '{}' at line {}: '{}'",
                column, line, value
            ),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DataError {
    fn from(e: std::io::Error) -> Self {
        DataError::Io(e)
    }
}

const COLUMNS: [&str; 8] = [
    "control_mean",
    "control_sd",
    "schizo_mean",
    "schizo_sd",
    "study_id",
    "n_schizo",
    "n_control",
    "task",
];

struct ColumnIndex {
    indices: [usize; 8],
    width: usize,
}

impl ColumnIndex {
    fn from_header(header: &str) -> Result<Self, DataError> {
        let names: Vec<&str> = header.split(',').map(str::trim).collect();
        let mut indices = [0usize; 8];
        for (slot, name) in COLUMNS.into_iter().enumerate() {
            indices[slot] = names
                .iter()
                .position(|&n| n == name)
                .ok_or(DataError::MissingColumn { name })?;
        }
        Ok(ColumnIndex {
            indices,
            width: names.len(),
        })
    }

    fn cell<'a>(&self, fields: &'a [&'a str], slot: usize) -> &'a str {
        fields[self.indices[slot]]
    }
}

fn parse_f64(
    fields: &[&str],
    cols: &ColumnIndex,
    slot: usize,
    line: usize,
) -> Result<f64, DataError> {
    let raw = cols.cell(fields, slot);
    raw.parse().map_err(|_| DataError::InvalidValue {
        line,
        column: COLUMNS[slot],
        value: raw.to_string(),
    })
}

fn parse_u32(
    fields: &[&str],
    cols: &ColumnIndex,
    slot: usize,
    line: usize,
) -> Result<u32, DataError> {
    let raw = cols.cell(fields, slot);
    raw.parse().map_err(|_| DataError::InvalidValue {
        line,
        column: COLUMNS[slot],
        value: raw.to_string(),
    })
}

/// Load the cleaned study table from a CSV file.
///
/// Row order in the file becomes row order in the returned batch, which
/// in turn fixes the index order of the model's per-study latent effects.
pub fn load_study_csv(path: &Path) -> Result<Vec<RawStudy>, DataError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => {
            return Err(DataError::Parse {
                line: 1,
                message: "file is empty, expected a header row".to_string(),
            })
        }
    };
    let cols = ColumnIndex::from_header(&header)?;

    let mut studies = Vec::new();
    for (idx, line) in lines.enumerate() {
        let line_no = idx + 2;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != cols.width {
            return Err(DataError::Parse {
                line: line_no,
                message: format!("expected {} fields, found {}", cols.width, fields.len()),
            });
        }

        studies.push(RawStudy {
            study_id: parse_u32(&fields, &cols, 4, line_no)?,
            task: cols.cell(&fields, 7).to_string(),
            control: ArmSummary {
                mean: parse_f64(&fields, &cols, 0, line_no)?,
                sd: parse_f64(&fields, &cols, 1, line_no)?,
                n: parse_u32(&fields, &cols, 6, line_no)?,
            },
            case: ArmSummary {
                mean: parse_f64(&fields, &cols, 2, line_no)?,
                sd: parse_f64(&fields, &cols, 3, line_no)?,
                n: parse_u32(&fields, &cols, 5, line_no)?,
            },
        });
    }
    Ok(studies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_contract_columns_in_any_order() {
        let file = write_csv(
            "task,study_id,control_mean,control_sd,schizo_mean,schizo_sd,n_schizo,n_control\n\
             free,1,24.1,4.0,22.3,4.4,18,21\n\
             constrained,2,30.0,2.5,29.0,3.0,40,35\n",
        );
        let studies = load_study_csv(file.path()).unwrap();
        assert_eq!(studies.len(), 2);
        assert_eq!(studies[0].study_id, 1);
        assert_eq!(studies[0].task, "free");
        assert_eq!(studies[0].control.n, 21);
        assert_eq!(studies[0].case.n, 18);
        assert!((studies[1].case.mean - 29.0).abs() < 1e-12);
    }

    #[test]
    fn reports_missing_column() {
        let file = write_csv("control_mean,control_sd\n1.0,2.0\n");
        let err = load_study_csv(file.path()).unwrap_err();
        assert!(matches!(
            err,
            DataError::MissingColumn {
                name: "schizo_mean"
            }
        ));
    }

    #[test]
    fn reports_invalid_cell_with_line_number() {
        let file = write_csv(
            "control_mean,control_sd,schizo_mean,schizo_sd,study_id,n_schizo,n_control,task\n\
             24.1,4.0,22.3,4.4,1,18,21,free\n\
             24.1,four,22.3,4.4,2,18,21,free\n",
        );
        let err = load_study_csv(file.path()).unwrap_err();
        match err {
            DataError::InvalidValue { line, column, value } => {
                assert_eq!(line, 3);
                assert_eq!(column, "control_sd");
                assert_eq!(value, "four");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn rejects_ragged_rows() {
        let file = write_csv(
            "control_mean,control_sd,schizo_mean,schizo_sd,study_id,n_schizo,n_control,task\n\
             24.1,4.0,22.3\n",
        );
        let err = load_study_csv(file.path()).unwrap_err();
        assert!(matches!(err, DataError::Parse { line: 2, .. }));
    }
}
