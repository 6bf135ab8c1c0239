//! Hypnogram loading
//!
//! A hypnogram is the ordered list of stage labels, one per epoch. This module
//! reads it from the formats scoring tools commonly export:
//!
//! - `labels`: plain tokens separated by whitespace, commas or newlines
//!   (`#` starts a comment line)
//! - `csv`: a table with an `AASM` column, other columns are ignored
//! - `json`: an array of labels, or `{ "epoch_length_sec": 30, "stages": [...] }`

use crate::analysis::SleepAnalysis;
use crate::config::AnalysisConfig;
use crate::error::ComputeError;
use crate::types::SleepStage;
use serde::{Deserialize, Serialize};

/// Name of the CSV column holding the stage labels
pub const STAGE_COLUMN: &str = "AASM";

/// Supported hypnogram encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Labels,
    Csv,
    Json,
}

/// Label that could not be mapped to a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidLabel {
    pub epoch: usize,
    pub label: String,
}

/// Owned, immutable sequence of scored epochs
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Hypnogram {
    stages: Vec<SleepStage>,
    /// Epoch length declared by the source document, if any
    epoch_length_sec: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonHypnogram {
    Labels(Vec<String>),
    Document {
        #[serde(default)]
        epoch_length_sec: Option<f64>,
        stages: Vec<String>,
    },
}

impl From<Vec<SleepStage>> for Hypnogram {
    fn from(stages: Vec<SleepStage>) -> Self {
        Self {
            stages,
            epoch_length_sec: None,
        }
    }
}

impl Hypnogram {
    /// Parse a hypnogram, failing on the first unknown label
    pub fn parse(input: &str, format: InputFormat) -> Result<Self, ComputeError> {
        let (labels, epoch_length_sec) = read_labels(input, format)?;

        let stages = labels
            .iter()
            .enumerate()
            .map(|(epoch, label)| {
                SleepStage::from_label(label).ok_or_else(|| ComputeError::UnknownStage {
                    epoch,
                    label: label.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!("parsed hypnogram with {} epochs", stages.len());

        Ok(Self {
            stages,
            epoch_length_sec,
        })
    }

    pub fn parse_labels(input: &str) -> Result<Self, ComputeError> {
        Self::parse(input, InputFormat::Labels)
    }

    pub fn parse_csv(input: &str) -> Result<Self, ComputeError> {
        Self::parse(input, InputFormat::Csv)
    }

    pub fn parse_json(input: &str) -> Result<Self, ComputeError> {
        Self::parse(input, InputFormat::Json)
    }

    /// Collect every unknown label instead of stopping at the first one.
    ///
    /// Structural problems (malformed JSON/CSV, missing column) are still errors.
    pub fn validate_labels(
        input: &str,
        format: InputFormat,
    ) -> Result<(usize, Vec<InvalidLabel>), ComputeError> {
        let (labels, _) = read_labels(input, format)?;

        let invalid = labels
            .iter()
            .enumerate()
            .filter(|(_, label)| SleepStage::from_label(label).is_none())
            .map(|(epoch, label)| InvalidLabel {
                epoch,
                label: label.clone(),
            })
            .collect();

        Ok((labels.len(), invalid))
    }

    pub fn stages(&self) -> &[SleepStage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn epoch_length_sec(&self) -> Option<f64> {
        self.epoch_length_sec
    }

    pub fn contains(&self, stage: SleepStage) -> bool {
        self.stages.contains(&stage)
    }

    /// Analyse this hypnogram; the analysis borrows the stages
    pub fn analyze(&self, config: &AnalysisConfig) -> SleepAnalysis<'_> {
        SleepAnalysis::with_config(&self.stages, config)
    }
}

fn read_labels(
    input: &str,
    format: InputFormat,
) -> Result<(Vec<String>, Option<f64>), ComputeError> {
    match format {
        InputFormat::Labels => Ok((read_plain_labels(input), None)),
        InputFormat::Csv => Ok((read_csv_labels(input)?, None)),
        InputFormat::Json => read_json_labels(input),
    }
}

fn read_plain_labels(input: &str) -> Vec<String> {
    input
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .flat_map(|line| line.split(|c: char| c.is_whitespace() || c == ','))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn read_csv_labels(input: &str) -> Result<Vec<String>, ComputeError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input.as_bytes());

    let headers = reader.headers()?.clone();
    let column = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(STAGE_COLUMN))
        .ok_or_else(|| ComputeError::MissingColumn(STAGE_COLUMN.to_string()))?;

    let mut labels = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let label = record.get(column).ok_or_else(|| {
            ComputeError::ParseError(format!("Row {} has no {} value", row + 1, STAGE_COLUMN))
        })?;
        labels.push(label.to_string());
    }

    Ok(labels)
}

fn read_json_labels(input: &str) -> Result<(Vec<String>, Option<f64>), ComputeError> {
    match serde_json::from_str::<JsonHypnogram>(input)? {
        JsonHypnogram::Labels(labels) => Ok((labels, None)),
        JsonHypnogram::Document {
            epoch_length_sec,
            stages,
        } => Ok((stages, epoch_length_sec)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SleepStage::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_labels() {
        let input = "# night 1\nL L W A\nW, N1, w\nn3 REM\n\n";
        let hypnogram = Hypnogram::parse_labels(input).unwrap();

        assert_eq!(hypnogram.stages(), &[L, L, W, A, W, N1, W, N3, R]);
        assert_eq!(hypnogram.epoch_length_sec(), None);
    }

    #[test]
    fn test_parse_csv() {
        let input = "epoch,aasm,confidence\n0,L,1.0\n1, W ,0.9\n2,N2,0.8\n3,R,0.7\n";
        let hypnogram = Hypnogram::parse_csv(input).unwrap();

        assert_eq!(hypnogram.stages(), &[L, W, N2, R]);
    }

    #[test]
    fn test_parse_csv_missing_column() {
        let result = Hypnogram::parse_csv("epoch,stage\n0,W\n");
        assert!(matches!(result, Err(ComputeError::MissingColumn(_))));
    }

    #[test]
    fn test_parse_csv_short_row() {
        let result = Hypnogram::parse_csv("epoch,x,AASM\n0,1\n");

        match result {
            Err(ComputeError::ParseError(message)) => {
                assert_eq!(message, "Row 1 has no AASM value");
            }
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_json_array() {
        let hypnogram = Hypnogram::parse_json(r#"["W", "A", "W", "N1", "W", "N3"]"#).unwrap();

        assert_eq!(hypnogram.len(), 6);
        assert!(hypnogram.contains(N3));
        assert!(!hypnogram.contains(R));
    }

    #[test]
    fn test_parse_json_document() {
        let input = r#"{"epoch_length_sec": 20, "stages": ["W", "N2", "N2", "W"]}"#;
        let hypnogram = Hypnogram::parse_json(input).unwrap();

        assert_eq!(hypnogram.stages(), &[W, N2, N2, W]);
        assert_eq!(hypnogram.epoch_length_sec(), Some(20.0));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            Hypnogram::parse_json("not json"),
            Err(ComputeError::JsonError(_))
        ));
    }

    #[test]
    fn test_unknown_stage() {
        let result = Hypnogram::parse_labels("W N1 N4 N2");

        match result {
            Err(ComputeError::UnknownStage { epoch, label }) => {
                assert_eq!(epoch, 2);
                assert_eq!(label, "N4");
            }
            other => panic!("expected unknown stage error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_labels() {
        let (total, invalid) =
            Hypnogram::validate_labels("W S1 N2 ? R", InputFormat::Labels).unwrap();

        assert_eq!(total, 5);
        assert_eq!(
            invalid,
            vec![
                InvalidLabel {
                    epoch: 1,
                    label: "S1".to_string()
                },
                InvalidLabel {
                    epoch: 3,
                    label: "?".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        let hypnogram = Hypnogram::parse_labels("").unwrap();
        assert!(hypnogram.is_empty());

        let hypnogram = Hypnogram::parse_json("[]").unwrap();
        assert!(hypnogram.is_empty());
    }

    #[test]
    fn test_analyze_borrows_stages() {
        let hypnogram = Hypnogram::from(vec![W, N1, N2, W]);
        let analysis = hypnogram.analyze(&AnalysisConfig::default());

        assert_eq!(analysis.hypnogram().len(), 4);
        assert!(std::ptr::eq(analysis.hypnogram(), hypnogram.stages()));
        assert_eq!(analysis.total_sleep_time(), 1.0);
    }
}
