//! Pipeline orchestration
//!
//! This module provides the public API for Synheart Sleep.
//! It orchestrates the full pipeline from raw hypnogram text to report JSON.

use crate::config::AnalysisConfig;
use crate::error::ComputeError;
use crate::hypnogram::{Hypnogram, InputFormat};
use crate::report::{ReportEncoder, SleepReport};

/// Convert a raw hypnogram to a sleep report JSON payload.
///
/// # Arguments
/// * `raw_input` - Hypnogram in the given format
/// * `format` - Encoding of `raw_input`
/// * `source` - Free-form description of where the hypnogram came from
///
/// The epoch length is taken from the hypnogram document when it declares one,
/// otherwise 30 s.
///
/// # Example
/// ```ignore
/// let report = hypnogram_to_report(
///     "W N1 N2 N2 W".to_string(),
///     InputFormat::Labels,
///     "night-1.txt".to_string(),
/// )?;
/// ```
pub fn hypnogram_to_report(
    raw_input: String,
    format: InputFormat,
    source: String,
) -> Result<String, ComputeError> {
    SleepProcessor::new().process(&raw_input, format, &source)
}

/// Processor holding the analysis settings and a report encoder.
///
/// Reports produced by one processor share its instance ID.
pub struct SleepProcessor {
    config: AnalysisConfig,
    /// Whether `config` was set by the caller and wins over document values
    explicit_config: bool,
    encoder: ReportEncoder,
}

impl Default for SleepProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl SleepProcessor {
    /// Create a new processor with default settings
    pub fn new() -> Self {
        Self {
            config: AnalysisConfig::default(),
            explicit_config: false,
            encoder: ReportEncoder::new(),
        }
    }

    /// Create a processor with fixed settings; an epoch length declared by the
    /// hypnogram document is ignored
    pub fn with_config(config: AnalysisConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            config,
            explicit_config: true,
            encoder: ReportEncoder::new(),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Parse, analyse and encode to JSON
    pub fn process(
        &self,
        raw_input: &str,
        format: InputFormat,
        source: &str,
    ) -> Result<String, ComputeError> {
        let report = self.process_report(raw_input, format, source)?;
        serde_json::to_string_pretty(&report).map_err(ComputeError::JsonError)
    }

    /// Parse and analyse
    pub fn process_report(
        &self,
        raw_input: &str,
        format: InputFormat,
        source: &str,
    ) -> Result<SleepReport, ComputeError> {
        let hypnogram = Hypnogram::parse(raw_input, format)?;
        self.process_hypnogram(&hypnogram, source)
    }

    /// Analyse an already loaded hypnogram
    pub fn process_hypnogram(
        &self,
        hypnogram: &Hypnogram,
        source: &str,
    ) -> Result<SleepReport, ComputeError> {
        let config = self.resolve_config(hypnogram)?;

        log::info!(
            "analysing {} epochs of {} s from {}",
            hypnogram.len(),
            config.epoch_length_sec,
            source
        );

        let analysis = hypnogram.analyze(&config);
        Ok(self.encoder.encode(&analysis, source))
    }

    fn resolve_config(&self, hypnogram: &Hypnogram) -> Result<AnalysisConfig, ComputeError> {
        if self.explicit_config {
            return Ok(self.config);
        }

        match hypnogram.epoch_length_sec() {
            Some(epoch_length_sec) => AnalysisConfig::with_epoch_length(epoch_length_sec),
            None => Ok(self.config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::QualityFlag;

    fn sample_json() -> &'static str {
        r#"{
            "epoch_length_sec": 20,
            "stages": ["L", "W", "N1", "N2", "N2", "N3", "W", "R", "R", "W", "L"]
        }"#
    }

    #[test]
    fn test_hypnogram_to_report() {
        let result = hypnogram_to_report(
            "L L W A W N1 W N3 L L L".to_string(),
            InputFormat::Labels,
            "case-a".to_string(),
        );

        assert!(result.is_ok());
        let payload: serde_json::Value = serde_json::from_str(&result.unwrap()).unwrap();

        assert_eq!(payload["report_version"], "1.0.0");
        assert_eq!(payload["producer"]["name"], "synheart-sleep");
        assert_eq!(payload["provenance"]["source"], "case-a");
        assert_eq!(payload["epoch_length_sec"], 30.0);
        assert_eq!(payload["lights"]["off"], 2);
        assert_eq!(payload["lights"]["on"], 8);
        assert_eq!(payload["parameters"]["sleep_onset_latency"], 1.5);
        assert!(payload["stages"]["onset_latency"]["R"].is_null());
    }

    #[test]
    fn test_document_epoch_length() {
        let processor = SleepProcessor::new();
        let report = processor
            .process_report(sample_json(), InputFormat::Json, "doc")
            .unwrap();

        assert_eq!(report.epoch_length_sec, 20.0);
        // 9 recorded epochs of 20 s
        assert!((report.parameters.total_recording_time.unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_explicit_config_wins() {
        let config = AnalysisConfig::with_epoch_length(30.0).unwrap();
        let processor = SleepProcessor::with_config(config).unwrap();
        let report = processor
            .process_report(sample_json(), InputFormat::Json, "doc")
            .unwrap();

        assert_eq!(report.epoch_length_sec, 30.0);
        assert_eq!(report.parameters.total_recording_time, Some(4.5));
    }

    #[test]
    fn test_invalid_document_epoch_length() {
        let result = SleepProcessor::new().process(
            r#"{"epoch_length_sec": 0, "stages": ["W"]}"#,
            InputFormat::Json,
            "doc",
        );

        assert!(matches!(result, Err(ComputeError::InvalidEpochLength(_))));
    }

    #[test]
    fn test_reports_share_instance_id() {
        let processor = SleepProcessor::new();
        let first = processor
            .process_report("W N2 W", InputFormat::Labels, "a")
            .unwrap();
        let second = processor
            .process_report("W N3 W", InputFormat::Labels, "b")
            .unwrap();

        assert_eq!(first.producer.instance_id, second.producer.instance_id);
    }

    #[test]
    fn test_all_wake_is_reported_not_failed() {
        let report = SleepProcessor::new()
            .process_report("W W W W", InputFormat::Labels, "awake")
            .unwrap();

        assert_eq!(report.quality.flags, vec![QualityFlag::NoSleepEpochs]);
        assert_eq!(report.parameters.total_recording_time, Some(2.0));
        assert_eq!(report.parameters.sleep_efficiency, None);
    }

    #[test]
    fn test_invalid_label() {
        let result = hypnogram_to_report(
            "W N1 X".to_string(),
            InputFormat::Labels,
            "bad".to_string(),
        );

        assert!(matches!(
            result,
            Err(ComputeError::UnknownStage { epoch: 2, .. })
        ));
    }
}
