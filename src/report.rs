//! Sleep report encoding
//!
//! This module turns a [`SleepAnalysis`] into a self-describing JSON report.
//! `NaN` parameters are encoded as `null` and explained by quality flags.

use crate::analysis::SleepAnalysis;
use crate::error::ComputeError;
use crate::types::{Lights, SleepEpochs, SleepStage, StageValues};
use crate::{PRODUCER_NAME, SLEEP_VERSION};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Report producer metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Report provenance information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProvenance {
    /// Where the hypnogram came from (file name, scorer, device)
    pub source: String,
    pub computed_at_utc: String,
}

/// Conditions that leave parameters undefined or worth a second look
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    /// Every epoch is L or A
    NoRecordedEpochs,
    /// No epoch is N1, N2, N3 or R
    NoSleepEpochs,
    /// At least one epoch is scored as artefact
    ContainsArtefacts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportQuality {
    pub flags: Vec<QualityFlag>,
}

/// Scalar parameters, minutes unless noted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportParameters {
    pub total_recording_time: Option<f64>,
    pub sleep_onset_latency: Option<f64>,
    pub sleep_period_time: Option<f64>,
    pub total_sleep_time: Option<f64>,
    pub wake_after_sleep_onset: Option<f64>,
    /// Percent
    pub sleep_efficiency: Option<f64>,
}

/// Per-stage parameters in R, N1, N2, N3 order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportStages {
    pub epochs: StageValues<usize>,
    pub minutes: StageValues<f64>,
    pub onset_latency: StageValues<Option<f64>>,
    /// Percent of total sleep
    pub relative_time: StageValues<Option<f64>>,
}

/// Complete sleep report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub provenance: ReportProvenance,
    pub quality: ReportQuality,
    pub epoch_length_sec: f64,
    pub epoch_count: usize,
    pub lights: Option<Lights>,
    pub sleep_epochs: Option<SleepEpochs>,
    pub parameters: ReportParameters,
    pub stages: ReportStages,
}

/// Report encoder
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Evaluate every parameter of `analysis` into a report
    pub fn encode(&self, analysis: &SleepAnalysis<'_>, source: &str) -> SleepReport {
        let metrics = analysis.metrics();

        let producer = ReportProducer {
            name: PRODUCER_NAME.to_string(),
            version: SLEEP_VERSION.to_string(),
            instance_id: self.instance_id.clone(),
        };

        let provenance = ReportProvenance {
            source: source.to_string(),
            computed_at_utc: Utc::now().to_rfc3339(),
        };

        let parameters = ReportParameters {
            total_recording_time: defined(metrics.total_recording_time),
            sleep_onset_latency: defined(metrics.sleep_onset_latency),
            sleep_period_time: defined(metrics.sleep_period_time),
            total_sleep_time: defined(metrics.total_sleep_time),
            wake_after_sleep_onset: defined(metrics.wake_after_sleep_onset),
            sleep_efficiency: defined(metrics.sleep_efficiency),
        };

        let stages = ReportStages {
            epochs: metrics.sleep_stage_epochs,
            minutes: metrics.sleep_time_per_stage,
            onset_latency: metrics.onset_latency.map(|v| defined(*v)),
            relative_time: metrics.relative_sleep_time_per_stage.map(|v| defined(*v)),
        };

        let quality = ReportQuality {
            flags: self.build_flags(analysis),
        };

        SleepReport {
            report_version: REPORT_VERSION.to_string(),
            producer,
            provenance,
            quality,
            epoch_length_sec: analysis.epoch_length_sec(),
            epoch_count: analysis.hypnogram().len(),
            lights: metrics.lights,
            sleep_epochs: metrics.sleep_epochs,
            parameters,
            stages,
        }
    }

    /// Encode to pretty-printed JSON
    pub fn encode_to_json(
        &self,
        analysis: &SleepAnalysis<'_>,
        source: &str,
    ) -> Result<String, ComputeError> {
        let report = self.encode(analysis, source);
        serde_json::to_string_pretty(&report).map_err(ComputeError::JsonError)
    }

    fn build_flags(&self, analysis: &SleepAnalysis<'_>) -> Vec<QualityFlag> {
        let mut flags = Vec::new();

        if analysis.lights().is_none() {
            flags.push(QualityFlag::NoRecordedEpochs);
        }

        if analysis.sleep_epochs().is_err() {
            flags.push(QualityFlag::NoSleepEpochs);
        }

        if analysis.hypnogram().contains(&SleepStage::A) {
            flags.push(QualityFlag::ContainsArtefacts);
        }

        flags
    }
}

/// `NaN` and infinities become `None`
fn defined(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}
