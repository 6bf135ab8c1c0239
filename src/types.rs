//! Core types for Synheart Sleep
//!
//! This module defines the stage labels that make up a hypnogram and the small
//! value records produced by the analysis: the lights window, the sleep window
//! and the per-stage quadruples keyed by R, N1, N2 and N3.

use serde::{Deserialize, Serialize};
use std::fmt;

/// AASM stage label of a single epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SleepStage {
    /// Wake
    W,
    /// NREM stage 1
    N1,
    /// NREM stage 2
    N2,
    /// NREM stage 3 (slow wave sleep)
    N3,
    /// REM sleep
    R,
    /// Lights on
    L,
    /// Artefact
    A,
}

impl SleepStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SleepStage::W => "W",
            SleepStage::N1 => "N1",
            SleepStage::N2 => "N2",
            SleepStage::N3 => "N3",
            SleepStage::R => "R",
            SleepStage::L => "L",
            SleepStage::A => "A",
        }
    }

    /// Parse a scoring label, case-insensitive. Accepts `REM` and `WAKE` as aliases.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "W" | "WAKE" => Some(SleepStage::W),
            "N1" => Some(SleepStage::N1),
            "N2" => Some(SleepStage::N2),
            "N3" => Some(SleepStage::N3),
            "R" | "REM" => Some(SleepStage::R),
            "L" => Some(SleepStage::L),
            "A" => Some(SleepStage::A),
            _ => None,
        }
    }

    /// NREM or REM sleep
    pub fn is_sleep(&self) -> bool {
        matches!(
            self,
            SleepStage::N1 | SleepStage::N2 | SleepStage::N3 | SleepStage::R
        )
    }

    /// Part of the recording, i.e. neither lights on nor artefact
    pub fn is_recorded(&self) -> bool {
        !matches!(self, SleepStage::L | SleepStage::A)
    }
}

impl fmt::Display for SleepStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed order of the per-stage quadruples
pub const STAGE_ORDER: [SleepStage; 4] = [
    SleepStage::R,
    SleepStage::N1,
    SleepStage::N2,
    SleepStage::N3,
];

/// Lights window in epoch indices: first recorded epoch and one past the last
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lights {
    pub off: usize,
    pub on: usize,
}

/// Sleep window in epoch indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepEpochs {
    /// First epoch scored N1, N2, N3 or R
    pub onset: usize,
    /// One past the last sleep epoch
    pub final_awakening: usize,
    /// Number of sleep epochs in the whole hypnogram
    pub total_sleep_epochs: usize,
}

/// One value per sleep stage, always ordered R, N1, N2, N3
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StageValues<T> {
    #[serde(rename = "R")]
    pub r: T,
    #[serde(rename = "N1")]
    pub n1: T,
    #[serde(rename = "N2")]
    pub n2: T,
    #[serde(rename = "N3")]
    pub n3: T,
}

impl<T> StageValues<T> {
    /// Build the quadruple by evaluating `f` once per stage, in R, N1, N2, N3 order
    pub fn from_fn(mut f: impl FnMut(SleepStage) -> T) -> Self {
        let r = f(SleepStage::R);
        let n1 = f(SleepStage::N1);
        let n2 = f(SleepStage::N2);
        let n3 = f(SleepStage::N3);
        Self { r, n1, n2, n3 }
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> StageValues<U> {
        StageValues {
            r: f(&self.r),
            n1: f(&self.n1),
            n2: f(&self.n2),
            n3: f(&self.n3),
        }
    }

    /// Value for a sleep stage; `None` for W, L and A
    pub fn get(&self, stage: SleepStage) -> Option<&T> {
        match stage {
            SleepStage::R => Some(&self.r),
            SleepStage::N1 => Some(&self.n1),
            SleepStage::N2 => Some(&self.n2),
            SleepStage::N3 => Some(&self.n3),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SleepStage, &T)> {
        [
            (SleepStage::R, &self.r),
            (SleepStage::N1, &self.n1),
            (SleepStage::N2, &self.n2),
            (SleepStage::N3, &self.n3),
        ]
        .into_iter()
    }
}

/// Snapshot of every parameter an analysis produces
///
/// Time values are minutes, efficiency and relative times are percentages.
/// Undefined values are `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SleepMetrics {
    pub lights: Option<Lights>,
    pub sleep_epochs: Option<SleepEpochs>,
    pub total_recording_time: f64,
    pub sleep_onset_latency: f64,
    pub sleep_period_time: f64,
    pub total_sleep_time: f64,
    pub wake_after_sleep_onset: f64,
    pub sleep_efficiency: f64,
    pub sleep_stage_epochs: StageValues<usize>,
    pub sleep_time_per_stage: StageValues<f64>,
    pub onset_latency: StageValues<f64>,
    pub relative_sleep_time_per_stage: StageValues<f64>,
}
