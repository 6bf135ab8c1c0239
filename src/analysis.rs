//! AASM sleep parameter analysis
//!
//! [`SleepAnalysis`] derives the standard sleep-scoring parameters from a
//! hypnogram. Every parameter is computed lazily on first access and cached for
//! the lifetime of the analysis:
//!
//! - Lights window and total recording time (TRT)
//! - Sleep window, sleep onset latency (SOL), sleep period time (SPT) and
//!   total sleep time (TST)
//! - Wake after sleep onset (WASO) and sleep efficiency (SE)
//! - Epochs, minutes, onset latency (OL) and relative time per sleep stage
//!
//! Undefined values are reported as `NaN` and propagate through every parameter
//! that depends on them.

use std::cell::OnceCell;

use log::{debug, warn};

use crate::config::AnalysisConfig;
use crate::error::ComputeError;
use crate::types::{Lights, SleepEpochs, SleepMetrics, SleepStage, StageValues};

/// Memoizing calculator over a borrowed hypnogram.
///
/// The cache cells make this type `!Sync`; share results, not the analysis.
pub struct SleepAnalysis<'a> {
    hypnogram: &'a [SleepStage],
    epoch_length_sec: f64,
    epoch_length_min: f64,
    lights: OnceCell<Option<Lights>>,
    total_recording_time: OnceCell<f64>,
    sleep_epochs: OnceCell<Option<SleepEpochs>>,
    sleep_onset_latency: OnceCell<f64>,
    sleep_period_time: OnceCell<f64>,
    total_sleep_time: OnceCell<f64>,
    wake_after_sleep_onset: OnceCell<f64>,
    sleep_efficiency: OnceCell<f64>,
    sleep_stage_epochs: OnceCell<StageValues<usize>>,
    sleep_time_per_stage: OnceCell<StageValues<f64>>,
    onset_latency: OnceCell<StageValues<f64>>,
    relative_sleep_time_per_stage: OnceCell<StageValues<f64>>,
}

impl<'a> SleepAnalysis<'a> {
    /// Create an analysis for `hypnogram` with epochs of `epoch_length_sec` seconds
    pub fn new(hypnogram: &'a [SleepStage], epoch_length_sec: f64) -> Self {
        Self {
            hypnogram,
            epoch_length_sec,
            epoch_length_min: epoch_length_sec / 60.0,
            lights: OnceCell::new(),
            total_recording_time: OnceCell::new(),
            sleep_epochs: OnceCell::new(),
            sleep_onset_latency: OnceCell::new(),
            sleep_period_time: OnceCell::new(),
            total_sleep_time: OnceCell::new(),
            wake_after_sleep_onset: OnceCell::new(),
            sleep_efficiency: OnceCell::new(),
            sleep_stage_epochs: OnceCell::new(),
            sleep_time_per_stage: OnceCell::new(),
            onset_latency: OnceCell::new(),
            relative_sleep_time_per_stage: OnceCell::new(),
        }
    }

    pub fn with_config(hypnogram: &'a [SleepStage], config: &AnalysisConfig) -> Self {
        Self::new(hypnogram, config.epoch_length_sec)
    }

    pub fn hypnogram(&self) -> &'a [SleepStage] {
        self.hypnogram
    }

    pub fn epoch_length_sec(&self) -> f64 {
        self.epoch_length_sec
    }

    pub fn epoch_length_min(&self) -> f64 {
        self.epoch_length_min
    }

    /// First and one-past-last epoch not scored L or A; `None` if there is none
    pub fn lights(&self) -> Option<Lights> {
        *self.lights.get_or_init(|| compute_lights(self.hypnogram))
    }

    /// Lights off to lights on (minutes)
    pub fn total_recording_time(&self) -> f64 {
        *self.total_recording_time.get_or_init(|| match self.lights() {
            Some(lights) => (lights.on - lights.off) as f64 * self.epoch_length_min,
            None => f64::NAN,
        })
    }

    /// Sleep onset, final awakening and number of sleep epochs.
    ///
    /// Fails with [`ComputeError::NoSleepEpochs`] if no epoch is scored
    /// N1, N2, N3 or R.
    pub fn sleep_epochs(&self) -> Result<SleepEpochs, ComputeError> {
        let sleep_epochs = *self
            .sleep_epochs
            .get_or_init(|| compute_sleep_epochs(self.hypnogram));
        sleep_epochs.ok_or(ComputeError::NoSleepEpochs)
    }

    /// Lights off to sleep onset (minutes)
    pub fn sleep_onset_latency(&self) -> f64 {
        *self.sleep_onset_latency.get_or_init(|| {
            match (self.sleep_epochs().ok(), self.lights()) {
                (Some(sleep), Some(lights)) => {
                    (sleep.onset as f64 - lights.off as f64) * self.epoch_length_min
                }
                _ => f64::NAN,
            }
        })
    }

    /// Sleep onset to final awakening (minutes)
    pub fn sleep_period_time(&self) -> f64 {
        *self.sleep_period_time.get_or_init(|| match self.sleep_epochs() {
            Ok(sleep) => (sleep.final_awakening - sleep.onset) as f64 * self.epoch_length_min,
            Err(_) => f64::NAN,
        })
    }

    /// Time scored N1, N2, N3 or R (minutes)
    pub fn total_sleep_time(&self) -> f64 {
        *self.total_sleep_time.get_or_init(|| match self.sleep_epochs() {
            Ok(sleep) => sleep.total_sleep_epochs as f64 * self.epoch_length_min,
            Err(_) => f64::NAN,
        })
    }

    /// Wake epochs after sleep onset (minutes).
    ///
    /// Counts W in `[onset, final_awakening - 1)`; the epoch right before the
    /// final awakening is never counted.
    pub fn wake_after_sleep_onset(&self) -> f64 {
        *self.wake_after_sleep_onset.get_or_init(|| match self.sleep_epochs() {
            Ok(sleep) => {
                let period = &self.hypnogram[sleep.onset..sleep.final_awakening - 1];
                let wake = period.iter().filter(|s| **s == SleepStage::W).count();
                wake as f64 * self.epoch_length_min
            }
            Err(_) => f64::NAN,
        })
    }

    /// TST / TRT in percent
    pub fn sleep_efficiency(&self) -> f64 {
        *self
            .sleep_efficiency
            .get_or_init(|| self.total_sleep_time() / self.total_recording_time() * 100.0)
    }

    /// Epochs per sleep stage over the whole hypnogram
    pub fn sleep_stage_epochs(&self) -> &StageValues<usize> {
        self.sleep_stage_epochs.get_or_init(|| {
            StageValues::from_fn(|stage| self.hypnogram.iter().filter(|s| **s == stage).count())
        })
    }

    /// Minutes per sleep stage
    pub fn sleep_time_per_stage(&self) -> &StageValues<f64> {
        self.sleep_time_per_stage.get_or_init(|| {
            self.sleep_stage_epochs()
                .map(|epochs| *epochs as f64 * self.epoch_length_min)
        })
    }

    /// Lights off to the first epoch of each stage (minutes); `NaN` for absent stages
    pub fn onset_latency(&self) -> &StageValues<f64> {
        self.onset_latency.get_or_init(|| {
            let lights = self.lights();
            StageValues::from_fn(|stage| {
                let first = self.hypnogram.iter().position(|s| *s == stage);
                match (first, lights) {
                    (Some(epoch), Some(lights)) => {
                        epoch as f64 * self.epoch_length_min
                            - lights.off as f64 * self.epoch_length_min
                    }
                    _ => f64::NAN,
                }
            })
        })
    }

    /// Share of each stage in total sleep (percent)
    pub fn relative_sleep_time_per_stage(&self) -> &StageValues<f64> {
        self.relative_sleep_time_per_stage.get_or_init(|| {
            let total = match self.sleep_epochs() {
                Ok(sleep) => sleep.total_sleep_epochs as f64,
                Err(_) => f64::NAN,
            };
            self.sleep_stage_epochs()
                .map(|epochs| *epochs as f64 / total * 100.0)
        })
    }

    /// Evaluate every parameter
    pub fn metrics(&self) -> SleepMetrics {
        SleepMetrics {
            lights: self.lights(),
            sleep_epochs: self.sleep_epochs().ok(),
            total_recording_time: self.total_recording_time(),
            sleep_onset_latency: self.sleep_onset_latency(),
            sleep_period_time: self.sleep_period_time(),
            total_sleep_time: self.total_sleep_time(),
            wake_after_sleep_onset: self.wake_after_sleep_onset(),
            sleep_efficiency: self.sleep_efficiency(),
            sleep_stage_epochs: *self.sleep_stage_epochs(),
            sleep_time_per_stage: *self.sleep_time_per_stage(),
            onset_latency: *self.onset_latency(),
            relative_sleep_time_per_stage: *self.relative_sleep_time_per_stage(),
        }
    }
}

/// Leading and trailing runs of L/A are excluded; interior ones are kept
fn compute_lights(hypnogram: &[SleepStage]) -> Option<Lights> {
    let off = hypnogram.iter().position(SleepStage::is_recorded);
    let last = hypnogram.iter().rposition(SleepStage::is_recorded);

    match (off, last) {
        (Some(off), Some(last)) => {
            debug!("lights off at epoch {off}, on at epoch {}", last + 1);
            Some(Lights { off, on: last + 1 })
        }
        _ => {
            warn!(
                "no recorded epochs in hypnogram of {} epochs (all L/A)",
                hypnogram.len()
            );
            None
        }
    }
}

fn compute_sleep_epochs(hypnogram: &[SleepStage]) -> Option<SleepEpochs> {
    let onset = hypnogram.iter().position(SleepStage::is_sleep)?;
    let last = hypnogram.iter().rposition(SleepStage::is_sleep)?;
    let total_sleep_epochs = hypnogram.iter().filter(|s| s.is_sleep()).count();

    debug!(
        "sleep onset at epoch {onset}, final awakening at epoch {}, {total_sleep_epochs} sleep epochs",
        last + 1
    );

    Some(SleepEpochs {
        onset,
        final_awakening: last + 1,
        total_sleep_epochs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SleepStage::*;
    use pretty_assertions::assert_eq;

    const EPS: f64 = 1e-9;

    fn case_a() -> Vec<SleepStage> {
        vec![L, L, W, A, W, N1, W, N3, L, L, L]
    }

    fn case_b() -> Vec<SleepStage> {
        vec![W, A, W, N1, W, N3]
    }

    fn night() -> Vec<SleepStage> {
        vec![
            L, W, W, N1, N2, N2, N3, N3, W, N2, R, R, A, N2, N1, W, W, L,
        ]
    }

    #[test]
    fn test_lights() {
        let hypnogram = case_a();
        let analysis = SleepAnalysis::new(&hypnogram, 30.0);

        assert_eq!(analysis.lights(), Some(Lights { off: 2, on: 8 }));
        assert_eq!(analysis.total_recording_time(), 3.0);
    }

    #[test]
    fn test_lights_without_leading_lights_on() {
        let hypnogram = case_b();
        let analysis = SleepAnalysis::new(&hypnogram, 30.0);

        assert_eq!(analysis.lights(), Some(Lights { off: 0, on: 6 }));
    }

    #[test]
    fn test_sleep_window() {
        let hypnogram = case_a();
        let analysis = SleepAnalysis::new(&hypnogram, 30.0);

        let sleep = analysis.sleep_epochs().unwrap();
        assert_eq!(sleep.onset, 5);
        assert_eq!(sleep.final_awakening, 8);
        assert_eq!(sleep.total_sleep_epochs, 2);

        assert_eq!(analysis.sleep_onset_latency(), 1.5);
        assert_eq!(analysis.sleep_period_time(), 1.5);
        assert_eq!(analysis.total_sleep_time(), 1.0);
        assert_eq!(analysis.wake_after_sleep_onset(), 0.5);
        assert!((analysis.sleep_efficiency() - 2.0 / 6.0 * 100.0).abs() < EPS);
    }

    #[test]
    fn test_stage_parameters() {
        let hypnogram = case_a();
        let analysis = SleepAnalysis::new(&hypnogram, 30.0);

        assert_eq!(
            *analysis.sleep_stage_epochs(),
            StageValues { r: 0, n1: 1, n2: 0, n3: 1 }
        );
        assert_eq!(analysis.sleep_time_per_stage().n3, 0.5);
        assert_eq!(analysis.sleep_time_per_stage().r, 0.0);
        assert_eq!(analysis.relative_sleep_time_per_stage().n3, 50.0);
        assert_eq!(analysis.relative_sleep_time_per_stage().n2, 0.0);

        let latency = analysis.onset_latency();
        assert!(latency.r.is_nan());
        assert!(latency.n2.is_nan());
        assert_eq!(latency.n1, 1.5);
        assert_eq!(latency.n3, 2.5);
    }

    #[test]
    fn test_wake_after_sleep_onset_ignores_outer_wake() {
        let hypnogram = vec![W, N2, W, W, N2, W];
        let analysis = SleepAnalysis::new(&hypnogram, 30.0);

        let sleep = analysis.sleep_epochs().unwrap();
        assert_eq!((sleep.onset, sleep.final_awakening), (1, 5));
        assert_eq!(analysis.wake_after_sleep_onset(), 1.0);
    }

    #[test]
    fn test_epoch_length_scaling() {
        let hypnogram = case_a();
        let analysis = SleepAnalysis::new(&hypnogram, 20.0);

        assert!((analysis.epoch_length_min() - 1.0 / 3.0).abs() < EPS);
        assert!((analysis.total_recording_time() - 2.0).abs() < EPS);
        assert!((analysis.sleep_onset_latency() - 1.0).abs() < EPS);
        // efficiency is a ratio and does not depend on the epoch length
        assert!((analysis.sleep_efficiency() - 100.0 / 3.0).abs() < EPS);
    }

    #[test]
    fn test_memoized_values_are_stable() {
        let hypnogram = night();
        let analysis = SleepAnalysis::new(&hypnogram, 30.0);

        let first = analysis.sleep_stage_epochs();
        let second = analysis.sleep_stage_epochs();
        assert!(std::ptr::eq(first, second));
        assert!(std::ptr::eq(
            analysis.onset_latency(),
            analysis.onset_latency()
        ));

        assert_eq!(analysis.sleep_efficiency(), analysis.sleep_efficiency());
        assert_eq!(analysis.lights(), analysis.lights());
        assert_eq!(analysis.metrics(), analysis.metrics());
    }

    #[test]
    fn test_instances_do_not_share_cache() {
        let short = case_b();
        let long = night();
        let a = SleepAnalysis::new(&short, 30.0);
        let b = SleepAnalysis::new(&long, 30.0);

        assert_eq!(a.lights(), Some(Lights { off: 0, on: 6 }));
        assert_eq!(b.lights(), Some(Lights { off: 1, on: 17 }));
    }

    #[test]
    fn test_invariants() {
        let hypnogram = night();
        let analysis = SleepAnalysis::new(&hypnogram, 30.0);

        assert!(analysis.sleep_period_time() >= analysis.total_sleep_time());

        let efficiency = analysis.sleep_efficiency();
        assert!((0.0..=100.0).contains(&efficiency));

        let relative_sum: f64 = analysis
            .relative_sleep_time_per_stage()
            .iter()
            .map(|(_, v)| *v)
            .sum();
        assert!((relative_sum - 100.0).abs() < EPS);

        let stage_sum: usize = analysis.sleep_stage_epochs().iter().map(|(_, v)| *v).sum();
        assert_eq!(stage_sum, analysis.sleep_epochs().unwrap().total_sleep_epochs);
    }

    #[test]
    fn test_absent_stage_is_zero_with_nan_latency() {
        let hypnogram = vec![W, N2, N2, W, N3, W];
        let analysis = SleepAnalysis::new(&hypnogram, 30.0);

        for stage in [R, N1] {
            assert_eq!(analysis.sleep_stage_epochs().get(stage), Some(&0));
            assert_eq!(analysis.sleep_time_per_stage().get(stage), Some(&0.0));
            assert_eq!(analysis.relative_sleep_time_per_stage().get(stage), Some(&0.0));
            assert!(analysis.onset_latency().get(stage).unwrap().is_nan());
        }
    }

    #[test]
    fn test_all_lights_on_or_artefact() {
        let hypnogram = vec![L, A, L, A];
        let analysis = SleepAnalysis::new(&hypnogram, 30.0);

        assert_eq!(analysis.lights(), None);
        assert!(analysis.total_recording_time().is_nan());
        assert!(analysis.sleep_onset_latency().is_nan());
        assert!(analysis.sleep_period_time().is_nan());
        assert!(analysis.total_sleep_time().is_nan());
        assert!(analysis.wake_after_sleep_onset().is_nan());
        assert!(analysis.sleep_efficiency().is_nan());
        assert!(analysis.onset_latency().iter().all(|(_, v)| v.is_nan()));
        assert!(analysis
            .relative_sleep_time_per_stage()
            .iter()
            .all(|(_, v)| v.is_nan()));
    }

    #[test]
    fn test_no_sleep_epochs() {
        let hypnogram = vec![L, W, W, A, W, L];
        let analysis = SleepAnalysis::new(&hypnogram, 30.0);

        assert!(matches!(
            analysis.sleep_epochs(),
            Err(ComputeError::NoSleepEpochs)
        ));
        assert_eq!(analysis.total_recording_time(), 2.0);
        assert!(analysis.sleep_onset_latency().is_nan());
        assert!(analysis.total_sleep_time().is_nan());
        assert!(analysis.wake_after_sleep_onset().is_nan());
        assert!(analysis.sleep_efficiency().is_nan());
        assert_eq!(*analysis.sleep_stage_epochs(), StageValues::default());

        let metrics = analysis.metrics();
        assert_eq!(metrics.sleep_epochs, None);
        assert_eq!(metrics.lights, Some(Lights { off: 1, on: 5 }));
    }

    #[test]
    fn test_empty_hypnogram() {
        let analysis = SleepAnalysis::with_config(&[], &AnalysisConfig::default());

        assert_eq!(analysis.lights(), None);
        assert!(analysis.sleep_epochs().is_err());
        assert!(analysis.sleep_efficiency().is_nan());
    }
}
