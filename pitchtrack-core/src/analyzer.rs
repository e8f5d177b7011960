//! # Analyzer
//!
//! Streaming entry point. Samples are pushed one at a time; every
//! `analysis_interval` samples the latest transform-size window runs through
//! windowing, the autocorrelation estimator, the voicing gate and the pitch
//! search, and one result lands in the pitch history.
//!
//! The analyzer is single-threaded and owns all of its buffers. Nothing is
//! allocated after construction. Calls must come from one producer, or be
//! serialized by the caller.

use tracing::{debug, trace};

use crate::config::AnalyzerConfig;
use crate::fft::{hann_window, packed_power_spectrum, RealTransform, SAMPLE_FULL_SCALE};
use crate::pitch::{detect_pitch, PitchRange};
use crate::ring::{HistorySnapshot, HistoryView, PitchHistory, WaveformBuffer};
use crate::tuning::{cents_above_c1, NO_PITCH_HZ};
use crate::{Error, Result};

/// Real-time pitch tracker over a stream of 16-bit samples.
#[derive(Debug)]
pub struct Analyzer {
    config: AnalyzerConfig,
    range: PitchRange,
    window: Box<[f64]>,
    transform: RealTransform,

    waveform: WaveformBuffer,
    spectrum: Box<[f64]>,
    acf: Box<[f64]>,

    peak_frequency: Option<f64>,
    voicing_level: f64,
    history: PitchHistory,
    analyze_count: usize,
    total_analyze_count: u64,
}

impl Analyzer {
    /// Builds an analyzer, sizing every buffer to the transform size derived
    /// from `config.sample_rate`.
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        let size = config.transform_size();
        let transform = RealTransform::new(size)?;
        debug!(
            sample_rate = config.sample_rate,
            transform_size = size,
            interval = config.analysis_interval,
            "analyzer ready"
        );

        Ok(Self {
            range: PitchRange::new(config.sample_rate, size),
            window: hann_window(size, SAMPLE_FULL_SCALE),
            transform,
            waveform: WaveformBuffer::new(size),
            spectrum: vec![0.0; size].into_boxed_slice(),
            acf: vec![0.0; size].into_boxed_slice(),
            peak_frequency: None,
            voicing_level: 0.0,
            history: PitchHistory::new(config.history_capacity),
            analyze_count: 0,
            total_analyze_count: 0,
            config,
        })
    }

    /// Ingests one sample, running an analysis when the interval is reached.
    pub fn add_data(&mut self, sample: i16) {
        self.waveform.push(sample as f64);
        self.analyze_count += 1;
        if self.analyze_count >= self.config.analysis_interval {
            self.analyze();
            self.analyze_count = 0;
        }
    }

    /// Ingests a block of samples. Returns how many analyses ran.
    pub fn add_samples(&mut self, samples: &[i16]) -> usize {
        let before = self.total_analyze_count;
        for &sample in samples {
            self.add_data(sample);
        }
        self.total_analyze_count.wrapping_sub(before) as usize
    }

    fn analyze(&mut self) {
        self.waveform.copy_windowed(&self.window, &mut self.spectrum);
        self.transform.forward(&mut self.spectrum);
        packed_power_spectrum(&self.spectrum, &mut self.acf);
        self.transform.inverse(&mut self.acf);

        self.voicing_level = self.acf[0].sqrt();
        self.peak_frequency = if self.voicing_level >= self.config.threshold {
            detect_pitch(&self.acf, &self.spectrum, &self.range)
        } else {
            None
        };

        self.history.push(self.peak_frequency.and_then(cents_above_c1));
        self.total_analyze_count = self.total_analyze_count.wrapping_add(1);
        trace!(
            frame = self.total_analyze_count,
            level = self.voicing_level,
            frequency = ?self.peak_frequency,
            "analysis"
        );
    }

    /// Rewinds ingestion. History and the total count are kept.
    ///
    /// The waveform is zeroed as well, so replaying a stream after `clear`
    /// yields the same frames as feeding it to a fresh analyzer.
    pub fn clear(&mut self) {
        self.waveform.reset();
        self.analyze_count = 0;
    }

    /// Changes the voicing threshold. Rejects negative and non-finite values.
    pub fn set_threshold(&mut self, threshold: f64) -> Result<()> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "threshold {threshold} must be a non-negative number"
            )));
        }
        debug!(threshold, "voicing threshold changed");
        self.config.threshold = threshold;
        Ok(())
    }

    pub fn threshold(&self) -> f64 {
        self.config.threshold
    }

    /// Changes the number of samples between analyses.
    pub fn set_analysis_interval(&mut self, interval: usize) -> Result<()> {
        if interval == 0 {
            return Err(Error::InvalidConfig(
                "analysis_interval must be greater than 0".to_string(),
            ));
        }
        debug!(interval, "analysis interval changed");
        self.config.analysis_interval = interval;
        Ok(())
    }

    pub fn analysis_interval(&self) -> usize {
        self.config.analysis_interval
    }

    /// Last analysis result in Hz, `None` when the frame had no pitch.
    pub fn peak_frequency(&self) -> Option<f64> {
        self.peak_frequency
    }

    /// [`peak_frequency`](Self::peak_frequency) with `-1` for no pitch.
    pub fn peak_frequency_hz(&self) -> f64 {
        self.peak_frequency.unwrap_or(NO_PITCH_HZ)
    }

    /// `sqrt(acf[0])` of the last analysed frame, the value the voicing
    /// threshold is compared against.
    pub fn voicing_level(&self) -> f64 {
        self.voicing_level
    }

    pub fn pitch_history(&self) -> HistoryView<'_> {
        self.history.view()
    }

    pub fn history(&self) -> &PitchHistory {
        &self.history
    }

    pub fn history_snapshot(&self) -> HistorySnapshot {
        self.history.snapshot(self.total_analyze_count)
    }

    pub fn total_analyze_count(&self) -> u64 {
        self.total_analyze_count
    }

    pub fn set_total_analyze_count(&mut self, count: u64) {
        self.total_analyze_count = count;
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn transform_size(&self) -> usize {
        self.transform.size()
    }

    /// Autocorrelation of the last analysed frame, indexed by lag.
    pub fn autocorrelation(&self) -> &[f64] {
        &self.acf
    }
}
