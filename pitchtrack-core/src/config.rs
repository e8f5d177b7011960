//! Analyzer configuration.
//!
//! Everything here is fixed when an [`Analyzer`](crate::Analyzer) is built,
//! except the threshold and analysis interval which have runtime setters.

use serde::{Deserialize, Serialize};

use crate::tuning::{FREQ_A3, FREQ_A3_SHARP};
use crate::{Error, Result};

/// Default number of samples between two analyses (~33 ms at 44.1 kHz).
pub const DEFAULT_ANALYSIS_INTERVAL: usize = 1470;
/// Default input sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: f64 = 44100.0;
/// Default voicing threshold, compared against `sqrt(acf[0])`.
pub const DEFAULT_THRESHOLD: f64 = 3.0;
/// Default number of entries kept in the pitch history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 800;

/// Configuration for the pitch analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Input sample rate in Hz. No negotiation happens after construction.
    pub sample_rate: f64,
    /// Samples ingested between two analyses.
    pub analysis_interval: usize,
    /// Voicing threshold on the frame's autocorrelation energy.
    pub threshold: f64,
    /// Capacity of the pitch history ring.
    pub history_capacity: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            analysis_interval: DEFAULT_ANALYSIS_INTERVAL,
            threshold: DEFAULT_THRESHOLD,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.sample_rate.is_finite() || self.sample_rate < 8000.0 || self.sample_rate > 384000.0 {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if self.analysis_interval == 0 {
            return Err(Error::InvalidConfig(
                "analysis_interval must be greater than 0".to_string(),
            ));
        }
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "threshold {} must be a non-negative number",
                self.threshold
            )));
        }
        if self.history_capacity == 0 {
            return Err(Error::InvalidConfig(
                "history_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Transform length for this sample rate. See [`transform_size_for`].
    pub fn transform_size(&self) -> usize {
        transform_size_for(self.sample_rate)
    }

    /// Analysis interval expressed in seconds.
    pub fn interval_secs(&self) -> f64 {
        self.analysis_interval as f64 / self.sample_rate
    }
}

/// Smallest power of two whose bin spacing resolves one semitone near A3.
///
/// `2^(floor(log2(sample_rate / (A#3 - A3))) + 1)`, which is 4096 at 44.1 kHz.
pub fn transform_size_for(sample_rate: f64) -> usize {
    let semitone_hz = FREQ_A3_SHARP - FREQ_A3;
    let exponent = (sample_rate / semitone_hz).log2().floor() as u32 + 1;
    1usize << exponent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.sample_rate, 44100.0);
        assert_eq!(config.analysis_interval, 1470);
        assert_eq!(config.history_capacity, 800);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_transform_size_at_44100() {
        assert_eq!(transform_size_for(44100.0), 4096);
        assert_eq!(AnalyzerConfig::default().transform_size(), 4096);
    }

    #[test]
    fn test_transform_size_tracks_sample_rate() {
        assert_eq!(transform_size_for(8000.0), 1024);
        assert_eq!(transform_size_for(48000.0), 4096);
        assert_eq!(transform_size_for(96000.0), 8192);
    }

    #[test]
    fn test_interval_secs() {
        let config = AnalyzerConfig::default();
        assert!((config.interval_secs() - 1470.0 / 44100.0).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad_rate = AnalyzerConfig { sample_rate: f64::NAN, ..Default::default() };
        assert!(bad_rate.validate().is_err());

        let bad_interval = AnalyzerConfig { analysis_interval: 0, ..Default::default() };
        assert!(bad_interval.validate().is_err());

        let bad_threshold = AnalyzerConfig { threshold: -1.0, ..Default::default() };
        assert!(bad_threshold.validate().is_err());

        let bad_capacity = AnalyzerConfig { history_capacity: 0, ..Default::default() };
        assert!(bad_capacity.validate().is_err());
    }

    #[test]
    fn test_missing_json_fields_take_defaults() {
        let config: AnalyzerConfig = serde_json::from_str(r#"{ "threshold": 10.0 }"#).unwrap();
        assert_eq!(config.threshold, 10.0);
        assert_eq!(config.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(config.analysis_interval, DEFAULT_ANALYSIS_INTERVAL);
    }
}
