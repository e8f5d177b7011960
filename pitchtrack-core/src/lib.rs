// pitchtrack-core/src/lib.rs

//! The core logic for the streaming pitch tracker.
//! This crate turns a stream of 16-bit samples into one pitch estimate per
//! analysis frame, stored as cents above C1 in a rolling history. It is
//! completely headless; capture helpers live in [`audio`], display is left to
//! the caller.

pub mod analyzer;
pub mod audio;
pub mod config;
pub mod error;
pub mod fft;
pub mod pitch;
pub mod ring;
pub mod tuning;

pub use analyzer::Analyzer;
pub use config::AnalyzerConfig;
pub use error::{Error, Result};
pub use ring::{HistorySnapshot, HistoryView, PitchHistory};

/// Represents the result of a single analysis frame, ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct PitchReading {
    /// Value of the total analysis counter after this frame.
    pub frame: u64,
    /// Detected fundamental in Hz.
    pub frequency: Option<f64>,
    /// Cents above C1, as stored in the history.
    pub cents: Option<f32>,
    /// The name of the nearest note.
    pub note_name: Option<String>,
    /// The deviation from the nearest note in cents.
    pub cents_deviation: Option<f64>,
    /// Frame energy compared against the voicing threshold.
    pub voicing_level: f64,
}

impl PitchReading {
    /// Captures the analyzer's latest frame.
    pub fn from_analyzer(analyzer: &Analyzer) -> Self {
        let frequency = analyzer.peak_frequency();
        let nearest = frequency.and_then(tuning::find_nearest_note);
        Self {
            frame: analyzer.total_analyze_count(),
            frequency,
            cents: frequency.and_then(tuning::cents_above_c1),
            note_name: nearest.map(|note| note.name.clone()),
            cents_deviation: frequency
                .zip(nearest)
                .map(|(freq, note)| tuning::cents_deviation(freq, note.frequency)),
            voicing_level: analyzer.voicing_level(),
        }
    }
}
