//! # Musical Tuning Module
//!
//! Frequency constants shared by the whole tracker, the cents scale the pitch
//! history is stored in, and nearest-note lookups for display.
//!
//! ## Cents scale
//! History entries are cents above C1 (`55 Hz · 2^-0.75` ≈ 32.70 Hz), so one
//! octave is 1200 and every equal-tempered note sits on a multiple of 100.
//! A frame without pitch is stored as [`NO_PITCH_CENTS`].

use once_cell::sync::Lazy;

pub use crate::ring::NO_PITCH_CENTS;

/// A3 in Hz.
pub const FREQ_A3: f64 = 220.0;
/// One equal-tempered semitone above A3 in Hz.
pub const FREQ_A3_SHARP: f64 = 233.08188075904496;
/// C1 in Hz. Lower edge of the detectable range and reference of the cents scale.
pub const FREQ_C1: f64 = 32.70319566257483;
/// C8 in Hz. Upper edge of the detectable range.
pub const FREQ_C8: f64 = 4186.009044809578;

/// Frequency value reported when a frame has no pitch.
pub const NO_PITCH_HZ: f64 = -1.0;

/// Represents a single musical note with its name and frequency.
#[derive(Debug, Clone)]
pub struct Note {
    /// Note name (e.g., "A4", "C#3")
    pub name: String,
    /// Frequency in Hz
    pub frequency: f64,
}

/// Equal-tempered notes from C1 to C8 with A4 = 440 Hz, computed once.
static NOTES: Lazy<Vec<Note>> = Lazy::new(|| {
    const NOTE_NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    (0..=84)
        .map(|i| {
            // C1 is 45 semitones below A4.
            let frequency = 440.0 * 2.0_f64.powf((i as f64 - 45.0) / 12.0);
            let name = format!("{}{}", NOTE_NAMES[i % 12], i / 12 + 1);
            Note { name, frequency }
        })
        .collect()
});

/// Cents above C1, or `None` for the negative "no pitch" marker.
pub fn cents_above_c1(freq: f64) -> Option<f32> {
    if freq < 0.0 {
        return None;
    }
    Some((1200.0 * (freq.log2() - FREQ_C1.log2())) as f32)
}

/// Sentinel-compatible form of [`cents_above_c1`]: `-1` maps to `-1`.
pub fn freq_to_cents(freq: f64) -> f32 {
    cents_above_c1(freq).unwrap_or(NO_PITCH_CENTS)
}

/// Finds the closest note in the C1..C8 table to a given frequency.
///
/// # Returns
/// * `None` - If `freq` is not a positive finite frequency
pub fn find_nearest_note(freq: f64) -> Option<&'static Note> {
    if !freq.is_finite() || freq <= 0.0 {
        return None;
    }
    NOTES.iter().min_by(|a, b| {
        let diff_a = cents_deviation(freq, a.frequency).abs();
        let diff_b = cents_deviation(freq, b.frequency).abs();
        diff_a.total_cmp(&diff_b)
    })
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values are flat.
pub fn cents_deviation(freq: f64, target_freq: f64) -> f64 {
    1200.0 * (freq / target_freq).log2()
}
