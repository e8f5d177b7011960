//! # Reading Display
//!
//! Formats one [`PitchReading`] per line for the terminal. Deviation from the
//! nearest note is shown as a small text meter, tagged with an accuracy zone.

use pitchtrack_core::PitchReading;

/// The meter spans -50..=+50 cents.
const METER_RANGE: f64 = 50.0;
/// Character cells on each side of the centre mark.
const METER_HALF_WIDTH: usize = 10;

/// How close a reading is to its nearest note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    InTune,
    Close,
    Off,
}

impl Zone {
    pub fn from_deviation(cents: f64) -> Self {
        if cents.abs() < 5.0 {
            Zone::InTune
        } else if cents.abs() < 20.0 {
            Zone::Close
        } else {
            Zone::Off
        }
    }

    fn label(self) -> &'static str {
        match self {
            Zone::InTune => "ok",
            Zone::Close => "~",
            Zone::Off => "!!",
        }
    }
}

/// Draws a needle on a fixed-width scale, e.g. `[---------|--*------]`.
fn meter(cents: f64) -> String {
    let clamped = cents.clamp(-METER_RANGE, METER_RANGE);
    let offset = (clamped / METER_RANGE * METER_HALF_WIDTH as f64).round() as isize;
    let needle = (METER_HALF_WIDTH as isize + offset) as usize;

    let cells: String = (0..=2 * METER_HALF_WIDTH)
        .map(|i| {
            if i == needle {
                '*'
            } else if i == METER_HALF_WIDTH {
                '|'
            } else {
                '-'
            }
        })
        .collect();
    format!("[{cells}]")
}

pub fn format_reading(reading: &PitchReading) -> String {
    let frame = reading.frame;
    match (reading.frequency, reading.cents, &reading.note_name, reading.cents_deviation) {
        (Some(freq), Some(cents), Some(name), Some(deviation)) => format!(
            "#{frame:<6} {freq:>8.2} Hz  {cents:>7.1} c  {name:<4} {deviation:>+6.1} c {} {}",
            meter(deviation),
            Zone::from_deviation(deviation).label(),
        ),
        (Some(freq), Some(cents), ..) => format!("#{frame:<6} {freq:>8.2} Hz  {cents:>7.1} c"),
        _ => format!("#{frame:<6}       --  (level {:.1})", reading.voicing_level),
    }
}
