//! # Pitch Detection Module
//!
//! Autocorrelation pitch estimation with spectral octave correction.
//!
//! ## Stages
//! 1. **Candidate lag search** - the strongest smoothed local maximum of the
//!    autocorrelation between the C8 and C1 periods
//! 2. **Octave correction** - spectral energy probed around multiples and
//!    submultiples of the candidate decides whether it was a harmonic alias
//! 3. **Harmonic refinement** - autocorrelation peaks at multiples of the
//!    corrected period are averaged into the final frequency
//!
//! All functions work on the analyzer's scratch arrays: `acf` indexed by lag
//! and `spectrum` in the packed layout of [`crate::fft`]. The numeric
//! thresholds below are calibrated for that layout's scaling and a Hann
//! window normalized to 16-bit full scale.

use tracing::trace;

use crate::fft::bin_power;
use crate::tuning::{FREQ_C1, FREQ_C8};

/// Extra samples folded into the forward-looking maximum of the lag search.
pub const SMOOTHING_SPAN: usize = 4;
/// The chosen peak must reach this fraction of the zero-lag energy.
pub const MIN_PEAK_TO_ENERGY: f64 = 0.5;

/// Lower edge of the spectral probe window, relative to the target.
pub const PROBE_LOW: f64 = 0.9791666666666666;
/// Upper edge of the spectral probe window, relative to the target.
pub const PROBE_HIGH: f64 = 1.0208333333333333;

/// Minimum probed energy for a frequency to count as present.
pub const MIN_PEAK_ENERGY: f64 = 0.24;
/// Energy ratio at 2/3 of the candidate that marks it as a third harmonic.
pub const THIRD_HARMONIC_RATIO: f64 = 3.15;
/// Energy ratio at 3/2 of the candidate that marks it as a second harmonic.
pub const SECOND_HARMONIC_RATIO: f64 = 1.0;
/// Ratio by which a multiple must exceed the candidate's energy to dominate.
pub const DOMINANCE_RATIO: f64 = 1.25;
/// Maximum relative energy left at the competing multiple.
pub const LEAKAGE_RATIO: f64 = 0.06;
/// Minimum combined energy over the candidate and its 2x/3x multiples.
pub const MIN_HARMONIC_NORM: f64 = 0.7;

/// Half-width of the window searched around each expected harmonic lag.
pub const REFINE_RADIUS: usize = 3;

/// Frequency and lag limits of the search, fixed per sample rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchRange {
    pub sample_rate: f64,
    /// Width of one transform bin in Hz.
    pub bin_hz: f64,
    pub f_low: f64,
    pub f_high: f64,
    /// First lag examined by the candidate search.
    pub min_lag: usize,
    /// Last lag examined by the candidate search, inclusive.
    pub max_lag: usize,
}

impl PitchRange {
    /// Limits for C1..C8 at `sample_rate` with a `transform_size` point transform.
    pub fn new(sample_rate: f64, transform_size: usize) -> Self {
        let f_low = FREQ_C1;
        let f_high = FREQ_C8;
        let min_lag = ((sample_rate / f_high) as usize).saturating_sub(1);
        // Every lag strictly below the C1 period plus one.
        let longest = (sample_rate / f_low + 1.0).ceil() as usize - 1;
        // The smoothed read at `lag + 1` must stay in the first half.
        let max_lag = longest.min((transform_size / 2).saturating_sub(SMOOTHING_SPAN + 2));

        Self {
            sample_rate,
            bin_hz: sample_rate / transform_size as f64,
            f_low,
            f_high,
            min_lag,
            max_lag,
        }
    }
}

/// The lag picked by the candidate search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub lag: usize,
    /// Smoothed autocorrelation value at `lag`.
    pub value: f64,
}

impl Candidate {
    pub fn frequency(&self, sample_rate: f64) -> f64 {
        sample_rate / self.lag as f64
    }
}

#[inline]
fn smoothed(acf: &[f64], lag: usize) -> f64 {
    acf[lag..=lag + SMOOTHING_SPAN]
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Finds the most plausible fundamental period in `acf`.
///
/// The autocorrelation is smoothed with a 5-sample forward-looking maximum,
/// and a local maximum is declared wherever the first difference of that
/// series turns from positive to negative. Flat stretches keep the last
/// non-zero slope. The largest such maximum wins.
///
/// # Returns
/// * `None` - If no maximum exists or the best one is below half of `acf[0]`
pub fn find_candidate(acf: &[f64], range: &PitchRange) -> Option<Candidate> {
    if range.max_lag < range.min_lag || range.max_lag + 1 + SMOOTHING_SPAN >= acf.len() {
        return None;
    }

    let mut previous = smoothed(acf, range.min_lag);
    let mut previous_slope = -1.0;
    let mut best: Option<Candidate> = None;
    let mut best_value = 0.0;

    for lag in range.min_lag..=range.max_lag {
        let value = smoothed(acf, lag + 1);
        let slope = value - previous;
        if slope < 0.0 && previous_slope > 0.0 && previous > best_value {
            best_value = previous;
            best = Some(Candidate { lag, value: previous });
        }
        if slope != 0.0 {
            previous_slope = slope;
            previous = value;
        }
    }

    best.filter(|c| c.lag > 0 && c.value >= acf[0] * MIN_PEAK_TO_ENERGY)
}

/// RMS power of the strongest bin within ±2.08% of `freq` and its two
/// neighbours.
///
/// This checks that real spectral energy exists at a frequency, independent
/// of what the autocorrelation says about periodicity.
pub fn spectral_energy_near(spectrum: &[f64], freq: f64, bin_hz: f64) -> f64 {
    let last_bin = spectrum.len() / 2 - 2;
    let low = (((freq * PROBE_LOW) / bin_hz) as usize).clamp(1, last_bin);
    let high = (((freq * PROBE_HIGH) / bin_hz) as usize).clamp(1, last_bin);

    let mut max_power = 0.0;
    let mut max_bin = None;
    for bin in low..=high {
        let p = bin_power(spectrum, bin);
        if p > max_power {
            max_power = p;
            max_bin = Some(bin);
        }
    }

    match max_bin {
        Some(bin) => {
            ((bin_power(spectrum, bin - 1) + max_power + bin_power(spectrum, bin + 1)) / 3.0).sqrt()
        }
        None => 0.0,
    }
}

/// What the octave corrector decided about a candidate frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// The candidate was a third harmonic.
    Third,
    /// The candidate was a second harmonic.
    Half,
    /// Default path: the candidate is doubled before refinement.
    Double,
    /// Not enough harmonic energy to trust any estimate.
    Unconfirmed,
}

impl Correction {
    /// Frequency handed to the refiner, or `None` when rejected.
    pub fn apply(self, candidate: f64) -> Option<f64> {
        match self {
            Correction::Third => Some(candidate / 3.0),
            Correction::Half => Some(candidate / 2.0),
            Correction::Double => Some(candidate * 2.0),
            Correction::Unconfirmed => None,
        }
    }
}

/// Energy at 2/3 of the candidate dwarfs the candidate's own.
pub fn is_third_harmonic(energy: f64, energy_two_thirds: f64, candidate: f64, f_low: f64) -> bool {
    energy >= MIN_PEAK_ENERGY
        && energy_two_thirds > THIRD_HARMONIC_RATIO * energy
        && candidate / 3.0 >= f_low
}

/// Energy at 3/2 of the candidate exceeds the candidate's own.
pub fn is_second_harmonic(energy: f64, energy_three_halves: f64, candidate: f64, f_low: f64) -> bool {
    energy >= MIN_PEAK_ENERGY
        && energy_three_halves > SECOND_HARMONIC_RATIO * energy
        && candidate / 2.0 >= f_low
}

/// The octave above carries the energy while the third multiple is silent.
pub fn octave_above_dominates(
    energy: f64,
    energy_double: f64,
    energy_triple: f64,
    candidate: f64,
    f_high: f64,
) -> bool {
    energy_double >= MIN_PEAK_ENERGY
        && energy_double > DOMINANCE_RATIO * energy
        && energy_triple < LEAKAGE_RATIO * energy_double
        && candidate * 2.0 <= f_high
}

/// The third multiple carries the energy while the octave above is silent.
pub fn third_multiple_dominates(
    energy: f64,
    energy_double: f64,
    energy_triple: f64,
    candidate: f64,
    f_high: f64,
) -> bool {
    energy_triple >= MIN_PEAK_ENERGY
        && energy_triple > DOMINANCE_RATIO * energy
        && energy_double < LEAKAGE_RATIO * energy_triple
        && candidate * 3.0 <= f_high
}

/// Combined energy of the candidate and its 2x/3x multiples is sufficient.
pub fn harmonics_confirmed(energy: f64, energy_double: f64, energy_triple: f64) -> bool {
    (energy * energy + energy_double * energy_double + energy_triple * energy_triple).sqrt()
        >= MIN_HARMONIC_NORM
}

/// Runs the ordered octave rules on `candidate` (Hz) against `spectrum`.
///
/// Probes are only taken when their rule is reached.
pub fn correct_octave(spectrum: &[f64], candidate: f64, range: &PitchRange) -> Correction {
    let probe = |freq: f64| spectral_energy_near(spectrum, freq, range.bin_hz);

    let energy = probe(candidate);
    if is_third_harmonic(energy, probe(candidate / 3.0 * 2.0), candidate, range.f_low) {
        return Correction::Third;
    }
    if is_second_harmonic(energy, probe(candidate * 1.5), candidate, range.f_low) {
        return Correction::Half;
    }

    let energy_double = probe(candidate * 2.0);
    let energy_triple = probe(candidate * 3.0);
    if !octave_above_dominates(energy, energy_double, energy_triple, candidate, range.f_high) {
        if third_multiple_dominates(energy, energy_double, energy_triple, candidate, range.f_high) {
            // The doubled estimate is still what the refiner receives.
            trace!(candidate, energy_triple, "third multiple dominates");
        }
        if !harmonics_confirmed(energy, energy_double, energy_triple) {
            return Correction::Unconfirmed;
        }
    }
    Correction::Double
}

/// Averages the fundamental implied by each autocorrelation peak found near
/// a multiple of the estimated period.
///
/// For harmonic `n`, the expected lag `sample_rate·n / mean` is searched
/// ±[`REFINE_RADIUS`] samples. Only a maximum strictly inside the window is
/// accepted; a maximum on either edge means no peak was bracketed.
pub fn refine_harmonics(acf: &[f64], fundamental: f64, sample_rate: f64) -> f64 {
    let last_lag = acf.len() / 2 - 1;
    let harmonics = (last_lag as f64 / (sample_rate / fundamental)) as usize;

    let mut sum = fundamental;
    let mut count = 1usize;
    for n in 2..=harmonics {
        let n = n as f64;
        let expected = (sample_rate * n / (sum / count as f64)) as usize;
        let upper = (expected + REFINE_RADIUS).min(last_lag);
        let lower = expected.saturating_sub(REFINE_RADIUS);
        if lower >= upper {
            continue;
        }

        // Ties go to the later lag.
        let mut peak = upper;
        let mut peak_value = acf[upper];
        for (lag, &value) in acf.iter().enumerate().take(upper + 1).skip(lower) {
            if value >= peak_value {
                peak_value = value;
                peak = lag;
            }
        }

        if peak != lower && peak != upper {
            sum += sample_rate * n / peak as f64;
            count += 1;
        }
    }

    // Halving pairs with the corrector's default doubling. It applies to
    // every outcome, Third and Half included.
    sum / count as f64 / 2.0
}

/// Full per-frame estimate from a voiced frame's autocorrelation and spectrum.
///
/// # Returns
/// * `Some(frequency)` - Fundamental in Hz
/// * `None` - No candidate, or the harmonic check rejected it
pub fn detect_pitch(acf: &[f64], spectrum: &[f64], range: &PitchRange) -> Option<f64> {
    let candidate = find_candidate(acf, range)?;
    let candidate_hz = candidate.frequency(range.sample_rate);

    let correction = correct_octave(spectrum, candidate_hz, range);
    trace!(lag = candidate.lag, candidate_hz, ?correction, "octave correction");

    let fundamental = correction.apply(candidate_hz)?;
    Some(refine_harmonics(acf, fundamental, range.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SAMPLE_RATE: f64 = 44100.0;
    const SIZE: usize = 4096;

    /// Autocorrelation shaped like a decaying cosine with the given period.
    fn periodic_acf(period: f64) -> Vec<f64> {
        (0..SIZE)
            .map(|lag| {
                let decay = 1.0 - lag as f64 / SIZE as f64;
                1000.0 * decay * (2.0 * std::f64::consts::PI * lag as f64 / period).cos()
            })
            .collect()
    }

    /// Packed spectrum with the given bins set to real amplitudes.
    fn spectrum_with(bins: &[(usize, f64)]) -> Vec<f64> {
        let mut spectrum = vec![0.0; SIZE];
        for &(bin, amplitude) in bins {
            spectrum[2 * bin] = amplitude;
        }
        spectrum
    }

    #[test]
    fn test_range_at_44100() {
        let range = PitchRange::new(SAMPLE_RATE, SIZE);
        assert_eq!(range.min_lag, 9);
        assert_eq!(range.max_lag, 1349);
        assert_relative_eq!(range.bin_hz, SAMPLE_RATE / 4096.0);
    }

    #[test]
    fn test_candidate_on_periodic_acf() {
        let range = PitchRange::new(SAMPLE_RATE, SIZE);
        let candidate = find_candidate(&periodic_acf(200.0), &range).unwrap();
        assert_eq!(candidate.lag, 200);
        assert_relative_eq!(candidate.frequency(SAMPLE_RATE), 220.5);
    }

    #[test]
    fn test_candidate_prefers_largest_peak() {
        let range = PitchRange::new(SAMPLE_RATE, SIZE);
        let mut acf = vec![0.0; SIZE];
        acf[0] = 100.0;
        acf[300] = 55.0;
        acf[600] = 80.0;
        let candidate = find_candidate(&acf, &range).unwrap();
        assert_eq!(candidate.lag, 600);
        assert_eq!(candidate.value, 80.0);
    }

    #[test]
    fn test_candidate_rejects_weak_peak() {
        let range = PitchRange::new(SAMPLE_RATE, SIZE);
        let mut acf = vec![0.0; SIZE];
        acf[0] = 100.0;
        acf[400] = 49.0;
        assert!(find_candidate(&acf, &range).is_none());

        acf[400] = 50.0;
        assert_eq!(find_candidate(&acf, &range).map(|c| c.lag), Some(400));
    }

    #[test]
    fn test_candidate_on_flat_acf() {
        let range = PitchRange::new(SAMPLE_RATE, SIZE);
        assert!(find_candidate(&vec![0.0; SIZE], &range).is_none());
    }

    #[test]
    fn test_energy_near_uses_neighbours() {
        let spectrum = spectrum_with(&[(40, 3.0), (41, 6.0), (42, 3.0)]);
        let freq = 41.0 * SAMPLE_RATE / SIZE as f64;
        let energy = spectral_energy_near(&spectrum, freq, SAMPLE_RATE / SIZE as f64);
        assert_relative_eq!(energy, ((9.0 + 36.0 + 9.0) / 3.0_f64).sqrt());
    }

    #[test]
    fn test_energy_near_silence_is_zero() {
        let spectrum = vec![0.0; SIZE];
        assert_eq!(spectral_energy_near(&spectrum, 440.0, SAMPLE_RATE / SIZE as f64), 0.0);
    }

    #[test]
    fn test_third_harmonic_rule() {
        assert!(is_third_harmonic(1.0, 3.2, 300.0, FREQ_C1));
        assert!(!is_third_harmonic(1.0, 3.15, 300.0, FREQ_C1));
        assert!(!is_third_harmonic(0.2, 10.0, 300.0, FREQ_C1));
        // A third of 90 Hz falls below C1.
        assert!(!is_third_harmonic(1.0, 10.0, 90.0, FREQ_C1));
    }

    #[test]
    fn test_second_harmonic_rule() {
        assert!(is_second_harmonic(1.0, 1.01, 200.0, FREQ_C1));
        assert!(!is_second_harmonic(1.0, 1.0, 200.0, FREQ_C1));
        assert!(!is_second_harmonic(0.23, 5.0, 200.0, FREQ_C1));
        assert!(!is_second_harmonic(1.0, 5.0, 60.0, FREQ_C1));
    }

    #[test]
    fn test_octave_above_rule() {
        assert!(octave_above_dominates(1.0, 2.0, 0.1, 440.0, FREQ_C8));
        assert!(!octave_above_dominates(1.0, 1.25, 0.0, 440.0, FREQ_C8));
        assert!(!octave_above_dominates(1.0, 2.0, 0.12, 440.0, FREQ_C8));
        assert!(!octave_above_dominates(1.0, 2.0, 0.1, 2100.0, FREQ_C8));
    }

    #[test]
    fn test_third_multiple_rule() {
        assert!(third_multiple_dominates(1.0, 0.1, 2.0, 440.0, FREQ_C8));
        assert!(!third_multiple_dominates(1.0, 0.12, 2.0, 440.0, FREQ_C8));
        assert!(!third_multiple_dominates(1.0, 0.1, 2.0, 1400.0, FREQ_C8));
    }

    #[test]
    fn test_harmonics_confirmed() {
        assert!(harmonics_confirmed(0.8, 0.0, 0.0));
        assert!(harmonics_confirmed(0.5, 0.5, 0.5));
        assert!(!harmonics_confirmed(0.4, 0.3, 0.3));
    }

    #[test]
    fn test_correction_apply() {
        assert_eq!(Correction::Third.apply(300.0), Some(100.0));
        assert_eq!(Correction::Half.apply(300.0), Some(150.0));
        assert_eq!(Correction::Double.apply(300.0), Some(600.0));
        assert_eq!(Correction::Unconfirmed.apply(300.0), None);
    }

    #[test]
    fn test_correct_octave_paths() {
        let range = PitchRange::new(SAMPLE_RATE, SIZE);
        let bin = |freq: f64| (freq / range.bin_hz).round() as usize;

        let pure = spectrum_with(&[(bin(430.0), 50.0)]);
        assert_eq!(correct_octave(&pure, 430.0, &range), Correction::Double);

        let third = spectrum_with(&[(bin(430.0), 5.0), (bin(430.0 * 2.0 / 3.0), 50.0)]);
        assert_eq!(correct_octave(&third, 430.0, &range), Correction::Third);

        let second = spectrum_with(&[(bin(430.0), 5.0), (bin(430.0 * 1.5), 50.0)]);
        assert_eq!(correct_octave(&second, 430.0, &range), Correction::Half);

        let faint = spectrum_with(&[(bin(430.0), 0.3)]);
        assert_eq!(correct_octave(&faint, 430.0, &range), Correction::Unconfirmed);
    }

    #[test]
    fn test_octave_above_skips_norm_check() {
        let range = PitchRange::new(SAMPLE_RATE, SIZE);
        let bin = |freq: f64| (freq / range.bin_hz).round() as usize;
        let energy = |spectrum: &[f64], freq: f64| spectral_energy_near(spectrum, freq, range.bin_hz);

        // Too little energy overall, but it sits an octave above.
        let quiet_octave = spectrum_with(&[(bin(430.0), 0.2), (bin(860.0), 0.8)]);
        let (v, v2, v3) = (
            energy(&quiet_octave, 430.0),
            energy(&quiet_octave, 860.0),
            energy(&quiet_octave, 1290.0),
        );
        assert!(octave_above_dominates(v, v2, v3, 430.0, range.f_high));
        assert!(!harmonics_confirmed(v, v2, v3));
        assert_eq!(correct_octave(&quiet_octave, 430.0, &range), Correction::Double);
    }

    #[test]
    fn test_third_multiple_still_doubles() {
        let range = PitchRange::new(SAMPLE_RATE, SIZE);
        let bin = |freq: f64| (freq / range.bin_hz).round() as usize;
        let energy = |spectrum: &[f64], freq: f64| spectral_energy_near(spectrum, freq, range.bin_hz);

        let strong_third = spectrum_with(&[(bin(430.0), 5.0), (bin(1290.0), 50.0)]);
        let (v, v2, v3) = (
            energy(&strong_third, 430.0),
            energy(&strong_third, 860.0),
            energy(&strong_third, 1290.0),
        );
        assert!(!octave_above_dominates(v, v2, v3, 430.0, range.f_high));
        assert!(third_multiple_dominates(v, v2, v3, 430.0, range.f_high));
        assert_eq!(correct_octave(&strong_third, 430.0, &range), Correction::Double);
    }

    #[test]
    fn test_refine_on_doubled_estimate() {
        // A doubled estimate lands every other expected lag on a trough,
        // which the edge check throws away.
        let acf = periodic_acf(200.0);
        let refined = refine_harmonics(&acf, 2.0 * SAMPLE_RATE / 200.0, SAMPLE_RATE);
        assert_relative_eq!(refined, SAMPLE_RATE / 200.0, max_relative = 1e-3);
    }

    #[test]
    fn test_refine_without_peaks_keeps_estimate_halved() {
        let acf = vec![0.0; SIZE];
        assert_relative_eq!(refine_harmonics(&acf, 500.0, SAMPLE_RATE), 250.0);
    }
}
