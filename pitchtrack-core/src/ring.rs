//! # Ring Buffers
//!
//! Fixed-size circular storage for the analyzer: the incoming waveform and
//! the per-frame pitch history. Both are allocated once and never grow.

use serde::{Deserialize, Serialize};

/// Cents value stored in the history when a frame has no pitch.
pub const NO_PITCH_CENTS: f32 = -1.0;

/// The most recent `len` raw samples, in circular order.
#[derive(Debug, Clone)]
pub struct WaveformBuffer {
    samples: Box<[f64]>,
    cursor: usize,
}

impl WaveformBuffer {
    pub fn new(len: usize) -> Self {
        Self {
            samples: vec![0.0; len].into_boxed_slice(),
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Index the next sample will be written to. This is also the position
    /// of the oldest sample.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Overwrites the oldest sample and advances the cursor.
    #[inline]
    pub fn push(&mut self, sample: f64) {
        self.samples[self.cursor] = sample;
        self.cursor += 1;
        if self.cursor == self.samples.len() {
            self.cursor = 0;
        }
    }

    /// Writes `window[i] * sample[i]` into `out`, oldest sample first.
    ///
    /// # Panics
    /// * If `window` or `out` differ in length from the buffer
    pub fn copy_windowed(&self, window: &[f64], out: &mut [f64]) {
        let len = self.samples.len();
        assert_eq!(window.len(), len, "window length differs from buffer");
        assert_eq!(out.len(), len, "output length differs from buffer");

        let (newest, oldest) = self.samples.split_at(self.cursor);
        let chronological = oldest.iter().chain(newest.iter());
        for ((slot, &coefficient), &sample) in out.iter_mut().zip(window).zip(chronological) {
            *slot = coefficient * sample;
        }
    }

    /// Zeroes every sample and rewinds the cursor.
    pub fn reset(&mut self) {
        self.samples.fill(0.0);
        self.cursor = 0;
    }
}

/// Circular history of per-frame results in cents, `-1` meaning no pitch.
#[derive(Debug, Clone)]
pub struct PitchHistory {
    entries: Box<[f32]>,
    cursor: usize,
}

/// Borrowed view of the history as the display side consumes it.
#[derive(Debug, Clone, Copy)]
pub struct HistoryView<'a> {
    pub buffer: &'a [f32],
    pub write_cursor: usize,
    pub capacity: usize,
}

/// Owned, serializable copy of the history in chronological order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub entries: Vec<f32>,
    pub write_cursor: usize,
    pub capacity: usize,
    pub total_analyze_count: u64,
}

impl PitchHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: vec![NO_PITCH_CENTS; capacity].into_boxed_slice(),
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn write_cursor(&self) -> usize {
        self.cursor
    }

    /// Stores one frame's result, overwriting the oldest entry once full.
    pub fn push(&mut self, cents: Option<f32>) {
        self.entries[self.cursor] = cents.unwrap_or(NO_PITCH_CENTS);
        self.cursor += 1;
        if self.cursor == self.entries.len() {
            self.cursor = 0;
        }
    }

    /// The entry written by the last `push`.
    pub fn latest(&self) -> Option<f32> {
        let index = self.cursor.checked_sub(1).unwrap_or(self.entries.len() - 1);
        let cents = self.entries[index];
        (cents != NO_PITCH_CENTS).then_some(cents)
    }

    /// Entries from oldest to newest, starting at the write cursor.
    pub fn iter_chronological(&self) -> impl Iterator<Item = f32> + '_ {
        let (newest, oldest) = self.entries.split_at(self.cursor);
        oldest.iter().chain(newest.iter()).copied()
    }

    pub fn view(&self) -> HistoryView<'_> {
        HistoryView {
            buffer: &self.entries,
            write_cursor: self.cursor,
            capacity: self.entries.len(),
        }
    }

    pub fn snapshot(&self, total_analyze_count: u64) -> HistorySnapshot {
        HistorySnapshot {
            entries: self.iter_chronological().collect(),
            write_cursor: self.cursor,
            capacity: self.entries.len(),
            total_analyze_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windowed_copy_reads_oldest_first() {
        let mut buffer = WaveformBuffer::new(4);
        for sample in 1..=6 {
            buffer.push(sample as f64);
        }
        // Slots now hold [5, 6, 3, 4] with the cursor on 3.
        assert_eq!(buffer.cursor(), 2);

        let window = [1.0, 10.0, 100.0, 1000.0];
        let mut out = [0.0; 4];
        buffer.copy_windowed(&window, &mut out);
        assert_eq!(out, [3.0, 40.0, 500.0, 6000.0]);
    }

    #[test]
    fn test_windowed_copy_with_cursor_at_zero() {
        let mut buffer = WaveformBuffer::new(3);
        for sample in [1.0, 2.0, 3.0] {
            buffer.push(sample);
        }
        assert_eq!(buffer.cursor(), 0);

        let mut out = [0.0; 3];
        buffer.copy_windowed(&[1.0; 3], &mut out);
        assert_eq!(out, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_reset_zeroes_samples() {
        let mut buffer = WaveformBuffer::new(3);
        buffer.push(7.0);
        buffer.reset();
        let mut out = [1.0; 3];
        buffer.copy_windowed(&[1.0; 3], &mut out);
        assert_eq!(out, [0.0; 3]);
        assert_eq!(buffer.cursor(), 0);
    }

    #[test]
    fn test_history_starts_empty() {
        let history = PitchHistory::new(5);
        assert_eq!(history.latest(), None);
        assert!(history.view().buffer.iter().all(|&c| c == NO_PITCH_CENTS));
    }

    #[test]
    fn test_history_wraps() {
        let mut history = PitchHistory::new(3);
        history.push(Some(100.0));
        history.push(None);
        history.push(Some(300.0));
        assert_eq!(history.write_cursor(), 0);
        assert_eq!(history.latest(), Some(300.0));

        history.push(Some(400.0));
        let view = history.view();
        assert_eq!(view.write_cursor, 1);
        assert_eq!(view.capacity, 3);
        assert_eq!(view.buffer, &[400.0, NO_PITCH_CENTS, 300.0]);

        let ordered: Vec<f32> = history.iter_chronological().collect();
        assert_eq!(ordered, vec![NO_PITCH_CENTS, 300.0, 400.0]);
    }

    #[test]
    fn test_snapshot_is_chronological() {
        let mut history = PitchHistory::new(2);
        history.push(Some(1.0));
        history.push(Some(2.0));
        history.push(Some(3.0));

        let snapshot = history.snapshot(3);
        assert_eq!(snapshot.entries, vec![2.0, 3.0]);
        assert_eq!(snapshot.write_cursor, 1);
        assert_eq!(snapshot.total_analyze_count, 3);
    }
}
