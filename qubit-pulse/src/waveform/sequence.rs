//! Time-positioned pulses flattened into a single sample buffer.

use num_complex::Complex64;

use crate::{real, Result, WaveformError};

/// A pulse shape placed `delay` samples after the start of its sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct Pulse {
    shape: Vec<Complex64>,
    delay: usize,
}

impl Pulse {
    pub fn new(shape: Vec<Complex64>, delay: usize) -> Self {
        Self { shape, delay }
    }

    pub fn shape(&self) -> &[Complex64] {
        &self.shape
    }

    pub fn delay(&self) -> usize {
        self.delay
    }

    /// The sample index just past the end of this pulse.
    pub fn len(&self) -> usize {
        self.shape.len() + self.delay
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An ordered collection of pulses on top of a constant baseline.
///
/// Pulses are appended at a cursor that advances past each inserted pulse, or at an explicit
/// position. Flattening is additive: overlapping pulses are summed, which is how sideband and
/// flux components are superposed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PulseSequence {
    pulses: Vec<Pulse>,
    offset: f64,
    position: usize,
}

impl PulseSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// The baseline added to every sample of the flattened waveform.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
    }

    /// The cursor at which the next pulse without explicit position is placed.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    pub fn pulses(&self) -> &[Pulse] {
        &self.pulses
    }

    /// Insert `shape` at `position + delay`, or at `cursor + delay` if no position is given, and
    /// move the cursor to the end of the inserted shape.
    pub fn add_pulse(&mut self, shape: Vec<Complex64>, delay: usize, position: Option<usize>) {
        let placement = position.unwrap_or(self.position) + delay;
        self.position = placement + shape.len();
        self.pulses.push(Pulse::new(shape, placement));
    }

    /// Advance the cursor by `length` samples without inserting anything.
    pub fn add_wait(&mut self, length: usize) {
        self.position += length;
    }

    /// Drop all pulses, keeping the offset and the cursor.
    pub fn clear_pulses(&mut self) {
        self.pulses.clear();
    }

    /// The length of the flattened waveform: the end of the last pulse or the cursor, whichever
    /// is later.
    pub fn len(&self) -> usize {
        self.pulses
            .iter()
            .map(Pulse::len)
            .max()
            .unwrap_or(0)
            .max(self.position)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten the sequence into a fresh buffer.
    ///
    /// With `end_at`, the content is right-aligned so that it ends just before sample `end_at`;
    /// the samples in front of it hold the offset. Fails if the content is longer than `end_at`.
    pub fn waveform(&self, end_at: Option<usize>) -> Result<Vec<Complex64>> {
        let baseline = real!(self.offset);
        let mut waveform = vec![baseline; self.len()];

        for pulse in &self.pulses {
            waveform[pulse.delay..pulse.len()]
                .iter_mut()
                .zip(&pulse.shape)
                .for_each(|(sample, value)| *sample += value);
        }

        let Some(end_at) = end_at else {
            return Ok(waveform);
        };

        if end_at < waveform.len() {
            return Err(WaveformError::SequenceTooLong {
                length: waveform.len(),
                end_at,
            });
        }

        let mut shifted = vec![baseline; end_at - waveform.len()];
        shifted.extend(waveform);
        Ok(shifted)
    }

    /// Like [`waveform`](Self::waveform), keeping only the real part of every sample.
    pub fn real_waveform(&self, end_at: Option<usize>) -> Result<Vec<f64>> {
        Ok(self
            .waveform(end_at)?
            .into_iter()
            .map(|sample| sample.re)
            .collect())
    }
}
