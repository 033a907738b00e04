// Copyright 2024 The qubit-pulse Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Mapping of finished waveforms onto fixed-size AWG buffers.
//!
//! The drive AWG repeats a buffer of `repetition_period` samples (1 ns each). The qubit is read
//! out at `readout_time`, so drive waveforms are right-aligned to end just before it; nothing may
//! be played before `drive_wait_time`. Each sample carries two marker bits (plus a third on some
//! instruments) that trigger the fluxline and the readout.

mod fluxline;

use itertools::{Itertools, MinMaxResult};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::{Result, WaveformError};

pub use fluxline::{
    AwgFluxlineStrategy, DirectFluxlineStrategy, FluxlineBuffer, FluxlineLoadStrategy,
    FluxlineOutput,
};

/// Largest marker value: three marker bits.
pub const MAX_MARKER: u8 = 7;

/// Widest supported DAC, in bits.
pub const MAX_DAC_RESOLUTION: u8 = 16;

/// Timing and resolution of the AWG buffers. All times are in samples of 1 ns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareBufferSpec {
    pub repetition_period: usize,
    /// Earliest sample at which drive pulses and markers may start.
    pub drive_wait_time: usize,
    /// Sample at which the qubit is read out; drive waveforms end just before it.
    pub readout_time: usize,
    /// Latency of the fluxline trigger relative to the drive AWG.
    pub fluxline_trigger_delay: usize,
    /// Samples at the end of each period that the fluxline buffer leaves unused.
    pub fluxline_guard_time: usize,
    /// Lead-in of the direct fluxline driver, in ns.
    pub fluxline_wait_time: usize,
    /// DAC resolution in bits.
    pub dac_resolution: u8,
}

impl Default for HardwareBufferSpec {
    fn default() -> Self {
        Self {
            repetition_period: 20_000,
            drive_wait_time: 2_000,
            readout_time: 10_000,
            fluxline_trigger_delay: 0,
            fluxline_guard_time: 1_000,
            fluxline_wait_time: 0,
            dac_resolution: 14,
        }
    }
}

impl HardwareBufferSpec {
    /// Check that the timing parameters describe a realizable buffer layout.
    pub fn validate(&self) -> Result<()> {
        if self.readout_time > self.repetition_period {
            return Err(WaveformError::InvalidTiming(format!(
                "readout time {} lies beyond the repetition period {}",
                self.readout_time, self.repetition_period
            )));
        }
        if self.drive_wait_time > self.readout_time {
            return Err(WaveformError::InvalidTiming(format!(
                "drive wait time {} lies beyond the readout time {}",
                self.drive_wait_time, self.readout_time
            )));
        }
        if self.fluxline_guard_time > self.repetition_period {
            return Err(WaveformError::InvalidTiming(format!(
                "fluxline guard time {} exceeds the repetition period {}",
                self.fluxline_guard_time, self.repetition_period
            )));
        }
        check_dac_resolution(self.dac_resolution)
    }

    /// Number of samples available to a drive waveform.
    pub fn drive_window(&self) -> usize {
        self.readout_time.saturating_sub(self.drive_wait_time)
    }

    /// Length of the buffer played on the fluxline AWG.
    pub fn fluxline_buffer_length(&self) -> usize {
        self.repetition_period
            .saturating_sub(self.fluxline_guard_time)
    }
}

/// Fail with [`WaveformError::RangeExceeded`] if any sample lies outside `[-1, 1]`.
///
/// The sample reported is the largest one if it is out of range, the smallest one otherwise.
pub fn check_dac_range(samples: &[f64]) -> Result<()> {
    let check = |index: usize| {
        let value = samples[index];
        if (-1.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(WaveformError::RangeExceeded { index, value })
        }
    };
    match samples
        .iter()
        .position_minmax_by(|left, right| left.total_cmp(right))
    {
        MinMaxResult::NoElements => Ok(()),
        MinMaxResult::OneElement(index) => check(index),
        MinMaxResult::MinMax(min, max) => check(max).and_then(|_| check(min)),
    }
}

/// Fail with [`WaveformError::InvalidTiming`] unless `bits` fits into a `u16` code.
pub fn check_dac_resolution(bits: u8) -> Result<()> {
    if (1..=MAX_DAC_RESOLUTION).contains(&bits) {
        Ok(())
    } else {
        Err(WaveformError::InvalidTiming(format!(
            "DAC resolution must be between 1 and {MAX_DAC_RESOLUTION} bits, got {bits}"
        )))
    }
}

/// The DAC code of a sample in `[-1, 1]`: `trunc((x + 1) / 2 · (2^bits - 1))`.
#[inline]
pub fn dac_code(sample: f64, bits: u8) -> u16 {
    ((sample + 1.0) / 2.0 * full_scale(bits)) as u16
}

#[inline]
pub(crate) fn full_scale(bits: u8) -> f64 {
    2f64.powi(i32::from(bits)) - 1.0
}

/// One AWG channel: analog samples in `[-1, 1]` and a marker value per sample.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelBuffer {
    pub samples: Vec<f64>,
    pub markers: Vec<u8>,
}

impl ChannelBuffer {
    /// The DAC codes of the samples at the given resolution.
    pub fn quantize(&self, bits: u8) -> Result<Vec<u16>> {
        check_dac_resolution(bits)?;
        check_dac_range(&self.samples)?;
        Ok(self
            .samples
            .iter()
            .map(|&sample| dac_code(sample, bits))
            .collect())
    }
}

/// The I and Q channel buffers of a loaded drive waveform.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WaveformResult {
    pub i: ChannelBuffer,
    pub q: ChannelBuffer,
}

/// Maps waveforms onto the AWG buffers described by a [`HardwareBufferSpec`].
#[derive(Clone, Copy, Debug)]
pub struct AwgLoader<'a> {
    spec: &'a HardwareBufferSpec,
}

impl<'a> AwgLoader<'a> {
    pub fn new(spec: &'a HardwareBufferSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &HardwareBufferSpec {
        self.spec
    }

    /// Place an IQ waveform so that it ends just before the readout.
    ///
    /// Without explicit markers, the I markers are high except on `[1, period / 2)` and the Q
    /// markers drop from 3 to 2 at half the period. Explicit markers are written into both
    /// channels starting at `drive_wait_time`, all other markers being zero.
    pub fn load_drive_waveform(
        &self,
        iq: &[Complex64],
        markers: Option<&[u8]>,
    ) -> Result<WaveformResult> {
        let spec = self.spec;
        if iq.len() + spec.drive_wait_time > spec.readout_time {
            return Err(WaveformError::WaveformTooLong {
                length: iq.len(),
                available: spec.drive_window(),
            });
        }
        if spec.readout_time > spec.repetition_period {
            return Err(WaveformError::InvalidTiming(format!(
                "readout time {} lies beyond the repetition period {}",
                spec.readout_time, spec.repetition_period
            )));
        }

        let period = spec.repetition_period;
        let start = spec.readout_time - iq.len();
        tracing::debug!(
            samples = iq.len(),
            start,
            readout_time = spec.readout_time,
            "placing drive waveform"
        );

        let mut i_samples = vec![0.0; period];
        let mut q_samples = vec![0.0; period];
        for (offset, sample) in iq.iter().enumerate() {
            i_samples[start + offset] = sample.re;
            q_samples[start + offset] = sample.im;
        }

        let (i_markers, q_markers) = match markers {
            None => default_markers(period),
            Some(markers) => {
                let channel = explicit_markers(markers, spec.drive_wait_time, period)?;
                (channel.clone(), channel)
            }
        };

        Ok(WaveformResult {
            i: ChannelBuffer {
                samples: i_samples,
                markers: i_markers,
            },
            q: ChannelBuffer {
                samples: q_samples,
                markers: q_markers,
            },
        })
    }

    /// Load a fluxline waveform sampled every `sampling_interval` ns with the given strategy.
    pub fn load_fluxline_waveform(
        &self,
        waveform: &[f64],
        sampling_interval: f64,
        strategy: &dyn FluxlineLoadStrategy,
    ) -> Result<FluxlineBuffer> {
        strategy.load(waveform, sampling_interval, self.spec)
    }
}

fn default_markers(period: usize) -> (Vec<u8>, Vec<u8>) {
    let half = period / 2;
    let mut i_markers = vec![3; period];
    if half > 1 {
        i_markers[1..half].fill(0);
    }
    let mut q_markers = vec![3; period];
    q_markers[half..].fill(2);
    (i_markers, q_markers)
}

fn explicit_markers(markers: &[u8], start: usize, period: usize) -> Result<Vec<u8>> {
    if let Some((index, &value)) = markers.iter().find_position(|&&value| value > MAX_MARKER) {
        return Err(WaveformError::MarkerOutOfRange { index, value });
    }
    if start + markers.len() > period {
        return Err(WaveformError::WaveformTooLong {
            length: markers.len(),
            available: period.saturating_sub(start),
        });
    }
    let mut channel = vec![0; period];
    channel[start..start + markers.len()].copy_from_slice(markers);
    Ok(channel)
}
