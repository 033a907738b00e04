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

//! Pre-distortion of fluxline waveforms against the measured line response.
//!
//! The fluxline between the AWG and the qubit low-pass filters and rings. Given its transfer
//! function, the waveform to play is obtained by dividing the waveform's spectrum by the response.
//! A Gaussian low-pass mask keeps the division from amplifying frequencies that the response
//! measurement does not resolve.

use num_complex::Complex64;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};

use crate::awg::check_dac_range;
use crate::calibration::FluxlineResponse;
use crate::waveform::gaussian_filter;
use crate::{real, Result, WaveformError};

/// Finest supported sampling interval, in ns.
pub const MIN_SAMPLING_INTERVAL: f64 = 0.5;

/// Whether the compensated waveform is destined for hardware.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum CompensationMode {
    /// Samples outside the DAC range are rejected.
    #[default]
    Hardware,
    /// The raw deconvolution result is returned, whatever its range.
    Simulate,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompensatorSettings {
    /// Cutoff of the low-pass mask relative to the Nyquist frequency; `None` disables the mask.
    pub low_pass_cutoff: Option<f64>,
    /// Minimum number of padding samples appended before the transform.
    pub guard_samples: usize,
}

impl Default for CompensatorSettings {
    fn default() -> Self {
        Self {
            low_pass_cutoff: Some(0.45),
            guard_samples: 1000,
        }
    }
}

/// Deconvolves waveforms against an injected [`FluxlineResponse`].
pub struct FluxResponseCompensator<'a> {
    response: &'a dyn FluxlineResponse,
    settings: CompensatorSettings,
}

impl std::fmt::Debug for FluxResponseCompensator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FluxResponseCompensator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<'a> FluxResponseCompensator<'a> {
    pub fn new(response: &'a dyn FluxlineResponse) -> Self {
        Self::with_settings(response, CompensatorSettings::default())
    }

    pub fn with_settings(response: &'a dyn FluxlineResponse, settings: CompensatorSettings) -> Self {
        Self { response, settings }
    }

    pub fn settings(&self) -> &CompensatorSettings {
        &self.settings
    }

    /// Pre-distort `waveform`, sampled every `sampling_interval` ns, so that the line plays it
    /// back undistorted. `factor` is the exponent applied to the response, with `1.0` being a
    /// full compensation.
    ///
    /// The waveform is padded with its last sample to the next power of two of at least
    /// `len + guard_samples` samples, and the result keeps that padded length; the padding
    /// carries the settling of the line after the waveform ends. The first and last samples of
    /// the result equal those of the input.
    ///
    /// # Errors
    ///
    /// - [`WaveformError::SamplingInterval`] below 0.5 ns,
    /// - [`WaveformError::InvalidLength`] for an empty waveform,
    /// - [`WaveformError::FrequencyOutOfRange`] if the response is not tabulated up to
    ///   `1 / sampling_interval`,
    /// - [`WaveformError::RangeExceeded`] in [`CompensationMode::Hardware`] if a sample of the
    ///   result leaves `[-1, 1]`.
    pub fn compensate(
        &self,
        waveform: &[f64],
        sampling_interval: f64,
        factor: f64,
        mode: CompensationMode,
    ) -> Result<Vec<f64>> {
        if sampling_interval.is_nan() || sampling_interval < MIN_SAMPLING_INTERVAL {
            return Err(WaveformError::SamplingInterval {
                sampling_interval,
                requirement: "response compensation needs a sampling interval of at least 0.5 ns",
            });
        }
        let (Some(&first), Some(&last)) = (waveform.first(), waveform.last()) else {
            return Err(WaveformError::InvalidLength(
                "cannot compensate an empty fluxline waveform".to_string(),
            ));
        };

        let padded_length = (waveform.len() + self.settings.guard_samples).next_power_of_two();
        tracing::debug!(
            samples = waveform.len(),
            padded_length,
            sampling_interval,
            factor,
            "compensating fluxline waveform"
        );

        let mut spectrum: Vec<Complex64> = waveform
            .iter()
            .chain(std::iter::repeat(&last))
            .take(padded_length)
            .map(|&sample| real!(sample))
            .collect();

        let mut planner = FftPlanner::<f64>::new();
        planner.plan_fft_forward(padded_length).process(&mut spectrum);

        let nyquist_bin = padded_length / 2;
        for (bin, value) in spectrum.iter_mut().enumerate().take(nyquist_bin + 1) {
            *value *= self.correction(bin, padded_length, sampling_interval, factor)?;
        }
        // Mirror the corrected half so that the inverse transform is real.
        for bin in 1..padded_length - nyquist_bin {
            spectrum[padded_length - bin] = spectrum[bin].conj();
        }
        spectrum[0].im = 0.0;
        spectrum[nyquist_bin].im = 0.0;

        planner.plan_fft_inverse(padded_length).process(&mut spectrum);

        let normalization = padded_length as f64;
        let mut compensated: Vec<f64> = spectrum
            .into_iter()
            .map(|value| value.re / normalization)
            .collect();
        compensated[0] = first;
        compensated[padded_length - 1] = last;

        if mode == CompensationMode::Hardware {
            check_dac_range(&compensated)?;
        }
        Ok(compensated)
    }

    /// The factor `(mask / response)^factor` applied to spectral bin `bin`.
    ///
    /// The response is read on an axis running from `0` at DC to `1 / sampling_interval` at the
    /// Nyquist bin, which is how response tables are measured. The mask takes the position of the
    /// bin relative to the Nyquist bin.
    fn correction(
        &self,
        bin: usize,
        padded_length: usize,
        sampling_interval: f64,
        factor: f64,
    ) -> Result<Complex64> {
        let nyquist_bin = padded_length / 2;
        let relative = if nyquist_bin == 0 {
            0.0
        } else {
            bin as f64 / nyquist_bin as f64
        };
        let response = self.response.response(relative / sampling_interval)?;
        let mask = match self.settings.low_pass_cutoff {
            Some(cutoff) => gaussian_filter(relative, cutoff),
            None => 1.0,
        };
        Ok((response / mask).powf(factor).inv())
    }
}
