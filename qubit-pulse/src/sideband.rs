//! Drive rotation, DRAG correction and single-sideband mixing of baseband envelopes.

use std::f64::consts::PI;

use num_complex::Complex64;

use crate::calibration::{SidebandCalibration, SidebandCorrection};
use crate::imag;
use crate::units::{Cycles, Radians};

/// Sideband mixing parameters of a single pulse. Frequencies are in GHz, i.e. cycles per sample.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SidebandParams {
    /// Carrier (local oscillator) frequency, used to look up mixer corrections.
    pub carrier_frequency: Option<f64>,
    pub sideband_frequency: f64,
    /// Added to `sideband_frequency`.
    pub frequency_shift: f64,
    /// Phase reference of the sideband; defaults to the pulse delay.
    pub sideband_delay: Option<usize>,
}

impl SidebandParams {
    pub fn new(sideband_frequency: f64) -> Self {
        Self {
            sideband_frequency,
            ..Self::default()
        }
    }

    /// The frequency actually mixed onto the envelope.
    pub fn effective_frequency(&self) -> f64 {
        self.sideband_frequency + self.frequency_shift
    }
}

/// Derivative Removal by Adiabatic Gate parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragParams {
    pub f01: Option<f64>,
    pub f12: Option<f64>,
    pub drag_factor: f64,
}

impl Default for DragParams {
    fn default() -> Self {
        Self {
            f01: None,
            f12: None,
            drag_factor: 1.0,
        }
    }
}

impl DragParams {
    /// Anharmonicity `2π (f12 - f01)` in radians per sample, if both transitions are known.
    pub fn anharmonicity(&self) -> Option<f64> {
        Some(2.0 * PI * (self.f12? - self.f01?))
    }
}

/// Applies rotation, DRAG and sideband mixing to envelopes.
///
/// Mixing uses the injected [`SidebandCalibration`] when it has an entry for the pulse's
/// carrier/sideband pair, and ideal mixing otherwise.
#[derive(Clone, Copy, Default)]
pub struct SidebandModulator<'a> {
    calibration: Option<&'a dyn SidebandCalibration>,
}

impl std::fmt::Debug for SidebandModulator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SidebandModulator")
            .field("calibrated", &self.calibration.is_some())
            .finish()
    }
}

impl<'a> SidebandModulator<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_calibration(calibration: &'a dyn SidebandCalibration) -> Self {
        Self {
            calibration: Some(calibration),
        }
    }

    /// Rotate `envelope` by `angle`, add the DRAG quadrature if requested and mix the samples after
    /// `delay` with the sideband.
    ///
    /// DRAG adds `-(Re(d) i - Im(d)) / (2Δ) · drag_factor` for the derivative `d`; it is skipped
    /// with a warning when the derivative or either transition frequency is missing.
    pub fn modulate(
        &self,
        envelope: &[Complex64],
        derivative: Option<&[Complex64]>,
        angle: Radians<f64>,
        delay: usize,
        sideband: &SidebandParams,
        drag: Option<&DragParams>,
    ) -> Vec<Complex64> {
        let rotation = Complex64::cis(angle.0);
        let mut samples: Vec<Complex64> = envelope.iter().map(|sample| sample * rotation).collect();

        if let Some(drag) = drag {
            match (drag.anharmonicity(), derivative) {
                (Some(delta), Some(derivative)) => {
                    let scale = drag.drag_factor / (2.0 * delta);
                    samples
                        .iter_mut()
                        .zip(derivative)
                        .for_each(|(sample, slope)| {
                            *sample -= (imag!(slope.re) - slope.im) * scale;
                        });
                }
                (None, _) => tracing::warn!(
                    f01 = ?drag.f01,
                    f12 = ?drag.f12,
                    "DRAG correction skipped: transition frequencies f01 and f12 are both required"
                ),
                (_, None) => {
                    tracing::warn!("DRAG correction skipped: pulse shape has no derivative")
                }
            }
        }

        let frequency = sideband.effective_frequency();
        if frequency != 0.0 && delay < samples.len() {
            let mixing = self.sideband_waveform(
                samples.len() - delay,
                sideband.sideband_delay.unwrap_or(delay),
                frequency,
                sideband.carrier_frequency,
            );
            samples[delay..]
                .iter_mut()
                .zip(mixing)
                .for_each(|(sample, factor)| *sample *= factor);
        }

        samples
    }

    /// The `length` sideband factors `exp(i 2π f (k + sideband_delay))`, or their calibrated
    /// counterparts when a correction for `carrier_frequency` is known.
    pub fn sideband_waveform(
        &self,
        length: usize,
        sideband_delay: usize,
        frequency: f64,
        carrier_frequency: Option<f64>,
    ) -> Vec<Complex64> {
        let correction = self.correction(carrier_frequency, frequency);
        (0..length)
            .map(|index| {
                let phase = Cycles(frequency * (index + sideband_delay) as f64);
                let Radians(theta) = Radians::from(phase);
                match &correction {
                    Some(correction) => correction.mix(theta),
                    None => Complex64::cis(theta),
                }
            })
            .collect()
    }

    fn correction(
        &self,
        carrier_frequency: Option<f64>,
        sideband_frequency: f64,
    ) -> Option<SidebandCorrection> {
        let Some(calibration) = self.calibration else {
            tracing::warn!(
                sideband_frequency,
                "no sideband calibration available, using ideal mixing"
            );
            return None;
        };
        let Some(carrier_frequency) = carrier_frequency else {
            tracing::warn!(
                sideband_frequency,
                "no carrier frequency given, using ideal sideband mixing"
            );
            return None;
        };
        let correction = calibration.sideband_correction(carrier_frequency, sideband_frequency);
        if correction.is_none() {
            tracing::warn!(
                carrier_frequency,
                sideband_frequency,
                "sideband calibration has no entry, using ideal mixing"
            );
        }
        correction
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::calibration::{SidebandCalibrationPoint, SidebandCalibrationTable};
    use crate::real;
    use crate::waveform::{gaussian_envelope, gaussian_envelope_with_derivative};

    #[test]
    fn unmodulated_pulse_is_unchanged() {
        let envelope = gaussian_envelope(100.0, 0.0, 3.0, true).unwrap();
        let modulated = SidebandModulator::new().modulate(
            &envelope,
            None,
            Radians(0.0),
            0,
            &SidebandParams::default(),
            None,
        );
        assert_eq!(modulated, envelope);
    }

    #[test]
    fn rotation_turns_the_envelope() {
        let envelope = vec![real!(1.0), real!(0.5)];
        let modulated = SidebandModulator::new().modulate(
            &envelope,
            None,
            Radians(PI / 2.0),
            0,
            &SidebandParams::default(),
            None,
        );
        assert_relative_eq!(modulated[0], imag!(1.0), epsilon = 1e-15);
        assert_relative_eq!(modulated[1], imag!(0.5), epsilon = 1e-15);
    }

    #[test]
    fn drag_adds_scaled_derivative_on_the_other_quadrature() {
        let pulse = gaussian_envelope_with_derivative(10.0, 0, 3.0, true).unwrap();
        let derivative = pulse.derivative.clone().unwrap();
        let drag = DragParams {
            f01: Some(5.0),
            f12: Some(4.8),
            drag_factor: 0.5,
        };
        let modulated = SidebandModulator::new().modulate(
            &pulse.envelope,
            pulse.derivative.as_deref(),
            Radians(0.0),
            0,
            &SidebandParams::default(),
            Some(&drag),
        );

        let delta = 2.0 * PI * (4.8 - 5.0);
        for ((sample, envelope), slope) in modulated.iter().zip(&pulse.envelope).zip(&derivative) {
            assert_relative_eq!(sample.re, envelope.re, epsilon = 1e-12);
            assert_relative_eq!(sample.im, -slope.re / (2.0 * delta) * 0.5, epsilon = 1e-12);
        }
    }

    #[rstest]
    #[case(DragParams { f01: Some(5.0), f12: None, drag_factor: 1.0 }, true)]
    #[case(DragParams { f01: None, f12: Some(4.8), drag_factor: 1.0 }, true)]
    #[case(DragParams { f01: Some(5.0), f12: Some(4.8), drag_factor: 1.0 }, false)]
    fn drag_is_skipped_without_inputs(#[case] drag: DragParams, #[case] with_derivative: bool) {
        let pulse = gaussian_envelope_with_derivative(10.0, 0, 3.0, with_derivative).unwrap();
        let modulated = SidebandModulator::new().modulate(
            &pulse.envelope,
            pulse.derivative.as_deref(),
            Radians(0.0),
            0,
            &SidebandParams::default(),
            Some(&drag),
        );
        assert_eq!(modulated, pulse.envelope);
    }

    #[test]
    fn sideband_mixing_starts_after_the_delay() {
        let envelope = vec![real!(1.0); 6];
        let sideband = SidebandParams {
            sideband_frequency: 0.2,
            frequency_shift: 0.05,
            ..SidebandParams::default()
        };
        let modulated =
            SidebandModulator::new().modulate(&envelope, None, Radians(0.0), 2, &sideband, None);

        assert_eq!(&modulated[..2], &envelope[..2]);
        for (offset, sample) in modulated[2..].iter().enumerate() {
            // The sideband phase is referenced to the pulse delay.
            let expected = Complex64::cis(2.0 * PI * 0.25 * (offset + 2) as f64);
            assert_relative_eq!(*sample, expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn explicit_sideband_delay_sets_the_phase_reference() {
        let modulator = SidebandModulator::new();
        let waveform = modulator.sideband_waveform(3, 10, 0.1, None);
        assert_relative_eq!(waveform[0], Complex64::cis(2.0 * PI), epsilon = 1e-12);
        assert_relative_eq!(waveform[2], Complex64::cis(2.4 * PI), epsilon = 1e-12);
    }

    #[test]
    fn calibrated_mixing_applies_the_correction() {
        let correction = SidebandCorrection {
            i_amplitude: 0.9,
            q_amplitude: 1.1,
            q_phase: Radians(0.05),
        };
        let table = SidebandCalibrationTable::from(vec![
            SidebandCalibrationPoint {
                carrier_frequency: 5.0,
                sideband_frequency: -0.1,
                correction,
            },
            SidebandCalibrationPoint {
                carrier_frequency: 6.0,
                sideband_frequency: -0.1,
                correction,
            },
        ]);
        let modulator = SidebandModulator::with_calibration(&table);

        let calibrated = modulator.sideband_waveform(4, 0, -0.1, Some(5.5));
        for (index, sample) in calibrated.iter().enumerate() {
            let theta = -2.0 * PI * 0.1 * index as f64;
            assert_relative_eq!(sample.re, 0.9 * theta.cos(), epsilon = 1e-12);
            assert_relative_eq!(sample.im, 1.1 * (theta + 0.05).sin(), epsilon = 1e-12);
        }

        // Outside the tabulated carrier range the modulator falls back to ideal mixing.
        let fallback = modulator.sideband_waveform(4, 0, -0.1, Some(7.0));
        assert_eq!(fallback, SidebandModulator::new().sideband_waveform(4, 0, -0.1, None));
    }
}
