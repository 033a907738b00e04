//! Synthesis of calibrated Rabi, Z and Ramsey pulses.

use std::f64::consts::PI;

use num_complex::Complex64;

use super::QubitParameters;
use crate::calibration::SidebandCalibration;
use crate::sideband::{SidebandModulator, SidebandParams};
use crate::units::Radians;
use crate::waveform::{
    gaussian_envelope, gaussian_envelope_with_derivative, rectangular_pulse, PulseSequence,
};
use crate::{Result, WaveformError};

/// The extent of a pulse, either as an area in samples or as a rotation angle.
///
/// A rotation is converted to an area through the calibrated π-pulse area. Negative values are
/// realized as a positive area with the drive rotated by half a turn.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PulseSpan {
    Length(f64),
    Phase(Radians<f64>),
}

impl PulseSpan {
    /// Build a span from optional length and phase arguments, exactly one of which must be given.
    pub fn from_options(length: Option<f64>, phase: Option<f64>) -> Result<Self> {
        match (length, phase) {
            (Some(length), None) => Ok(Self::Length(length)),
            (None, Some(phase)) => Ok(Self::Phase(Radians(phase))),
            _ => Err(WaveformError::InvalidLength(
                "specify either the length or the phase of the pulse".to_string(),
            )),
        }
    }

    /// The non-negative pulse area and the additional rotation that encodes its sign.
    pub fn resolve(self, t_pi: Option<f64>) -> Result<(f64, Radians<f64>)> {
        let signed = match self {
            Self::Length(length) => length,
            Self::Phase(phase) => {
                let t_pi = t_pi.ok_or(WaveformError::CalibrationMissing(
                    "π pulse length is not calibrated",
                ))?;
                phase.0 * t_pi / PI
            }
        };
        check_finite(signed)?;
        if signed < 0.0 {
            Ok((-signed, Radians::HALF_TURN))
        } else {
            Ok((signed, Radians(0.0)))
        }
    }
}

/// The envelope of a pulse.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EnvelopeShape {
    /// Gaussian flanks of the given width around a plateau.
    Gaussian { flank: f64 },
    Rectangular,
}

impl Default for EnvelopeShape {
    fn default() -> Self {
        Self::Gaussian { flank: 3.0 }
    }
}

/// A drive pulse, rotated and mixed onto the sideband.
#[derive(Clone, Debug, PartialEq)]
pub struct RabiPulseRequest {
    pub span: PulseSpan,
    pub delay: usize,
    pub shape: EnvelopeShape,
    /// Amplitude of rectangular pulses; Gaussian pulses are normalized to their area.
    pub height: f64,
    pub angle: Radians<f64>,
    /// Overrides the configured drive frequency.
    pub carrier_frequency: Option<f64>,
    /// Overrides the configured sideband frequency.
    pub sideband_frequency: Option<f64>,
    /// Overrides the configured frequency shift.
    pub frequency_shift: Option<f64>,
    pub sideband_delay: Option<usize>,
}

impl RabiPulseRequest {
    pub fn new(span: PulseSpan) -> Self {
        Self {
            span,
            delay: 0,
            shape: EnvelopeShape::default(),
            height: 1.0,
            angle: Radians(0.0),
            carrier_frequency: None,
            sideband_frequency: None,
            frequency_shift: None,
            sideband_delay: None,
        }
    }
}

/// A flux pulse on the qubit's Z control.
#[derive(Clone, Debug, PartialEq)]
pub struct ZPulseRequest {
    pub span: PulseSpan,
    pub delay: usize,
    pub shape: EnvelopeShape,
    /// Overall amplitude; replaced by the calibrated Z drive amplitude for [`PulseSpan::Phase`].
    pub height: f64,
}

impl ZPulseRequest {
    pub fn new(span: PulseSpan) -> Self {
        Self {
            span,
            delay: 0,
            shape: EnvelopeShape::default(),
            height: 1.0,
        }
    }
}

/// Two π/2 pulses separated by a free evolution interval, optionally refocused by a π pulse.
#[derive(Clone, Debug, PartialEq)]
pub struct RamseyRequest {
    pub delay: usize,
    pub interval: usize,
    /// Area of the π pulse; defaults to the calibrated one.
    pub pi_length: Option<f64>,
    pub spin_echo: bool,
    pub flank: f64,
    /// Extra wait between the second π/2 pulse and the readout.
    pub readout_delay: usize,
}

impl Default for RamseyRequest {
    fn default() -> Self {
        Self {
            delay: 0,
            interval: 0,
            pi_length: None,
            spin_echo: false,
            flank: 1.0,
            readout_delay: 0,
        }
    }
}

/// A Ramsey waveform and the sample at which it should be read out.
#[derive(Clone, Debug, PartialEq)]
pub struct RamseySequence {
    pub waveform: Vec<Complex64>,
    pub readout_time: usize,
}

/// Builds pulses from a qubit's calibrated parameters.
#[derive(Clone, Copy)]
pub struct PulseGenerator<'a> {
    parameters: &'a QubitParameters,
    sideband_calibration: Option<&'a dyn SidebandCalibration>,
}

impl std::fmt::Debug for PulseGenerator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseGenerator")
            .field("parameters", self.parameters)
            .field("sideband_calibrated", &self.sideband_calibration.is_some())
            .finish()
    }
}

impl<'a> PulseGenerator<'a> {
    pub fn new(parameters: &'a QubitParameters) -> Self {
        Self {
            parameters,
            sideband_calibration: None,
        }
    }

    pub fn with_sideband_calibration(mut self, calibration: &'a dyn SidebandCalibration) -> Self {
        self.sideband_calibration = Some(calibration);
        self
    }

    pub fn parameters(&self) -> &QubitParameters {
        self.parameters
    }

    fn modulator(&self) -> SidebandModulator<'a> {
        match self.sideband_calibration {
            Some(calibration) => SidebandModulator::with_calibration(calibration),
            None => SidebandModulator::new(),
        }
    }

    /// A drive pulse of the requested area or rotation.
    ///
    /// The envelope is rotated by the request's angle plus the configured drive rotation, DRAG
    /// corrected if enabled, and mixed onto the sideband frequency plus frequency shift.
    pub fn rabi_pulse(&self, request: &RabiPulseRequest) -> Result<Vec<Complex64>> {
        let drive = &self.parameters.drive;
        let (length, sign) = request.span.resolve(drive.t_pi)?;
        let angle = request.angle + sign + self.parameters.drive_rotation;

        let (envelope, derivative) = match request.shape {
            EnvelopeShape::Gaussian { flank } => {
                let pulse = gaussian_envelope_with_derivative(length, request.delay, flank, true)?;
                (pulse.envelope, pulse.derivative)
            }
            EnvelopeShape::Rectangular => {
                (rectangle(length, request.delay, request.height)?, None)
            }
        };

        let sideband = SidebandParams {
            carrier_frequency: request.carrier_frequency.or(drive.drive_frequency),
            sideband_frequency: request.sideband_frequency.unwrap_or(0.0),
            frequency_shift: request.frequency_shift.unwrap_or(drive.f_shift),
            sideband_delay: request.sideband_delay,
        };
        let drag = self.parameters.drag();
        let modulated = self.modulator().modulate(
            &envelope,
            derivative.as_deref(),
            angle,
            request.delay,
            &sideband,
            drag.as_ref(),
        );

        let mut sequence = PulseSequence::new();
        sequence.add_pulse(modulated, 0, None);
        sequence.waveform(None)
    }

    /// A real-valued flux pulse.
    ///
    /// Gaussian Z pulses are not normalized: their plateau sits at `height`. A negative area
    /// flips the sign of the pulse.
    pub fn z_pulse(&self, request: &ZPulseRequest) -> Result<Vec<f64>> {
        let z = &self.parameters.z;
        let (signed_length, height) = match request.span {
            PulseSpan::Length(length) => (length, request.height),
            PulseSpan::Phase(phase) => {
                let t_pi = z.t_pi.ok_or(WaveformError::CalibrationMissing(
                    "Z π pulse length is not calibrated",
                ))?;
                let amplitude = z.drive_amplitude.ok_or(WaveformError::CalibrationMissing(
                    "Z drive amplitude is not calibrated",
                ))?;
                (phase.0 * t_pi / PI, amplitude)
            }
        };
        check_finite(signed_length)?;
        let (length, height) = if signed_length < 0.0 {
            (-signed_length, -height)
        } else {
            (signed_length, height)
        };

        let envelope = match request.shape {
            EnvelopeShape::Gaussian { flank } => {
                gaussian_envelope(length, request.delay as f64, flank, false)?
            }
            EnvelopeShape::Rectangular => rectangle(length, request.delay, 1.0)?,
        };
        Ok(envelope.into_iter().map(|sample| sample.re * height).collect())
    }

    /// Two normalized Gaussian π/2 pulses, `interval` samples apart, after `delay` samples.
    ///
    /// With `spin_echo`, a π pulse is centred in the interval, which must then be long enough to
    /// hold it. The readout follows the second π/2 pulse after `readout_delay` samples.
    pub fn ramsey_sequence(&self, request: &RamseyRequest) -> Result<RamseySequence> {
        let pi_length = request
            .pi_length
            .or(self.parameters.drive.t_pi)
            .ok_or(WaveformError::CalibrationMissing("π pulse length is not calibrated"))?;
        let half_pi = gaussian_envelope(pi_length / 2.0, 0.0, request.flank, true)?;
        let half_length = half_pi.len();

        let mut sequence = PulseSequence::new();
        sequence.add_pulse(half_pi.clone(), request.delay, Some(0));

        if request.spin_echo {
            let pi = gaussian_envelope(pi_length, 0.0, request.flank, true)?;
            if pi.len() > request.interval {
                return Err(WaveformError::InvalidLength(format!(
                    "spin echo π pulse of {} samples does not fit into an interval of {} samples",
                    pi.len(),
                    request.interval
                )));
            }
            let centred = request.delay + half_length + (request.interval - pi.len()) / 2;
            sequence.add_pulse(pi, 0, Some(centred));
        }

        sequence.add_pulse(half_pi, 0, Some(request.delay + half_length + request.interval));

        let waveform = sequence.waveform(None)?;
        Ok(RamseySequence {
            readout_time: waveform.len() + request.readout_delay,
            waveform,
        })
    }
}

fn check_finite(area: f64) -> Result<()> {
    if area.is_finite() {
        Ok(())
    } else {
        Err(WaveformError::InvalidLength(format!(
            "pulse area must be a finite number of samples, got {area}"
        )))
    }
}

/// A rectangle of `length` rounded to whole samples.
fn rectangle(length: f64, delay: usize, height: f64) -> Result<Vec<Complex64>> {
    let samples = length.round() as usize;
    if samples.checked_add(delay).is_none() {
        return Err(WaveformError::InvalidLength(format!(
            "rectangular pulse of {length} samples after a delay of {delay} samples is too long"
        )));
    }
    Ok(rectangular_pulse(samples, delay, height))
}
