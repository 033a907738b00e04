//! A configured qubit: calibrated pulse synthesis plus loading into the AWG buffers.

mod parameters;
mod pulses;

use num_complex::Complex64;

use crate::awg::{AwgLoader, FluxlineBuffer, HardwareBufferSpec, WaveformResult};
use crate::calibration::{CalibrationTables, IqCalibration, IqCoefficients};
use crate::config::QubitConfig;
use crate::fluxline::{CompensationMode, FluxResponseCompensator};
use crate::waveform::PulseSequence;
use crate::{Result, WaveformError};

pub use parameters::{
    DriveParameters, FluxlineParameters, QubitParameters, TransitionFrequencies, ZPulseParameters,
};
pub use pulses::{
    EnvelopeShape, PulseGenerator, PulseSpan, RabiPulseRequest, RamseyRequest, RamseySequence,
    ZPulseRequest,
};

/// A qubit with its hardware layout, calibrated parameters and calibration tables.
#[derive(Clone, Debug, PartialEq)]
pub struct Qubit {
    hardware: HardwareBufferSpec,
    parameters: QubitParameters,
    calibration: CalibrationTables,
}

impl Qubit {
    /// Build a qubit from its configuration, rejecting inconsistent hardware timing.
    pub fn new(config: QubitConfig) -> Result<Self> {
        config.hardware.validate()?;
        Ok(Self {
            hardware: config.hardware,
            parameters: config.qubit,
            calibration: config.calibration,
        })
    }

    pub fn hardware(&self) -> &HardwareBufferSpec {
        &self.hardware
    }

    pub fn parameters(&self) -> &QubitParameters {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut QubitParameters {
        &mut self.parameters
    }

    pub fn calibration(&self) -> &CalibrationTables {
        &self.calibration
    }

    /// A pulse generator using this qubit's parameters and sideband calibration, if any.
    pub fn generator(&self) -> PulseGenerator<'_> {
        let generator = PulseGenerator::new(&self.parameters);
        match &self.calibration.sideband {
            Some(table) => generator.with_sideband_calibration(table),
            None => generator,
        }
    }

    pub fn loader(&self) -> AwgLoader<'_> {
        AwgLoader::new(&self.hardware)
    }

    /// Generate a Rabi pulse and load it so that it ends `request.delay` samples before the
    /// readout.
    ///
    /// The sideband frequency defaults to the configured one; with neither, the pulse cannot be
    /// loaded.
    pub fn load_rabi_pulse(&self, request: &RabiPulseRequest) -> Result<WaveformResult> {
        let sideband_frequency = request
            .sideband_frequency
            .or(self.parameters.drive.f_sb)
            .ok_or(WaveformError::CalibrationMissing(
                "no sideband frequency given or configured",
            ))?;
        let pulse_request = RabiPulseRequest {
            delay: 0,
            sideband_frequency: Some(sideband_frequency),
            ..request.clone()
        };
        let pulse = self.generator().rabi_pulse(&pulse_request)?;

        let mut sequence = PulseSequence::new();
        sequence.add_pulse(pulse, 0, None);
        sequence.add_wait(request.delay);
        self.load_waveform(&sequence.waveform(None)?, None)
    }

    /// Generate a Ramsey sequence and load it so that the readout follows the second π/2 pulse
    /// after `request.readout_delay` samples.
    pub fn load_ramsey_sequence(&self, request: &RamseyRequest) -> Result<WaveformResult> {
        let ramsey = self.generator().ramsey_sequence(request)?;
        tracing::debug!(
            samples = ramsey.waveform.len(),
            readout_time = ramsey.readout_time,
            "loading Ramsey sequence"
        );

        let mut sequence = PulseSequence::new();
        sequence.add_pulse(ramsey.waveform, 0, None);
        sequence.set_position(ramsey.readout_time);
        self.load_waveform(&sequence.waveform(None)?, None)
    }

    /// Load an IQ waveform into the drive AWG buffers.
    pub fn load_waveform(
        &self,
        iq: &[Complex64],
        markers: Option<&[u8]>,
    ) -> Result<WaveformResult> {
        self.loader().load_drive_waveform(iq, markers)
    }

    /// Pre-distort a fluxline waveform against the measured line response.
    pub fn compensate_fluxline_waveform(
        &self,
        waveform: &[f64],
        mode: CompensationMode,
    ) -> Result<Vec<f64>> {
        let response = self
            .calibration
            .fluxline
            .as_ref()
            .ok_or(WaveformError::CalibrationMissing(
                "no fluxline response calibration available",
            ))?;
        let fluxline = &self.parameters.fluxline;
        FluxResponseCompensator::with_settings(response, fluxline.compensator).compensate(
            waveform,
            fluxline.sampling_interval,
            fluxline.compensation_factor,
            mode,
        )
    }

    /// Load a fluxline waveform, compensated if configured so, with the configured output.
    pub fn load_fluxline_waveform(&self, waveform: &[f64]) -> Result<FluxlineBuffer> {
        let fluxline = &self.parameters.fluxline;
        let strategy = fluxline.output.strategy();
        if fluxline.compensate_response {
            let compensated =
                self.compensate_fluxline_waveform(waveform, CompensationMode::Hardware)?;
            self.loader()
                .load_fluxline_waveform(&compensated, fluxline.sampling_interval, strategy)
        } else {
            self.loader()
                .load_fluxline_waveform(waveform, fluxline.sampling_interval, strategy)
        }
    }

    /// Mixer calibration at the configured drive frequency.
    pub fn iq_coefficients(&self) -> Result<IqCoefficients> {
        let frequency = self
            .parameters
            .drive
            .drive_frequency
            .ok_or(WaveformError::CalibrationMissing("drive frequency is not set"))?;
        self.calibration
            .iq
            .as_ref()
            .ok_or(WaveformError::CalibrationMissing(
                "no IQ mixer calibration available",
            ))?
            .iq_coefficients(frequency)
    }

    /// I and Q channel offsets that null the carrier leakage at the drive frequency.
    pub fn drive_offsets(&self) -> Result<(f64, f64)> {
        let coefficients = self.iq_coefficients()?;
        Ok((coefficients.offset_i, coefficients.offset_q))
    }

    /// Channel amplitudes producing the requested output powers in dB.
    ///
    /// Without IQ calibration the requested values are taken as amplitudes.
    pub fn drive_amplitudes(
        &self,
        power_i: Option<f64>,
        power_q: Option<f64>,
    ) -> Result<(Option<f64>, Option<f64>)> {
        if self.calibration.iq.is_none() {
            tracing::warn!("no IQ mixer calibration available, using powers as amplitudes");
            return Ok((power_i, power_q));
        }
        let coefficients = self.iq_coefficients()?;
        Ok((
            power_i.map(|power| coefficients.amplitude_i(power)),
            power_q.map(|power| coefficients.amplitude_q(power)),
        ))
    }
}
