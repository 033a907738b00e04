//! Calibrated parameters of a single qubit.

use serde::{Deserialize, Serialize};

use crate::awg::FluxlineOutput;
use crate::fluxline::CompensatorSettings;
use crate::sideband::DragParams;
use crate::units::Radians;

/// Everything that pulse synthesis needs to know about a qubit. Frequencies are in GHz, times in
/// ns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QubitParameters {
    pub drive: DriveParameters,
    pub z: ZPulseParameters,
    pub frequencies: TransitionFrequencies,
    /// Rotation applied to every drive pulse, compensating the phase of the drive line.
    pub drive_rotation: Radians<f64>,
    pub fluxline: FluxlineParameters,
}

impl QubitParameters {
    /// DRAG parameters, if DRAG is enabled for the XY pulses.
    pub fn drag(&self) -> Option<DragParams> {
        self.drive.use_drag.then(|| DragParams {
            f01: self.frequencies.f01,
            f12: self.frequencies.f12,
            drag_factor: self.drive.drag_factor,
        })
    }
}

/// XY drive calibration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveParameters {
    /// Area of a π pulse.
    pub t_pi: Option<f64>,
    /// Sideband frequency used when a request names none.
    pub f_sb: Option<f64>,
    /// Added to every sideband frequency.
    pub f_shift: f64,
    pub use_drag: bool,
    pub drag_factor: f64,
    /// Carrier frequency of the drive microwave generator.
    pub drive_frequency: Option<f64>,
}

impl Default for DriveParameters {
    fn default() -> Self {
        Self {
            t_pi: None,
            f_sb: None,
            f_shift: 0.0,
            use_drag: false,
            drag_factor: 1.0,
            drive_frequency: None,
        }
    }
}

/// Z (flux) pulse calibration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZPulseParameters {
    pub t_pi: Option<f64>,
    pub drive_amplitude: Option<f64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionFrequencies {
    pub f01: Option<f64>,
    pub f12: Option<f64>,
}

/// How fluxline waveforms are compensated and which instrument plays them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluxlineParameters {
    pub output: FluxlineOutput,
    pub compensate_response: bool,
    /// Exponent of the response in the compensation; `1.0` compensates fully.
    pub compensation_factor: f64,
    pub sampling_interval: f64,
    pub compensator: CompensatorSettings,
}

impl Default for FluxlineParameters {
    fn default() -> Self {
        Self {
            output: FluxlineOutput::default(),
            compensate_response: true,
            compensation_factor: 1.0,
            sampling_interval: 1.0,
            compensator: CompensatorSettings::default(),
        }
    }
}
