//! Errors raised while building, compensating or loading waveforms.
//!
//! Every variant is a hard, synchronous failure: construction aborts and nothing partial is
//! returned. Optional corrections that cannot be applied (DRAG without an anharmonicity, sideband
//! mixing without calibration) are not errors; they are logged and skipped.

/// Errors that may occur while synthesizing or loading a waveform.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum WaveformError {
    #[error("invalid pulse length: {0}")]
    InvalidLength(String),

    #[error("pulse sequence of {length} samples does not fit before sample {end_at}")]
    SequenceTooLong { length: usize, end_at: usize },

    #[error(
        "sampling interval of {sampling_interval} ns is not supported; \
         {requirement}"
    )]
    SamplingInterval {
        sampling_interval: f64,
        requirement: &'static str,
    },

    #[error(
        "waveform sample {value} at index {index} exceeds the DAC range [-1, 1]"
    )]
    RangeExceeded { index: usize, value: f64 },

    #[error(
        "waveform of {length} samples exceeds the available {available} samples; \
         increase the repetition period or decrease the drive wait time"
    )]
    WaveformTooLong { length: usize, available: usize },

    #[error("calibration missing: {0}")]
    CalibrationMissing(&'static str),

    #[error("no calibration data at {frequency} GHz (tabulated range is {min} to {max} GHz)")]
    FrequencyOutOfRange { frequency: f64, min: f64, max: f64 },

    #[error("marker value {value} at index {index} does not fit into three marker bits")]
    MarkerOutOfRange { index: usize, value: u8 },

    #[error("inconsistent hardware timing: {0}")]
    InvalidTiming(String),
}

pub type Result<T> = std::result::Result<T, WaveformError>;
