//! Envelope synthesis and pulse placement.

pub mod envelope;
mod sequence;

pub use envelope::{
    gaussian_envelope, gaussian_envelope_with_derivative, gaussian_filter, rectangular_pulse,
    GaussianPulse,
};
pub use sequence::{Pulse, PulseSequence};
