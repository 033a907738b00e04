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

//! Pulse synthesis and waveform compensation for superconducting qubit drives.
//!
//! Within this crate you'll find:
//!
//! * [Envelope primitives] (Gaussian flanks, closed-form derivatives, rectangles)
//! * A [pulse sequence] that places envelopes in time and flattens them additively
//! * A [sideband modulator] applying drive rotation, DRAG correction and single-sideband mixing
//! * A [fluxline compensator] that deconvolves flux waveforms against the measured line response
//! * An [AWG loader] that maps finished waveforms onto fixed-size, quantized hardware buffers
//!
//! All waveform construction is pure: every function returns a freshly allocated buffer, and
//! calibration data is injected by reference rather than looked up globally.
//!
//! [AWG loader]: crate::awg::AwgLoader
//! [Envelope primitives]: crate::waveform::envelope
//! [fluxline compensator]: crate::fluxline::FluxResponseCompensator
//! [pulse sequence]: crate::waveform::PulseSequence
//! [sideband modulator]: crate::sideband::SidebandModulator

pub mod awg;
pub mod calibration;
pub mod config;
pub mod error;
pub mod fluxline;
mod macros;
pub mod qubit;
pub mod sideband;
pub mod units;
pub mod waveform;

pub use error::{Result, WaveformError};
