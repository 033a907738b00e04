use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use approx::assert_abs_diff_eq;
use pretty_assertions::assert_eq;
use rstest::rstest;

use qubit_pulse::awg::{AwgLoader, FluxlineOutput, HardwareBufferSpec};
use qubit_pulse::config::QubitConfig;
use qubit_pulse::fluxline::CompensationMode;
use qubit_pulse::qubit::{PulseSpan, Qubit, RabiPulseRequest, RamseyRequest, ZPulseRequest};
use qubit_pulse::sideband::{SidebandModulator, SidebandParams};
use qubit_pulse::units::Radians;
use qubit_pulse::waveform::{gaussian_envelope, PulseSequence};
use qubit_pulse::WaveformError;

fn load_qubit(path: &Path) -> Qubit {
    let config = QubitConfig::from_path(path)
        .unwrap_or_else(|error| panic!("Should be able to load {path:?}: {error}"));
    Qubit::new(config).expect("configurations under test are valid")
}

/// A flux step of the given height with tanh edges.
fn smooth_step(length: usize, height: f64) -> Vec<f64> {
    (0..length)
        .map(|index| {
            let t = index as f64;
            let rise = ((t - length as f64 * 0.25) / 8.0).tanh();
            let fall = ((t - length as f64 * 0.75) / 8.0).tanh();
            height * (rise - fall) / 2.0
        })
        .collect()
}

#[test]
fn unmodulated_envelope_survives_the_pipeline() {
    let spec = HardwareBufferSpec::default();
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

    let mut sequence = PulseSequence::new();
    sequence.add_pulse(modulated, 0, None);
    let waveform = sequence.waveform(None).unwrap();

    let loaded = AwgLoader::new(&spec)
        .load_drive_waveform(&waveform, None)
        .unwrap();
    let start = spec.readout_time - envelope.len();
    for (index, sample) in envelope.iter().enumerate() {
        assert_eq!(loaded.i.samples[start + index], sample.re);
        assert_eq!(loaded.q.samples[start + index], 0.0);
    }
    // The last sample of the pulse sits just before the readout.
    assert_eq!(
        loaded.i.samples[spec.readout_time - 1],
        envelope[envelope.len() - 1].re
    );
    assert_eq!(loaded.i.samples[spec.readout_time], 0.0);

    let area: f64 = loaded.i.samples.iter().sum();
    assert_abs_diff_eq!(area, 100.0, epsilon = 1e-6);
}

#[rstest]
fn configured_qubits_load_pulses(#[files("tests/configs/*.json")] path: PathBuf) {
    let qubit = load_qubit(&path);
    let spec = qubit.hardware().clone();

    let loaded = qubit
        .load_rabi_pulse(&RabiPulseRequest::new(PulseSpan::Phase(Radians(PI))))
        .unwrap();
    assert_eq!(loaded.i.samples.len(), spec.repetition_period);
    assert_eq!(loaded.q.markers.len(), spec.repetition_period);

    let codes = loaded.i.quantize(spec.dac_resolution).unwrap();
    let midscale = ((1u32 << spec.dac_resolution) - 1) / 2;
    // Nothing is played after the readout.
    assert!(codes[spec.readout_time..]
        .iter()
        .all(|&code| u32::from(code) == midscale));
    // The π pulse leaves a trace right before it.
    assert!(loaded.i.samples[spec.readout_time - 40..spec.readout_time]
        .iter()
        .any(|sample| sample.abs() > 1e-3));

    let ramsey = qubit
        .load_ramsey_sequence(&RamseyRequest {
            interval: 200,
            spin_echo: true,
            ..RamseyRequest::default()
        })
        .unwrap();
    assert!(ramsey.i.quantize(spec.dac_resolution).is_ok());
}

#[rstest]
fn configured_qubits_load_fluxline_waveforms(#[files("tests/configs/*.json")] path: PathBuf) {
    let qubit = load_qubit(&path);
    let fluxline = &qubit.parameters().fluxline;
    let waveform = smooth_step(200, 0.3);

    let compensated = qubit
        .compensate_fluxline_waveform(&waveform, CompensationMode::Simulate)
        .unwrap();
    assert!(compensated.len().is_power_of_two());
    assert!(compensated.len() >= waveform.len() + fluxline.compensator.guard_samples);
    assert_eq!(compensated[0], waveform[0]);

    let buffer = qubit.load_fluxline_waveform(&waveform).unwrap();
    match fluxline.output {
        FluxlineOutput::Awg => {
            assert_eq!(buffer.codes.len(), qubit.hardware().fluxline_buffer_length());
            assert_eq!(buffer.markers.len(), buffer.codes.len());
            assert_eq!(buffer.period, None);
        }
        FluxlineOutput::Direct => {
            let lead_in = 2 * qubit.hardware().fluxline_wait_time;
            assert_eq!(buffer.codes.len(), lead_in + compensated.len());
            assert_eq!(buffer.period, Some(buffer.codes.len() as f64 / 2.0));
            assert!(buffer.markers.is_empty());
        }
    }
}

#[test]
fn z_pulse_overshoot_is_caught_before_hardware() {
    let config = QubitConfig::from_path("tests/configs/transmon_awg.json").unwrap();
    let qubit = Qubit::new(config).unwrap();

    // A Z rotation of 3π at the calibrated amplitude is fine, a plateau above full scale is not.
    let within = qubit
        .generator()
        .z_pulse(&ZPulseRequest::new(PulseSpan::Phase(Radians(3.0 * PI))))
        .unwrap();
    assert!(within.iter().all(|sample| sample.abs() <= 0.35 + 1e-12));

    let beyond = qubit
        .generator()
        .z_pulse(&ZPulseRequest {
            height: 1.4,
            ..ZPulseRequest::new(PulseSpan::Length(50.0))
        })
        .unwrap();
    assert!(matches!(
        qubit.load_fluxline_waveform(&beyond),
        Err(WaveformError::RangeExceeded { .. })
    ));
}
