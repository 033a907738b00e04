//! Loading strategies for fluxline waveforms.
//!
//! The fluxline can be driven either by a channel of the drive AWG, triggered once per repetition,
//! or by a dedicated arbitrary waveform driver with its own 0.5 ns clock. The two differ in
//! sampling, encoding and buffer layout, so each is a [`FluxlineLoadStrategy`].

use serde::{Deserialize, Serialize};

use super::{check_dac_range, check_dac_resolution, dac_code, full_scale, HardwareBufferSpec};
use crate::fluxline::MIN_SAMPLING_INTERVAL;
use crate::{Result, WaveformError};

/// Marker value written along the whole AWG fluxline buffer.
const FLUXLINE_MARKER: u8 = 3;

/// Shortest buffer accepted by the direct driver, in native samples.
const DIRECT_MIN_SAMPLES: usize = 150;

/// A fluxline waveform in the form the instrument accepts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FluxlineBuffer {
    pub codes: Vec<u16>,
    /// One marker per code, or empty if the instrument has no markers.
    pub markers: Vec<u8>,
    /// Playback period in ns for instruments that are not slaved to the repetition period.
    pub period: Option<f64>,
}

/// Turns a fluxline waveform sampled every `sampling_interval` ns into an instrument buffer.
pub trait FluxlineLoadStrategy {
    fn load(
        &self,
        waveform: &[f64],
        sampling_interval: f64,
        spec: &HardwareBufferSpec,
    ) -> Result<FluxlineBuffer>;
}

/// Selects one of the built-in strategies by name.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FluxlineOutput {
    #[default]
    Awg,
    Direct,
}

impl FluxlineOutput {
    pub fn strategy(self) -> &'static dyn FluxlineLoadStrategy {
        match self {
            Self::Awg => &AwgFluxlineStrategy,
            Self::Direct => &DirectFluxlineStrategy,
        }
    }
}

/// Plays the fluxline on a channel of the drive AWG.
///
/// The buffer spans the repetition period minus the guard time and holds the first sample of the
/// waveform wherever the waveform itself is not playing. The waveform starts at
/// `drive_wait_time - fluxline_trigger_delay`, so that the trigger latency lines it up with the
/// drive window.
#[derive(Clone, Copy, Debug, Default)]
pub struct AwgFluxlineStrategy;

impl FluxlineLoadStrategy for AwgFluxlineStrategy {
    fn load(
        &self,
        waveform: &[f64],
        sampling_interval: f64,
        spec: &HardwareBufferSpec,
    ) -> Result<FluxlineBuffer> {
        if sampling_interval != 1.0 {
            return Err(WaveformError::SamplingInterval {
                sampling_interval,
                requirement: "fluxline waveforms played by the AWG must be sampled every 1 ns",
            });
        }
        check_dac_resolution(spec.dac_resolution)?;
        let Some(&first) = waveform.first() else {
            return Err(WaveformError::InvalidLength(
                "cannot load an empty fluxline waveform".to_string(),
            ));
        };

        let available = spec
            .fluxline_buffer_length()
            .saturating_sub(spec.drive_wait_time);
        if waveform.len() > available {
            return Err(WaveformError::WaveformTooLong {
                length: waveform.len(),
                available,
            });
        }
        let Some(start) = spec
            .drive_wait_time
            .checked_sub(spec.fluxline_trigger_delay)
        else {
            return Err(WaveformError::InvalidTiming(format!(
                "drive wait time {} cannot absorb the fluxline trigger delay of {} ns",
                spec.drive_wait_time, spec.fluxline_trigger_delay
            )));
        };
        check_dac_range(waveform)?;

        let length = spec.fluxline_buffer_length();
        let mut samples = vec![first; length];
        samples[start..start + waveform.len()].copy_from_slice(waveform);
        tracing::debug!(
            samples = waveform.len(),
            start,
            buffer = length,
            "placing fluxline waveform on the AWG"
        );

        Ok(FluxlineBuffer {
            codes: samples
                .iter()
                .map(|&sample| dac_code(sample, spec.dac_resolution))
                .collect(),
            markers: vec![FLUXLINE_MARKER; length],
            period: None,
        })
    }
}

/// Plays the fluxline on a dedicated driver clocked at 0.5 ns.
///
/// Waveforms shorter than 150 native samples are extended with their last value. Coarser
/// sampling intervals must be integer multiples of 0.5 ns and are upsampled by linear
/// interpolation. The buffer opens with `2 · fluxline_wait_time` samples of the first value.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectFluxlineStrategy;

impl DirectFluxlineStrategy {
    fn upsampling_factor(sampling_interval: f64) -> Result<usize> {
        let ratio = sampling_interval / MIN_SAMPLING_INTERVAL;
        if ratio >= 1.0 && approx::relative_eq!(ratio, ratio.round(), max_relative = 1e-9) {
            Ok(ratio.round() as usize)
        } else {
            Err(WaveformError::SamplingInterval {
                sampling_interval,
                requirement: "the direct fluxline driver needs a multiple of 0.5 ns",
            })
        }
    }
}

impl FluxlineLoadStrategy for DirectFluxlineStrategy {
    fn load(
        &self,
        waveform: &[f64],
        sampling_interval: f64,
        spec: &HardwareBufferSpec,
    ) -> Result<FluxlineBuffer> {
        let factor = Self::upsampling_factor(sampling_interval)?;
        check_dac_resolution(spec.dac_resolution)?;
        let Some(&last) = waveform.last() else {
            return Err(WaveformError::InvalidLength(
                "cannot load an empty fluxline waveform".to_string(),
            ));
        };
        check_dac_range(waveform)?;

        // Codes are centred on 2^(bits - 1) - 1, one below the AWG convention at full scale.
        let half_scale = (full_scale(spec.dac_resolution) + 1.0) / 2.0 - 1.0;
        let encoded: Vec<f64> = waveform
            .iter()
            .chain(std::iter::repeat(&last))
            .take(waveform.len().max(DIRECT_MIN_SAMPLES))
            .map(|&sample| (sample + 1.0) * half_scale)
            .collect();

        let lead_in = 2 * spec.fluxline_wait_time;
        let mut codes = Vec::with_capacity(lead_in + factor * (encoded.len() - 1) + 1);
        codes.extend(std::iter::repeat(encoded[0] as u16).take(lead_in));
        for pair in encoded.windows(2) {
            let step = (pair[1] - pair[0]) / factor as f64;
            codes.extend((0..factor).map(|index| (pair[0] + step * index as f64) as u16));
        }
        codes.push(encoded[encoded.len() - 1] as u16);

        let period = codes.len() as f64 / 2.0;
        tracing::debug!(
            samples = waveform.len(),
            factor,
            lead_in,
            period,
            "encoding fluxline waveform for the direct driver"
        );

        Ok(FluxlineBuffer {
            codes,
            markers: Vec::new(),
            period: Some(period),
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn spec() -> HardwareBufferSpec {
        HardwareBufferSpec {
            repetition_period: 3000,
            drive_wait_time: 500,
            readout_time: 1500,
            fluxline_trigger_delay: 200,
            fluxline_guard_time: 1000,
            fluxline_wait_time: 4,
            dac_resolution: 14,
        }
    }

    #[test]
    fn awg_strategy_places_waveform_after_trigger_delay() {
        let buffer = AwgFluxlineStrategy
            .load(&[0.0, 1.0, -1.0], 1.0, &spec())
            .unwrap();

        assert_eq!(buffer.codes.len(), 2000);
        assert_eq!(buffer.markers, vec![3; 2000]);
        assert_eq!(buffer.period, None);
        assert_eq!(&buffer.codes[298..304], &[8191, 8191, 8191, 16383, 0, 8191]);
        assert!(buffer.codes.iter().all(|&code| code <= 16383));
    }

    #[test]
    fn awg_strategy_fills_with_first_sample() {
        let buffer = AwgFluxlineStrategy
            .load(&[-0.5, 0.5], 1.0, &spec())
            .unwrap();
        assert_eq!(buffer.codes[0], 4095);
        assert_eq!(buffer.codes[301], 12287);
        assert_eq!(buffer.codes[1999], 4095);
    }

    #[rstest]
    #[case(1500, true)]
    #[case(1501, false)]
    fn awg_strategy_length_limit(#[case] length: usize, #[case] fits: bool) {
        let result = AwgFluxlineStrategy.load(&vec![0.0; length], 1.0, &spec());
        if fits {
            assert!(result.is_ok());
        } else {
            assert_eq!(
                result,
                Err(WaveformError::WaveformTooLong {
                    length,
                    available: 1500
                })
            );
        }
    }

    #[test]
    fn awg_strategy_requires_nanosecond_sampling() {
        assert!(matches!(
            AwgFluxlineStrategy.load(&[0.0], 0.5, &spec()),
            Err(WaveformError::SamplingInterval { .. })
        ));
    }

    #[test]
    fn awg_strategy_requires_room_for_trigger_delay() {
        let spec = HardwareBufferSpec {
            fluxline_trigger_delay: 501,
            ..spec()
        };
        assert!(matches!(
            AwgFluxlineStrategy.load(&[0.0], 1.0, &spec),
            Err(WaveformError::InvalidTiming(_))
        ));
    }

    #[test]
    fn direct_strategy_pads_and_prefixes() {
        let buffer = DirectFluxlineStrategy
            .load(&[0.0, 1.0], 0.5, &spec())
            .unwrap();

        // 8 lead-in samples, then the waveform extended to 150 samples.
        assert_eq!(buffer.codes.len(), 8 + 150);
        assert!(buffer.codes[..9].iter().all(|&code| code == 8191));
        assert!(buffer.codes[9..].iter().all(|&code| code == 16382));
        assert_eq!(buffer.period, Some(79.0));
        assert!(buffer.markers.is_empty());
    }

    #[test]
    fn direct_strategy_interpolates_coarse_sampling() {
        let waveform: Vec<f64> = (0..200).map(|index| if index == 0 { -1.0 } else { 1.0 }).collect();
        let buffer = DirectFluxlineStrategy.load(&waveform, 2.0, &spec()).unwrap();

        // Four native samples per input sample, plus the closing sample.
        assert_eq!(buffer.codes.len(), 8 + 4 * 199 + 1);
        assert_eq!(&buffer.codes[8..13], &[0, 4095, 8191, 12286, 16382]);
        assert_eq!(buffer.period, Some((8 + 4 * 199 + 1) as f64 / 2.0));
    }

    #[rstest]
    #[case(0.75)]
    #[case(0.25)]
    #[case(1.2)]
    fn direct_strategy_rejects_fractional_upsampling(#[case] sampling_interval: f64) {
        assert!(matches!(
            DirectFluxlineStrategy.load(&[0.0], sampling_interval, &spec()),
            Err(WaveformError::SamplingInterval { .. })
        ));
    }

    #[rstest]
    #[case(FluxlineOutput::Awg)]
    #[case(FluxlineOutput::Direct)]
    fn strategies_reject_empty_and_out_of_range_waveforms(#[case] output: FluxlineOutput) {
        let strategy = output.strategy();
        assert!(matches!(
            strategy.load(&[], 1.0, &spec()),
            Err(WaveformError::InvalidLength(_))
        ));
        assert!(matches!(
            strategy.load(&[0.0, 1.5], 1.0, &spec()),
            Err(WaveformError::RangeExceeded { index: 1, .. })
        ));
    }

    #[rstest]
    fn strategies_reject_unsupported_resolutions(
        #[values(FluxlineOutput::Awg, FluxlineOutput::Direct)] output: FluxlineOutput,
        #[values(0, 17, 32)] bits: u8,
    ) {
        let spec = HardwareBufferSpec {
            dac_resolution: bits,
            ..spec()
        };
        assert!(matches!(
            output.strategy().load(&[0.0, 0.5], 1.0, &spec),
            Err(WaveformError::InvalidTiming(_))
        ));
    }

    #[test]
    fn output_names() {
        assert_eq!("direct".parse::<FluxlineOutput>().unwrap(), FluxlineOutput::Direct);
        assert_eq!(FluxlineOutput::Awg.to_string(), "awg");
        assert_eq!(
            serde_json::from_str::<FluxlineOutput>(r#""direct""#).unwrap(),
            FluxlineOutput::Direct
        );
    }
}
