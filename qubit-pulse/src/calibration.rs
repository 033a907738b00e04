//! Calibration data consumed by the waveform pipeline.
//!
//! Calibration is measured and persisted elsewhere; this module only describes the tabulated data
//! and how to read values between tabulated frequencies. Every lookup interpolates linearly and
//! refuses to extrapolate.
//!
//! The pipeline depends on the [`IqCalibration`], [`SidebandCalibration`] and
//! [`FluxlineResponse`] traits rather than on the tables, so callers can inject their own sources.

use std::cmp::Ordering;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::units::Radians;
use crate::{Result, WaveformError};

/// Mixer offsets and power coefficients of the I and Q channels at one drive frequency.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IqCoefficients {
    pub offset_i: f64,
    pub offset_q: f64,
    pub coeff_i: f64,
    pub coeff_q: f64,
}

impl IqCoefficients {
    /// The channel amplitude producing `power_db` at the mixer output, `sqrt(10^(dB/10) / coeff)`.
    pub fn amplitude_for_power(power_db: f64, coeff: f64) -> f64 {
        (10f64.powf(power_db / 10.0) / coeff).sqrt()
    }

    /// Amplitude of the I channel for the requested output power.
    pub fn amplitude_i(&self, power_db: f64) -> f64 {
        Self::amplitude_for_power(power_db, self.coeff_i)
    }

    /// Amplitude of the Q channel for the requested output power.
    pub fn amplitude_q(&self, power_db: f64) -> f64 {
        Self::amplitude_for_power(power_db, self.coeff_q)
    }
}

/// Correction of the I/Q imbalance of a sideband-mixed drive.
///
/// An ideal mixer is described by unit amplitudes and a zero phase, for which the corrected
/// sideband waveform reduces to `exp(iθ)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SidebandCorrection {
    pub i_amplitude: f64,
    pub q_amplitude: f64,
    pub q_phase: Radians<f64>,
}

impl Default for SidebandCorrection {
    fn default() -> Self {
        Self {
            i_amplitude: 1.0,
            q_amplitude: 1.0,
            q_phase: Radians(0.0),
        }
    }
}

impl SidebandCorrection {
    /// The corrected mixing factor at sideband phase `theta`.
    #[inline]
    pub fn mix(&self, theta: f64) -> Complex64 {
        Complex64::new(
            self.i_amplitude * theta.cos(),
            self.q_amplitude * (theta + self.q_phase.0).sin(),
        )
    }
}

/// A source of mixer offset and power calibration.
pub trait IqCalibration {
    fn iq_coefficients(&self, frequency: f64) -> Result<IqCoefficients>;
}

/// A source of sideband mixing corrections.
///
/// Returns `None` when no correction is known for the carrier/sideband pair, in which case the
/// caller falls back to ideal mixing.
pub trait SidebandCalibration {
    fn sideband_correction(
        &self,
        carrier_frequency: f64,
        sideband_frequency: f64,
    ) -> Option<SidebandCorrection>;
}

/// The measured transfer function of the fluxline, as a function of frequency in GHz.
pub trait FluxlineResponse {
    fn response(&self, frequency: f64) -> Result<Complex64>;
}

/// One row of the IQ mixer calibration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IqCalibrationPoint {
    pub frequency: f64,
    #[serde(flatten)]
    pub coefficients: IqCoefficients,
}

/// Tabulated IQ mixer calibration, sorted by frequency.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<IqCalibrationPoint>", into = "Vec<IqCalibrationPoint>")]
pub struct IqCalibrationTable {
    frequencies: Vec<f64>,
    points: Vec<IqCalibrationPoint>,
}

impl From<Vec<IqCalibrationPoint>> for IqCalibrationTable {
    fn from(mut points: Vec<IqCalibrationPoint>) -> Self {
        points.sort_by(|left, right| total_order(left.frequency, right.frequency));
        Self {
            frequencies: points.iter().map(|point| point.frequency).collect(),
            points,
        }
    }
}

impl From<IqCalibrationTable> for Vec<IqCalibrationPoint> {
    fn from(table: IqCalibrationTable) -> Self {
        table.points
    }
}

impl IqCalibrationTable {
    pub fn points(&self) -> &[IqCalibrationPoint] {
        &self.points
    }
}

impl IqCalibration for IqCalibrationTable {
    fn iq_coefficients(&self, frequency: f64) -> Result<IqCoefficients> {
        let (lower, upper, weight) = locate(
            &self.frequencies,
            frequency,
            "IQ mixer calibration table is empty",
        )?;
        let (low, high) = (
            &self.points[lower].coefficients,
            &self.points[upper].coefficients,
        );
        Ok(IqCoefficients {
            offset_i: lerp(low.offset_i, high.offset_i, weight),
            offset_q: lerp(low.offset_q, high.offset_q, weight),
            coeff_i: lerp(low.coeff_i, high.coeff_i, weight),
            coeff_q: lerp(low.coeff_q, high.coeff_q, weight),
        })
    }
}

/// One row of the sideband mixing calibration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SidebandCalibrationPoint {
    pub carrier_frequency: f64,
    pub sideband_frequency: f64,
    #[serde(flatten)]
    pub correction: SidebandCorrection,
}

/// Sideband corrections measured at discrete sideband frequencies, interpolated along the
/// carrier frequency.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "Vec<SidebandCalibrationPoint>",
    into = "Vec<SidebandCalibrationPoint>"
)]
pub struct SidebandCalibrationTable {
    points: Vec<SidebandCalibrationPoint>,
}

impl From<Vec<SidebandCalibrationPoint>> for SidebandCalibrationTable {
    fn from(mut points: Vec<SidebandCalibrationPoint>) -> Self {
        points.sort_by(|left, right| {
            total_order(left.sideband_frequency, right.sideband_frequency)
                .then(total_order(left.carrier_frequency, right.carrier_frequency))
        });
        Self { points }
    }
}

impl From<SidebandCalibrationTable> for Vec<SidebandCalibrationPoint> {
    fn from(table: SidebandCalibrationTable) -> Self {
        table.points
    }
}

impl SidebandCalibration for SidebandCalibrationTable {
    fn sideband_correction(
        &self,
        carrier_frequency: f64,
        sideband_frequency: f64,
    ) -> Option<SidebandCorrection> {
        let matching: Vec<&SidebandCalibrationPoint> = self
            .points
            .iter()
            .filter(|point| {
                approx::relative_eq!(
                    point.sideband_frequency,
                    sideband_frequency,
                    epsilon = 1e-12,
                    max_relative = 1e-9
                )
            })
            .collect();
        let carriers: Vec<f64> = matching
            .iter()
            .map(|point| point.carrier_frequency)
            .collect();

        let (lower, upper, weight) = bracket(&carriers, carrier_frequency)?;
        let (low, high) = (&matching[lower].correction, &matching[upper].correction);
        Some(SidebandCorrection {
            i_amplitude: lerp(low.i_amplitude, high.i_amplitude, weight),
            q_amplitude: lerp(low.q_amplitude, high.q_amplitude, weight),
            q_phase: Radians(lerp(low.q_phase.0, high.q_phase.0, weight)),
        })
    }
}

/// One row of the fluxline response measurement.
///
/// The response seen by the qubit is the product of the DAC response and the response of the
/// sample-and-hold input stage.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FluxlineResponsePoint {
    pub frequency: f64,
    pub response_dac: Complex64,
    pub response_input_sample: Complex64,
}

/// Tabulated fluxline response, sorted by frequency.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "Vec<FluxlineResponsePoint>",
    into = "Vec<FluxlineResponsePoint>"
)]
pub struct FluxlineResponseTable {
    frequencies: Vec<f64>,
    responses: Vec<Complex64>,
    points: Vec<FluxlineResponsePoint>,
}

impl From<Vec<FluxlineResponsePoint>> for FluxlineResponseTable {
    fn from(mut points: Vec<FluxlineResponsePoint>) -> Self {
        points.sort_by(|left, right| total_order(left.frequency, right.frequency));
        Self {
            frequencies: points.iter().map(|point| point.frequency).collect(),
            responses: points
                .iter()
                .map(|point| point.response_dac * point.response_input_sample)
                .collect(),
            points,
        }
    }
}

impl From<FluxlineResponseTable> for Vec<FluxlineResponsePoint> {
    fn from(table: FluxlineResponseTable) -> Self {
        table.points
    }
}

impl FluxlineResponseTable {
    /// A response that is flat at `value` between `0` and `max_frequency`.
    pub fn flat(value: Complex64, max_frequency: f64) -> Self {
        let point = |frequency| FluxlineResponsePoint {
            frequency,
            response_dac: value,
            response_input_sample: Complex64::new(1.0, 0.0),
        };
        vec![point(0.0), point(max_frequency)].into()
    }

    pub fn points(&self) -> &[FluxlineResponsePoint] {
        &self.points
    }
}

impl FluxlineResponse for FluxlineResponseTable {
    fn response(&self, frequency: f64) -> Result<Complex64> {
        let (lower, upper, weight) = locate(
            &self.frequencies,
            frequency,
            "fluxline response table is empty",
        )?;
        Ok(self.responses[lower] * (1.0 - weight) + self.responses[upper] * weight)
    }
}

/// All calibration tables of one qubit; any of them may be absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationTables {
    pub iq: Option<IqCalibrationTable>,
    pub sideband: Option<SidebandCalibrationTable>,
    pub fluxline: Option<FluxlineResponseTable>,
}

#[inline]
fn lerp(low: f64, high: f64, weight: f64) -> f64 {
    low + (high - low) * weight
}

fn total_order(left: f64, right: f64) -> Ordering {
    left.total_cmp(&right)
}

/// Find the tabulated interval containing `x`: the indices of its bounds and the weight of the
/// upper bound. `abscissae` must be sorted.
fn bracket(abscissae: &[f64], x: f64) -> Option<(usize, usize, f64)> {
    let (first, last) = (*abscissae.first()?, *abscissae.last()?);
    if !(first..=last).contains(&x) {
        return None;
    }
    let upper = abscissae.partition_point(|value| *value < x);
    if upper == 0 {
        return Some((0, 0, 0.0));
    }
    let lower = upper - 1;
    let weight = (x - abscissae[lower]) / (abscissae[upper] - abscissae[lower]);
    Some((lower, upper, weight))
}

fn locate(abscissae: &[f64], x: f64, empty: &'static str) -> Result<(usize, usize, f64)> {
    match (abscissae.first(), abscissae.last()) {
        (Some(&min), Some(&max)) => {
            bracket(abscissae, x).ok_or(WaveformError::FrequencyOutOfRange {
                frequency: x,
                min,
                max,
            })
        }
        _ => Err(WaveformError::CalibrationMissing(empty)),
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rstest::rstest;

    use super::*;

    fn iq_point(frequency: f64, offset: f64, coeff: f64) -> IqCalibrationPoint {
        IqCalibrationPoint {
            frequency,
            coefficients: IqCoefficients {
                offset_i: offset,
                offset_q: -offset,
                coeff_i: coeff,
                coeff_q: 2.0 * coeff,
            },
        }
    }

    #[rstest]
    #[case(&[0.0, 1.0, 3.0], 0.0, Some((0, 0, 0.0)))]
    #[case(&[0.0, 1.0, 3.0], 0.5, Some((0, 1, 0.5)))]
    #[case(&[0.0, 1.0, 3.0], 1.0, Some((0, 1, 1.0)))]
    #[case(&[0.0, 1.0, 3.0], 2.5, Some((1, 2, 0.75)))]
    #[case(&[0.0, 1.0, 3.0], 3.0, Some((1, 2, 1.0)))]
    #[case(&[0.0, 1.0, 3.0], 3.5, None)]
    #[case(&[0.0, 1.0, 3.0], -0.1, None)]
    #[case(&[2.0], 2.0, Some((0, 0, 0.0)))]
    #[case(&[], 2.0, None)]
    fn bracket_cases(
        #[case] abscissae: &[f64],
        #[case] x: f64,
        #[case] expected: Option<(usize, usize, f64)>,
    ) {
        assert_eq!(bracket(abscissae, x), expected);
    }

    #[test]
    fn iq_table_interpolates_between_points() {
        let table = IqCalibrationTable::from(vec![iq_point(6.0, 0.2, 4.0), iq_point(5.0, 0.1, 2.0)]);
        let coefficients = table.iq_coefficients(5.25).unwrap();

        assert_relative_eq!(coefficients.offset_i, 0.125);
        assert_relative_eq!(coefficients.offset_q, -0.125);
        assert_relative_eq!(coefficients.coeff_i, 2.5);
        assert_relative_eq!(coefficients.coeff_q, 5.0);
    }

    #[test]
    fn iq_table_refuses_to_extrapolate() {
        let table = IqCalibrationTable::from(vec![iq_point(5.0, 0.1, 2.0), iq_point(6.0, 0.2, 4.0)]);
        assert_eq!(
            table.iq_coefficients(6.5),
            Err(WaveformError::FrequencyOutOfRange {
                frequency: 6.5,
                min: 5.0,
                max: 6.0
            })
        );
        assert!(matches!(
            IqCalibrationTable::default().iq_coefficients(5.0),
            Err(WaveformError::CalibrationMissing(_))
        ));
    }

    #[rstest]
    #[case(0.0, 1.0, 1.0)]
    #[case(10.0, 1.0, 10f64.sqrt())]
    #[case(-20.0, 0.01, 1.0)]
    fn amplitude_for_power(#[case] power_db: f64, #[case] coeff: f64, #[case] expected: f64) {
        assert_relative_eq!(
            IqCoefficients::amplitude_for_power(power_db, coeff),
            expected,
            max_relative = 1e-12
        );
    }

    #[test]
    fn fluxline_response_is_product_of_stages() {
        let table = FluxlineResponseTable::from(vec![
            FluxlineResponsePoint {
                frequency: 0.0,
                response_dac: Complex64::new(1.0, 0.0),
                response_input_sample: Complex64::new(1.0, 0.0),
            },
            FluxlineResponsePoint {
                frequency: 0.5,
                response_dac: Complex64::new(0.5, 0.0),
                response_input_sample: Complex64::new(0.0, 1.0),
            },
        ]);

        assert_relative_eq!(table.response(0.5).unwrap(), Complex64::new(0.0, 0.5));
        assert_relative_eq!(
            table.response(0.25).unwrap(),
            Complex64::new(0.5, 0.25),
            epsilon = 1e-12
        );
        assert!(table.response(0.75).is_err());
    }

    #[test]
    fn sideband_table_matches_sideband_and_interpolates_carrier() {
        let point = |carrier_frequency, sideband_frequency, i_amplitude| SidebandCalibrationPoint {
            carrier_frequency,
            sideband_frequency,
            correction: SidebandCorrection {
                i_amplitude,
                ..Default::default()
            },
        };
        let table = SidebandCalibrationTable::from(vec![
            point(5.0, 0.1, 1.0),
            point(6.0, 0.1, 1.2),
            point(5.0, -0.1, 0.5),
        ]);

        let correction = table.sideband_correction(5.5, 0.1).unwrap();
        assert_relative_eq!(correction.i_amplitude, 1.1);
        assert_relative_eq!(correction.q_amplitude, 1.0);

        assert_eq!(
            table.sideband_correction(5.0, -0.1).map(|c| c.i_amplitude),
            Some(0.5)
        );
        assert_eq!(table.sideband_correction(5.5, 0.2), None);
        assert_eq!(table.sideband_correction(7.0, 0.1), None);
    }

    #[test]
    fn ideal_correction_is_a_plain_phasor() {
        let correction = SidebandCorrection::default();
        for theta in [0.0, 0.3, 2.0, -1.2] {
            assert_relative_eq!(
                correction.mix(theta),
                Complex64::cis(theta),
                epsilon = 1e-15
            );
        }
    }

    #[test]
    fn tables_round_trip_through_json() {
        let json = r#"{
            "iq": [
                {"frequency": 5.0, "offset_i": 0.1, "offset_q": 0.0, "coeff_i": 1.0, "coeff_q": 1.0}
            ],
            "fluxline": [
                {"frequency": 0.0, "response_dac": [1.0, 0.0], "response_input_sample": [1.0, 0.0]},
                {"frequency": 1.0, "response_dac": [0.8, 0.1], "response_input_sample": [1.0, 0.0]}
            ]
        }"#;
        let tables: CalibrationTables = serde_json::from_str(json).unwrap();
        assert_eq!(tables.sideband, None);
        assert_eq!(tables.iq.as_ref().map(|table| table.points().len()), Some(1));

        let reparsed: CalibrationTables =
            serde_json::from_str(&serde_json::to_string(&tables).unwrap()).unwrap();
        assert_eq!(reparsed, tables);
    }
}
