//! Elementary pulse envelopes.
//!
//! Gaussian flanks are parameterized by their total width `flank` (in samples), which spans three
//! standard deviations on either side of the flank centre. Envelopes that are normalized are
//! scaled by their discrete sum so that the pulse area equals the requested `length`; the area is
//! what the calibrated π-pulse length refers to.

use std::iter::repeat;

use ndarray::Array;
use num_complex::Complex64;

use crate::{real, Result, WaveformError};

/// An envelope together with its analytic time derivative.
#[derive(Clone, Debug, PartialEq)]
pub struct GaussianPulse {
    pub envelope: Vec<Complex64>,
    /// Present only when requested.
    pub derivative: Option<Vec<Complex64>>,
}

impl GaussianPulse {
    /// The number of samples in the envelope, including the leading delay.
    pub fn len(&self) -> usize {
        self.envelope.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envelope.is_empty()
    }
}

/// A flat-top pulse with Gaussian flanks.
///
/// The buffer holds `ceil(2 * flank) + 1 + ceil(length) + ceil(delay)` samples: the rising flank
/// is centred at `delay + flank`, the plateau lasts `length` samples, and the falling flank mirrors
/// the rising one. Samples before the rising flank carry the (vanishing) Gaussian tail.
///
/// With `normalize`, the sum of the samples equals `length`. A zero `length` yields an all-zero
/// buffer of the same size.
pub fn gaussian_envelope(
    length: f64,
    delay: f64,
    flank: f64,
    normalize: bool,
) -> Result<Vec<Complex64>> {
    validate_shape(length, flank)?;
    if !delay.is_finite() || delay < 0.0 {
        return Err(WaveformError::InvalidLength(format!(
            "pulse delay must be a non-negative number of samples, got {delay}"
        )));
    }

    let sample_count = gaussian_width(flank) + length.ceil() as usize + delay.ceil() as usize;
    if length == 0.0 {
        return Ok(vec![real!(0.0); sample_count]);
    }

    let rise_centre = flank + delay;
    let fall_centre = rise_centre + length;
    let time_steps = Array::range(0.0, sample_count as f64, 1.0);

    let mut samples: Vec<Complex64> = time_steps
        .into_iter()
        .map(|t| {
            let value = if t <= rise_centre {
                flank_sample(t - rise_centre, flank)
            } else if t >= fall_centre {
                flank_sample(t - fall_centre, flank)
            } else {
                1.0
            };
            real!(value)
        })
        .collect();

    if normalize {
        let area: f64 = samples.iter().map(|sample| sample.re).sum();
        let scale = length / area;
        samples.iter_mut().for_each(|sample| *sample *= scale);
    }

    Ok(samples)
}

/// A Gaussian-flanked pulse built in closed form, optionally with its time derivative.
///
/// When the requested area is smaller than the area of a full Gaussian of width `flank`, the
/// Gaussian alone is scaled down. Otherwise the Gaussian is split at its centre and a plateau of
/// `ceil(length - area)` samples is inserted between the halves. In both cases the envelope is
/// scaled so that its sum is exactly `length`, and the derivative is scaled by the same factor.
///
/// The derivative is the analytic one, `-(t - flank) (3 / flank)² G(t)`, and vanishes on the
/// plateau. It feeds the DRAG correction in [`crate::sideband`].
pub fn gaussian_envelope_with_derivative(
    length: f64,
    delay: usize,
    flank: f64,
    with_derivative: bool,
) -> Result<GaussianPulse> {
    validate_shape(length, flank)?;

    let gaussian_length = gaussian_width(flank);
    let gaussian: Vec<f64> = (0..gaussian_length)
        .map(|index| flank_sample(index as f64 - flank, flank))
        .collect();
    let slope: Vec<f64> = (0..gaussian_length)
        .map(|index| {
            let offset = index as f64 - flank;
            -offset * (3.0 / flank).powi(2) * flank_sample(offset, flank)
        })
        .collect();

    let area: f64 = gaussian.iter().sum();

    let (envelope, derivative) = if area > length {
        let delayed = |values: &[f64]| -> Vec<f64> {
            repeat(0.0)
                .take(delay)
                .chain(values.iter().copied())
                .collect()
        };
        (delayed(&gaussian), delayed(&slope))
    } else {
        let plateau = (length - area).ceil() as usize;
        let total = delay + plateau + gaussian_length;
        let half = (gaussian_length + 1) / 2;
        let falling = gaussian_length / 2..gaussian_length;

        let mut envelope = vec![0.0; total];
        envelope[delay..].fill(1.0);
        envelope[delay..delay + half].copy_from_slice(&gaussian[..half]);
        envelope[total - half..].copy_from_slice(&gaussian[falling.clone()]);

        let mut derivative = vec![0.0; total];
        derivative[delay..delay + half].copy_from_slice(&slope[..half]);
        derivative[total - half..].copy_from_slice(&slope[falling]);

        (envelope, derivative)
    };

    let scale = length / envelope.iter().sum::<f64>();
    let to_samples = |values: Vec<f64>| -> Vec<Complex64> {
        values.into_iter().map(|value| real!(value * scale)).collect()
    };

    Ok(GaussianPulse {
        envelope: to_samples(envelope),
        derivative: with_derivative.then(|| to_samples(derivative)),
    })
}

/// A rectangular pulse of `height` lasting `length` samples after `delay` zero samples.
///
/// The buffer always holds at least one sample.
pub fn rectangular_pulse(length: usize, delay: usize, height: f64) -> Vec<Complex64> {
    let mut samples = vec![real!(0.0); (length + delay).max(1)];
    samples[delay..delay + length].fill(real!(height));
    samples
}

/// Gaussian low-pass mask, `exp(-(|x| / cutoff)²)`.
#[inline]
pub fn gaussian_filter(x: f64, cutoff: f64) -> f64 {
    (-(x.abs() / cutoff).powi(2)).exp()
}

/// Number of samples spanned by a full Gaussian of the given flank width.
fn gaussian_width(flank: f64) -> usize {
    (2.0 * flank).ceil() as usize + 1
}

#[inline]
fn flank_sample(offset: f64, flank: f64) -> f64 {
    (-0.5 * (offset / flank * 3.0).powi(2)).exp()
}

fn validate_shape(length: f64, flank: f64) -> Result<()> {
    if !length.is_finite() || length < 0.0 {
        return Err(WaveformError::InvalidLength(format!(
            "pulse length must be a non-negative number of samples, got {length}"
        )));
    }
    if !flank.is_finite() || flank <= 0.0 {
        return Err(WaveformError::InvalidLength(format!(
            "flank width must be a positive number of samples, got {flank}"
        )));
    }
    Ok(())
}
