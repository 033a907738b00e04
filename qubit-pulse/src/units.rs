//! Angle newtypes used for drive rotations and sideband phases.

use std::f64::consts::PI;
use std::ops::Add;

/// An angle measured in full turns.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Cycles<T>(pub T);

/// An angle measured in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Radians<T>(pub T);

impl Radians<f64> {
    /// Half a turn; added to a rotation to encode a negative pulse area.
    pub const HALF_TURN: Self = Radians(PI);
}

impl From<Cycles<f64>> for Radians<f64> {
    fn from(cycles: Cycles<f64>) -> Self {
        Radians(cycles.0 * 2.0 * PI)
    }
}

impl From<Radians<f64>> for Cycles<f64> {
    fn from(radians: Radians<f64>) -> Self {
        Cycles(radians.0 / (2.0 * PI))
    }
}

impl Add for Radians<f64> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Radians(self.0 + rhs.0)
    }
}

impl Add for Cycles<f64> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Cycles(self.0 + rhs.0)
    }
}
