//! Acceleration to velocity integration
//!
//! Cumulative trapezoidal integration of channels in g, scaled into the
//! requested velocity unit. The output keeps the input length.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::series::{ChannelMatrix, ChannelSeries, Unit};
use crate::error::{ConvertError, Result};

/// Standard gravity in m/s^2
pub const STANDARD_GRAVITY: f64 = 9.81;

/// Unit of integrated acceleration channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VelocityUnit {
    #[serde(rename = "m/s")]
    MetresPerSecond,
    #[default]
    #[serde(rename = "mm/s")]
    MillimetresPerSecond,
}

impl VelocityUnit {
    /// Factor from g*s to this unit
    pub fn scale(&self) -> f64 {
        match self {
            VelocityUnit::MetresPerSecond => STANDARD_GRAVITY,
            VelocityUnit::MillimetresPerSecond => STANDARD_GRAVITY * 1000.0,
        }
    }

    pub fn unit(&self) -> Unit {
        match self {
            VelocityUnit::MetresPerSecond => Unit::MetresPerSecond,
            VelocityUnit::MillimetresPerSecond => Unit::MillimetresPerSecond,
        }
    }
}

impl FromStr for VelocityUnit {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m/s" | "mps" => Ok(VelocityUnit::MetresPerSecond),
            "mm/s" | "mmps" => Ok(VelocityUnit::MillimetresPerSecond),
            _ => Err(ConvertError::InvalidParameter {
                param: "velocity_unit".to_string(),
                value: s.to_string(),
                expected: "m/s or mm/s".to_string(),
            }),
        }
    }
}

impl fmt::Display for VelocityUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.unit().symbol())
    }
}

/// Cumulative trapezoid of `samples` at `sample_rate`, times `scale`
///
/// `out[i]` sums the areas of intervals `0..=i`; the last sample repeats
/// the previous total since it has no following interval.
pub fn cumulative_trapezoid(samples: &[f64], sample_rate: f64, scale: f64) -> Vec<f64> {
    let half_step = 0.5 / sample_rate * scale;
    let mut total = 0.0;
    let mut out = Vec::with_capacity(samples.len());

    for (i, &sample) in samples.iter().enumerate() {
        if let Some(&next) = samples.get(i + 1) {
            total += half_step * (sample + next);
        }
        out.push(total);
    }
    out
}

/// Integrate one series when it is in g; other units pass through
pub fn integrate_series(series: ChannelSeries, unit: VelocityUnit) -> ChannelSeries {
    if series.unit() != Unit::G {
        return series;
    }
    let rate = series.time_base().rate;
    let velocity = cumulative_trapezoid(series.samples(), rate, unit.scale());
    series.with_samples(velocity, unit.unit())
}

/// Integrate the acceleration channels of a matrix
pub fn integrate(matrix: ChannelMatrix, unit: VelocityUnit) -> Result<ChannelMatrix> {
    let channels = matrix
        .into_channels()
        .into_iter()
        .map(|series| integrate_series(series, unit))
        .collect();
    ChannelMatrix::new(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::series::TimeBase;
    use approx::assert_relative_eq;

    #[test]
    fn test_constant_ramps_to_total() {
        let rate = 100.0;
        let n = 501;
        let out = cumulative_trapezoid(&vec![2.0; n], rate, STANDARD_GRAVITY);

        assert_eq!(out.len(), n);
        let duration = (n - 1) as f64 / rate;
        assert_relative_eq!(out[n - 1], STANDARD_GRAVITY * 2.0 * duration, epsilon = 1e-9);
        assert_relative_eq!(out[99], STANDARD_GRAVITY * 2.0 * 1.0, epsilon = 1e-9);
        assert_eq!(out[n - 1], out[n - 2]);
    }

    #[test]
    fn test_trapezoid_areas() {
        let out = cumulative_trapezoid(&[0.0, 1.0, 3.0, 0.0], 1.0, 1.0);
        assert_eq!(out, vec![0.5, 2.5, 4.0, 4.0]);
    }

    #[test]
    fn test_empty_and_single() {
        assert!(cumulative_trapezoid(&[], 10.0, 1.0).is_empty());
        assert_eq!(cumulative_trapezoid(&[4.0], 10.0, 1.0), vec![0.0]);
    }

    #[test]
    fn test_unit_scales() {
        assert_relative_eq!(VelocityUnit::MetresPerSecond.scale(), 9.81);
        assert_relative_eq!(VelocityUnit::MillimetresPerSecond.scale(), 9810.0);
        assert_eq!("mm/s".parse::<VelocityUnit>().unwrap(), VelocityUnit::MillimetresPerSecond);
        assert!("km/h".parse::<VelocityUnit>().is_err());
    }

    #[test]
    fn test_only_acceleration_is_integrated() {
        let tb = TimeBase::new(0.0, 10.0);
        let matrix = ChannelMatrix::from_columns(vec![vec![1.0; 11]; 6], tb).unwrap();
        let out = integrate(matrix, VelocityUnit::MetresPerSecond).unwrap();

        assert_eq!(out.channel(0).unwrap().unit(), Unit::MetresPerSecond);
        assert_relative_eq!(
            *out.channel(2).unwrap().samples().last().unwrap(),
            9.81,
            epsilon = 1e-9
        );
        let gyro = out.channel(3).unwrap();
        assert_eq!(gyro.unit(), Unit::DegreesPerSecond);
        assert!(gyro.samples().iter().all(|&s| s == 1.0));
    }
}
