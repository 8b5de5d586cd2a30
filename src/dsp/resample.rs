//! Time-grid resampling
//!
//! Maps a channel matrix from its native time base onto the shared
//! [`ResampleWindow`] by linear interpolation. The fractional source index
//! is computed once per output sample and reused for every channel.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::series::{ChannelMatrix, ChannelSeries, TimeBase};
use crate::error::{ConvertError, Result};
use crate::progress::ProgressTicker;

/// Interpolation between native samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    #[default]
    Linear,
}

impl FromStr for Interpolation {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(Interpolation::Linear),
            _ => Err(ConvertError::UnsupportedInterpolation {
                kind: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interpolation::Linear => write!(f, "linear"),
        }
    }
}

/// Common output timeline shared by every logger of a job
///
/// `sample_count == floor((stop - start) * frequency) + 1` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResampleWindow {
    /// Unix time of the first output sample
    pub start: f64,
    /// Unix time the window ends, half a period past the last sample
    pub stop: f64,
    /// Output rate in Hz
    pub frequency: f64,
    /// Samples per channel
    pub sample_count: usize,
}

impl ResampleWindow {
    /// Build a window over `[start, stop]`, nudging `stop` to half a period
    /// past the last whole sample
    pub fn new(start: f64, stop: f64, frequency: f64) -> Result<Self> {
        if !(frequency > 0.0) || !frequency.is_finite() {
            return Err(ConvertError::InvalidParameter {
                param: "frequency".to_string(),
                value: frequency.to_string(),
                expected: "a positive frequency in Hz".to_string(),
            });
        }
        if !(stop > start) {
            return Err(ConvertError::EmptyWindow { start, stop });
        }

        let sample_count = ((stop - start) * frequency).floor() as usize + 1;
        let stop = start + (sample_count as f64 - 0.5) / frequency;

        Ok(Self {
            start,
            stop,
            frequency,
            sample_count,
        })
    }

    pub fn period(&self) -> f64 {
        1.0 / self.frequency
    }

    /// Time of output sample `index`
    pub fn time_at(&self, index: usize) -> f64 {
        self.start + index as f64 / self.frequency
    }

    pub fn duration(&self) -> f64 {
        self.stop - self.start
    }

    /// Time base of resampled series
    pub fn time_base(&self) -> TimeBase {
        TimeBase::new(self.start, self.frequency)
    }
}

/// Resample every channel of `matrix` onto `window`
pub fn resample(
    matrix: ChannelMatrix,
    window: &ResampleWindow,
    interpolation: Interpolation,
    progress: &mut ProgressTicker<'_>,
) -> Result<ChannelMatrix> {
    let Interpolation::Linear = interpolation;

    let native_len = matrix.num_samples();
    if native_len < 2 {
        return Err(ConvertError::InsufficientSamples {
            needed: 2,
            got: native_len,
        });
    }
    let Some(native) = matrix.time_base() else {
        return ChannelMatrix::new(Vec::new());
    };

    // idx(k) = (target_start + k * dt_target - native_start) / dt_native
    let first_index = (window.start - native.start) * native.rate;
    let step = native.rate / window.frequency;
    let last_lower = native_len - 2;

    let sources = matrix.into_channels();
    let mut outputs: Vec<Vec<f64>> = sources
        .iter()
        .map(|_| Vec::with_capacity(window.sample_count))
        .collect();

    for k in 0..window.sample_count {
        let index = first_index + k as f64 * step;
        let lower = (index.floor().max(0.0) as usize).min(last_lower);
        // edges hold the outermost sample
        let frac = (index - lower as f64).clamp(0.0, 1.0);

        for (source, output) in sources.iter().zip(outputs.iter_mut()) {
            let s = source.samples();
            output.push(s[lower] + frac * (s[lower + 1] - s[lower]));
        }
        progress.tick(k);
    }
    progress.finish();

    let time_base = window.time_base();
    let channels = sources
        .into_iter()
        .zip(outputs)
        .map(|(source, samples)| ChannelSeries::new(samples, time_base, source.unit()))
        .collect();
    ChannelMatrix::new(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::series::Unit;
    use crate::progress::{NullProgress, Stage};
    use approx::assert_relative_eq;

    fn ticker() -> ProgressTicker<'static> {
        ProgressTicker::new(&NullProgress, 0, Stage::Resample, 0)
    }

    fn ramp_matrix(start: f64, rate: f64, len: usize) -> ChannelMatrix {
        let tb = TimeBase::new(start, rate);
        let ramp: Vec<f64> = (0..len).map(|i| i as f64).collect();
        let squares: Vec<f64> = (0..len).map(|i| (i * i) as f64).collect();
        let negated: Vec<f64> = ramp.iter().map(|v| -v).collect();
        ChannelMatrix::from_columns(vec![ramp, squares, negated], tb).unwrap()
    }

    #[test]
    fn test_window_sample_count() {
        let window = ResampleWindow::new(1.75, 9.75, 50.0).unwrap();
        assert_eq!(window.sample_count, 401);
        assert_eq!(
            window.sample_count,
            ((window.stop - window.start) * window.frequency).floor() as usize + 1
        );
        assert_relative_eq!(window.stop, 1.75 + 400.5 / 50.0);
    }

    #[test]
    fn test_window_rejects_empty_span() {
        let err = ResampleWindow::new(10.0, 10.0, 50.0).unwrap_err();
        assert!(matches!(err, ConvertError::EmptyWindow { .. }));
        assert!(ResampleWindow::new(0.0, 1.0, 0.0).is_err());
    }

    #[test]
    fn test_interpolation_names() {
        assert_eq!("linear".parse::<Interpolation>().unwrap(), Interpolation::Linear);
        assert_eq!(" Linear ".parse::<Interpolation>().unwrap(), Interpolation::Linear);
        let err = "cubic".parse::<Interpolation>().unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedInterpolation { .. }));
    }

    #[test]
    fn test_native_grid_is_identity() {
        let matrix = ramp_matrix(1000.0, 100.0, 200);
        let original = matrix.clone();
        let window = ResampleWindow::new(1000.0, 1000.0 + 199.5 / 100.0, 100.0).unwrap();
        assert_eq!(window.sample_count, 200);

        let out = resample(matrix, &window, Interpolation::Linear, &mut ticker()).unwrap();
        for (a, b) in out.channels().iter().zip(original.channels()) {
            for (x, y) in a.samples().iter().zip(b.samples()) {
                assert_relative_eq!(*x, *y, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_midpoints_are_interpolated() {
        let matrix = ramp_matrix(0.0, 10.0, 11);
        let window = ResampleWindow::new(0.05, 0.96, 10.0).unwrap();
        let out = resample(matrix, &window, Interpolation::Linear, &mut ticker()).unwrap();

        assert_eq!(out.num_samples(), window.sample_count);
        let ramp = out.channel(0).unwrap().samples();
        assert_relative_eq!(ramp[0], 0.5, epsilon = 1e-9);
        assert_relative_eq!(ramp[3], 3.5, epsilon = 1e-9);
        // between 1 and 4 on the squares channel
        assert_relative_eq!(out.channel(1).unwrap().samples()[1], 2.5, epsilon = 1e-9);
    }

    #[test]
    fn test_downsample_keeps_units_and_time_base() {
        let tb = TimeBase::new(0.0, 100.0);
        let channels = vec![
            ChannelSeries::new(vec![1.0; 1000], tb, Unit::G),
            ChannelSeries::new(vec![2.0; 1000], tb, Unit::DegreesPerSecond),
        ];
        let matrix = ChannelMatrix::new(channels).unwrap();
        let window = ResampleWindow::new(1.0, 9.0, 25.0).unwrap();

        let out = resample(matrix, &window, Interpolation::Linear, &mut ticker()).unwrap();
        assert_eq!(out.num_samples(), 201);
        assert_eq!(out.time_base(), Some(window.time_base()));
        assert_eq!(out.units(), vec![Unit::G, Unit::DegreesPerSecond]);
        assert!(out.channel(1).unwrap().samples().iter().all(|&v| v == 2.0));
    }

    #[test]
    fn test_edges_hold_instead_of_extrapolating() {
        let matrix = ramp_matrix(10.0, 10.0, 5);
        // starts before and ends after the native span
        let window = ResampleWindow::new(9.0, 11.0, 10.0).unwrap();
        let out = resample(matrix, &window, Interpolation::Linear, &mut ticker()).unwrap();
        let ramp = out.channel(0).unwrap().samples();
        assert_eq!(ramp[0], 0.0);
        assert_eq!(*ramp.last().unwrap(), 4.0);
    }

    #[test]
    fn test_single_sample_is_rejected() {
        let matrix = ramp_matrix(0.0, 10.0, 1);
        let window = ResampleWindow::new(0.0, 1.0, 10.0).unwrap();
        let err = resample(matrix, &window, Interpolation::Linear, &mut ticker()).unwrap_err();
        assert!(matches!(err, ConvertError::InsufficientSamples { .. }));
    }
}
