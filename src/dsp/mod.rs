//! Signal Processing
//!
//! Per-logger processing stages. Each stage takes a [`ChannelMatrix`] by
//! value and returns a new one:
//! - Resampling onto a shared time grid
//! - Zero-phase Butterworth low-pass and high-pass filtering
//! - Trapezoidal integration of acceleration into velocity

pub mod filter;
pub mod integrate;
pub mod resample;
pub mod series;

pub use filter::{FilterKind, ZeroPhaseFilter, DEFAULT_FILTER_ORDER, LOWPASS_CUTOFF_NUDGE};
pub use integrate::{cumulative_trapezoid, integrate, integrate_series, VelocityUnit};
pub use resample::{resample, Interpolation, ResampleWindow};
pub use series::{min_max, ChannelMatrix, ChannelSeries, TimeBase, Unit};
