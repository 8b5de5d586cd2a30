//! Channel series and matrices
//!
//! A [`ChannelSeries`] owns its samples. Stages take a series or matrix by
//! value and hand back a new one, so no buffer is shared across stages.

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};

/// Physical unit carried by a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// Gravitational acceleration
    G,
    DegreesPerSecond,
    MicroTesla,
    MetresPerSecond,
    MillimetresPerSecond,
}

impl Unit {
    /// Unit of a freshly decoded channel (0-2 accel, 3-5 gyro, 6-8 mag)
    pub fn for_channel(channel: usize) -> Self {
        match channel / 3 {
            0 => Unit::G,
            1 => Unit::DegreesPerSecond,
            _ => Unit::MicroTesla,
        }
    }

    /// Symbol written into channel headers
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::G => "g",
            Unit::DegreesPerSecond => "deg/s",
            Unit::MicroTesla => "uT",
            Unit::MetresPerSecond => "m/s",
            Unit::MillimetresPerSecond => "mm/s",
        }
    }
}

/// Uniform time base: first sample time and sample rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeBase {
    /// Unix time of sample 0 in seconds
    pub start: f64,
    /// Samples per second
    pub rate: f64,
}

impl TimeBase {
    pub fn new(start: f64, rate: f64) -> Self {
        Self { start, rate }
    }

    /// Seconds between samples
    pub fn period(&self) -> f64 {
        1.0 / self.rate
    }

    /// Time of sample `index`
    pub fn time_at(&self, index: usize) -> f64 {
        self.start + index as f64 / self.rate
    }

    /// End of a series of `len` samples (one period past the last sample)
    pub fn stop(&self, len: usize) -> f64 {
        self.time_at(len)
    }
}

/// One channel of samples with its time base and unit
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSeries {
    samples: Vec<f64>,
    time_base: TimeBase,
    unit: Unit,
}

impl ChannelSeries {
    pub fn new(samples: Vec<f64>, time_base: TimeBase, unit: Unit) -> Self {
        Self {
            samples,
            time_base,
            unit,
        }
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f64] {
        &mut self.samples
    }

    pub fn into_samples(self) -> Vec<f64> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn stop_time(&self) -> f64 {
        self.time_base.stop(self.samples.len())
    }

    /// Replace the samples and unit, keeping the time base
    pub fn with_samples(self, samples: Vec<f64>, unit: Unit) -> Self {
        Self {
            samples,
            time_base: self.time_base,
            unit,
        }
    }

    /// Smallest and largest sample, `None` when empty
    pub fn min_max(&self) -> Option<(f64, f64)> {
        min_max(&self.samples)
    }
}

/// Channels of one logger sharing a time base and length
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMatrix {
    channels: Vec<ChannelSeries>,
}

impl ChannelMatrix {
    /// Build a matrix, checking every channel shares length and time base
    pub fn new(channels: Vec<ChannelSeries>) -> Result<Self> {
        if let Some(first) = channels.first() {
            for (index, channel) in channels.iter().enumerate().skip(1) {
                if channel.len() != first.len() || channel.time_base != first.time_base {
                    return Err(ConvertError::InvalidParameter {
                        param: format!("channel {}", index),
                        value: format!("{} samples at {:?}", channel.len(), channel.time_base),
                        expected: format!("{} samples at {:?}", first.len(), first.time_base),
                    });
                }
            }
        }
        Ok(Self { channels })
    }

    /// Build from equal-length sample columns with per-channel default units
    pub fn from_columns(columns: Vec<Vec<f64>>, time_base: TimeBase) -> Result<Self> {
        let channels = columns
            .into_iter()
            .enumerate()
            .map(|(index, samples)| ChannelSeries::new(samples, time_base, Unit::for_channel(index)))
            .collect();
        Self::new(channels)
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn num_samples(&self) -> usize {
        self.channels.first().map_or(0, ChannelSeries::len)
    }

    /// Shared time base, `None` for a matrix without channels
    pub fn time_base(&self) -> Option<TimeBase> {
        self.channels.first().map(ChannelSeries::time_base)
    }

    pub fn channel(&self, index: usize) -> Option<&ChannelSeries> {
        self.channels.get(index)
    }

    pub fn channels(&self) -> &[ChannelSeries] {
        &self.channels
    }

    pub fn into_channels(self) -> Vec<ChannelSeries> {
        self.channels
    }

    pub fn units(&self) -> Vec<Unit> {
        self.channels.iter().map(ChannelSeries::unit).collect()
    }
}

/// Smallest and largest value of a slice, `None` when empty
pub fn min_max(samples: &[f64]) -> Option<(f64, f64)> {
    let first = *samples.first()?;
    Some(
        samples
            .iter()
            .fold((first, first), |(lo, hi), &s| (lo.min(s), hi.max(s))),
    )
}
