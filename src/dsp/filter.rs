//! Zero-phase Butterworth filtering
//!
//! Designs low-pass and high-pass Butterworth filters as cascaded biquad
//! sections (bilinear transform with frequency pre-warping) and applies them
//! forward and backward over a whole channel, so the result has no phase
//! shift and the squared magnitude response of the design.
//!
//! Edges are handled like a classic `filtfilt`: the signal is padded with an
//! odd reflection and every section starts from its steady state for the
//! first (forward) or last (backward) padded sample.

use std::f64::consts::PI;

use serde::Serialize;

use super::series::{ChannelMatrix, ChannelSeries};
use crate::error::{ConvertError, Result};

/// Order used when the job does not name one
pub const DEFAULT_FILTER_ORDER: usize = 8;

/// Highest supported order
pub const MAX_FILTER_ORDER: usize = 16;

/// Fraction the low-pass cutoff is pulled below the requested frequency
pub const LOWPASS_CUTOFF_NUDGE: f64 = 0.05;

/// Response of a filter design
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    LowPass,
    HighPass,
}

/// Normalized section coefficients (`a0 == 1`)
/// H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq)]
struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    /// Second-order section for the analog pole pair `s^2 + damping*s + 1`
    fn second_order(kind: FilterKind, k: f64, damping: f64) -> Self {
        let k2 = k * k;
        let a0 = 1.0 + damping * k + k2;
        let (b0, b1, b2) = match kind {
            FilterKind::LowPass => (k2, 2.0 * k2, k2),
            FilterKind::HighPass => (1.0, -2.0, 1.0),
        };
        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: 2.0 * (k2 - 1.0) / a0,
            a2: (1.0 - damping * k + k2) / a0,
        }
    }

    /// First-order section for the real pole of odd orders
    fn first_order(kind: FilterKind, k: f64) -> Self {
        let a0 = 1.0 + k;
        let (b0, b1) = match kind {
            FilterKind::LowPass => (k, k),
            FilterKind::HighPass => (1.0, -1.0),
        };
        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: 0.0,
            a1: (k - 1.0) / a0,
            a2: 0.0,
        }
    }

    /// Gain at DC
    fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// State that makes a constant input `level` pass without a transient
    fn steady_state(&self, level: f64) -> BiquadState {
        let g = self.dc_gain();
        let z2 = (self.b2 - self.a2 * g) * level;
        let z1 = (self.b1 - self.a1 * g) * level + z2;
        BiquadState { z1, z2 }
    }
}

/// Transposed direct form II state
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    z1: f64,
    z2: f64,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, c: &BiquadCoeffs, input: f64) -> f64 {
        let output = c.b0 * input + self.z1;
        self.z1 = c.b1 * input - c.a1 * output + self.z2;
        self.z2 = c.b2 * input - c.a2 * output;
        output
    }
}

/// Butterworth filter applied forward and backward
#[derive(Debug, Clone, PartialEq)]
pub struct ZeroPhaseFilter {
    kind: FilterKind,
    order: usize,
    /// Cutoff as a fraction of the Nyquist frequency
    normalized_cutoff: f64,
    sections: Vec<BiquadCoeffs>,
}

impl ZeroPhaseFilter {
    /// Low-pass filter for data at `input_rate`
    ///
    /// The effective cutoff is 95% of `cutoff_hz` so the band edge stays
    /// clear of the output Nyquist frequency.
    pub fn lowpass(cutoff_hz: f64, input_rate: f64, order: usize) -> Result<Self> {
        let effective = cutoff_hz * (1.0 - LOWPASS_CUTOFF_NUDGE);
        Self::design(FilterKind::LowPass, cutoff_hz, effective, input_rate, order)
    }

    /// High-pass filter for data at `input_rate`
    pub fn highpass(cutoff_hz: f64, input_rate: f64, order: usize) -> Result<Self> {
        Self::design(FilterKind::HighPass, cutoff_hz, cutoff_hz, input_rate, order)
    }

    fn design(
        kind: FilterKind,
        cutoff_hz: f64,
        effective_hz: f64,
        sample_rate: f64,
        order: usize,
    ) -> Result<Self> {
        if order == 0 || order > MAX_FILTER_ORDER {
            return Err(ConvertError::InvalidParameter {
                param: "filter_order".to_string(),
                value: order.to_string(),
                expected: format!("1..={}", MAX_FILTER_ORDER),
            });
        }

        let normalized = effective_hz / (sample_rate / 2.0);
        if !(normalized > 0.0 && normalized < 1.0) {
            return Err(ConvertError::InvalidCutoff {
                cutoff_hz,
                sample_rate,
                normalized,
            });
        }

        // Pre-warped analog frequency for the bilinear transform
        let k = (PI * normalized / 2.0).tan();

        let mut sections = Vec::with_capacity(order.div_ceil(2));
        for pair in 0..order / 2 {
            let theta = PI * (2 * pair + 1) as f64 / (2 * order) as f64;
            sections.push(BiquadCoeffs::second_order(kind, k, 2.0 * theta.sin()));
        }
        if order % 2 == 1 {
            sections.push(BiquadCoeffs::first_order(kind, k));
        }

        Ok(Self {
            kind,
            order,
            normalized_cutoff: normalized,
            sections,
        })
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Cutoff as a fraction of the input Nyquist frequency
    pub fn normalized_cutoff(&self) -> f64 {
        self.normalized_cutoff
    }

    /// Samples of odd-reflection padding on each side
    fn pad_len(&self, len: usize) -> usize {
        (3 * (self.order + 1)).min(len.saturating_sub(1))
    }

    /// Filter `samples` in place with zero phase shift
    pub fn apply(&self, samples: &mut [f64]) {
        let len = samples.len();
        if len == 0 {
            return;
        }

        let pad = self.pad_len(len);
        let mut extended = odd_extend(samples, pad);

        self.run_cascade(&mut extended);
        extended.reverse();
        self.run_cascade(&mut extended);
        extended.reverse();

        samples.copy_from_slice(&extended[pad..pad + len]);
    }

    /// Run every section over `data`, each starting in steady state
    fn run_cascade(&self, data: &mut [f64]) {
        let mut level = data[0];
        for coeffs in &self.sections {
            let mut state = coeffs.steady_state(level);
            for sample in data.iter_mut() {
                *sample = state.process(coeffs, *sample);
            }
            level *= coeffs.dc_gain();
        }
    }

    /// Filter one channel, keeping its time base and unit
    pub fn apply_series(&self, mut series: ChannelSeries) -> ChannelSeries {
        self.apply(series.samples_mut());
        series
    }

    /// Filter every channel of a matrix
    pub fn apply_matrix(&self, matrix: ChannelMatrix) -> Result<ChannelMatrix> {
        let channels = matrix
            .into_channels()
            .into_iter()
            .map(|series| self.apply_series(series))
            .collect();
        ChannelMatrix::new(channels)
    }
}

/// Pad `samples` with `pad` odd-reflected values on both ends
fn odd_extend(samples: &[f64], pad: usize) -> Vec<f64> {
    let len = samples.len();
    let first = samples[0];
    let last = samples[len - 1];

    let mut extended = Vec::with_capacity(len + 2 * pad);
    extended.extend((1..=pad).rev().map(|i| 2.0 * first - samples[i]));
    extended.extend_from_slice(samples);
    extended.extend((1..=pad).map(|i| 2.0 * last - samples[len - 1 - i]));
    extended
}
