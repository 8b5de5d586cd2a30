//! Channel data blocks
//!
//! A channel's samples are stored contiguously as 8-byte doubles, 4-byte
//! singles, or in the compact form: a `{min, max}` double pair followed by
//! one `u16` level per sample, `min` mapping to 0 and `max` to 65535.

use std::io::{self, BufWriter, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;

use super::header::SampleWidth;
use crate::dsp::min_max;
use crate::error::Result;

/// Highest quantization level
pub const QUANTIZED_LEVELS: f64 = 65535.0;

/// Value range of a quantized channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuantizedRange {
    pub min: f64,
    pub max: f64,
}

impl QuantizedRange {
    /// Range spanning `samples`; `{0, 0}` when empty
    pub fn of(samples: &[f64]) -> Self {
        let (min, max) = min_max(samples).unwrap_or((0.0, 0.0));
        Self { min, max }
    }

    /// Value represented by one level step
    pub fn step(&self) -> f64 {
        (self.max - self.min) / QUANTIZED_LEVELS
    }

    pub fn quantize(&self, value: f64) -> u16 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0;
        }
        ((value - self.min) / span * QUANTIZED_LEVELS)
            .round()
            .clamp(0.0, QUANTIZED_LEVELS) as u16
    }

    pub fn dequantize(&self, level: u16) -> f64 {
        self.min + f64::from(level) * self.step()
    }
}

/// Write one channel's data block, returning the bytes written
pub fn write_channel<W: Write>(w: &mut W, samples: &[f64], width: SampleWidth) -> io::Result<u64> {
    match width {
        SampleWidth::Float64 => {
            for &s in samples {
                w.write_f64::<LittleEndian>(s)?;
            }
        }
        SampleWidth::Float32 => {
            for &s in samples {
                w.write_f32::<LittleEndian>(s as f32)?;
            }
        }
        SampleWidth::Quantized16 => {
            let range = QuantizedRange::of(samples);
            w.write_f64::<LittleEndian>(range.min)?;
            w.write_f64::<LittleEndian>(range.max)?;
            for &s in samples {
                w.write_u16::<LittleEndian>(range.quantize(s))?;
            }
        }
    }
    Ok(width.block_len(samples.len()))
}

/// Encode one channel's data block into memory
pub fn encode_channel(samples: &[f64], width: SampleWidth) -> Vec<u8> {
    let mut buf = Vec::with_capacity(width.block_len(samples.len()) as usize);
    // writes into a Vec cannot fail
    let _ = write_channel(&mut buf, samples, width);
    buf
}

/// Write several channels back to back through one buffer
pub fn write_channels<'a, W, I>(w: W, channels: I, width: SampleWidth) -> io::Result<u64>
where
    W: Write,
    I: IntoIterator<Item = &'a [f64]>,
{
    let mut writer = BufWriter::new(w);
    let mut written = 0;
    for samples in channels {
        written += write_channel(&mut writer, samples, width)?;
    }
    writer.flush()?;
    Ok(written)
}

/// Read one channel of `count` samples
pub fn read_channel<R: Read>(r: &mut R, count: usize, width: SampleWidth) -> Result<Vec<f64>> {
    let mut samples = Vec::with_capacity(count);
    match width {
        SampleWidth::Float64 => {
            for _ in 0..count {
                samples.push(r.read_f64::<LittleEndian>()?);
            }
        }
        SampleWidth::Float32 => {
            for _ in 0..count {
                samples.push(f64::from(r.read_f32::<LittleEndian>()?));
            }
        }
        SampleWidth::Quantized16 => {
            let min = r.read_f64::<LittleEndian>()?;
            let max = r.read_f64::<LittleEndian>()?;
            let range = QuantizedRange { min, max };
            for _ in 0..count {
                samples.push(range.dequantize(r.read_u16::<LittleEndian>()?));
            }
        }
    }
    Ok(samples)
}
