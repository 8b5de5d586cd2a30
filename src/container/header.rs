//! Container header records
//!
//! Layout of the measurement container (format version 5012):
//!
//! ```text
//! preamble:  u16 file id | u32 data offset | str comment | 32 x str reserved
//!            u16 channel count | u32 max channels (0) | N x u32 header offset | u32 (0)
//! per channel:
//!            u16 index | u32 samples | str name | str unit | str comment
//!            u16 format (0) | u16 width | f64 time | u32 148 | 148-byte block
//!            u8 lin mode | u8 scale type | u8 lin points | u16 thermo | str formula
//!            u32 70 | 70-byte sensor info
//! ```
//!
//! Strings are `u16`-length prefixed. Times are legacy spreadsheet days
//! (days since 1899-12-30).

use std::io::{self, Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use super::encoding::{
    read_fixed_str, read_string, skip_bytes, string_len, write_fixed_str, write_string,
    write_zeros,
};
use crate::error::{ConvertError, Result};

/// Container format version
pub const FILE_ID: u16 = 5012;

/// Number of reserved comment strings in the preamble
pub const RESERVED_STRINGS: usize = 32;

/// Content of every reserved string
pub const RESERVED_TEXT: &str = " ";

/// Size of the extended channel header block
pub const EXTENDED_HEADER_SIZE: u32 = 148;

/// Size of the sensor info block
pub const SENSOR_INFO_SIZE: u32 = 70;

/// Description written into the sensor info block
pub const SENSOR_DESCRIPTION: &str = "[description]";

/// Days between 1899-12-30 and the Unix epoch
pub const LEGACY_EPOCH_OFFSET_DAYS: f64 = 25569.0;

const SECONDS_PER_DAY: f64 = 86400.0;
const DESCRIPTION_WIDTH: usize = 50;
const SENSOR_ID_WIDTH: usize = 16;
const SERIAL_WIDTH: usize = 32;
const UNIT_WIDTH: usize = 8;

/// Encoded size of a channel record without its three strings
const CHANNEL_FIXED_LEN: usize = 2 + 4 + 2 + 2 + 8 + 4;
const TRAILER_LEN: usize = 1 + 1 + 1 + 2 + 2 + 4;

/// Unix seconds to legacy spreadsheet days
pub fn legacy_days(unix_seconds: f64) -> f64 {
    unix_seconds / SECONDS_PER_DAY + LEGACY_EPOCH_OFFSET_DAYS
}

/// Legacy spreadsheet days to Unix seconds
pub fn unix_seconds(legacy_days: f64) -> f64 {
    (legacy_days - LEGACY_EPOCH_OFFSET_DAYS) * SECONDS_PER_DAY
}

/// On-disk sample encoding of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleWidth {
    /// 8-byte IEEE double
    Float64,
    /// 4-byte IEEE single
    #[default]
    Float32,
    /// {min, max} double pair followed by `u16` levels
    Quantized16,
}

impl SampleWidth {
    /// Bytes of the {min, max} pair leading a quantized channel
    pub const RANGE_HEADER_LEN: u64 = 16;

    /// Parse the byte-width code (8, 4 or 2)
    pub fn from_bytes(bytes: u16) -> Result<Self> {
        match bytes {
            8 => Ok(SampleWidth::Float64),
            4 => Ok(SampleWidth::Float32),
            2 => Ok(SampleWidth::Quantized16),
            other => Err(ConvertError::InvalidParameter {
                param: "byte_width".to_string(),
                value: other.to_string(),
                expected: "8, 4 or 2".to_string(),
            }),
        }
    }

    /// Bytes per sample
    pub fn bytes(&self) -> u16 {
        match self {
            SampleWidth::Float64 => 8,
            SampleWidth::Float32 => 4,
            SampleWidth::Quantized16 => 2,
        }
    }

    /// Export format code stored in the extended header
    pub fn export_format(&self) -> u8 {
        match self {
            SampleWidth::Float64 => 0,
            SampleWidth::Float32 => 1,
            SampleWidth::Quantized16 => 2,
        }
    }

    /// Bytes occupied by a channel of `samples` samples
    pub fn block_len(&self, samples: usize) -> u64 {
        let data = samples as u64 * u64::from(self.bytes());
        match self {
            SampleWidth::Quantized16 => data + Self::RANGE_HEADER_LEN,
            _ => data,
        }
    }
}

/// Metadata record of one output channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelHeader {
    /// Position of the channel in the container
    pub index: u16,
    pub sample_count: u32,
    pub name: String,
    pub unit: String,
    pub comment: String,
    pub width: SampleWidth,
    /// Unix time of the first sample
    pub start_time: f64,
    pub sample_period_ms: f64,
    /// Device identifier written as the sensor id
    pub sensor_id: String,
}

impl ChannelHeader {
    /// Sample rate implied by the sample period
    pub fn sample_rate(&self) -> f64 {
        1000.0 / self.sample_period_ms
    }

    /// Unix time half a period past the last sample
    pub fn stop_time(&self) -> f64 {
        self.start_time + (f64::from(self.sample_count) - 0.5) * self.sample_period_ms / 1000.0
    }

    /// Bytes of this channel's data block
    pub fn data_len(&self) -> u64 {
        self.width.block_len(self.sample_count as usize)
    }

    /// Encoded size of this record
    pub fn encoded_len(&self) -> usize {
        CHANNEL_FIXED_LEN
            + string_len(&self.name)
            + string_len(&self.unit)
            + string_len(&self.comment)
            + EXTENDED_HEADER_SIZE as usize
            + TRAILER_LEN
            + SENSOR_INFO_SIZE as usize
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let time = legacy_days(self.start_time);

        w.write_u16::<LittleEndian>(self.index)?;
        w.write_u32::<LittleEndian>(self.sample_count)?;
        write_string(w, &self.name)?;
        write_string(w, &self.unit)?;
        write_string(w, &self.comment)?;
        w.write_u16::<LittleEndian>(0)?; // numeric
        w.write_u16::<LittleEndian>(self.width.bytes())?;
        w.write_f64::<LittleEndian>(time)?;
        w.write_u32::<LittleEndian>(EXTENDED_HEADER_SIZE)?;

        self.write_extended(w, time)?;

        // linearisation: none, no table, no thermo type, empty formula
        w.write_u8(0)?;
        w.write_u8(0)?;
        w.write_u8(0)?;
        w.write_u16::<LittleEndian>(0)?;
        w.write_u16::<LittleEndian>(0)?;

        w.write_u32::<LittleEndian>(SENSOR_INFO_SIZE)?;
        w.write_u32::<LittleEndian>(0)?; // in use
        write_fixed_str(w, SENSOR_DESCRIPTION, DESCRIPTION_WIDTH)?;
        write_fixed_str(w, &self.sensor_id, SENSOR_ID_WIDTH)
    }

    /// The 148-byte acquisition block
    fn write_extended<W: Write>(&self, w: &mut W, time: f64) -> io::Result<()> {
        w.write_f64::<LittleEndian>(time)?;
        w.write_f64::<LittleEndian>(self.sample_period_ms)?;
        // sensor type, supply voltage, filter characteristic and frequency
        write_zeros(w, 4 * 4)?;
        // tare, zero, measuring range, input characteristic
        write_zeros(w, 4 * 4)?;
        write_zeros(w, SERIAL_WIDTH)?;
        write_zeros(w, UNIT_WIDTH)?; // physical unit
        write_zeros(w, UNIT_WIDTH)?; // native unit
        w.write_u32::<LittleEndian>(0)?; // slot
        w.write_u32::<LittleEndian>(u32::from(self.index))?; // sub-slot
        // amplifier type, connector type, k factor, bridge factor,
        // measurement signal, amplifier input, highpass code
        write_zeros(w, 7 * 4)?;
        w.write_u8(0)?; // online import info
        w.write_u8(0)?; // engineering units
        w.write_f32::<LittleEndian>(0.0)?; // software tare
        w.write_u8(0)?; // write protected
        w.write_f32::<LittleEndian>(0.0)?; // nominal range
        w.write_f32::<LittleEndian>(0.0)?; // cable length factor
        w.write_u8(self.width.export_format())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let index = r.read_u16::<LittleEndian>()?;
        let sample_count = r.read_u32::<LittleEndian>()?;
        let name = read_string(r)?;
        let unit = read_string(r)?;
        let comment = read_string(r)?;

        let format = r.read_u16::<LittleEndian>()?;
        if format != 0 {
            return Err(format_error(format!(
                "channel {} has non-numeric format {}",
                index, format
            )));
        }
        let width = SampleWidth::from_bytes(r.read_u16::<LittleEndian>()?)?;
        let time = r.read_f64::<LittleEndian>()?;

        let extended = r.read_u32::<LittleEndian>()?;
        if extended != EXTENDED_HEADER_SIZE {
            return Err(format_error(format!(
                "channel {} extended header is {} bytes, expected {}",
                index, extended, EXTENDED_HEADER_SIZE
            )));
        }
        let mut block = vec![0u8; EXTENDED_HEADER_SIZE as usize];
        r.read_exact(&mut block)?;
        let mut block = Cursor::new(block);
        let _t0 = block.read_f64::<LittleEndian>()?;
        let sample_period_ms = block.read_f64::<LittleEndian>()?;
        block.set_position(u64::from(EXTENDED_HEADER_SIZE) - 1);
        let export_format = block.read_u8()?;
        if export_format != width.export_format() {
            return Err(format_error(format!(
                "channel {} export format {} disagrees with width {}",
                index,
                export_format,
                width.bytes()
            )));
        }

        let _lin_mode = r.read_u8()?;
        let _scale_type = r.read_u8()?;
        let lin_points = r.read_u8()?;
        skip_bytes(r, lin_points as usize)?;
        let _thermo = r.read_u16::<LittleEndian>()?;
        let formula_len = r.read_u16::<LittleEndian>()?;
        skip_bytes(r, formula_len as usize)?;

        let info_len = r.read_u32::<LittleEndian>()? as usize;
        let sensor_id = if info_len == SENSOR_INFO_SIZE as usize {
            let _in_use = r.read_u32::<LittleEndian>()?;
            skip_bytes(r, DESCRIPTION_WIDTH)?;
            read_fixed_str(r, SENSOR_ID_WIDTH)?
        } else {
            skip_bytes(r, info_len)?;
            String::new()
        };

        Ok(Self {
            index,
            sample_count,
            name,
            unit,
            comment,
            width,
            start_time: unix_seconds(time),
            sample_period_ms,
            sensor_id,
        })
    }
}

/// Preamble plus channel records of a container
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerHeader {
    pub comment: String,
    pub channels: Vec<ChannelHeader>,
}

impl ContainerHeader {
    pub fn new(comment: impl Into<String>, channels: Vec<ChannelHeader>) -> Self {
        Self {
            comment: comment.into(),
            channels,
        }
    }

    /// Bytes before the first channel record
    pub fn preamble_len(&self) -> usize {
        2 + 4
            + string_len(&self.comment)
            + RESERVED_STRINGS * string_len(RESERVED_TEXT)
            + 2
            + 4
            + 4 * self.channels.len()
            + 4
    }

    /// Absolute offset of every channel record
    pub fn channel_offsets(&self) -> Vec<u64> {
        let mut offset = self.preamble_len() as u64;
        self.channels
            .iter()
            .map(|channel| {
                let current = offset;
                offset += channel.encoded_len() as u64;
                current
            })
            .collect()
    }

    /// Offset of the data block, which is the total header length
    pub fn data_offset(&self) -> u64 {
        self.preamble_len() as u64
            + self
                .channels
                .iter()
                .map(|c| c.encoded_len() as u64)
                .sum::<u64>()
    }

    /// Bytes of all channel data blocks
    pub fn data_len(&self) -> u64 {
        self.channels.iter().map(ChannelHeader::data_len).sum()
    }

    /// Serialize the complete header block
    pub fn encode(&self) -> Result<Vec<u8>> {
        let count = u16::try_from(self.channels.len()).map_err(|_| {
            ConvertError::InvalidParameter {
                param: "channels".to_string(),
                value: self.channels.len().to_string(),
                expected: format!("at most {}", u16::MAX),
            }
        })?;
        let data_offset = u32::try_from(self.data_offset())
            .map_err(|_| format_error("header block exceeds 4 GiB".to_string()))?;

        let mut buf = Vec::with_capacity(data_offset as usize);
        buf.write_u16::<LittleEndian>(FILE_ID)?;
        buf.write_u32::<LittleEndian>(data_offset)?;
        write_string(&mut buf, &self.comment)?;
        for _ in 0..RESERVED_STRINGS {
            write_string(&mut buf, RESERVED_TEXT)?;
        }
        buf.write_u16::<LittleEndian>(count)?;
        buf.write_u32::<LittleEndian>(0)?;
        for offset in self.channel_offsets() {
            buf.write_u32::<LittleEndian>(offset as u32)?;
        }
        buf.write_u32::<LittleEndian>(0)?;

        for channel in &self.channels {
            channel.write_to(&mut buf)?;
        }
        Ok(buf)
    }

    /// Parse a header block, returning it with the stored data offset
    pub fn read_from<R: Read>(r: &mut R) -> Result<(Self, u64)> {
        let file_id = r.read_u16::<LittleEndian>()?;
        if file_id != FILE_ID {
            return Err(format_error(format!(
                "file id {} is not {}",
                file_id, FILE_ID
            )));
        }
        let data_offset = u64::from(r.read_u32::<LittleEndian>()?);
        let comment = read_string(r)?;
        for _ in 0..RESERVED_STRINGS {
            read_string(r)?;
        }

        let count = r.read_u16::<LittleEndian>()? as usize;
        let _max_channels = r.read_u32::<LittleEndian>()?;
        let offsets = (0..count)
            .map(|_| r.read_u32::<LittleEndian>().map(u64::from))
            .collect::<io::Result<Vec<_>>>()?;
        let _unused = r.read_u32::<LittleEndian>()?;

        let mut channels = Vec::with_capacity(count);
        for _ in 0..count {
            channels.push(ChannelHeader::read_from(r)?);
        }

        let header = Self { comment, channels };
        if header.channel_offsets() != offsets {
            return Err(format_error(
                "channel offset table does not match the channel records".to_string(),
            ));
        }
        if header.data_offset() != data_offset {
            return Err(format_error(format!(
                "data offset {} does not follow the headers ending at {}",
                data_offset,
                header.data_offset()
            )));
        }
        Ok((header, data_offset))
    }
}

fn format_error(reason: String) -> ConvertError {
    ConvertError::ContainerFormat { reason }
}
