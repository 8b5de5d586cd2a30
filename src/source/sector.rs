//! Data sector layout
//!
//! Every data sector is a fixed [`SECTOR_SIZE`] block: a 30-byte header
//! carrying the timestamp and sampling configuration, 480 bytes of
//! interleaved little-endian `i16` samples, and a trailing checksum.

use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use chrono::{DateTime, Datelike, NaiveDate, Timelike};
use serde::Serialize;

use crate::error::{ConvertError, Result};

/// Size of one data sector in bytes
pub const SECTOR_SIZE: usize = 512;

/// Offset of the sample block within a sector
pub const SAMPLE_OFFSET: usize = 30;

/// Size of the sample block within a sector
pub const SAMPLE_BLOCK_SIZE: usize = 480;

/// Bytes per stored axis value
pub const BYTES_PER_AXIS: usize = 2;

const SECTOR_MAGIC: &[u8; 2] = b"AX";
const SECTOR_PACKET_LENGTH: u16 = (SECTOR_SIZE - 4) as u16;

const FRACTIONAL_OFFSET: usize = 4;
const SESSION_ID_OFFSET: usize = 6;
const SEQUENCE_OFFSET: usize = 10;
const TIMESTAMP_OFFSET: usize = 14;
const LIGHT_OFFSET: usize = 18;
const RATE_CODE_OFFSET: usize = 24;
const AXES_OFFSET: usize = 25;
const TIMESTAMP_INDEX_OFFSET: usize = 26;
const SAMPLE_COUNT_OFFSET: usize = 28;

const FRACTIONAL_VALID: u16 = 0x8000;
const FRACTIONAL_UNITS: f64 = 32768.0;

/// Magnetometer counts per microtesla
const MAG_SCALE: f64 = 16.0;
/// Accelerometer counts per g on 3-axis loggers
const ACCEL_SCALE_3_AXIS: f64 = 256.0;
/// Full gyroscope range before the range divisor is applied (deg/s)
const GYRO_FULL_RANGE: f64 = 8000.0;

/// Valid channel counts: accel, accel+gyro, accel+gyro+mag
pub const VALID_CHANNEL_COUNTS: [usize; 3] = [3, 6, 9];

/// Per-triad count-to-unit divisors
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaleFactors {
    /// Counts per g
    pub accel: f64,
    /// Counts per deg/s
    pub gyro: f64,
    /// Counts per uT
    pub mag: f64,
}

impl Default for ScaleFactors {
    fn default() -> Self {
        Self {
            accel: ACCEL_SCALE_3_AXIS,
            gyro: 1.0,
            mag: MAG_SCALE,
        }
    }
}

impl ScaleFactors {
    /// Derive scale factors from a sector's light/scale field
    pub fn from_light_field(channel_count: usize, light: u16) -> Self {
        if channel_count <= 3 {
            return Self::default();
        }

        let accel_exponent = (light >> 13) & 0x07;
        let gyro_divisor = (light >> 10) & 0x07;
        let gyro_range = GYRO_FULL_RANGE / f64::from(1u16 << gyro_divisor);

        Self {
            accel: f64::from(1u32 << (8 + accel_exponent)),
            gyro: 32768.0 / gyro_range,
            mag: MAG_SCALE,
        }
    }

    /// Divisor for a channel index (0-2 accel, 3-5 gyro, 6-8 mag)
    pub fn for_channel(&self, channel: usize) -> f64 {
        match channel / 3 {
            0 => self.accel,
            1 => self.gyro,
            _ => self.mag,
        }
    }
}

/// Decoded sector header
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorHeader {
    pub session_id: u32,
    pub sequence: u32,
    /// Unix time of the first sample in this sector
    pub start_time: f64,
    /// Nominal sample rate in Hz
    pub sample_rate: f64,
    pub channel_count: usize,
    pub samples_per_sector: usize,
    pub scale: ScaleFactors,
}

impl SectorHeader {
    /// Parse and validate the header of one sector
    pub fn parse(sector: &[u8], path: &Path) -> Result<Self> {
        let malformed = |reason: String| ConvertError::MalformedSector {
            path: path.to_path_buf(),
            reason,
        };

        if sector.len() < SECTOR_SIZE {
            return Err(malformed(format!(
                "sector is {} bytes, expected {}",
                sector.len(),
                SECTOR_SIZE
            )));
        }
        if &sector[0..2] != SECTOR_MAGIC {
            return Err(malformed(format!("bad sector magic {:02x?}", &sector[0..2])));
        }

        let axes = sector[AXES_OFFSET];
        let channel_count = (axes >> 4) as usize;
        if !VALID_CHANNEL_COUNTS.contains(&channel_count) {
            return Err(malformed(format!(
                "channel count {} is not one of {:?}",
                channel_count, VALID_CHANNEL_COUNTS
            )));
        }
        let bytes_per_axis = (axes & 0x0F) as usize;
        if bytes_per_axis != BYTES_PER_AXIS {
            return Err(malformed(format!(
                "{}-byte samples are not supported",
                bytes_per_axis
            )));
        }

        let samples_per_sector = LittleEndian::read_u16(&sector[SAMPLE_COUNT_OFFSET..]) as usize;
        let capacity = max_samples_per_sector(channel_count);
        if samples_per_sector == 0 || samples_per_sector > capacity {
            return Err(malformed(format!(
                "{} samples per sector, expected 1..={} for {} channels",
                samples_per_sector, capacity, channel_count
            )));
        }

        let packed = LittleEndian::read_u32(&sector[TIMESTAMP_OFFSET..]);
        let whole_seconds = unpack_timestamp(packed)
            .ok_or_else(|| malformed(format!("invalid packed timestamp {:#010x}", packed)))?;

        let sample_rate = rate_from_code(sector[RATE_CODE_OFFSET]);
        let fractional = LittleEndian::read_u16(&sector[FRACTIONAL_OFFSET..]);
        let fraction = if fractional & FRACTIONAL_VALID != 0 {
            f64::from(fractional & !FRACTIONAL_VALID) / FRACTIONAL_UNITS
        } else {
            0.0
        };
        let timestamp_index = LittleEndian::read_i16(&sector[TIMESTAMP_INDEX_OFFSET..]);
        let start_time =
            whole_seconds as f64 + fraction - f64::from(timestamp_index) / sample_rate;

        let light = LittleEndian::read_u16(&sector[LIGHT_OFFSET..]);

        Ok(Self {
            session_id: LittleEndian::read_u32(&sector[SESSION_ID_OFFSET..]),
            sequence: LittleEndian::read_u32(&sector[SEQUENCE_OFFSET..]),
            start_time,
            sample_rate,
            channel_count,
            samples_per_sector,
            scale: ScaleFactors::from_light_field(channel_count, light),
        })
    }
}

/// Fields needed to build a sector from scratch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorSpec {
    pub session_id: u32,
    pub sequence: u32,
    pub start_time: f64,
    pub rate_code: u8,
    pub channel_count: usize,
    pub samples_per_sector: usize,
    pub light: u16,
}

impl SectorSpec {
    /// Encode a sector; `samples` is interleaved in channel order
    pub fn encode(&self, samples: &[i16]) -> Vec<u8> {
        let mut sector = vec![0u8; SECTOR_SIZE];
        sector[0..2].copy_from_slice(SECTOR_MAGIC);
        LittleEndian::write_u16(&mut sector[2..4], SECTOR_PACKET_LENGTH);

        let mut whole = self.start_time.floor() as i64;
        let mut ticks = ((self.start_time - whole as f64) * FRACTIONAL_UNITS).round() as u16;
        if ticks >= FRACTIONAL_UNITS as u16 {
            whole += 1;
            ticks = 0;
        }
        LittleEndian::write_u16(&mut sector[FRACTIONAL_OFFSET..], FRACTIONAL_VALID | ticks);
        LittleEndian::write_u32(&mut sector[SESSION_ID_OFFSET..], self.session_id);
        LittleEndian::write_u32(&mut sector[SEQUENCE_OFFSET..], self.sequence);
        LittleEndian::write_u32(&mut sector[TIMESTAMP_OFFSET..], pack_timestamp(whole));
        LittleEndian::write_u16(&mut sector[LIGHT_OFFSET..], self.light);
        sector[RATE_CODE_OFFSET] = self.rate_code;
        sector[AXES_OFFSET] = ((self.channel_count as u8) << 4) | BYTES_PER_AXIS as u8;
        LittleEndian::write_i16(&mut sector[TIMESTAMP_INDEX_OFFSET..], 0);
        LittleEndian::write_u16(
            &mut sector[SAMPLE_COUNT_OFFSET..],
            self.samples_per_sector as u16,
        );

        let count = samples
            .len()
            .min(self.samples_per_sector * self.channel_count);
        for (i, value) in samples[..count].iter().enumerate() {
            let at = SAMPLE_OFFSET + i * BYTES_PER_AXIS;
            LittleEndian::write_i16(&mut sector[at..at + BYTES_PER_AXIS], *value);
        }

        sector
    }
}

/// Why a data sector does not match the layout of its recording, if it doesn't
pub fn layout_mismatch(
    sector: &[u8],
    channel_count: usize,
    samples_per_sector: usize,
) -> Option<String> {
    if &sector[0..2] != SECTOR_MAGIC {
        return Some(format!("bad sector magic {:02x?}", &sector[0..2]));
    }
    let channels = (sector[AXES_OFFSET] >> 4) as usize;
    if channels != channel_count {
        return Some(format!("{} channels, expected {}", channels, channel_count));
    }
    let samples = LittleEndian::read_u16(&sector[SAMPLE_COUNT_OFFSET..]) as usize;
    if samples != samples_per_sector {
        return Some(format!("{} samples, expected {}", samples, samples_per_sector));
    }
    None
}

/// Largest number of samples a sector can hold for a channel count
pub fn max_samples_per_sector(channel_count: usize) -> usize {
    SAMPLE_BLOCK_SIZE / (channel_count * BYTES_PER_AXIS)
}

/// Sample rate in Hz encoded by a rate code
pub fn rate_from_code(code: u8) -> f64 {
    3200.0 / f64::from(1u32 << (15 - u32::from(code & 0x0F)))
}

/// Rate code for an exactly representable sample rate
pub fn rate_code(sample_rate: f64) -> Option<u8> {
    (0u8..=15).find(|&code| (rate_from_code(code) - sample_rate).abs() < 1e-9)
}

/// Unpack a `YYYYYYMM MMDDDDDh hhhhmmmm mmssssss` timestamp into Unix seconds
pub fn unpack_timestamp(packed: u32) -> Option<i64> {
    let year = ((packed >> 26) & 0x3F) as i32 + 2000;
    let month = (packed >> 22) & 0x0F;
    let day = (packed >> 17) & 0x1F;
    let hour = (packed >> 12) & 0x1F;
    let minute = (packed >> 6) & 0x3F;
    let second = packed & 0x3F;

    NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(hour, minute, second)
        .map(|dt| dt.and_utc().timestamp())
}

/// Pack Unix seconds into the sector timestamp format (years 2000-2063)
pub fn pack_timestamp(unix_seconds: i64) -> u32 {
    let Some(dt) = DateTime::from_timestamp(unix_seconds, 0) else {
        return 0;
    };
    let year = (dt.year() - 2000).clamp(0, 0x3F) as u32;
    (year << 26)
        | (dt.month() << 22)
        | (dt.day() << 17)
        | (dt.hour() << 12)
        | (dt.minute() << 6)
        | dt.second()
}
