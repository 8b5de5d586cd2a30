//! Synthetic recordings
//!
//! Writes files in the logger sector layout from a sample generator.
//! Useful for testing the pipeline without real logger downloads.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::header::FileHeader;
use super::sector::{max_samples_per_sector, rate_code, SectorSpec, VALID_CHANNEL_COUNTS};
use crate::error::{ConvertError, Result};

/// Shape of a synthetic recording
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticRecording {
    pub device_id: u32,
    pub session_id: u32,
    /// 3, 6 or 9
    pub channel_count: usize,
    /// Must be 3200 / 2^k Hz
    pub sample_rate: f64,
    /// Unix time of the first sample
    pub start_time: f64,
    pub sectors: usize,
    /// Samples per sector; the sector capacity when unset
    pub samples_per_sector: Option<usize>,
    /// Accelerometer scale exponent for 6/9-channel loggers (counts/g = 2^(8+e))
    pub accel_exponent: u16,
    /// Gyroscope range divisor for 6/9-channel loggers (range = 8000 / 2^d deg/s)
    pub gyro_divisor: u16,
}

impl Default for SyntheticRecording {
    fn default() -> Self {
        Self {
            device_id: 1,
            session_id: 1,
            channel_count: 3,
            sample_rate: 100.0,
            start_time: 1_584_104_203.0,
            sectors: 10,
            samples_per_sector: None,
            accel_exponent: 3,
            gyro_divisor: 2,
        }
    }
}

impl SyntheticRecording {
    pub fn samples_per_sector(&self) -> usize {
        self.samples_per_sector
            .unwrap_or_else(|| max_samples_per_sector(self.channel_count))
    }

    /// Samples per channel in the whole recording
    pub fn sample_count(&self) -> usize {
        self.sectors * self.samples_per_sector()
    }

    fn light_field(&self) -> u16 {
        if self.channel_count > 3 {
            ((self.accel_exponent & 0x07) << 13) | ((self.gyro_divisor & 0x07) << 10)
        } else {
            0
        }
    }
}

/// Write a recording; `sample(index, channel)` yields the raw count
pub fn write_recording<F>(path: &Path, recording: &SyntheticRecording, sample: F) -> Result<()>
where
    F: Fn(usize, usize) -> i16,
{
    if !VALID_CHANNEL_COUNTS.contains(&recording.channel_count) {
        return Err(ConvertError::InvalidParameter {
            param: "channel_count".to_string(),
            value: recording.channel_count.to_string(),
            expected: format!("one of {:?}", VALID_CHANNEL_COUNTS),
        });
    }
    let capacity = max_samples_per_sector(recording.channel_count);
    let per_sector = recording.samples_per_sector();
    if per_sector == 0 || per_sector > capacity {
        return Err(ConvertError::InvalidParameter {
            param: "samples_per_sector".to_string(),
            value: per_sector.to_string(),
            expected: format!("1..={}", capacity),
        });
    }
    let code = rate_code(recording.sample_rate).ok_or_else(|| {
        ConvertError::InvalidParameter {
            param: "sample_rate".to_string(),
            value: recording.sample_rate.to_string(),
            expected: "3200 / 2^k Hz".to_string(),
        }
    })?;

    let file = File::create(path).map_err(|e| ConvertError::io(path, e))?;
    let mut writer = BufWriter::new(file);

    let header = FileHeader::new(recording.device_id, recording.session_id);
    writer
        .write_all(&header.encode())
        .map_err(|e| ConvertError::io(path, e))?;

    let channels = recording.channel_count;
    let mut block = Vec::with_capacity(per_sector * channels);

    for sector in 0..recording.sectors {
        let first_index = sector * per_sector;
        block.clear();
        for i in 0..per_sector {
            for channel in 0..channels {
                block.push(sample(first_index + i, channel));
            }
        }

        let spec = SectorSpec {
            session_id: recording.session_id,
            sequence: sector as u32,
            start_time: recording.start_time + first_index as f64 / recording.sample_rate,
            rate_code: code,
            channel_count: channels,
            samples_per_sector: per_sector,
            light: recording.light_field(),
        };
        writer
            .write_all(&spec.encode(&block))
            .map_err(|e| ConvertError::io(path, e))?;
    }

    writer.flush().map_err(|e| ConvertError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::header::HEADER_SIZE;
    use crate::source::sector::SECTOR_SIZE;
    use tempfile::tempdir;

    #[test]
    fn test_file_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.cwa");
        let recording = SyntheticRecording {
            sectors: 4,
            ..SyntheticRecording::default()
        };
        write_recording(&path, &recording, |i, _| i as i16).unwrap();

        let len = std::fs::metadata(&path).unwrap().len() as usize;
        assert_eq!(len, HEADER_SIZE + 4 * SECTOR_SIZE);
        assert_eq!(recording.sample_count(), 320);
    }

    #[test]
    fn test_partial_sectors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.cwa");
        let recording = SyntheticRecording {
            sectors: 20,
            samples_per_sector: Some(50),
            ..SyntheticRecording::default()
        };
        write_recording(&path, &recording, |_, _| 0).unwrap();
        assert_eq!(recording.sample_count(), 1000);

        let too_many = SyntheticRecording {
            samples_per_sector: Some(81),
            ..recording
        };
        assert!(write_recording(&path, &too_many, |_, _| 0).is_err());
    }

    #[test]
    fn test_rejects_unrepresentable_rate() {
        let dir = tempdir().unwrap();
        let recording = SyntheticRecording {
            sample_rate: 120.0,
            ..SyntheticRecording::default()
        };
        let result = write_recording(&dir.path().join("a.cwa"), &recording, |_, _| 0);
        assert!(matches!(result, Err(ConvertError::InvalidParameter { .. })));
    }
}
