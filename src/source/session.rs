//! Logger discovery
//!
//! Discovery reads only the header, the first sector and the last sector of
//! a recording. The resulting [`LoggerSession`] is immutable.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;

use super::header::{FileHeader, HEADER_SIZE};
use super::sector::{ScaleFactors, SectorHeader, SECTOR_SIZE};
use crate::dsp::TimeBase;
use crate::error::{ConvertError, Result};

const AXES_3: [&str; 3] = ["X", "Y", "Z"];
const AXES_9: [&str; 9] = ["Ax", "Ay", "Az", "Gx", "Gy", "Gz", "Mx", "My", "Mz"];

/// Metadata of one source recording
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggerSession {
    pub path: PathBuf,
    pub device_id: u32,
    pub session_id: u32,
    /// 3, 6 or 9
    pub channel_count: usize,
    pub scale: ScaleFactors,
    pub samples_per_sector: usize,
    pub sector_count: usize,
    /// Samples per channel
    pub sample_count: usize,
    /// Rate declared by the sectors
    pub nominal_rate: f64,
    /// Samples per second measured over the whole recording
    pub mean_rate: f64,
    /// Unix time of the first sample
    pub first_timestamp: f64,
    /// Unix time one sample period past the last sample
    pub last_timestamp: f64,
}

impl LoggerSession {
    /// Discover the metadata of the recording at `path`
    pub fn discover(path: &Path) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| ConvertError::io(path, e))?;
        let file_len = file
            .metadata()
            .map_err(|e| ConvertError::io(path, e))?
            .len() as usize;

        let sector_count = sector_count(file_len, path)?;

        let mut header_bytes = vec![0u8; HEADER_SIZE];
        file.read_exact(&mut header_bytes)
            .map_err(|e| ConvertError::io(path, e))?;
        let header = FileHeader::parse(&header_bytes, path)?;

        let mut sector = vec![0u8; SECTOR_SIZE];
        file.read_exact(&mut sector)
            .map_err(|e| ConvertError::io(path, e))?;
        let first = SectorHeader::parse(&sector, path)?;

        let last_offset = (HEADER_SIZE + (sector_count - 1) * SECTOR_SIZE) as u64;
        file.seek(SeekFrom::Start(last_offset))
            .map_err(|e| ConvertError::io(path, e))?;
        file.read_exact(&mut sector)
            .map_err(|e| ConvertError::io(path, e))?;
        let last = SectorHeader::parse(&sector, path)?;

        if last.channel_count != first.channel_count {
            return Err(ConvertError::MalformedSector {
                path: path.to_path_buf(),
                reason: format!(
                    "channel count changes from {} to {}",
                    first.channel_count, last.channel_count
                ),
            });
        }

        let samples_per_sector = first.samples_per_sector;
        let sample_count = sector_count * samples_per_sector;
        let first_timestamp = first.start_time;
        let last_timestamp = last.start_time + samples_per_sector as f64 / last.sample_rate;
        let span = last_timestamp - first_timestamp;
        let mean_rate = if span > 0.0 {
            sample_count as f64 / span
        } else {
            first.sample_rate
        };

        debug!(
            "Discovered {}: device {} session {}, {} channels, {} sectors, {:.3} Hz",
            path.display(),
            header.device_id,
            header.session_id,
            first.channel_count,
            sector_count,
            mean_rate
        );

        Ok(Self {
            path: path.to_path_buf(),
            device_id: header.device_id,
            session_id: header.session_id,
            channel_count: first.channel_count,
            scale: first.scale,
            samples_per_sector,
            sector_count,
            sample_count,
            nominal_rate: first.sample_rate,
            mean_rate,
            first_timestamp,
            last_timestamp,
        })
    }

    /// Native time base of the decoded channels
    pub fn time_base(&self) -> TimeBase {
        TimeBase::new(self.first_timestamp, self.mean_rate)
    }

    /// Recording length in seconds
    pub fn duration(&self) -> f64 {
        self.last_timestamp - self.first_timestamp
    }

    /// File name used in channel comments
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Axis label of channel `index`
    pub fn axis_label(&self, index: usize) -> &'static str {
        if self.channel_count == 3 {
            AXES_3[index % 3]
        } else {
            AXES_9[index % 9]
        }
    }

    /// Output channel name: `{device}_{session}_{axis}`
    pub fn channel_name(&self, index: usize) -> String {
        format!(
            "{}_{}_{}",
            self.device_id,
            self.session_id,
            self.axis_label(index)
        )
    }
}

/// Number of whole data sectors in a file of `file_len` bytes
pub fn sector_count(file_len: usize, path: &Path) -> Result<usize> {
    if file_len < HEADER_SIZE {
        return Err(ConvertError::InvalidHeader {
            path: path.to_path_buf(),
            reason: format!("file is {} bytes, shorter than the header", file_len),
        });
    }

    let data_len = file_len - HEADER_SIZE;
    if data_len % SECTOR_SIZE != 0 {
        return Err(ConvertError::MalformedSector {
            path: path.to_path_buf(),
            reason: format!(
                "{} data bytes is not a multiple of the {}-byte sector size",
                data_len, SECTOR_SIZE
            ),
        });
    }
    if data_len == 0 {
        return Err(ConvertError::MalformedSector {
            path: path.to_path_buf(),
            reason: "recording has no data sectors".to_string(),
        });
    }

    Ok(data_len / SECTOR_SIZE)
}
