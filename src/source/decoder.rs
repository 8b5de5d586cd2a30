//! Sector decoder
//!
//! Streams a recording in chunks of whole sectors and converts the raw
//! `i16` counts of every channel into physical units. Peak memory is the
//! decoded output plus one chunk.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};

use super::header::HEADER_SIZE;
use super::sector::{
    layout_mismatch, max_samples_per_sector, ScaleFactors, BYTES_PER_AXIS, SAMPLE_OFFSET, SECTOR_SIZE,
    VALID_CHANNEL_COUNTS,
};
use super::session::{sector_count, LoggerSession};
use crate::dsp::{ChannelMatrix, ChannelSeries, Unit};
use crate::error::{ConvertError, Result};
use crate::progress::{CancelToken, ProgressTicker};

/// Default number of sectors read per chunk
pub const DEFAULT_CHUNK_SECTORS: usize = 100;

/// Decoder for one recording's sample layout
#[derive(Debug, Clone)]
pub struct SectorDecoder {
    samples_per_sector: usize,
    channel_count: usize,
    /// Reciprocal of each channel's scale factor
    inverse_scale: Vec<f64>,
    chunk_sectors: usize,
}

impl SectorDecoder {
    /// Create a decoder for the layout declared by the sectors of `path`
    ///
    /// Channel counts other than 3, 6 or 9 and sample counts the sector
    /// cannot hold are malformed sector data.
    pub fn new(
        path: &Path,
        samples_per_sector: usize,
        channel_count: usize,
        scale: ScaleFactors,
    ) -> Result<Self> {
        if !VALID_CHANNEL_COUNTS.contains(&channel_count) {
            return Err(ConvertError::MalformedSector {
                path: path.to_path_buf(),
                reason: format!(
                    "channel count {} is not one of {:?}",
                    channel_count, VALID_CHANNEL_COUNTS
                ),
            });
        }
        let capacity = max_samples_per_sector(channel_count);
        if samples_per_sector == 0 || samples_per_sector > capacity {
            return Err(ConvertError::MalformedSector {
                path: path.to_path_buf(),
                reason: format!(
                    "{} samples per sector, expected 1..={} for {} channels",
                    samples_per_sector, capacity, channel_count
                ),
            });
        }

        let inverse_scale = (0..channel_count)
            .map(|channel| 1.0 / scale.for_channel(channel))
            .collect();

        Ok(Self {
            samples_per_sector,
            channel_count,
            inverse_scale,
            chunk_sectors: DEFAULT_CHUNK_SECTORS,
        })
    }

    /// Decoder matching a discovered session
    pub fn for_session(session: &LoggerSession) -> Result<Self> {
        Self::new(
            &session.path,
            session.samples_per_sector,
            session.channel_count,
            session.scale,
        )
    }

    /// Set the number of sectors read per chunk (at least 1)
    pub fn with_chunk_sectors(mut self, chunk_sectors: usize) -> Self {
        self.chunk_sectors = chunk_sectors.max(1);
        self
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Decode one sector, appending its samples to `columns`
    pub fn decode_sector(&self, sector: &[u8], columns: &mut [Vec<f64>]) {
        let stride = self.channel_count * BYTES_PER_AXIS;
        let block = &sector[SAMPLE_OFFSET..SAMPLE_OFFSET + self.samples_per_sector * stride];

        for frame in block.chunks_exact(stride) {
            for (channel, raw) in frame.chunks_exact(BYTES_PER_AXIS).enumerate() {
                let count = LittleEndian::read_i16(raw);
                columns[channel].push(f64::from(count) * self.inverse_scale[channel]);
            }
        }
    }

    /// Decode every sector of the file into one column per channel
    pub fn decode_file(
        &self,
        path: &Path,
        progress: &mut ProgressTicker<'_>,
        cancel: &CancelToken,
    ) -> Result<Vec<Vec<f64>>> {
        let mut file = File::open(path).map_err(|e| ConvertError::io(path, e))?;
        let file_len = file
            .metadata()
            .map_err(|e| ConvertError::io(path, e))?
            .len() as usize;
        let sectors = sector_count(file_len, path)?;
        let total = sectors * self.samples_per_sector;

        file.seek(SeekFrom::Start(HEADER_SIZE as u64))
            .map_err(|e| ConvertError::io(path, e))?;

        let mut columns: Vec<Vec<f64>> = (0..self.channel_count)
            .map(|_| Vec::with_capacity(total))
            .collect();
        let mut chunk = vec![0u8; self.chunk_sectors * SECTOR_SIZE];
        let mut done = 0;
        let mut mismatched = 0usize;

        debug!(
            "Decoding {} sectors from {} in chunks of {}",
            sectors,
            path.display(),
            self.chunk_sectors
        );

        while done < sectors {
            cancel.check()?;

            let in_chunk = (sectors - done).min(self.chunk_sectors);
            let bytes = &mut chunk[..in_chunk * SECTOR_SIZE];
            file.read_exact(bytes).map_err(|e| ConvertError::io(path, e))?;

            for sector in bytes.chunks_exact(SECTOR_SIZE) {
                if let Some(reason) =
                    layout_mismatch(sector, self.channel_count, self.samples_per_sector)
                {
                    mismatched += 1;
                    warn!("{} sector {}: {}", path.display(), done, reason);
                }
                self.decode_sector(sector, &mut columns);
                done += 1;
                progress.tick(done * self.samples_per_sector);
            }
        }
        progress.finish();

        if mismatched > 0 {
            warn!(
                "{}: {} of {} sectors did not match the recording layout",
                path.display(),
                mismatched,
                sectors
            );
        }
        Ok(columns)
    }
}

/// Decode a discovered session into a channel matrix on its native time base
pub fn decode_session(
    session: &LoggerSession,
    chunk_sectors: usize,
    progress: &mut ProgressTicker<'_>,
    cancel: &CancelToken,
) -> Result<ChannelMatrix> {
    let decoder = SectorDecoder::for_session(session)?.with_chunk_sectors(chunk_sectors);
    let columns = decoder.decode_file(&session.path, progress, cancel)?;
    let time_base = session.time_base();

    let channels = columns
        .into_iter()
        .enumerate()
        .map(|(index, samples)| ChannelSeries::new(samples, time_base, Unit::for_channel(index)))
        .collect();
    ChannelMatrix::new(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NullProgress, Stage};
    use crate::source::synth::{write_recording, SyntheticRecording};
    use approx::assert_relative_eq;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::tempdir;
    use test_case::test_case;

    fn raw(index: usize, channel: usize) -> i16 {
        ((index * 7 + channel * 1000) % 4000) as i16 - 2000
    }

    #[test_case(3; "accel only")]
    #[test_case(6; "accel and gyro")]
    #[test_case(9; "accel, gyro and mag")]
    fn test_decode_scales_each_triad(channel_count: usize) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logger.cwa");
        let recording = SyntheticRecording {
            channel_count,
            sectors: 7,
            ..SyntheticRecording::default()
        };
        write_recording(&path, &recording, raw).unwrap();

        let session = LoggerSession::discover(&path).unwrap();
        let mut ticker = ProgressTicker::new(&NullProgress, 0, Stage::Decode, session.sample_count);
        let matrix = decode_session(&session, 3, &mut ticker, &CancelToken::new()).unwrap();

        assert_eq!(matrix.num_channels(), channel_count);
        assert_eq!(matrix.num_samples(), recording.sample_count());

        for channel in 0..channel_count {
            let scale = session.scale.for_channel(channel);
            let series = matrix.channel(channel).unwrap();
            assert_eq!(series.unit(), Unit::for_channel(channel));
            for (index, value) in series.samples().iter().enumerate() {
                assert_relative_eq!(*value, f64::from(raw(index, channel)) / scale);
            }
        }
    }

    #[test]
    fn test_unit_scale_is_exact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logger.cwa");
        write_recording(&path, &SyntheticRecording::default(), raw).unwrap();

        let scale = ScaleFactors {
            accel: 1.0,
            gyro: 1.0,
            mag: 1.0,
        };
        let decoder = SectorDecoder::new(&path, 80, 3, scale).unwrap();
        let mut ticker = ProgressTicker::new(&NullProgress, 0, Stage::Decode, 800);
        let columns = decoder
            .decode_file(&path, &mut ticker, &CancelToken::new())
            .unwrap();

        assert_eq!(columns[1][5], f64::from(raw(5, 1)));
        assert_eq!(columns[2][799], f64::from(raw(799, 2)));
    }

    #[test]
    fn test_rejects_invalid_channel_count() {
        let path = Path::new("logger.cwa");
        let err = SectorDecoder::new(path, 80, 4, ScaleFactors::default()).unwrap_err();
        assert!(matches!(err, ConvertError::MalformedSector { .. }));
        assert_eq!(err.error_code(), "MALFORMED_SECTOR");
    }

    #[test]
    fn test_rejects_overfull_sector_layout() {
        let path = Path::new("logger.cwa");
        let err = SectorDecoder::new(path, 41, 6, ScaleFactors::default()).unwrap_err();
        assert!(matches!(err, ConvertError::MalformedSector { .. }));
    }

    #[test]
    fn test_mismatched_sector_is_decoded_anyway() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logger.cwa");
        write_recording(&path, &SyntheticRecording::default(), raw).unwrap();

        // Break the magic of the fifth sector
        let mut bytes = std::fs::read(&path).unwrap();
        let at = HEADER_SIZE + 4 * SECTOR_SIZE;
        bytes[at..at + 2].copy_from_slice(b"XX");
        std::fs::write(&path, &bytes).unwrap();

        let decoder = SectorDecoder::new(&path, 80, 3, ScaleFactors::default()).unwrap();
        let mut ticker = ProgressTicker::new(&NullProgress, 0, Stage::Decode, 800);
        let columns = decoder
            .decode_file(&path, &mut ticker, &CancelToken::new())
            .unwrap();
        assert_eq!(columns[0].len(), 800);
        assert_eq!(columns[0][4 * 80], f64::from(raw(320, 0)) / 256.0);
    }

    #[test]
    fn test_rejects_partial_sector() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logger.cwa");
        write_recording(&path, &SyntheticRecording::default(), raw).unwrap();
        OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(&[0u8; 17])
            .unwrap();

        let decoder = SectorDecoder::new(&path, 80, 3, ScaleFactors::default()).unwrap();
        let mut ticker = ProgressTicker::new(&NullProgress, 0, Stage::Decode, 800);
        let err = decoder
            .decode_file(&path, &mut ticker, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, ConvertError::MalformedSector { .. }));
    }

    #[test]
    fn test_cancel_between_chunks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logger.cwa");
        write_recording(&path, &SyntheticRecording::default(), raw).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let decoder = SectorDecoder::new(&path, 80, 3, ScaleFactors::default()).unwrap();
        let mut ticker = ProgressTicker::new(&NullProgress, 0, Stage::Decode, 800);
        let err = decoder.decode_file(&path, &mut ticker, &cancel).unwrap_err();
        assert!(matches!(err, ConvertError::Cancelled));
    }
}
