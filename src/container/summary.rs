//! Pointer file
//!
//! Plain-text companion written next to the container. The measurement
//! software opens this file and follows its `DATAFILE=` line.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::header::ContainerHeader;
use crate::error::{ConvertError, Result};

pub const POINTER_MAGIC: &str = "CATMAN TEST FILE";
pub const POINTER_EXTENSION: &str = "TST";
pub const CONVERT_COMMENT: &str =
    "These channels were created and imported with the use of the CWA to BIN converter";

/// Which summary the pointer file carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryKind {
    /// Per-channel names, comments and time ranges
    Convert,
    /// Shared sample count, rate and logging span
    Resample,
}

/// Pointer file path for a container: same stem, `.TST` extension
pub fn pointer_path(container: &Path) -> PathBuf {
    container.with_extension(POINTER_EXTENSION)
}

/// Render a Unix time as `YYYY-MM-DD HH:MM:SS.mmm`
pub fn timestamp_string(unix_seconds: f64) -> String {
    let millis = (unix_seconds * 1000.0).round() as i64;
    match DateTime::<Utc>::from_timestamp_millis(millis) {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        None => format!("{:.3}", unix_seconds),
    }
}

fn rate_string(rate: f64) -> String {
    if rate.fract() == 0.0 {
        format!("{:.1}", rate)
    } else {
        format!("{}", rate)
    }
}

/// Text of the conversion summary
///
/// `stop_times` holds the recorded end of each channel's logger; channels
/// without an entry fall back to the end implied by their sample count.
pub fn render_convert_summary(
    header: &ContainerHeader,
    stop_times: &[f64],
    container: &Path,
    converted_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", POINTER_MAGIC);
    let _ = writeln!(out, "Comment = {}", CONVERT_COMMENT);
    let _ = writeln!(
        out,
        "Date Converted = {}",
        converted_at.format("%Y-%m-%d-%H:%M:%S")
    );
    for (i, channel) in header.channels.iter().enumerate() {
        let _ = writeln!(
            out,
            "Chan({}) = Name: {}, ({}) with {} samples at {}Hz",
            i,
            channel.name,
            channel.comment,
            channel.sample_count,
            rate_string(channel.sample_rate())
        );
        let _ = writeln!(
            out,
            "Chan({}) = Start {}; Stopped {}",
            i,
            timestamp_string(channel.start_time),
            timestamp_string(
                stop_times
                    .get(i)
                    .copied()
                    .unwrap_or_else(|| channel.stop_time())
            )
        );
    }
    let _ = write!(out, "DATAFILE={}", container.display());
    out
}

/// Text of the resample summary
pub fn render_resample_summary(header: &ContainerHeader, container: &Path) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", POINTER_MAGIC);
    if let Some(first) = header.channels.first() {
        let rate = (first.sample_rate() * 100.0).round() / 100.0;
        let _ = writeln!(out, "Number Samples per channel = {}", first.sample_count);
        let _ = writeln!(out, "Sample Rate = {} Hz", rate_string(rate));
        let _ = writeln!(
            out,
            "Logging Start Time = {} UTC",
            timestamp_string(first.start_time)
        );
        let _ = writeln!(
            out,
            "Logging End Time = {} UTC",
            timestamp_string(first.stop_time())
        );
    }
    for channel in &header.channels {
        let _ = writeln!(out, "Logger ={}", channel.name);
    }
    let _ = write!(out, "DATAFILE={}", container.display());
    out
}

/// Write the pointer file for `container`, returning its path
pub fn write_pointer_file(
    container: &Path,
    header: &ContainerHeader,
    kind: SummaryKind,
    stop_times: &[f64],
    converted_at: DateTime<Utc>,
) -> Result<PathBuf> {
    let text = match kind {
        SummaryKind::Convert => render_convert_summary(header, stop_times, container, converted_at),
        SummaryKind::Resample => render_resample_summary(header, container),
    };
    let path = pointer_path(container);
    fs::write(&path, text).map_err(|e| ConvertError::io(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::header::{ChannelHeader, SampleWidth};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn header() -> ContainerHeader {
        let channels = ["X", "Y"]
            .iter()
            .enumerate()
            .map(|(i, axis)| ChannelHeader {
                index: i as u16,
                sample_count: 401,
                name: format!("42_7_{}", axis),
                unit: "g".to_string(),
                comment: "42_7.cwa".to_string(),
                width: SampleWidth::Float64,
                start_time: 1_584_104_203.0,
                sample_period_ms: 20.0,
                sensor_id: "42".to_string(),
            })
            .collect();
        ContainerHeader::new("Resampling on at 50Hz", channels)
    }

    #[test]
    fn test_timestamp_string() {
        assert_eq!(timestamp_string(1_584_104_203.25), "2020-03-13 12:56:43.250");
    }

    #[test]
    fn test_convert_summary() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let text = render_convert_summary(&header(), &[], Path::new("/data/job.BIN"), at);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "CATMAN TEST FILE");
        assert_eq!(lines[2], "Date Converted = 2024-05-01-09:30:00");
        assert_eq!(lines[3], "Chan(0) = Name: 42_7_X, (42_7.cwa) with 401 samples at 50.0Hz");
        assert_eq!(
            lines[4],
            "Chan(0) = Start 2020-03-13 12:56:43.000; Stopped 2020-03-13 12:56:51.010"
        );
        assert_eq!(*lines.last().unwrap(), "DATAFILE=/data/job.BIN");
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn test_convert_summary_uses_recorded_stop() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let stops = [1_584_104_211.5, 1_584_104_211.5];
        let text = render_convert_summary(&header(), &stops, Path::new("job.BIN"), at);
        assert!(text.contains("Chan(1) = Start 2020-03-13 12:56:43.000; Stopped 2020-03-13 12:56:51.500"));
    }

    #[test]
    fn test_resample_summary() {
        let text = render_resample_summary(&header(), Path::new("job.BIN"));
        let expected = "CATMAN TEST FILE\n\
                        Number Samples per channel = 401\n\
                        Sample Rate = 50.0 Hz\n\
                        Logging Start Time = 2020-03-13 12:56:43.000 UTC\n\
                        Logging End Time = 2020-03-13 12:56:51.010 UTC\n\
                        Logger =42_7_X\n\
                        Logger =42_7_Y\n\
                        DATAFILE=job.BIN";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_pointer_path() {
        assert_eq!(pointer_path(Path::new("/tmp/run.BIN")), PathBuf::from("/tmp/run.TST"));
    }
}
