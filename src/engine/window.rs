//! Shared resample window
//!
//! The window starts at the latest logger start and ends before the
//! earliest logger end, so every logger has data over the whole span.

use log::debug;

use super::config::ResampleConfig;
use super::stats::{DiscoveryStats, Statistic};
use crate::dsp::ResampleWindow;
use crate::error::{ConvertError, Result};

/// Seconds kept clear of the shortest logger's tail
pub const TAIL_MARGIN_SECS: f64 = 0.25;

/// Compute the window every logger of the job is resampled onto
pub fn compute_window(stats: &DiscoveryStats, config: &ResampleConfig) -> Result<ResampleWindow> {
    let latest_start = stats
        .summary(Statistic::FirstTimestamp)
        .map(|s| s.max)
        .ok_or(ConvertError::NoInputFiles)?;
    let earliest_end = stats
        .summary(Statistic::LastTimestamp)
        .map(|s| s.min)
        .ok_or(ConvertError::NoInputFiles)?;

    let start = latest_start + config.trim_start_secs;
    let stop = earliest_end - TAIL_MARGIN_SECS - config.trim_end_secs;
    let window = ResampleWindow::new(start, stop, config.frequency_hz)?;

    debug!(
        "Resample window {:.3}..{:.3} at {} Hz: {} samples",
        window.start, window.stop, window.frequency, window.sample_count
    );
    Ok(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{LoggerSession, ScaleFactors};
    use approx::assert_relative_eq;
    use std::path::PathBuf;

    fn session(first: f64, samples: usize, rate: f64) -> LoggerSession {
        LoggerSession {
            path: PathBuf::from("x.cwa"),
            device_id: 1,
            session_id: 1,
            channel_count: 3,
            scale: ScaleFactors::default(),
            samples_per_sector: 80,
            sector_count: samples / 80,
            sample_count: samples,
            nominal_rate: rate,
            mean_rate: rate,
            first_timestamp: first,
            last_timestamp: first + samples as f64 / rate,
        }
    }

    fn config(frequency_hz: f64, trim_start_secs: f64, trim_end_secs: f64) -> ResampleConfig {
        ResampleConfig {
            frequency_hz,
            trim_start_secs,
            trim_end_secs,
            ..ResampleConfig::default()
        }
    }

    #[test]
    fn test_overlap_of_two_loggers() {
        let sessions = vec![session(0.0, 1000, 100.0), session(1.75, 1000, 100.0)];
        let stats = DiscoveryStats::collect(&sessions);
        let window = compute_window(&stats, &config(50.0, 0.0, 0.0)).unwrap();

        assert_relative_eq!(window.start, 1.75);
        assert_eq!(window.sample_count, 401);
        assert_eq!(
            window.sample_count,
            ((window.stop - window.start) * window.frequency).floor() as usize + 1
        );
    }

    #[test]
    fn test_trims_shrink_window() {
        let sessions = vec![session(100.0, 8000, 100.0)];
        let stats = DiscoveryStats::collect(&sessions);
        let window = compute_window(&stats, &config(10.0, 5.0, 14.75)).unwrap();
        // 100 + 5 .. 180 - 0.25 - 14.75
        assert_relative_eq!(window.start, 105.0);
        assert_eq!(window.sample_count, 601);
    }

    #[test]
    fn test_disjoint_loggers_have_empty_window() {
        let sessions = vec![session(0.0, 1000, 100.0), session(20.0, 1000, 100.0)];
        let stats = DiscoveryStats::collect(&sessions);
        let err = compute_window(&stats, &config(50.0, 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, ConvertError::EmptyWindow { .. }));
        assert!(err.is_job_fatal());
    }

    #[test]
    fn test_trim_past_end_is_empty() {
        let sessions = vec![session(0.0, 1000, 100.0)];
        let stats = DiscoveryStats::collect(&sessions);
        assert!(compute_window(&stats, &config(50.0, 6.0, 4.0)).is_err());
    }
}
