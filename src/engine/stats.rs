//! Cross-logger statistics
//!
//! Discovery results are aggregated per statistic (min, max and mean with
//! the loggers holding the extremes). A logger further from the mean than
//! the statistic's tolerance is reported as out of range; the job carries on.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::source::LoggerSession;

pub const SAMPLE_COUNT_TOLERANCE: f64 = 10_000.0;
pub const SAMPLE_RATE_TOLERANCE_HZ: f64 = 20.0;
pub const TIMESTAMP_TOLERANCE_SECS: f64 = 10_000.0;
pub const CHANNEL_COUNT_TOLERANCE: f64 = 0.0;

/// A per-logger discovery statistic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    SampleCount,
    SampleRate,
    FirstTimestamp,
    LastTimestamp,
    ChannelCount,
}

impl Statistic {
    pub const ALL: [Statistic; 5] = [
        Statistic::SampleCount,
        Statistic::SampleRate,
        Statistic::FirstTimestamp,
        Statistic::LastTimestamp,
        Statistic::ChannelCount,
    ];

    /// Largest accepted distance from the mean
    pub fn tolerance(&self) -> f64 {
        match self {
            Statistic::SampleCount => SAMPLE_COUNT_TOLERANCE,
            Statistic::SampleRate => SAMPLE_RATE_TOLERANCE_HZ,
            Statistic::FirstTimestamp | Statistic::LastTimestamp => TIMESTAMP_TOLERANCE_SECS,
            Statistic::ChannelCount => CHANNEL_COUNT_TOLERANCE,
        }
    }

    pub fn value(&self, session: &LoggerSession) -> f64 {
        match self {
            Statistic::SampleCount => session.sample_count as f64,
            Statistic::SampleRate => session.mean_rate,
            Statistic::FirstTimestamp => session.first_timestamp,
            Statistic::LastTimestamp => session.last_timestamp,
            Statistic::ChannelCount => session.channel_count as f64,
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Statistic::SampleCount => "sample count",
            Statistic::SampleRate => "sample rate",
            Statistic::FirstTimestamp => "first timestamp",
            Statistic::LastTimestamp => "last timestamp",
            Statistic::ChannelCount => "channel count",
        };
        f.write_str(name)
    }
}

/// Aggregate of one statistic across loggers
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatSummary {
    pub statistic: Statistic,
    pub min: f64,
    /// Index of the logger holding the minimum
    pub min_logger: usize,
    pub max: f64,
    pub max_logger: usize,
    pub mean: f64,
}

impl StatSummary {
    /// Summarize `statistic` over `sessions`; `None` when there are none
    pub fn collect(statistic: Statistic, sessions: &[LoggerSession]) -> Option<Self> {
        let first = statistic.value(sessions.first()?);
        let mut summary = Self {
            statistic,
            min: first,
            min_logger: 0,
            max: first,
            max_logger: 0,
            mean: 0.0,
        };

        let mut total = 0.0;
        for (index, session) in sessions.iter().enumerate() {
            let value = statistic.value(session);
            if value < summary.min {
                summary.min = value;
                summary.min_logger = index;
            }
            if value > summary.max {
                summary.max = value;
                summary.max_logger = index;
            }
            total += value;
        }
        summary.mean = total / sessions.len() as f64;
        Some(summary)
    }

    /// Largest distance of an extreme from the mean
    pub fn spread(&self) -> f64 {
        (self.max - self.mean).max(self.mean - self.min)
    }

    pub fn is_out_of_range(&self) -> bool {
        self.spread() > self.statistic.tolerance()
    }
}

/// A logger whose statistic strays from the job mean
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggerOutOfRange {
    pub logger: usize,
    pub path: PathBuf,
    pub statistic: Statistic,
    pub value: f64,
    pub mean: f64,
    pub tolerance: f64,
}

impl fmt::Display for LoggerOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {} is more than {} from the mean {}",
            self.path.display(),
            self.statistic,
            self.value,
            self.tolerance,
            self.mean
        )
    }
}

/// All statistics of a discovery pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryStats {
    pub loggers: usize,
    pub summaries: Vec<StatSummary>,
}

impl DiscoveryStats {
    pub fn collect(sessions: &[LoggerSession]) -> Self {
        let summaries = Statistic::ALL
            .iter()
            .filter_map(|&statistic| StatSummary::collect(statistic, sessions))
            .collect();
        Self {
            loggers: sessions.len(),
            summaries,
        }
    }

    pub fn summary(&self, statistic: Statistic) -> Option<&StatSummary> {
        self.summaries.iter().find(|s| s.statistic == statistic)
    }

    /// Loggers outside the tolerance of any statistic
    pub fn out_of_range(&self, sessions: &[LoggerSession]) -> Vec<LoggerOutOfRange> {
        let mut flagged = Vec::new();
        for summary in self.summaries.iter().filter(|s| s.is_out_of_range()) {
            let tolerance = summary.statistic.tolerance();
            for (logger, session) in sessions.iter().enumerate() {
                let value = summary.statistic.value(session);
                if (value - summary.mean).abs() > tolerance {
                    flagged.push(LoggerOutOfRange {
                        logger,
                        path: session.path.clone(),
                        statistic: summary.statistic,
                        value,
                        mean: summary.mean,
                        tolerance,
                    });
                }
            }
        }
        flagged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ScaleFactors;

    fn session(name: &str, samples: usize, rate: f64, first: f64, channels: usize) -> LoggerSession {
        LoggerSession {
            path: PathBuf::from(name),
            device_id: 1,
            session_id: 1,
            channel_count: channels,
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

    #[test]
    fn test_summary_extremes() {
        let sessions = vec![
            session("a", 1000, 100.0, 10.0, 3),
            session("b", 1200, 100.0, 12.0, 3),
            session("c", 800, 100.0, 11.0, 3),
        ];
        let stats = DiscoveryStats::collect(&sessions);
        let samples = stats.summary(Statistic::SampleCount).unwrap();
        assert_eq!(samples.min, 800.0);
        assert_eq!(samples.min_logger, 2);
        assert_eq!(samples.max_logger, 1);
        assert_eq!(samples.mean, 1000.0);

        let first = stats.summary(Statistic::FirstTimestamp).unwrap();
        assert_eq!(first.max, 12.0);
        assert!(stats.out_of_range(&sessions).is_empty());
    }

    #[test]
    fn test_rate_outlier_is_flagged() {
        let sessions = vec![
            session("a", 1000, 100.0, 0.0, 3),
            session("b", 1000, 100.0, 0.0, 3),
            session("c", 1000, 160.0, 0.0, 3),
        ];
        let flagged = DiscoveryStats::collect(&sessions).out_of_range(&sessions);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].logger, 2);
        assert_eq!(flagged[0].statistic, Statistic::SampleRate);
    }

    #[test]
    fn test_mixed_channel_counts_are_flagged() {
        let sessions = vec![session("a", 800, 100.0, 0.0, 3), session("b", 800, 100.0, 0.0, 6)];
        let flagged = DiscoveryStats::collect(&sessions).out_of_range(&sessions);
        assert_eq!(flagged.len(), 2);
        assert!(flagged.iter().all(|w| w.statistic == Statistic::ChannelCount));
    }

    #[test]
    fn test_empty() {
        let stats = DiscoveryStats::collect(&[]);
        assert!(stats.summaries.is_empty());
    }
}
