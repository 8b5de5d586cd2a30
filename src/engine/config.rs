//! Job configuration
//!
//! A [`JobConfig`] is plain data: it can be built in code, loaded from a
//! JSON file, or assembled from command-line flags. [`JobConfig::validate`]
//! runs before discovery so configuration mistakes fail before any file is
//! opened.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::container::SampleWidth;
use crate::dsp::filter::MAX_FILTER_ORDER;
use crate::dsp::{Interpolation, VelocityUnit, DEFAULT_FILTER_ORDER};
use crate::error::{ConvertError, Result};
use crate::source::DEFAULT_CHUNK_SECTORS;

pub const DEFAULT_THREADS: usize = 4;
pub const DEFAULT_RESAMPLE_HZ: f64 = 800.0;
pub const DEFAULT_BYTE_WIDTH: u16 = 4;
pub const DEFAULT_HIGHPASS_HZ: f64 = 0.5;

/// Output timeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleConfig {
    pub frequency_hz: f64,
    /// Only "linear" is supported
    pub interpolation: String,
    /// Seconds dropped after the latest logger start
    pub trim_start_secs: f64,
    /// Seconds dropped before the earliest logger end
    pub trim_end_secs: f64,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            frequency_hz: DEFAULT_RESAMPLE_HZ,
            interpolation: Interpolation::Linear.to_string(),
            trim_start_secs: 0.0,
            trim_end_secs: 0.0,
        }
    }
}

/// Anti-alias filter applied before resampling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowPassConfig {
    /// Defaults to half the output rate
    pub cutoff_hz: Option<f64>,
    pub order: usize,
}

impl Default for LowPassConfig {
    fn default() -> Self {
        Self {
            cutoff_hz: None,
            order: DEFAULT_FILTER_ORDER,
        }
    }
}

impl LowPassConfig {
    /// Requested cutoff for an output rate of `output_hz`
    pub fn cutoff_for(&self, output_hz: f64) -> f64 {
        self.cutoff_hz.unwrap_or(output_hz / 2.0)
    }
}

/// Acceleration to velocity integration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    pub unit: VelocityUnit,
    /// Drift filter applied before and after integrating
    pub highpass_cutoff_hz: f64,
    pub highpass_order: usize,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            unit: VelocityUnit::default(),
            highpass_cutoff_hz: DEFAULT_HIGHPASS_HZ,
            highpass_order: DEFAULT_FILTER_ORDER,
        }
    }
}

/// Everything a conversion job needs besides its input files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// `None` converts every logger at its native rate
    pub resample: Option<ResampleConfig>,
    pub lowpass: Option<LowPassConfig>,
    pub integration: Option<IntegrationConfig>,
    /// Bytes per sample: 8, 4 or 2
    pub byte_width: u16,
    /// Worker pool size upper bound
    pub threads: usize,
    /// Sectors per decoder read
    pub chunk_sectors: usize,
    /// Container comment; derived from the resample settings when unset
    pub comment: Option<String>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            resample: None,
            lowpass: None,
            integration: None,
            byte_width: DEFAULT_BYTE_WIDTH,
            threads: DEFAULT_THREADS,
            chunk_sectors: DEFAULT_CHUNK_SECTORS,
            comment: None,
        }
    }
}

impl JobConfig {
    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConvertError::io(path, e))?;
        let config: JobConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConvertError::io(path, e))
    }

    /// Check every setting that does not depend on the input files
    pub fn validate(&self) -> Result<()> {
        self.sample_width()?;
        self.interpolation()?;

        if self.threads == 0 {
            return Err(invalid("threads", self.threads, "at least 1"));
        }
        if self.chunk_sectors == 0 {
            return Err(invalid("chunk_sectors", self.chunk_sectors, "at least 1"));
        }

        if let Some(resample) = &self.resample {
            if !(resample.frequency_hz > 0.0) || !resample.frequency_hz.is_finite() {
                return Err(invalid(
                    "resample.frequency_hz",
                    resample.frequency_hz,
                    "a positive frequency",
                ));
            }
            if !(resample.trim_start_secs >= 0.0) {
                return Err(invalid(
                    "resample.trim_start_secs",
                    resample.trim_start_secs,
                    "zero or more seconds",
                ));
            }
            if !(resample.trim_end_secs >= 0.0) {
                return Err(invalid(
                    "resample.trim_end_secs",
                    resample.trim_end_secs,
                    "zero or more seconds",
                ));
            }
        }

        if let Some(lowpass) = &self.lowpass {
            if self.resample.is_none() {
                return Err(invalid(
                    "lowpass",
                    "set",
                    "a resample frequency to filter for",
                ));
            }
            check_order("lowpass.order", lowpass.order)?;
        }

        if let Some(integration) = &self.integration {
            check_order("integration.highpass_order", integration.highpass_order)?;
            if !(integration.highpass_cutoff_hz > 0.0) {
                return Err(invalid(
                    "integration.highpass_cutoff_hz",
                    integration.highpass_cutoff_hz,
                    "a positive frequency",
                ));
            }
        }

        Ok(())
    }

    pub fn sample_width(&self) -> Result<SampleWidth> {
        SampleWidth::from_bytes(self.byte_width)
    }

    /// Parsed interpolation kind, `None` when not resampling
    pub fn interpolation(&self) -> Result<Option<Interpolation>> {
        self.resample
            .as_ref()
            .map(|r| r.interpolation.parse())
            .transpose()
    }

    /// Comment stored in the container preamble
    pub fn container_comment(&self) -> String {
        if let Some(comment) = &self.comment {
            return comment.clone();
        }
        match &self.resample {
            Some(resample) => format!("Resampling on at {}Hz", resample.frequency_hz),
            None => "Resampling off.".to_string(),
        }
    }
}

fn check_order(param: &str, order: usize) -> Result<()> {
    if order == 0 || order > MAX_FILTER_ORDER {
        return Err(invalid(param, order, &format!("1..={}", MAX_FILTER_ORDER)));
    }
    Ok(())
}

fn invalid(param: &str, value: impl ToString, expected: &str) -> ConvertError {
    ConvertError::InvalidParameter {
        param: param.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn resampling(frequency_hz: f64) -> JobConfig {
        JobConfig {
            resample: Some(ResampleConfig {
                frequency_hz,
                ..ResampleConfig::default()
            }),
            ..JobConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = JobConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.threads, 4);
        assert_eq!(config.sample_width().unwrap(), SampleWidth::Float32);
        assert_eq!(config.container_comment(), "Resampling off.");
        assert_eq!(config.interpolation().unwrap(), None);
    }

    #[test]
    fn test_comment_names_frequency() {
        assert_eq!(resampling(50.0).container_comment(), "Resampling on at 50Hz");
        assert_eq!(resampling(62.5).container_comment(), "Resampling on at 62.5Hz");
    }

    #[test]
    fn test_unsupported_interpolation_fails_fast() {
        let mut config = resampling(100.0);
        if let Some(r) = config.resample.as_mut() {
            r.interpolation = "cubic".to_string();
        }
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedInterpolation { .. }));
    }

    #[test]
    fn test_invalid_settings() {
        assert!(resampling(0.0).validate().is_err());
        assert!(JobConfig { byte_width: 3, ..JobConfig::default() }.validate().is_err());
        assert!(JobConfig { threads: 0, ..JobConfig::default() }.validate().is_err());
        assert!(JobConfig {
            lowpass: Some(LowPassConfig::default()),
            ..JobConfig::default()
        }
        .validate()
        .is_err());

        let mut config = resampling(100.0);
        config.lowpass = Some(LowPassConfig {
            cutoff_hz: None,
            order: 40,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lowpass_default_cutoff() {
        assert_eq!(LowPassConfig::default().cutoff_for(800.0), 400.0);
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("job.json");
        let mut config = resampling(200.0);
        config.integration = Some(IntegrationConfig::default());
        config.save(&path).unwrap();

        let loaded = JobConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: JobConfig =
            serde_json::from_str(r#"{"resample": {"frequency_hz": 50}, "byte_width": 2}"#).unwrap();
        let resample = config.resample.as_ref().unwrap();
        assert_eq!(resample.interpolation, "linear");
        assert_eq!(config.byte_width, 2);
        assert_eq!(config.threads, DEFAULT_THREADS);

        let integration: IntegrationConfig = serde_json::from_str(r#"{"unit": "m/s"}"#).unwrap();
        assert_eq!(integration.unit, VelocityUnit::MetresPerSecond);
    }
}
