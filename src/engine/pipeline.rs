//! Per-logger processing chain
//!
//! decode -> [low-pass] -> [resample] -> [high-pass -> integrate -> high-pass]
//!
//! Filters are designed during planning from each logger's own input rate,
//! so cutoff errors surface before the output file is created.

use log::debug;

use super::config::JobConfig;
use crate::dsp::{
    integrate_series, resample, ChannelMatrix, Interpolation, ResampleWindow, Unit,
    VelocityUnit, ZeroPhaseFilter,
};
use crate::error::Result;
use crate::progress::{CancelToken, ProgressSink, ProgressTicker, Stage};
use crate::source::{decode_session, LoggerSession};

/// Drift removal and integration of acceleration channels
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationStage {
    pub unit: VelocityUnit,
    pub highpass: ZeroPhaseFilter,
}

/// Processing steps of one logger
#[derive(Debug, Clone, PartialEq)]
pub struct LoggerPipeline {
    chunk_sectors: usize,
    lowpass: Option<ZeroPhaseFilter>,
    resample: Option<(ResampleWindow, Interpolation)>,
    integration: Option<IntegrationStage>,
}

impl LoggerPipeline {
    /// Design the chain for `session` under `config`
    pub fn plan(
        session: &LoggerSession,
        config: &JobConfig,
        window: Option<&ResampleWindow>,
    ) -> Result<Self> {
        let input_rate = session.mean_rate;
        let output_rate = window.map_or(input_rate, |w| w.frequency);

        let lowpass = match (&config.lowpass, window) {
            (Some(lowpass), Some(window)) => Some(ZeroPhaseFilter::lowpass(
                lowpass.cutoff_for(window.frequency),
                input_rate,
                lowpass.order,
            )?),
            _ => None,
        };

        let resample = match (config.interpolation()?, window) {
            (Some(interpolation), Some(window)) => Some((*window, interpolation)),
            _ => None,
        };

        let integration = match &config.integration {
            Some(integration) => Some(IntegrationStage {
                unit: integration.unit,
                highpass: ZeroPhaseFilter::highpass(
                    integration.highpass_cutoff_hz,
                    output_rate,
                    integration.highpass_order,
                )?,
            }),
            None => None,
        };

        Ok(Self {
            chunk_sectors: config.chunk_sectors,
            lowpass,
            resample,
            integration,
        })
    }

    /// Samples per channel this chain produces for `session`
    pub fn output_len(&self, session: &LoggerSession) -> usize {
        match &self.resample {
            Some((window, _)) => window.sample_count,
            None => session.sample_count,
        }
    }

    /// Unit written for source channel `channel`
    pub fn output_unit(&self, channel: usize) -> Unit {
        let unit = Unit::for_channel(channel);
        match &self.integration {
            Some(stage) if unit == Unit::G => stage.unit.unit(),
            _ => unit,
        }
    }

    /// Decode and process one logger
    pub fn run(
        &self,
        logger: usize,
        session: &LoggerSession,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<ChannelMatrix> {
        let mut ticker = ProgressTicker::new(progress, logger, Stage::Decode, session.sample_count);
        let matrix = decode_session(session, self.chunk_sectors, &mut ticker, cancel)?;
        self.process(matrix, logger, progress, cancel)
    }

    /// Apply the filter, resample and integration steps to a decoded matrix
    pub fn process(
        &self,
        mut matrix: ChannelMatrix,
        logger: usize,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<ChannelMatrix> {
        if let Some(filter) = &self.lowpass {
            cancel.check()?;
            debug!(
                "Logger {}: low-pass at {:.4} of Nyquist",
                logger,
                filter.normalized_cutoff()
            );
            matrix = filter.apply_matrix(matrix)?;
        }

        if let Some((window, interpolation)) = &self.resample {
            cancel.check()?;
            let mut ticker =
                ProgressTicker::new(progress, logger, Stage::Resample, window.sample_count);
            matrix = resample(matrix, window, *interpolation, &mut ticker)?;
        }

        if let Some(stage) = &self.integration {
            cancel.check()?;
            debug!("Logger {}: integrating acceleration to {}", logger, stage.unit);
            let channels = matrix
                .into_channels()
                .into_iter()
                .map(|series| {
                    if series.unit() != Unit::G {
                        return series;
                    }
                    let series = stage.highpass.apply_series(series);
                    let series = integrate_series(series, stage.unit);
                    stage.highpass.apply_series(series)
                })
                .collect();
            matrix = ChannelMatrix::new(channels)?;
        }

        Ok(matrix)
    }
}
