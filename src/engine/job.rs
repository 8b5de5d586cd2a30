//! Conversion job orchestration
//!
//! A job runs in two phases:
//! 1. Planning: discover every logger, aggregate statistics, compute the
//!    shared window, design each logger's filters, build the container
//!    header and assign byte ranges. Any failure here aborts the job before
//!    the output file is touched.
//! 2. Execution: write the header block, then process loggers on a bounded
//!    worker pool. Each worker opens its own handle and writes only its
//!    pre-assigned range. A failing logger does not stop the others.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use super::config::JobConfig;
use super::layout::{LoggerBlock, OutputLayout};
use super::pipeline::LoggerPipeline;
use super::stats::{DiscoveryStats, LoggerOutOfRange};
use super::window::compute_window;
use crate::container::{
    write_channels, write_pointer_file, ChannelHeader, ContainerHeader, SampleWidth, SummaryKind,
};
use crate::dsp::ResampleWindow;
use crate::error::{ConvertError, Result};
use crate::progress::{CancelToken, ProgressSink};
use crate::source::LoggerSession;

/// Everything decided before the first byte is written
#[derive(Debug, Clone, Serialize)]
pub struct JobPlan {
    pub sessions: Vec<LoggerSession>,
    pub stats: DiscoveryStats,
    pub warnings: Vec<LoggerOutOfRange>,
    pub window: Option<ResampleWindow>,
    pub header: ContainerHeader,
    pub layout: OutputLayout,
    #[serde(skip)]
    pipelines: Vec<LoggerPipeline>,
}

impl JobPlan {
    /// Total size of the output file
    pub fn output_len(&self) -> u64 {
        self.layout.end()
    }

    pub fn summary_kind(&self) -> SummaryKind {
        if self.window.is_some() {
            SummaryKind::Resample
        } else {
            SummaryKind::Convert
        }
    }

    /// Recorded end of each output channel's logger
    pub fn channel_stop_times(&self) -> Vec<f64> {
        self.sessions
            .iter()
            .flat_map(|s| std::iter::repeat(s.last_timestamp).take(s.channel_count))
            .collect()
    }
}

/// Result of one logger's processing
#[derive(Debug, Serialize)]
pub struct LoggerReport {
    pub logger: usize,
    pub path: PathBuf,
    /// Data bytes written on success
    pub bytes_written: Option<u64>,
    pub error: Option<String>,
    pub error_code: Option<&'static str>,
    #[serde(skip)]
    failure: Option<ConvertError>,
}

impl LoggerReport {
    fn new(logger: usize, session: &LoggerSession, result: Result<u64>) -> Self {
        let (bytes_written, failure) = match result {
            Ok(bytes) => (Some(bytes), None),
            Err(e) => (None, Some(e)),
        };
        Self {
            logger,
            path: session.path.clone(),
            bytes_written,
            error: failure.as_ref().map(ToString::to_string),
            error_code: failure.as_ref().map(ConvertError::error_code),
            failure,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Outcome of a finished job
#[derive(Debug, Serialize)]
pub struct JobReport {
    pub output: PathBuf,
    pub pointer_file: PathBuf,
    pub warnings: Vec<LoggerOutOfRange>,
    pub window: Option<ResampleWindow>,
    pub layout: OutputLayout,
    pub loggers: Vec<LoggerReport>,
    pub elapsed_secs: f64,
}

impl JobReport {
    pub fn succeeded(&self) -> usize {
        self.loggers.iter().filter(|l| l.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.loggers.len() - self.succeeded()
    }

    /// `Err` carrying the first logger failure, if any
    pub fn into_result(mut self) -> Result<Self> {
        let failed = self.loggers.iter_mut().find(|l| l.failure.is_some());
        if let Some(report) = failed {
            if let Some(source) = report.failure.take() {
                return Err(ConvertError::LoggerFailed {
                    logger: report.path.display().to_string(),
                    source: Box::new(source),
                });
            }
        }
        Ok(self)
    }
}

/// A multi-logger conversion into one container
#[derive(Debug, Clone)]
pub struct ConversionJob {
    inputs: Vec<PathBuf>,
    config: JobConfig,
}

impl ConversionJob {
    /// Create a job; inputs are processed in sorted path order
    pub fn new(mut inputs: Vec<PathBuf>, config: JobConfig) -> Self {
        inputs.sort();
        inputs.dedup();
        Self { inputs, config }
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Read the metadata of every input
    pub fn discover(&self) -> Result<Vec<LoggerSession>> {
        if self.inputs.is_empty() {
            return Err(ConvertError::NoInputFiles);
        }
        self.inputs
            .iter()
            .map(|path| {
                LoggerSession::discover(path).map_err(|e| ConvertError::LoggerFailed {
                    logger: path.display().to_string(),
                    source: Box::new(e),
                })
            })
            .collect()
    }

    /// Plan the job without writing anything
    pub fn plan(&self) -> Result<JobPlan> {
        self.config.validate()?;
        let sessions = self.discover()?;

        let stats = DiscoveryStats::collect(&sessions);
        let warnings = stats.out_of_range(&sessions);
        for warning in &warnings {
            warn!("Logger out of range: {}", warning);
        }

        let window = match &self.config.resample {
            Some(resample) => Some(compute_window(&stats, resample)?),
            None => None,
        };

        let pipelines = sessions
            .iter()
            .map(|session| LoggerPipeline::plan(session, &self.config, window.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let width = self.config.sample_width()?;
        let header = build_header(
            &sessions,
            &pipelines,
            window.as_ref(),
            width,
            self.config.container_comment(),
        )?;

        let blocks: Vec<LoggerBlock> = sessions
            .iter()
            .zip(&pipelines)
            .map(|(session, pipeline)| LoggerBlock {
                channels: session.channel_count,
                samples: pipeline.output_len(session),
            })
            .collect();
        let layout = OutputLayout::new(header.data_offset(), &blocks, width);

        debug!(
            "Planned {} loggers, {} channels, {} bytes",
            sessions.len(),
            header.channels.len(),
            layout.end()
        );

        Ok(JobPlan {
            sessions,
            stats,
            warnings,
            window,
            header,
            layout,
            pipelines,
        })
    }

    /// Plan and execute the job, writing `output` and its pointer file
    pub fn run(
        &self,
        output: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<JobReport> {
        let plan = self.plan()?;
        self.execute(plan, output, progress, cancel)
    }

    /// Execute a plan produced by [`ConversionJob::plan`]
    pub fn execute(
        &self,
        plan: JobPlan,
        output: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<JobReport> {
        let started = Instant::now();
        cancel.check()?;

        info!(
            "Converting {} loggers into {} ({} bytes)",
            plan.sessions.len(),
            output.display(),
            plan.output_len()
        );
        write_header_block(output, &plan)?;

        let threads = self.config.threads.min(plan.sessions.len()).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| ConvertError::ThreadPool {
                reason: e.to_string(),
            })?;

        let width = plan.layout.width();
        let results: Vec<Result<u64>> = pool.install(|| {
            plan.sessions
                .par_iter()
                .zip(plan.pipelines.par_iter())
                .enumerate()
                .map(|(logger, (session, pipeline))| {
                    let span = plan.layout.logger_span(logger);
                    convert_logger(
                        logger, session, pipeline, span, width, output, progress, cancel,
                    )
                })
                .collect()
        });

        let loggers: Vec<LoggerReport> = plan
            .sessions
            .iter()
            .zip(results)
            .enumerate()
            .map(|(logger, (session, result))| {
                if let Err(e) = &result {
                    error!("Logger {} ({}) failed: {}", logger, session.path.display(), e);
                }
                LoggerReport::new(logger, session, result)
            })
            .collect();

        let pointer_file = write_pointer_file(
            output,
            &plan.header,
            plan.summary_kind(),
            &plan.channel_stop_times(),
            Utc::now(),
        )?;

        let report = JobReport {
            output: output.to_path_buf(),
            pointer_file,
            warnings: plan.warnings,
            window: plan.window,
            layout: plan.layout,
            loggers,
            elapsed_secs: started.elapsed().as_secs_f64(),
        };
        info!(
            "Finished in {:.2}s: {} loggers written, {} failed",
            report.elapsed_secs,
            report.succeeded(),
            report.failed()
        );
        Ok(report)
    }
}

/// Channel header records for every logger, in layout order
fn build_header(
    sessions: &[LoggerSession],
    pipelines: &[LoggerPipeline],
    window: Option<&ResampleWindow>,
    width: SampleWidth,
    comment: String,
) -> Result<ContainerHeader> {
    let mut channels = Vec::new();

    for (session, pipeline) in sessions.iter().zip(pipelines) {
        let (start_time, rate) = match window {
            Some(window) => (window.start, window.frequency),
            None => (session.first_timestamp, session.mean_rate),
        };
        let samples = pipeline.output_len(session);
        let sample_count = u32::try_from(samples).map_err(|_| ConvertError::InvalidParameter {
            param: "sample_count".to_string(),
            value: samples.to_string(),
            expected: format!("at most {}", u32::MAX),
        })?;

        for channel in 0..session.channel_count {
            let index = u16::try_from(channels.len()).map_err(|_| {
                ConvertError::InvalidParameter {
                    param: "channels".to_string(),
                    value: (channels.len() + 1).to_string(),
                    expected: format!("at most {}", u16::MAX),
                }
            })?;
            channels.push(ChannelHeader {
                index,
                sample_count,
                name: session.channel_name(channel),
                unit: pipeline.output_unit(channel).symbol().to_string(),
                comment: session.file_name(),
                width,
                start_time,
                sample_period_ms: 1000.0 / rate,
                sensor_id: session.device_id.to_string(),
            });
        }
    }

    Ok(ContainerHeader::new(comment, channels))
}

/// Create the output, size it, and write the complete header block
fn write_header_block(output: &Path, plan: &JobPlan) -> Result<()> {
    let bytes = plan.header.encode()?;
    let mut file = File::create(output).map_err(|e| ConvertError::io(output, e))?;
    file.set_len(plan.output_len())
        .map_err(|e| ConvertError::io(output, e))?;
    file.write_all(&bytes)
        .map_err(|e| ConvertError::io(output, e))?;
    file.sync_data().map_err(|e| ConvertError::io(output, e))?;
    Ok(())
}

/// Decode, process and write one logger into its byte range
#[allow(clippy::too_many_arguments)]
fn convert_logger(
    logger: usize,
    session: &LoggerSession,
    pipeline: &LoggerPipeline,
    span: Option<(u64, u64)>,
    width: SampleWidth,
    output: &Path,
    progress: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<u64> {
    cancel.check()?;
    let Some((offset, length)) = span else {
        return Ok(0);
    };
    info!("Logger {}: {}", logger, session.path.display());

    let matrix = pipeline.run(logger, session, progress, cancel)?;
    let expected = pipeline.output_len(session);
    if matrix.num_samples() != expected {
        return Err(ConvertError::InsufficientSamples {
            needed: expected,
            got: matrix.num_samples(),
        });
    }
    cancel.check()?;

    let mut file = OpenOptions::new()
        .write(true)
        .open(output)
        .map_err(|e| ConvertError::io(output, e))?;
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| ConvertError::io(output, e))?;

    let written = write_channels(
        &mut file,
        matrix.channels().iter().map(|series| series.samples()),
        width,
    )
    .map_err(|e| ConvertError::io(output, e))?;

    debug_assert_eq!(written, length);
    debug!("Logger {}: wrote {} bytes at offset {}", logger, written, offset);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgress;
    use crate::source::{write_recording, SyntheticRecording};
    use tempfile::tempdir;

    fn recording(session_id: u32, start_time: f64) -> SyntheticRecording {
        SyntheticRecording {
            device_id: 100 + session_id,
            session_id,
            start_time,
            sectors: 20,
            samples_per_sector: Some(50),
            ..SyntheticRecording::default()
        }
    }

    #[test]
    fn test_no_inputs() {
        let job = ConversionJob::new(Vec::new(), JobConfig::default());
        assert!(matches!(job.plan().unwrap_err(), ConvertError::NoInputFiles));
    }

    #[test]
    fn test_discovery_failure_names_logger() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.cwa");
        std::fs::write(&path, vec![0u8; 100]).unwrap();

        let job = ConversionJob::new(vec![path], JobConfig::default());
        let err = job.plan().unwrap_err();
        assert!(matches!(err, ConvertError::LoggerFailed { .. }));
        assert!(err.to_string().contains("broken.cwa"));
    }

    #[test]
    fn test_inputs_are_sorted_and_deduplicated() {
        let inputs = vec![
            PathBuf::from("b.cwa"),
            PathBuf::from("a.cwa"),
            PathBuf::from("b.cwa"),
        ];
        let job = ConversionJob::new(inputs, JobConfig::default());
        assert_eq!(job.inputs(), &[PathBuf::from("a.cwa"), PathBuf::from("b.cwa")]);
    }

    #[test]
    fn test_cancelled_before_start_writes_nothing() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("a.cwa");
        write_recording(&input, &recording(1, 1_600_000_000.0), |_, _| 0).unwrap();
        let output = dir.path().join("out.bin");

        let cancel = CancelToken::new();
        cancel.cancel();
        let job = ConversionJob::new(vec![input], JobConfig::default());
        let err = job.run(&output, &NullProgress, &cancel).unwrap_err();
        assert!(matches!(err, ConvertError::Cancelled));
        assert!(!output.exists());
    }

    #[test]
    fn test_into_result_surfaces_failure() {
        let session = LoggerSession {
            path: PathBuf::from("bad.cwa"),
            device_id: 1,
            session_id: 1,
            channel_count: 3,
            scale: crate::source::ScaleFactors::default(),
            samples_per_sector: 80,
            sector_count: 1,
            sample_count: 80,
            nominal_rate: 100.0,
            mean_rate: 100.0,
            first_timestamp: 0.0,
            last_timestamp: 0.8,
        };
        let report = JobReport {
            output: PathBuf::from("out.bin"),
            pointer_file: PathBuf::from("out.TST"),
            warnings: Vec::new(),
            window: None,
            layout: OutputLayout::new(0, &[], SampleWidth::Float32),
            loggers: vec![LoggerReport::new(0, &session, Err(ConvertError::Cancelled))],
            elapsed_secs: 0.0,
        };
        assert_eq!(report.failed(), 1);
        let err = report.into_result().unwrap_err();
        assert_eq!(err.error_code(), "LOGGER_FAILED");
    }
}
