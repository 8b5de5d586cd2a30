//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use log::{debug, info, warn};
use walkdir::WalkDir;

use super::WindowArgs;
use crate::container::read_container_header;
use crate::dsp::VelocityUnit;
use crate::engine::config::DEFAULT_RESAMPLE_HZ;
use crate::engine::{ConversionJob, IntegrationConfig, JobConfig, LowPassConfig, ResampleConfig};
use crate::error::{ConvertError, Result};
use crate::progress::{CancelToken, ChannelProgress, ProgressUpdate};
use crate::source::LoggerSession;

/// Extension of logger recordings
pub const RECORDING_EXTENSION: &str = "cwa";

/// Progress updates buffered before ticks are dropped
const PROGRESS_QUEUE: usize = 256;

/// Expand directories into the recordings they contain.
pub fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        for entry in WalkDir::new(input).follow_links(true) {
            let entry = entry.map_err(|e| ConvertError::io(input, e.into()))?;
            let is_recording = entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(RECORDING_EXTENSION));
            if entry.file_type().is_file() && is_recording {
                files.push(entry.into_path());
            }
        }
    }
    files.sort();
    files.dedup();
    debug!("Expanded {} inputs into {} recordings", inputs.len(), files.len());
    Ok(files)
}

/// Apply window flags to a configuration.
pub fn apply_window_args(config: &mut JobConfig, args: &WindowArgs) {
    if let Some(frequency_hz) = args.resample {
        let resample = config.resample.get_or_insert_with(ResampleConfig::default);
        resample.frequency_hz = frequency_hz;
    }
    if let Some(resample) = config.resample.as_mut() {
        if let Some(trim) = args.trim_start {
            resample.trim_start_secs = trim;
        }
        if let Some(trim) = args.trim_end {
            resample.trim_end_secs = trim;
        }
    }
}

/// Build the job configuration from an optional file and flag overrides.
pub fn job_config(
    config: Option<&Path>,
    window: &WindowArgs,
    lowpass: Option<Option<f64>>,
    integrate: Option<&str>,
    width: Option<u16>,
    threads: Option<usize>,
) -> Result<JobConfig> {
    let mut config = match config {
        Some(path) => JobConfig::from_file(path)?,
        None => JobConfig::default(),
    };
    apply_window_args(&mut config, window);

    if let Some(cutoff_hz) = lowpass {
        let lowpass = config.lowpass.get_or_insert_with(LowPassConfig::default);
        if cutoff_hz.is_some() {
            lowpass.cutoff_hz = cutoff_hz;
        }
    }
    if let Some(unit) = integrate {
        let unit: VelocityUnit = unit.parse()?;
        let integration = config
            .integration
            .get_or_insert_with(IntegrationConfig::default);
        integration.unit = unit;
    }
    if let Some(width) = width {
        config.byte_width = width;
    }
    if let Some(threads) = threads {
        config.threads = threads;
    }

    config.validate()?;
    Ok(config)
}

/// Convert recordings into one container.
#[allow(clippy::too_many_arguments)]
pub fn convert(
    inputs: &[PathBuf],
    output: &Path,
    config: Option<&Path>,
    window: &WindowArgs,
    lowpass: Option<Option<f64>>,
    integrate: Option<&str>,
    width: Option<u16>,
    threads: Option<usize>,
    report_path: Option<&Path>,
) -> Result<()> {
    let config = job_config(config, window, lowpass, integrate, width, threads)?;
    let job = ConversionJob::new(expand_inputs(inputs)?, config);

    let (sender, receiver) = crossbeam_channel::bounded::<ProgressUpdate>(PROGRESS_QUEUE);
    let logger_thread = thread::spawn(move || {
        for update in receiver {
            if update.percent % 20 == 0 {
                info!(
                    "Logger {} {:?}: {}%",
                    update.logger, update.stage, update.percent
                );
            }
        }
    });

    let progress = ChannelProgress::new(sender);
    let result = job.run(output, &progress, &CancelToken::new());
    drop(progress);
    if logger_thread.join().is_err() {
        warn!("Progress thread panicked");
    }
    let report = result?;

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json).map_err(|e| ConvertError::io(path, e))?;
    }

    println!("Container: {}", report.output.display());
    println!("Pointer file: {}", report.pointer_file.display());
    if let Some(window) = &report.window {
        println!(
            "Window: {:.3} .. {:.3} at {} Hz ({} samples)",
            window.start, window.stop, window.frequency, window.sample_count
        );
    }
    for warning in &report.warnings {
        println!("Warning: {}", warning);
    }
    for logger in &report.loggers {
        match (&logger.bytes_written, &logger.error) {
            (Some(bytes), _) => println!("  {} {} bytes", logger.path.display(), bytes),
            (None, Some(error)) => println!("  {} FAILED: {}", logger.path.display(), error),
            (None, None) => {}
        }
    }

    report.into_result().map(|_| ())
}

/// Preview the resample window.
pub fn window(inputs: &[PathBuf], args: &WindowArgs) -> Result<()> {
    let mut config = JobConfig::default();
    let args = WindowArgs {
        resample: args.resample.or(Some(DEFAULT_RESAMPLE_HZ)),
        ..args.clone()
    };
    apply_window_args(&mut config, &args);

    let job = ConversionJob::new(expand_inputs(inputs)?, config);
    let plan = job.plan()?;

    println!("Loggers: {}", plan.stats.loggers);
    for summary in &plan.stats.summaries {
        println!(
            "  {:<16} min {:.3} (#{})  max {:.3} (#{})  mean {:.3}",
            summary.statistic.to_string(),
            summary.min,
            summary.min_logger,
            summary.max,
            summary.max_logger,
            summary.mean
        );
    }
    for warning in &plan.warnings {
        println!("Warning: {}", warning);
    }
    if let Some(window) = &plan.window {
        println!("Window start: {:.6}", window.start);
        println!("Window stop:  {:.6}", window.stop);
        println!("Frequency:    {} Hz", window.frequency);
        println!("Samples:      {}", window.sample_count);
    }
    println!("Output size:  {} bytes", plan.output_len());

    Ok(())
}

/// Show discovery results per logger.
pub fn info(inputs: &[PathBuf]) -> Result<()> {
    let files = expand_inputs(inputs)?;
    if files.is_empty() {
        return Err(ConvertError::NoInputFiles);
    }

    for path in &files {
        match LoggerSession::discover(path) {
            Ok(session) => {
                println!("{}", path.display());
                println!("  Device:   {}", session.device_id);
                println!("  Session:  {}", session.session_id);
                println!("  Channels: {}", session.channel_count);
                println!("  Samples:  {}", session.sample_count);
                println!(
                    "  Rate:     {:.3} Hz (nominal {} Hz)",
                    session.mean_rate, session.nominal_rate
                );
                println!("  Start:    {:.6}", session.first_timestamp);
                println!("  End:      {:.6}", session.last_timestamp);
            }
            Err(e) => println!("{}: {}", path.display(), e),
        }
    }

    Ok(())
}

/// Dump the header of a written container.
pub fn inspect(path: &Path) -> Result<()> {
    let (header, data_offset) = read_container_header(path)?;

    println!("Container: {}", path.display());
    println!("Comment: {}", header.comment);
    println!("Channels: {}", header.channels.len());
    println!("Data offset: {}", data_offset);
    println!("{:-<72}", "");
    for channel in &header.channels {
        println!(
            "{:>4} {:<20} {:>8} samples  {:>10.3} Hz  {:<5} {:?}",
            channel.index,
            channel.name,
            channel.sample_count,
            channel.sample_rate(),
            channel.unit,
            channel.width
        );
    }

    Ok(())
}
