//! cwabin - logger recordings to measurement containers
//!
//! Converts sector-based accelerometer logger recordings into a single
//! multi-channel binary container plus a text pointer file.
//!
//! # Pipeline
//!
//! Each logger runs through:
//! - Sector decoding into scaled channel series
//! - Optional zero-phase low-pass filtering and resampling onto a window
//!   shared by every logger of the job
//! - Optional integration of acceleration into velocity
//! - Encoding into its pre-assigned byte range of the container
//!
//! Loggers are processed in parallel on a bounded worker pool.

pub mod cli;
pub mod container;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod progress;
pub mod source;

pub use engine::{ConversionJob, JobConfig, JobReport};
pub use error::{ConvertError, Result};
pub use progress::{CancelToken, ChannelProgress, NullProgress, ProgressSink, ProgressUpdate};
