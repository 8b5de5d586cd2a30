//! Conversion Engine Module
//!
//! Multi-logger orchestration:
//! - Job configuration
//! - Discovery statistics and outlier detection
//! - Shared resample window and output byte layout
//! - Per-logger processing chains
//! - Parallel container writing

pub mod config;
pub mod job;
pub mod layout;
pub mod pipeline;
pub mod stats;
pub mod window;

pub use config::{IntegrationConfig, JobConfig, LowPassConfig, ResampleConfig};
pub use job::{ConversionJob, JobPlan, JobReport, LoggerReport};
pub use layout::{LayoutEntry, LoggerBlock, OutputLayout};
pub use pipeline::{IntegrationStage, LoggerPipeline};
pub use stats::{DiscoveryStats, LoggerOutOfRange, StatSummary, Statistic};
pub use window::{compute_window, TAIL_MARGIN_SECS};
