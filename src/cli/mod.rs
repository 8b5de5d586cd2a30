//! CLI Module
//!
//! Command-line interface for the cwabin converter.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// cwabin - convert logger recordings into a measurement container
#[derive(Parser, Debug)]
#[command(name = "cwabin")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Window settings shared by `convert` and `window`
#[derive(Args, Debug, Clone, Default)]
pub struct WindowArgs {
    /// Resample every logger onto a shared grid at this frequency (Hz)
    #[arg(long, value_name = "HZ")]
    pub resample: Option<f64>,

    /// Seconds dropped after the latest logger start
    #[arg(long, value_name = "S")]
    pub trim_start: Option<f64>,

    /// Seconds dropped before the earliest logger end
    #[arg(long, value_name = "S")]
    pub trim_end: Option<f64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert recordings into one container
    #[command(name = "convert")]
    Convert {
        /// Recordings or directories containing .cwa files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output container path
        #[arg(short, long)]
        output: PathBuf,

        /// JSON job configuration; flags override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        window: WindowArgs,

        /// Low-pass before resampling, optionally with a cutoff in Hz
        #[arg(long, value_name = "HZ", num_args = 0..=1)]
        lowpass: Option<Option<f64>>,

        /// Integrate acceleration into velocity (mm/s or m/s)
        #[arg(long, value_name = "UNIT")]
        integrate: Option<String>,

        /// Bytes per sample: 8, 4 or 2
        #[arg(long)]
        width: Option<u16>,

        /// Worker threads
        #[arg(long)]
        threads: Option<usize>,

        /// Write the job report as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Preview the shared resample window without writing anything
    #[command(name = "window")]
    Window {
        /// Recordings or directories containing .cwa files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        window: WindowArgs,
    },

    /// Show discovery results per logger
    #[command(name = "info")]
    Info {
        /// Recordings or directories containing .cwa files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Dump the header of a written container
    #[command(name = "inspect")]
    Inspect {
        /// Container file
        path: PathBuf,
    },
}
