//! Source Recording Module
//!
//! Reading of the sector-based logger format:
//! - File header (device and session identity)
//! - Data sector layout and timestamps
//! - Header-only discovery into [`LoggerSession`]
//! - Chunked decoding into channel matrices

pub mod decoder;
pub mod header;
pub mod sector;
pub mod session;
pub mod synth;

pub use decoder::{decode_session, SectorDecoder, DEFAULT_CHUNK_SECTORS};
pub use header::{FileHeader, HEADER_SIZE};
pub use sector::{ScaleFactors, SectorHeader, SECTOR_SIZE};
pub use session::LoggerSession;
pub use synth::{write_recording, SyntheticRecording};
