//! Measurement Container
//!
//! Byte-exact encoding of the target container:
//! - Preamble and per-channel header records
//! - Channel data blocks (double, single or quantized)
//! - Reader for written containers
//! - Plain-text pointer file

pub mod data;
pub mod encoding;
pub mod header;
pub mod reader;
pub mod summary;

pub use data::{encode_channel, read_channel, write_channel, write_channels, QuantizedRange};
pub use header::{
    legacy_days, unix_seconds, ChannelHeader, ContainerHeader, SampleWidth, FILE_ID,
};
pub use reader::{read_container, read_container_header, Container};
pub use summary::{pointer_path, write_pointer_file, SummaryKind};
