//! Container reader
//!
//! Parses a written container back into its header and decoded samples.

use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;

use super::data::read_channel;
use super::header::{ChannelHeader, ContainerHeader};
use crate::error::{ConvertError, Result};

/// A container loaded into memory
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub header: ContainerHeader,
    pub data_offset: u64,
    /// Decoded samples, one vector per channel header
    pub channels: Vec<Vec<f64>>,
}

impl Container {
    /// Channel header and samples by name
    pub fn channel(&self, name: &str) -> Option<(&ChannelHeader, &[f64])> {
        self.header
            .channels
            .iter()
            .zip(&self.channels)
            .find(|(header, _)| header.name == name)
            .map(|(header, samples)| (header, samples.as_slice()))
    }
}

/// Read only the header block of the container at `path`
pub fn read_container_header(path: &Path) -> Result<(ContainerHeader, u64)> {
    let file = File::open(path).map_err(|e| ConvertError::io(path, e))?;
    ContainerHeader::read_from(&mut BufReader::new(file))
}

/// Read the header and every channel of the container at `path`
pub fn read_container(path: &Path) -> Result<Container> {
    let file = File::open(path).map_err(|e| ConvertError::io(path, e))?;
    let file_len = file
        .metadata()
        .map_err(|e| ConvertError::io(path, e))?
        .len();
    let mut reader = BufReader::new(file);
    let (header, data_offset) = ContainerHeader::read_from(&mut reader)?;

    let expected = data_offset + header.data_len();
    if file_len < expected {
        return Err(ConvertError::ContainerFormat {
            reason: format!(
                "{} is {} bytes, headers describe {}",
                path.display(),
                file_len,
                expected
            ),
        });
    }

    reader
        .seek(SeekFrom::Start(data_offset))
        .map_err(|e| ConvertError::io(path, e))?;
    let channels = header
        .channels
        .iter()
        .map(|channel| read_channel(&mut reader, channel.sample_count as usize, channel.width))
        .collect::<Result<Vec<_>>>()?;

    Ok(Container {
        header,
        data_offset,
        channels,
    })
}
