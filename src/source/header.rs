//! Logger file header
//!
//! The first [`HEADER_SIZE`] bytes of a recording identify the device and
//! the logging session. Everything else in the header is ignored.

use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use crate::error::{ConvertError, Result};

/// Size of the header region preceding the first data sector
pub const HEADER_SIZE: usize = 1024;

const HEADER_MAGIC: &[u8; 2] = b"MD";
const HEADER_PACKET_LENGTH: u16 = (HEADER_SIZE - 4) as u16;

const DEVICE_ID_LOW_OFFSET: usize = 5;
const SESSION_ID_OFFSET: usize = 7;
const DEVICE_ID_HIGH_OFFSET: usize = 11;

/// Identity fields of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileHeader {
    pub device_id: u32,
    pub session_id: u32,
}

impl FileHeader {
    pub fn new(device_id: u32, session_id: u32) -> Self {
        Self {
            device_id,
            session_id,
        }
    }

    /// Parse the header region of the recording at `path`
    pub fn parse(bytes: &[u8], path: &Path) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(ConvertError::InvalidHeader {
                path: path.to_path_buf(),
                reason: format!("header is {} bytes, expected {}", bytes.len(), HEADER_SIZE),
            });
        }

        if &bytes[0..2] != HEADER_MAGIC {
            return Err(ConvertError::InvalidHeader {
                path: path.to_path_buf(),
                reason: format!("bad magic {:02x?}", &bytes[0..2]),
            });
        }

        let low = LittleEndian::read_u16(&bytes[DEVICE_ID_LOW_OFFSET..]) as u32;
        let high = match LittleEndian::read_u16(&bytes[DEVICE_ID_HIGH_OFFSET..]) {
            0xFFFF => 0,
            high => high as u32,
        };
        let session_id = LittleEndian::read_u32(&bytes[SESSION_ID_OFFSET..]);

        Ok(Self {
            device_id: (high << 16) | low,
            session_id,
        })
    }

    /// Encode into a full header region
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes[0..2].copy_from_slice(HEADER_MAGIC);
        LittleEndian::write_u16(&mut bytes[2..4], HEADER_PACKET_LENGTH);
        LittleEndian::write_u16(
            &mut bytes[DEVICE_ID_LOW_OFFSET..],
            (self.device_id & 0xFFFF) as u16,
        );
        LittleEndian::write_u32(&mut bytes[SESSION_ID_OFFSET..], self.session_id);
        LittleEndian::write_u16(
            &mut bytes[DEVICE_ID_HIGH_OFFSET..],
            (self.device_id >> 16) as u16,
        );
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_fields() {
        let header = FileHeader::new(6_011_027, 42);
        let bytes = header.encode();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[0..2], b"MD");

        let parsed = FileHeader::parse(&bytes, Path::new("a.cwa")).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_missing_high_device_id() {
        let mut bytes = FileHeader::new(1234, 1).encode();
        bytes[DEVICE_ID_HIGH_OFFSET] = 0xFF;
        bytes[DEVICE_ID_HIGH_OFFSET + 1] = 0xFF;

        let parsed = FileHeader::parse(&bytes, Path::new("a.cwa")).unwrap();
        assert_eq!(parsed.device_id, 1234);
    }

    #[test]
    fn test_rejects_short_or_foreign_headers() {
        let short = FileHeader::parse(&[0u8; 100], Path::new("a.cwa"));
        assert!(matches!(short, Err(ConvertError::InvalidHeader { .. })));

        let foreign = FileHeader::parse(&[0u8; HEADER_SIZE], Path::new("a.cwa"));
        assert!(matches!(foreign, Err(ConvertError::InvalidHeader { .. })));
    }
}
