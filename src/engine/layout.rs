//! Output byte layout
//!
//! Every logger/channel pair owns one byte range of the output file. Ranges
//! follow the header block back to back in logger-then-channel order, so
//! workers can write their loggers concurrently without coordination.

use serde::Serialize;

use crate::container::SampleWidth;

/// Byte range of one output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayoutEntry {
    pub logger: usize,
    pub channel: usize,
    pub offset: u64,
    pub length: u64,
}

impl LayoutEntry {
    /// First byte past the range
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Shape of one logger's output block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggerBlock {
    pub channels: usize,
    /// Samples per channel
    pub samples: usize,
}

/// Byte ranges of every output channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputLayout {
    data_start: u64,
    width: SampleWidth,
    entries: Vec<LayoutEntry>,
}

impl OutputLayout {
    /// Assign ranges starting at `data_start`
    pub fn new(data_start: u64, blocks: &[LoggerBlock], width: SampleWidth) -> Self {
        let mut offset = data_start;
        let mut entries = Vec::with_capacity(blocks.iter().map(|b| b.channels).sum());

        for (logger, block) in blocks.iter().enumerate() {
            let length = width.block_len(block.samples);
            for channel in 0..block.channels {
                entries.push(LayoutEntry {
                    logger,
                    channel,
                    offset,
                    length,
                });
                offset += length;
            }
        }

        Self {
            data_start,
            width,
            entries,
        }
    }

    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    pub fn width(&self) -> SampleWidth {
        self.width
    }

    /// Offset of the first data byte (the header block length)
    pub fn data_start(&self) -> u64 {
        self.data_start
    }

    /// Total size of the output file
    pub fn end(&self) -> u64 {
        self.entries.last().map_or(self.data_start, LayoutEntry::end)
    }

    /// Bytes of channel data
    pub fn data_len(&self) -> u64 {
        self.end() - self.data_start
    }

    /// Ranges of one logger's channels
    pub fn logger_entries(&self, logger: usize) -> impl Iterator<Item = &LayoutEntry> + '_ {
        self.entries.iter().filter(move |e| e.logger == logger)
    }

    /// Start and length of one logger's block
    pub fn logger_span(&self, logger: usize) -> Option<(u64, u64)> {
        let mut entries = self.logger_entries(logger);
        let first = entries.next()?;
        let end = entries.last().map_or(first.end(), LayoutEntry::end);
        Some((first.offset, end - first.offset))
    }

    /// Whether the ranges start at the data offset and follow each other
    /// without gaps or overlap
    pub fn is_contiguous(&self) -> bool {
        let mut expected = self.data_start;
        for entry in &self.entries {
            if entry.offset != expected {
                return false;
            }
            expected = entry.end();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_two_logger_scenario() {
        let blocks = [LoggerBlock { channels: 3, samples: 401 }; 2];
        let layout = OutputLayout::new(1000, &blocks, SampleWidth::Float64);

        assert_eq!(layout.entries().len(), 6);
        assert_eq!(layout.data_len(), 19_248);
        assert!(layout.is_contiguous());
        assert_eq!(layout.logger_span(1), Some((1000 + 3 * 3208, 3 * 3208)));
    }

    #[test_case(SampleWidth::Float64, 8 * 100; "doubles")]
    #[test_case(SampleWidth::Float32, 4 * 100; "singles")]
    #[test_case(SampleWidth::Quantized16, 2 * 100 + 16; "quantized reserves range")]
    fn test_entry_length(width: SampleWidth, expected: u64) {
        let layout = OutputLayout::new(0, &[LoggerBlock { channels: 1, samples: 100 }], width);
        assert_eq!(layout.entries()[0].length, expected);
    }

    #[test]
    fn test_mixed_loggers_never_overlap() {
        let blocks = [
            LoggerBlock { channels: 3, samples: 10 },
            LoggerBlock { channels: 9, samples: 7 },
            LoggerBlock { channels: 6, samples: 12 },
        ];
        let layout = OutputLayout::new(512, &blocks, SampleWidth::Quantized16);
        assert!(layout.is_contiguous());

        for (i, a) in layout.entries().iter().enumerate() {
            for b in &layout.entries()[i + 1..] {
                assert!(a.end() <= b.offset || b.end() <= a.offset);
            }
        }
        let expected: u64 = blocks
            .iter()
            .map(|b| b.channels as u64 * (b.samples as u64 * 2 + 16))
            .sum();
        assert_eq!(layout.data_len(), expected);
        assert_eq!(layout.logger_entries(1).count(), 9);
    }

    #[test]
    fn test_empty_layout() {
        let layout = OutputLayout::new(300, &[], SampleWidth::Float32);
        assert_eq!(layout.end(), 300);
        assert_eq!(layout.logger_span(0), None);
    }
}
