//! Primitive field encoding
//!
//! All container fields are little-endian. Variable strings carry a `u16`
//! byte-length prefix; fixed strings are zero-padded to their field width.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// Encoded size of a length-prefixed string
pub fn string_len(s: &str) -> usize {
    2 + s.len()
}

/// Write a `u16` length prefix followed by the UTF-8 bytes
pub fn write_string<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    let len = u16::try_from(s.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("string of {} bytes does not fit a u16 length", s.len()),
        )
    })?;
    w.write_u16::<LittleEndian>(len)?;
    w.write_all(s.as_bytes())
}

/// Read a length-prefixed string
pub fn read_string<R: Read>(r: &mut R) -> io::Result<String> {
    let len = r.read_u16::<LittleEndian>()? as usize;
    let mut bytes = vec![0u8; len];
    r.read_exact(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Write `s` into a fixed field of `width` bytes, truncating or zero-padding
pub fn write_fixed_str<W: Write>(w: &mut W, s: &str, width: usize) -> io::Result<()> {
    let bytes = s.as_bytes();
    let used = bytes.len().min(width);
    w.write_all(&bytes[..used])?;
    write_zeros(w, width - used)
}

/// Read a fixed field of `width` bytes, dropping trailing zero padding
pub fn read_fixed_str<R: Read>(r: &mut R, width: usize) -> io::Result<String> {
    let mut bytes = vec![0u8; width];
    r.read_exact(&mut bytes)?;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(width);
    Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
}

pub fn write_zeros<W: Write>(w: &mut W, count: usize) -> io::Result<()> {
    const ZEROS: [u8; 64] = [0; 64];
    let mut left = count;
    while left > 0 {
        let n = left.min(ZEROS.len());
        w.write_all(&ZEROS[..n])?;
        left -= n;
    }
    Ok(())
}

pub fn skip_bytes<R: Read>(r: &mut R, count: usize) -> io::Result<()> {
    let copied = io::copy(&mut r.by_ref().take(count as u64), &mut io::sink())?;
    if copied as usize != count {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {} bytes, found {}", count, copied),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_string_prefix() {
        let mut buf = Vec::new();
        write_string(&mut buf, "g").unwrap();
        assert_eq!(buf, vec![1, 0, b'g']);
        assert_eq!(string_len("g"), 3);

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_string(&mut cursor).unwrap(), "g");
    }

    #[test]
    fn test_reserved_blank_string() {
        let mut buf = Vec::new();
        write_string(&mut buf, " ").unwrap();
        assert_eq!(buf, vec![1, 0, b' ']);
    }

    #[test]
    fn test_fixed_str_pads_and_truncates() {
        let mut buf = Vec::new();
        write_fixed_str(&mut buf, "abc", 6).unwrap();
        write_fixed_str(&mut buf, "abcdefgh", 4).unwrap();
        assert_eq!(buf, b"abc\0\0\0abcd".to_vec());

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_fixed_str(&mut cursor, 6).unwrap(), "abc");
        assert_eq!(read_fixed_str(&mut cursor, 4).unwrap(), "abcd");
    }

    #[test]
    fn test_skip_past_end() {
        let mut cursor = Cursor::new(vec![0u8; 3]);
        assert!(skip_bytes(&mut cursor, 2).is_ok());
        assert!(skip_bytes(&mut cursor, 2).is_err());
    }

    #[test]
    fn test_zeros() {
        let mut buf = Vec::new();
        write_zeros(&mut buf, 150).unwrap();
        assert_eq!(buf.len(), 150);
        assert!(buf.iter().all(|&b| b == 0));
    }
}
