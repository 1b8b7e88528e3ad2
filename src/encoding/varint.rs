//! # Variable-Length Integer Encoding
//!
//! LEB128 encoding for the unsigned lengths and counts inside node records:
//! seven value bits per byte, high bit set on every byte except the last.
//! Small values (the common case for entry counts and key lengths) encode
//! in a single byte; a full `u64` takes at most ten.
//!
//! The encoding is deterministic: `read_varint` rejects over-long encodings
//! past the tenth byte and values that overflow 64 bits, so a value has
//! exactly one accepted byte sequence of each length and round-trips exactly.
//!
//! ## Error Handling
//!
//! `read_varint` returns `eyre::Result`:
//! - empty or truncated input: "truncated varint"
//! - more than ten bytes / overflow: "varint overflows u64"

use eyre::{bail, ensure, Result};

/// Number of bytes `write_varint` will append for `value`.
pub fn varint_len(value: u64) -> usize {
    let bits = (64 - value.leading_zeros()).max(1) as usize;
    bits.div_ceil(7)
}

/// Appends the LEB128 encoding of `value` to `buf`.
pub fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

/// Decodes a LEB128 value from the front of `buf`, returning the value and
/// the number of bytes consumed.
pub fn read_varint(buf: &[u8]) -> Result<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0u32;

    for (i, &byte) in buf.iter().enumerate() {
        ensure!(i < 10, "varint overflows u64");
        let payload = (byte & 0x7F) as u64;
        if shift == 63 {
            // Tenth byte: only the low bit may be set.
            ensure!(payload <= 1, "varint overflows u64");
        }
        value |= payload << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        shift += 7;
    }

    bail!("truncated varint")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_boundary_values() {
        for value in [
            0u64,
            1,
            0x7F,
            0x80,
            0x3FFF,
            0x4000,
            u32::MAX as u64,
            u64::MAX,
        ] {
            let mut buf = Vec::new();
            write_varint(&mut buf, value);
            let (decoded, read) = read_varint(&buf).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(read, buf.len());
        }
    }

    #[test]
    fn single_byte_values_encode_in_one_byte() {
        for value in 0..=0x7Fu64 {
            let mut buf = Vec::new();
            write_varint(&mut buf, value);
            assert_eq!(buf, vec![value as u8]);
        }
    }

    #[test]
    fn varint_len_matches_encoding() {
        for value in [0u64, 0x7F, 0x80, 0x3FFF, 0x4000, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            write_varint(&mut buf, value);
            assert_eq!(varint_len(value), buf.len(), "value {value}");
        }
    }

    #[test]
    fn decode_consumes_only_the_varint() {
        let mut buf = Vec::new();
        write_varint(&mut buf, 300);
        buf.extend_from_slice(b"trailing");
        let (value, read) = read_varint(&buf).unwrap();
        assert_eq!(value, 300);
        assert_eq!(read, 2);
    }

    #[test]
    fn truncated_input_is_an_error() {
        assert!(read_varint(&[]).is_err());
        assert!(read_varint(&[0x80]).is_err());
        assert!(read_varint(&[0xFF, 0xFF]).is_err());
    }

    #[test]
    fn eleventh_byte_is_an_error() {
        let buf = [0x80u8; 11];
        assert!(read_varint(&buf).is_err());
    }

    #[test]
    fn tenth_byte_overflow_is_an_error() {
        let mut buf = [0x80u8; 10];
        buf[9] = 0x02;
        assert!(read_varint(&buf).is_err());
    }
}
