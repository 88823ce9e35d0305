//! Primitive decoders for the mapsforge binary format
//!
//! Fixed-width integers are stored big-endian. Counts, sizes and coordinate
//! deltas use a variable-length encoding of little-endian 7-bit groups where
//! the high bit of each byte flags a continuation. Signed varints reserve the
//! second-highest bit of their final byte as a sign flag.
//!
//! Every reader takes the buffer and a cursor, checks that enough bytes
//! remain, and only then advances the cursor.
//!
//! # Example
//!
//! ```rust
//! use mapsforge_reader::decode::{read_int, read_signed_varint};
//!
//! let buf = [0x00, 0x00, 0x01, 0x00, 0x41];
//! let mut pos = 0;
//! assert_eq!(read_int(&buf, &mut pos).unwrap(), 256);
//! assert_eq!(read_signed_varint(&buf, &mut pos).unwrap(), -1);
//! assert_eq!(pos, 5);
//! ```

use crate::error::{MapError, Result};

/// Longest varint the format produces
pub const MAX_VARINT_BYTES: usize = 5;

#[inline]
fn take<'a>(buf: &'a [u8], pos: &mut usize, len: usize, what: &str) -> Result<&'a [u8]> {
    let end = pos
        .checked_add(len)
        .filter(|&end| end <= buf.len())
        .ok_or_else(|| {
            MapError::decode(format!(
                "{} out of bounds: need {} bytes at {}, buffer holds {}",
                what,
                len,
                pos,
                buf.len()
            ))
        })?;
    let bytes = &buf[*pos..end];
    *pos = end;
    Ok(bytes)
}

#[inline]
fn byte_at(buf: &[u8], index: usize) -> Result<u8> {
    buf.get(index)
        .copied()
        .ok_or_else(|| MapError::decode(format!("varint out of bounds at {}", index)))
}

/// Read one unsigned byte.
#[inline]
pub fn read_byte(buf: &[u8], pos: &mut usize) -> Result<u8> {
    Ok(take(buf, pos, 1, "byte")?[0])
}

/// Read a big-endian 16-bit signed integer.
#[inline]
pub fn read_short(buf: &[u8], pos: &mut usize) -> Result<i16> {
    let b = take(buf, pos, 2, "short")?;
    Ok(i16::from_be_bytes([b[0], b[1]]))
}

/// Read a big-endian 32-bit signed integer.
#[inline]
pub fn read_int(buf: &[u8], pos: &mut usize) -> Result<i32> {
    let b = take(buf, pos, 4, "int")?;
    Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

/// Read a big-endian 64-bit signed integer.
#[inline]
pub fn read_long(buf: &[u8], pos: &mut usize) -> Result<i64> {
    let b = take(buf, pos, 8, "long")?;
    Ok(i64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
}

/// Read a big-endian unsigned 40-bit integer, the width of one index entry.
#[inline]
pub fn read_five_bytes(buf: &[u8], pos: &mut usize) -> Result<u64> {
    let b = take(buf, pos, 5, "index entry")?;
    Ok(b.iter().fold(0u64, |acc, &v| (acc << 8) | v as u64))
}

/// Borrow `len` raw bytes.
#[inline]
pub fn read_bytes<'a>(buf: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8]> {
    take(buf, pos, len, "byte run")
}

/// Read an unsigned varint of at most five bytes.
///
/// The fifth byte is taken as the last one regardless of its continuation
/// bit; bits beyond 32 are discarded.
pub fn read_unsigned_varint(buf: &[u8], pos: &mut usize) -> Result<u32> {
    let start = *pos;
    let mut value: u32 = 0;
    for i in 0..MAX_VARINT_BYTES {
        let b = byte_at(buf, start + i)?;
        value |= ((b & 0x7f) as u32) << (7 * i);
        if b & 0x80 == 0 || i == MAX_VARINT_BYTES - 1 {
            *pos = start + i + 1;
            break;
        }
    }
    Ok(value)
}

/// Read a signed varint of at most five bytes.
///
/// The final byte carries six value bits and a sign flag in bit 6. The sign
/// is applied as `(magnitude ^ -flag) + flag`, which wraps for the
/// magnitudes that do not fit a positive `i32`.
pub fn read_signed_varint(buf: &[u8], pos: &mut usize) -> Result<i32> {
    let start = *pos;
    let mut value: u32 = 0;
    let mut i = 0;
    loop {
        let b = byte_at(buf, start + i)?;
        let shift = 7 * i;
        if b & 0x80 == 0 || i == MAX_VARINT_BYTES - 1 {
            value |= ((b & 0x3f) as u32) << shift;
            let flag = ((b & 0x40) >> 6) as i32;
            *pos = start + i + 1;
            return Ok((value as i32 ^ flag.wrapping_neg()).wrapping_add(flag));
        }
        value |= ((b & 0x7f) as u32) << shift;
        i += 1;
    }
}

/// Decode `out.len()` consecutive signed varints into `out`.
///
/// On error the cursor is left where the failing varint started.
pub fn read_signed_varints(buf: &[u8], pos: &mut usize, out: &mut [i32]) -> Result<()> {
    for slot in out.iter_mut() {
        *slot = read_signed_varint(buf, pos)?;
    }
    Ok(())
}

/// Read a varint length-prefixed UTF-8 string.
pub fn read_utf8_string(buf: &[u8], pos: &mut usize) -> Result<String> {
    let len = read_unsigned_varint(buf, pos)? as usize;
    read_utf8_string_of_len(buf, pos, len)
}

/// Read `len` bytes as UTF-8. Invalid sequences are replaced, not rejected.
pub fn read_utf8_string_of_len(buf: &[u8], pos: &mut usize, len: usize) -> Result<String> {
    if len == 0 {
        return Ok(String::new());
    }
    let remaining = buf.len().saturating_sub(*pos);
    if len > remaining {
        return Err(MapError::decode(format!(
            "string length {} exceeds remaining {} bytes",
            len, remaining
        )));
    }
    let bytes = take(buf, pos, len, "string")?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Encode in the format's signed varint layout.
    pub(crate) fn encode_signed(v: i32, out: &mut Vec<u8>) {
        let negative = v < 0;
        let mut mag = v.unsigned_abs() as u64;
        while mag > 0x3f {
            out.push((mag & 0x7f) as u8 | 0x80);
            mag >>= 7;
        }
        let sign = if negative { 0x40 } else { 0 };
        out.push(mag as u8 | sign);
    }

    pub(crate) fn encode_unsigned(mut v: u32, out: &mut Vec<u8>) {
        while v > 0x7f {
            out.push((v & 0x7f) as u8 | 0x80);
            v >>= 7;
        }
        out.push(v as u8);
    }

    #[test]
    fn test_fixed_width_big_endian() {
        let buf = [
            0x7f, 0x12, 0x34, 0x80, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
            0x02,
        ];
        let mut pos = 0;
        assert_eq!(read_byte(&buf, &mut pos).unwrap(), 0x7f);
        assert_eq!(read_short(&buf, &mut pos).unwrap(), 0x1234);
        assert_eq!(read_int(&buf, &mut pos).unwrap(), i32::MIN + 1);
        assert_eq!(read_long(&buf, &mut pos).unwrap(), 0x0102);
        assert_eq!(pos, buf.len());
    }

    #[test]
    fn test_five_byte_entry() {
        let buf = [0x80, 0x00, 0x00, 0x01, 0x00];
        let mut pos = 0;
        let v = read_five_bytes(&buf, &mut pos).unwrap();
        assert_eq!(v & 0x7F_FFFF_FFFF, 256);
        assert_ne!(v & 0x80_0000_0000, 0);
    }

    #[test]
    fn test_underrun_does_not_advance() {
        let buf = [0x00, 0x01];
        let mut pos = 1;
        assert!(read_int(&buf, &mut pos).is_err());
        assert_eq!(pos, 1);

        let unterminated = [0x80, 0x80];
        let mut pos = 0;
        assert!(read_unsigned_varint(&unterminated, &mut pos).is_err());
        assert!(read_signed_varint(&unterminated, &mut pos).is_err());
        assert_eq!(pos, 0);
    }

    #[test]
    fn test_signed_varint_boundaries() {
        for v in [0, 1, -1, 63, 64, -64, 8191, -8192, i32::MIN, i32::MAX] {
            let mut buf = Vec::new();
            encode_signed(v, &mut buf);
            let mut pos = 0;
            assert_eq!(read_signed_varint(&buf, &mut pos).unwrap(), v, "value {}", v);
            assert_eq!(pos, buf.len());
        }
    }

    #[test]
    fn test_negative_zero_decodes_to_zero() {
        let mut pos = 0;
        assert_eq!(read_signed_varint(&[0x40], &mut pos).unwrap(), 0);
    }

    #[test]
    fn test_batch_decode() {
        let mut buf = Vec::new();
        for v in [5, -7, 300_000, -1] {
            encode_signed(v, &mut buf);
        }
        let mut out = [0i32; 4];
        let mut pos = 0;
        read_signed_varints(&buf, &mut pos, &mut out).unwrap();
        assert_eq!(out, [5, -7, 300_000, -1]);
    }

    #[test]
    fn test_string_length_checked() {
        let buf = [0x05, b'a', b'b'];
        let mut pos = 0;
        assert!(read_utf8_string(&buf, &mut pos).is_err());

        let buf = [0x00, 0x02, b'h', b'i'];
        let mut pos = 0;
        assert_eq!(read_utf8_string(&buf, &mut pos).unwrap(), "");
        assert_eq!(read_utf8_string(&buf, &mut pos).unwrap(), "hi");
    }

    proptest! {
        #[test]
        fn prop_signed_varint_round_trip(v in any::<i32>()) {
            let mut buf = Vec::new();
            encode_signed(v, &mut buf);
            let mut pos = 0;
            prop_assert_eq!(read_signed_varint(&buf, &mut pos).unwrap(), v);
            prop_assert_eq!(pos, buf.len());
        }

        #[test]
        fn prop_unsigned_varint_round_trip(v in any::<u32>()) {
            let mut buf = Vec::new();
            encode_unsigned(v, &mut buf);
            let mut pos = 0;
            prop_assert_eq!(read_unsigned_varint(&buf, &mut pos).unwrap(), v);
        }
    }
}
