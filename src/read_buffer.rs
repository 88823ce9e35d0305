//! Cursor-addressed reads over one block of a map file
//!
//! A [`ReadBuffer`] owns a scratch allocation reused for every block a
//! query reads. Loading a block replaces the content and rewinds the
//! cursor; the allocation only ever grows.

use crate::decode;
use crate::error::{MapError, Result};
use crate::source::MapSource;
use crate::tag::{Tag, TagSet};
use log::warn;

/// Largest block a single read may request.
pub const MAXIMUM_BUFFER_SIZE: usize = 12_000_000;

/// Outcome of [`ReadBuffer::skip_ways`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaySkip {
    /// Ways left to decode, counting the one the cursor now points into
    pub remaining: usize,
    /// Position of the special byte of the last skipped way that had tags
    pub last_tag_position: Option<usize>,
}

/// Scratch buffer plus cursor for decoding one block.
#[derive(Debug, Default)]
pub struct ReadBuffer {
    data: Vec<u8>,
    len: usize,
    pos: usize,
}

impl ReadBuffer {
    /// An empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// A buffer preloaded with `bytes`, cursor at 0.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        Self {
            data: bytes,
            len,
            pos: 0,
        }
    }

    /// Replace the content with `length` bytes of `source` at `offset`.
    ///
    /// Fails without touching the source when `length` exceeds
    /// [`MAXIMUM_BUFFER_SIZE`], and with an I/O error on a short read.
    pub fn read_from_source(
        &mut self,
        source: &dyn MapSource,
        offset: u64,
        length: usize,
    ) -> Result<()> {
        if length > MAXIMUM_BUFFER_SIZE {
            return Err(MapError::decode(format!(
                "block of {} bytes exceeds maximum buffer size {}",
                length, MAXIMUM_BUFFER_SIZE
            )));
        }
        if self.data.len() < length {
            self.data.resize(length, 0);
        }
        let got = source.read_at(offset, &mut self.data[..length])?;
        if got != length {
            self.len = 0;
            self.pos = 0;
            return Err(MapError::short_read(length, got, offset));
        }
        self.len = length;
        self.pos = 0;
        Ok(())
    }

    /// Bytes currently loaded.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no bytes are loaded.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the underlying allocation.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Current cursor.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes between the cursor and the end of the loaded block.
    pub fn remaining(&self) -> usize {
        self.len.saturating_sub(self.pos)
    }

    /// Move the cursor to `pos`, which may equal the block length.
    pub fn set_position(&mut self, pos: usize) -> Result<()> {
        if pos > self.len {
            return Err(MapError::decode(format!(
                "position {} beyond block length {}",
                pos, self.len
            )));
        }
        self.pos = pos;
        Ok(())
    }

    /// Advance the cursor by `n` bytes.
    pub fn skip_bytes(&mut self, n: usize) -> Result<()> {
        let target = self
            .pos
            .checked_add(n)
            .ok_or_else(|| MapError::decode("skip overflows"))?;
        self.set_position(target)
    }

    /// Loaded bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Read one byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        decode::read_byte(&self.data[..self.len], &mut self.pos)
    }

    /// Read a big-endian `i16`.
    pub fn read_short(&mut self) -> Result<i16> {
        decode::read_short(&self.data[..self.len], &mut self.pos)
    }

    /// Read a big-endian `i32`.
    pub fn read_int(&mut self) -> Result<i32> {
        decode::read_int(&self.data[..self.len], &mut self.pos)
    }

    /// Read a big-endian `i64`.
    pub fn read_long(&mut self) -> Result<i64> {
        decode::read_long(&self.data[..self.len], &mut self.pos)
    }

    /// Read an unsigned varint.
    pub fn read_unsigned_varint(&mut self) -> Result<u32> {
        decode::read_unsigned_varint(&self.data[..self.len], &mut self.pos)
    }

    /// Read a signed varint.
    pub fn read_signed_varint(&mut self) -> Result<i32> {
        decode::read_signed_varint(&self.data[..self.len], &mut self.pos)
    }

    /// Fill `out` with consecutive signed varints.
    pub fn read_signed_varints(&mut self, out: &mut [i32]) -> Result<()> {
        decode::read_signed_varints(&self.data[..self.len], &mut self.pos, out)
    }

    /// Read a varint length-prefixed UTF-8 string.
    pub fn read_utf8_string(&mut self) -> Result<String> {
        decode::read_utf8_string(&self.data[..self.len], &mut self.pos)
    }

    /// Read exactly `len` bytes as a string.
    pub fn read_utf8_string_of_len(&mut self, len: usize) -> Result<String> {
        decode::read_utf8_string_of_len(&self.data[..self.len], &mut self.pos, len)
    }

    /// Read a length-prefixed string at `offset`, leaving the cursor where it was.
    pub fn read_utf8_string_at(&mut self, offset: usize) -> Result<String> {
        if offset > self.len {
            return Err(MapError::decode(format!(
                "string offset {} beyond block length {}",
                offset, self.len
            )));
        }
        let mut at = offset;
        decode::read_utf8_string(&self.data[..self.len], &mut at)
    }

    /// Replace `tags` with `count` dictionary entries addressed by varint IDs.
    ///
    /// An ID outside the dictionary is logged and ends tag collection for
    /// this record. The remaining IDs are still consumed so the cursor
    /// lands on the next field.
    pub fn read_tags(&mut self, tags: &mut TagSet, dictionary: &[Tag], count: u8) -> Result<()> {
        tags.clear();
        let mut valid = true;
        for _ in 0..count {
            let id = self.read_unsigned_varint()? as usize;
            if !valid {
                continue;
            }
            match dictionary.get(id) {
                Some(tag) => tags.add(tag.clone()),
                None => {
                    warn!(
                        "invalid tag ID {} (dictionary holds {}), dropping remaining tags",
                        id,
                        dictionary.len()
                    );
                    valid = false;
                }
            }
        }
        Ok(())
    }

    /// Skip way records whose sub-tile bitmask misses `query_bitmask`.
    ///
    /// Each record starts with its size as a varint, followed by the
    /// two-byte bitmask and the special byte. Skipping stops at the first
    /// matching record, leaving the cursor just past its bitmask.
    pub fn skip_ways(&mut self, query_bitmask: u16, count: usize) -> Result<WaySkip> {
        let mut remaining = count;
        let mut last_tag_position = None;
        while remaining > 0 {
            let size = self.read_unsigned_varint()? as usize;
            if self.pos + 2 > self.len {
                return Err(MapError::decode(format!(
                    "way bitmask out of bounds at {}",
                    self.pos
                )));
            }
            let bitmask = u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]);
            if bitmask & query_bitmask != 0 {
                self.pos += 2;
                break;
            }
            if size > self.remaining() {
                return Err(MapError::decode(format!(
                    "way size {} exceeds remaining {} bytes",
                    size,
                    self.remaining()
                )));
            }
            let special = self.pos + 2;
            if special < self.len && self.data[special] & 0x0f != 0 {
                last_tag_position = Some(special);
            }
            self.pos += size;
            remaining -= 1;
        }
        Ok(WaySkip {
            remaining,
            last_tag_position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    #[test]
    fn test_block_reads_grow_and_never_shrink() {
        let source = MemorySource::new((0u8..100).collect());
        let mut buffer = ReadBuffer::new();

        buffer.read_from_source(&source, 10, 50).unwrap();
        assert_eq!(buffer.len(), 50);
        assert_eq!(buffer.read_byte().unwrap(), 10);

        buffer.read_from_source(&source, 0, 5).unwrap();
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.position(), 0);
        assert_eq!(buffer.capacity(), 50);
        assert!(buffer.skip_bytes(6).is_err());
    }

    #[test]
    fn test_oversized_and_short_reads_rejected() {
        let source = MemorySource::new(vec![0; 16]);
        let mut buffer = ReadBuffer::new();
        let err = buffer
            .read_from_source(&source, 0, MAXIMUM_BUFFER_SIZE + 1)
            .unwrap_err();
        assert!(matches!(err, MapError::Decode(_)));

        let err = buffer.read_from_source(&source, 10, 10).unwrap_err();
        assert!(matches!(err, MapError::Io(_)));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_string_at_restores_cursor() {
        let mut buffer = ReadBuffer::from_bytes(vec![0x01, 0x02, b'o', b'k']);
        buffer.read_byte().unwrap();
        assert_eq!(buffer.read_utf8_string_at(1).unwrap(), "ok");
        assert_eq!(buffer.position(), 1);
        assert!(buffer.read_utf8_string_at(9).is_err());
    }

    #[test]
    fn test_read_tags_with_invalid_id_keeps_cursor_aligned() {
        let dictionary = vec![Tag::new("highway", "primary"), Tag::new("name", "x")];
        let mut buffer = ReadBuffer::from_bytes(vec![0x01, 0x07, 0x00, 0xaa]);
        let mut tags = TagSet::new();
        tags.add(Tag::new("stale", "tag"));

        buffer.read_tags(&mut tags, &dictionary, 3).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.value("name"), Some("x"));
        assert_eq!(buffer.read_byte().unwrap(), 0xaa);
    }

    #[test]
    fn test_skip_ways_stops_at_matching_bitmask() {
        // way 1: size 4, bitmask 0x0001, special byte with two tags, one pad byte
        // way 2: size 3, bitmask 0x8000, special byte
        let bytes = vec![0x04, 0x00, 0x01, 0x52, 0x00, 0x03, 0x80, 0x00, 0x50];
        let mut buffer = ReadBuffer::from_bytes(bytes);

        let skip = buffer.skip_ways(0xcc00, 2).unwrap();
        assert_eq!(skip.remaining, 1);
        assert_eq!(skip.last_tag_position, Some(3));
        assert_eq!(buffer.position(), 8);
        assert_eq!(buffer.read_byte().unwrap(), 0x50);
    }

    #[test]
    fn test_skip_ways_rejects_oversized_record() {
        let mut buffer = ReadBuffer::from_bytes(vec![0x7f, 0x00, 0x01, 0x00]);
        assert!(buffer.skip_ways(0xcc00, 1).is_err());
    }
}
