//! Bounds-checked byte cursor.
//!
//! [`ByteCursor`] is a sequential reader over one asset's in-memory bytes.
//! It owns nothing: the buffer is borrowed for the duration of a single
//! decode call, and the attached [`VersionContext`] is the only version
//! input the decode chain sees.
//!
//! Every read checks `position + size <= limit` up front and fails with
//! `Truncated`; there is no partial read and no wraparound. Byte order is
//! fixed at archive open and applied on every multi-byte read.

use half::f16;

use crate::error::{DecodeError, DecodeErrorKind, DecodeResult, check_count};
use crate::version::{Endian, VersionContext};

/// Sequential reader over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    limit: usize,
    ctx: VersionContext,
    /// Label of the structure currently being decoded, for diagnostics.
    structure: &'static str,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8], ctx: VersionContext) -> Self {
        Self {
            data,
            pos: 0,
            limit: data.len(),
            ctx,
            structure: "stream",
        }
    }

    /// The version context attached at archive open.
    pub fn ctx(&self) -> VersionContext {
        self.ctx
    }

    /// Current position.
    pub fn tell(&self) -> usize {
        self.pos
    }

    /// Bytes left before the limit.
    pub fn remaining(&self) -> usize {
        self.limit - self.pos
    }

    /// Label subsequent reads as belonging to `structure`; returns the
    /// previous label so nested readers can restore it.
    pub fn enter(&mut self, structure: &'static str) -> &'static str {
        std::mem::replace(&mut self.structure, structure)
    }

    /// Restore a label saved by [`Self::enter`].
    pub fn leave(&mut self, structure: &'static str) {
        self.structure = structure;
    }

    /// Build an error at the current position.
    pub fn error(&self, kind: DecodeErrorKind) -> DecodeError {
        DecodeError::new(kind, self.structure, self.pos, self.ctx)
    }

    /// Absolute seek. Seeking past the limit is an error; seeking *to* the
    /// limit is allowed (cursor exhausted).
    pub fn seek(&mut self, pos: usize) -> DecodeResult<()> {
        if pos > self.limit {
            return Err(self.error(DecodeErrorKind::Truncated {
                wanted: pos - self.pos,
                remaining: self.remaining(),
            }));
        }
        self.pos = pos;
        Ok(())
    }

    /// Advance to the next 4-byte boundary.
    pub fn align4(&mut self) -> DecodeResult<()> {
        let aligned = (self.pos + 3) & !3;
        if aligned > self.limit {
            return Err(self.error(DecodeErrorKind::Truncated {
                wanted: aligned - self.pos,
                remaining: self.remaining(),
            }));
        }
        self.pos = aligned;
        Ok(())
    }

    /// Borrow the next `n` bytes and advance past them.
    pub fn read_bytes(&mut self, n: usize) -> DecodeResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(self.error(DecodeErrorKind::Truncated {
                wanted: n,
                remaining: self.remaining(),
            }));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_i8(&mut self) -> DecodeResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> DecodeResult<u16> {
        let b: [u8; 2] = self.read_bytes(2)?.try_into().unwrap_or([0; 2]);
        Ok(match self.ctx.endian {
            Endian::Little => u16::from_le_bytes(b),
            Endian::Big => u16::from_be_bytes(b),
        })
    }

    pub fn read_i16(&mut self) -> DecodeResult<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> DecodeResult<u32> {
        let b: [u8; 4] = self.read_bytes(4)?.try_into().unwrap_or([0; 4]);
        Ok(match self.ctx.endian {
            Endian::Little => u32::from_le_bytes(b),
            Endian::Big => u32::from_be_bytes(b),
        })
    }

    pub fn read_i32(&mut self) -> DecodeResult<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_u64(&mut self) -> DecodeResult<u64> {
        let b: [u8; 8] = self.read_bytes(8)?.try_into().unwrap_or([0; 8]);
        Ok(match self.ctx.endian {
            Endian::Little => u64::from_le_bytes(b),
            Endian::Big => u64::from_be_bytes(b),
        })
    }

    pub fn read_f32(&mut self) -> DecodeResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Read a binary16 value, widened to f32.
    pub fn read_f16(&mut self) -> DecodeResult<f32> {
        Ok(f16::from_bits(self.read_u16()?).to_f32())
    }

    /// Read a declared element count and validate it against the sanity
    /// ceiling before the caller allocates anything.
    pub fn read_count(&mut self) -> DecodeResult<usize> {
        let at = self.pos;
        let count = self.read_u32()?;
        check_count(u64::from(count), self.structure, at, self.ctx)?;
        Ok(count as usize)
    }

    /// Read a length-prefixed string (u32 length + raw bytes, no NUL).
    pub fn read_string(&mut self) -> DecodeResult<String> {
        let len = self.read_count()?;
        let bytes = self.read_bytes(len)?;
        Ok(bytes.iter().map(|&b| b as char).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn le_cursor(data: &[u8]) -> ByteCursor<'_> {
        ByteCursor::new(data, VersionContext::mainline(300))
    }

    #[test]
    fn test_scalar_reads_little_endian() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x00, 0x00, 0x80, 0x3F];
        let mut cur = le_cursor(&data);
        assert_eq!(cur.read_u16().unwrap(), 0x0201);
        assert_eq!(cur.read_u16().unwrap(), 0x0403);
        assert_eq!(cur.read_f32().unwrap(), 1.0);
        assert_eq!(cur.remaining(), 0);
    }

    #[test]
    fn test_big_endian() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let ctx = VersionContext::mainline(300).big_endian();
        let mut cur = ByteCursor::new(&data, ctx);
        assert_eq!(cur.read_u32().unwrap(), 0x0102_0304);
    }

    #[test]
    fn test_truncated_read() {
        let mut cur = le_cursor(&[0xAA]);
        cur.enter("Header");
        let err = cur.read_u32().unwrap_err();
        assert_eq!(
            err.kind,
            DecodeErrorKind::Truncated {
                wanted: 4,
                remaining: 1
            }
        );
        assert_eq!(err.structure, "Header");
        // position unchanged after a failed read
        assert_eq!(cur.tell(), 0);
    }

    #[test]
    fn test_seek_and_tell() {
        let data = [0u8; 16];
        let mut cur = le_cursor(&data);
        cur.seek(8).unwrap();
        assert_eq!(cur.tell(), 8);
        assert_eq!(cur.remaining(), 8);
        assert!(cur.seek(17).is_err());
    }

    #[test]
    fn test_align4() {
        let data = [0u8; 8];
        let mut cur = le_cursor(&data);
        cur.read_u8().unwrap();
        cur.align4().unwrap();
        assert_eq!(cur.tell(), 4);
        cur.align4().unwrap();
        assert_eq!(cur.tell(), 4);
    }

    #[test]
    fn test_read_f16() {
        // 0x3C00 is 1.0 in binary16
        let data = [0x00, 0x3C];
        let mut cur = le_cursor(&data);
        assert_eq!(cur.read_f16().unwrap(), 1.0);
    }

    #[test]
    fn test_read_string() {
        let data = [0x03, 0x00, 0x00, 0x00, b'a', b'b', b'c'];
        let mut cur = le_cursor(&data);
        assert_eq!(cur.read_string().unwrap(), "abc");
    }

    #[test]
    fn test_read_count_ceiling() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF];
        let mut cur = le_cursor(&data);
        let err = cur.read_count().unwrap_err();
        assert!(matches!(
            err.kind,
            DecodeErrorKind::SizeLimitExceeded { .. }
        ));
    }
}
