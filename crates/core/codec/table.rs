//! Read-only view over FlatBuffers tables.
//!
//! A [`Table`] borrows the encoded bytes and resolves fields through the
//! table's vtable. Nothing is copied until a caller asks for an owned value.

use crate::error::{FgbError, Result};

#[inline]
fn slice(buf: &[u8], pos: usize, len: usize) -> Result<&[u8]> {
    pos.checked_add(len)
        .and_then(|end| buf.get(pos..end))
        .ok_or_else(|| FgbError::truncated(pos, len, buf.len().saturating_sub(pos)))
}

pub(crate) fn read_u8(buf: &[u8], pos: usize) -> Result<u8> {
    Ok(slice(buf, pos, 1)?[0])
}

pub(crate) fn read_u16(buf: &[u8], pos: usize) -> Result<u16> {
    let b = slice(buf, pos, 2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

pub(crate) fn read_u32(buf: &[u8], pos: usize) -> Result<u32> {
    let b = slice(buf, pos, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub(crate) fn read_i32(buf: &[u8], pos: usize) -> Result<i32> {
    Ok(read_u32(buf, pos)? as i32)
}

/// 64-bit values are assembled from two 32-bit halves.
pub(crate) fn read_u64(buf: &[u8], pos: usize) -> Result<u64> {
    let lo = read_u32(buf, pos)?;
    let hi = read_u32(buf, pos + 4)?;
    Ok((u64::from(hi) << 32) | u64::from(lo))
}

pub(crate) fn read_f64(buf: &[u8], pos: usize) -> Result<f64> {
    Ok(f64::from_bits(read_u64(buf, pos)?))
}

/// Follow a forward offset stored at `pos`, relative to `pos` itself.
fn indirect(buf: &[u8], pos: usize) -> Result<usize> {
    let rel = read_u32(buf, pos)? as usize;
    pos.checked_add(rel)
        .filter(|target| *target < buf.len())
        .ok_or_else(|| FgbError::truncated(pos, rel, buf.len().saturating_sub(pos)))
}

/// A table inside an encoded buffer.
#[derive(Clone, Copy)]
pub struct Table<'a> {
    buf: &'a [u8],
    pos: usize,
    vtable: usize,
    vtable_len: u16,
}

impl<'a> Table<'a> {
    /// Open the root table of a buffer whose first four bytes hold the
    /// offset to it.
    pub fn root(buf: &'a [u8]) -> Result<Self> {
        let pos = indirect(buf, 0)?;
        Self::at(buf, pos)
    }

    pub fn at(buf: &'a [u8], pos: usize) -> Result<Self> {
        let soffset = read_i32(buf, pos)?;
        let vtable = (pos as i64) - i64::from(soffset);
        if vtable < 0 || vtable as usize >= buf.len() {
            return Err(FgbError::truncated(pos, 4, buf.len().saturating_sub(pos)));
        }
        let vtable = vtable as usize;
        let vtable_len = read_u16(buf, vtable)?;
        if vtable_len < 4 {
            return Err(FgbError::truncated(vtable, 4, usize::from(vtable_len)));
        }
        slice(buf, vtable, usize::from(vtable_len))?;
        Ok(Self {
            buf,
            pos,
            vtable,
            vtable_len,
        })
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    /// Absolute position of field `slot`, or `None` when it is absent.
    fn field(&self, slot: u16) -> Result<Option<usize>> {
        let entry = 4 + 2 * usize::from(slot);
        if entry >= usize::from(self.vtable_len) {
            return Ok(None);
        }
        let offset = read_u16(self.buf, self.vtable + entry)?;
        if offset == 0 {
            return Ok(None);
        }
        Ok(Some(self.pos + usize::from(offset)))
    }

    pub fn has(&self, slot: u16) -> Result<bool> {
        Ok(self.field(slot)?.is_some())
    }

    pub fn get_u8(&self, slot: u16, default: u8) -> Result<u8> {
        match self.field(slot)? {
            Some(pos) => read_u8(self.buf, pos),
            None => Ok(default),
        }
    }

    pub fn get_bool(&self, slot: u16, default: bool) -> Result<bool> {
        Ok(self.get_u8(slot, u8::from(default))? != 0)
    }

    pub fn get_u16(&self, slot: u16, default: u16) -> Result<u16> {
        match self.field(slot)? {
            Some(pos) => read_u16(self.buf, pos),
            None => Ok(default),
        }
    }

    pub fn get_i32(&self, slot: u16, default: i32) -> Result<i32> {
        match self.field(slot)? {
            Some(pos) => read_i32(self.buf, pos),
            None => Ok(default),
        }
    }

    pub fn get_u64(&self, slot: u16, default: u64) -> Result<u64> {
        match self.field(slot)? {
            Some(pos) => read_u64(self.buf, pos),
            None => Ok(default),
        }
    }

    /// Resolve a vector field to `(first element position, element count)`.
    fn vector(&self, slot: u16, elem_size: usize) -> Result<Option<(usize, usize)>> {
        let Some(pos) = self.field(slot)? else {
            return Ok(None);
        };
        let start = indirect(self.buf, pos)?;
        let count = read_u32(self.buf, start)? as usize;
        let data = start + 4;
        let len = count
            .checked_mul(elem_size)
            .ok_or_else(|| FgbError::truncated(data, usize::MAX, self.buf.len().saturating_sub(data)))?;
        slice(self.buf, data, len)?;
        Ok(Some((data, count)))
    }

    pub fn get_bytes(&self, slot: u16) -> Result<Option<&'a [u8]>> {
        match self.vector(slot, 1)? {
            Some((data, count)) => Ok(Some(slice(self.buf, data, count)?)),
            None => Ok(None),
        }
    }

    /// A UTF-8 string field. `what` names the field in error messages.
    pub fn get_str(&self, slot: u16, what: &'static str) -> Result<Option<&'a str>> {
        match self.get_bytes(slot)? {
            Some(bytes) => std::str::from_utf8(bytes)
                .map(Some)
                .map_err(|_| FgbError::InvalidUtf8(what)),
            None => Ok(None),
        }
    }

    pub fn get_string(&self, slot: u16, what: &'static str) -> Result<Option<String>> {
        Ok(self.get_str(slot, what)?.map(str::to_string))
    }

    pub fn get_f64_vec(&self, slot: u16) -> Result<Option<Vec<f64>>> {
        let Some((data, count)) = self.vector(slot, 8)? else {
            return Ok(None);
        };
        (0..count)
            .map(|i| read_f64(self.buf, data + i * 8))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    pub fn get_u32_vec(&self, slot: u16) -> Result<Option<Vec<u32>>> {
        let Some((data, count)) = self.vector(slot, 4)? else {
            return Ok(None);
        };
        (0..count)
            .map(|i| read_u32(self.buf, data + i * 4))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    pub fn get_u64_vec(&self, slot: u16) -> Result<Option<Vec<u64>>> {
        let Some((data, count)) = self.vector(slot, 8)? else {
            return Ok(None);
        };
        (0..count)
            .map(|i| read_u64(self.buf, data + i * 8))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    pub fn get_table(&self, slot: u16) -> Result<Option<Table<'a>>> {
        match self.field(slot)? {
            Some(pos) => Ok(Some(Table::at(self.buf, indirect(self.buf, pos)?)?)),
            None => Ok(None),
        }
    }

    pub fn get_tables(&self, slot: u16) -> Result<Option<Vec<Table<'a>>>> {
        let Some((data, count)) = self.vector(slot, 4)? else {
            return Ok(None);
        };
        (0..count)
            .map(|i| Table::at(self.buf, indirect(self.buf, data + i * 4)?))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }
}
