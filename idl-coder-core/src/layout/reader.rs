use crate::error::DecodeError;

/// Deepest nesting of containers and named types a decode may enter.
pub const MAX_RECURSION_DEPTH: usize = 128;

/// Bounds-checked cursor over an input buffer.
#[derive(Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
    depth: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            depth: 0,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::UnexpectedEof {
                offset: self.offset,
                needed: n,
                remaining: self.remaining(),
            });
        }
        let out = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(out)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.array::<4>()?))
    }

    /// Read a u32 length prefix and check that `len * min_item_size` bytes
    /// can still follow, so a corrupt prefix fails before allocating.
    pub fn read_len(&mut self, min_item_size: usize) -> Result<usize, DecodeError> {
        let offset = self.offset;
        let len = self.read_u32()? as usize;
        let needed = len.saturating_mul(min_item_size);
        if needed > self.remaining() {
            return Err(DecodeError::LengthOverflow {
                offset,
                len,
                remaining: self.remaining(),
            });
        }
        Ok(len)
    }

    /// Enter one nesting level. Paired with [`Reader::leave`].
    pub fn enter(&mut self) -> Result<(), DecodeError> {
        if self.depth >= MAX_RECURSION_DEPTH {
            return Err(DecodeError::RecursionLimit {
                offset: self.offset,
                limit: MAX_RECURSION_DEPTH,
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}
