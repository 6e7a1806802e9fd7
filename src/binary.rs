// SPDX-License-Identifier: MIT
//! Bounds-checked little-endian reader over a byte slice
//!
//! All ISOXML companion files (TimeLog, Grid, Point streams) are plain
//! little-endian records without framing, so decoders only need a position
//! and typed reads that fail instead of panicking at the end of input.

/// Read past the end of the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Underrun;

#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move to `pos`, clamped to the end of the input
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn has_remaining(&self) -> bool {
        self.pos < self.data.len()
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], Underrun> {
        let bytes = self.peek_at::<N>(self.pos)?;
        self.pos += N;
        Ok(bytes)
    }

    fn peek_at<const N: usize>(&self, index: usize) -> Result<[u8; N], Underrun> {
        let end = index.checked_add(N).ok_or(Underrun)?;
        let slice = self.data.get(index..end).ok_or(Underrun)?;
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(slice);
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, Underrun> {
        Ok(self.take::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, Underrun> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, Underrun> {
        Ok(i16::from_le_bytes(self.take()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, Underrun> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, Underrun> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    /// Absolute read that leaves the position untouched
    pub fn u16_at(&self, index: usize) -> Result<u16, Underrun> {
        Ok(u16::from_le_bytes(self.peek_at(index)?))
    }

    /// Absolute read that leaves the position untouched
    pub fn i32_at(&self, index: usize) -> Result<i32, Underrun> {
        Ok(i32::from_le_bytes(self.peek_at(index)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_reads() {
        let mut data = vec![7u8];
        data.extend_from_slice(&0x1234u16.to_le_bytes());
        data.extend_from_slice(&(-5i32).to_le_bytes());
        data.extend_from_slice(&(-300i16).to_le_bytes());

        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_u8(), Ok(7));
        assert_eq!(reader.read_u16(), Ok(0x1234));
        assert_eq!(reader.read_i32(), Ok(-5));
        assert_eq!(reader.read_i16(), Ok(-300));
        assert!(!reader.has_remaining());
        assert_eq!(reader.read_u8(), Err(Underrun));
    }

    #[test]
    fn test_underrun_keeps_position() {
        let data = [1u8, 2, 3];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_u8(), Ok(1));
        assert_eq!(reader.read_u32(), Err(Underrun));
        assert_eq!(reader.position(), 1);
        assert_eq!(reader.remaining(), 2);
    }

    #[test]
    fn test_absolute_reads() {
        let data = [0u8, 0xE8, 0x03, 0x00, 0x00, 0x98, 0x3A];
        let reader = ByteReader::new(&data);
        assert_eq!(reader.i32_at(1), Ok(1000));
        assert_eq!(reader.u16_at(5), Ok(15000));
        assert_eq!(reader.u16_at(6), Err(Underrun));
        assert_eq!(reader.i32_at(usize::MAX), Err(Underrun));
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_set_position_clamps() {
        let data = [0u8; 4];
        let mut reader = ByteReader::new(&data);
        reader.set_position(10);
        assert_eq!(reader.position(), 4);
        assert_eq!(reader.remaining(), 0);
    }
}
