// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::LayerError;

use super::{Read, ReadPartial, Seek, Write};

/// Reads from a file that was loaded in memory in its entirety.
pub struct SliceReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }
}

impl<'a> ReadPartial for SliceReader<'a> {
    type Error = LayerError;

    fn read_partial(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let to_read = self.remaining().min(buf.len());
        if to_read == 0 {
            return Ok(0);
        }
        buf[..to_read].copy_from_slice(&self.data[self.pos..self.pos + to_read]);
        self.pos += to_read;
        Ok(to_read)
    }
}

impl<'a> Read for SliceReader<'a> {
    type Error = LayerError;

    fn read(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        let start = self.pos;
        let mut buf: &mut [u8] = buf;
        while !buf.is_empty() {
            let n = self.read_partial(buf)?;
            if n == 0 {
                return Err(LayerError::Format(format!(
                    "unexpected end of stream at offset {} (needed {} more bytes from offset {})",
                    self.pos, buf.len(), start,
                )));
            }
            let rest = buf;
            buf = &mut rest[n..];
        }
        Ok(())
    }
}

impl<'a> Seek for SliceReader<'a> {
    fn seek_from_start(&mut self, pos: u32) {
        // Seeking past the end is allowed, reads will fail.
        self.pos = pos as usize;
    }
}

impl Write for Vec<u8> {
    type Error = LayerError;

    fn write(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        self.extend_from_slice(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};

    #[repr(C, packed)]
    #[derive(Copy, Clone, Debug, Pod, Zeroable)]
    struct Pair {
        a: u32,
        b: f32,
    }

    #[test]
    fn test_read_obj_little_endian() {
        let mut data = vec![];
        data.extend_from_slice(&7u32.to_le_bytes());
        data.extend_from_slice(&1.5f32.to_le_bytes());
        let mut reader = SliceReader::new(&data);
        let pair = reader.read_obj::<Pair>().unwrap();
        assert_eq!({ pair.a }, 7);
        assert_eq!({ pair.b }, 1.5);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_truncated_read_is_a_format_error() {
        let data = [1u8, 2, 3];
        let mut reader = SliceReader::new(&data);
        let err = reader.read_obj::<Pair>().unwrap_err();
        assert!(matches!(err, LayerError::Format(_)));
    }

    #[test]
    fn test_seek_then_read() {
        let data = [0u8, 1, 2, 3, 4, 5];
        let mut reader = SliceReader::new(&data);
        reader.seek_from_start(4);
        let mut buf = [0u8; 2];
        reader.read(&mut buf).unwrap();
        assert_eq!(buf, [4, 5]);

        reader.seek_from_start(100);
        assert_eq!(reader.remaining(), 0);
        assert!(reader.read(&mut buf).is_err());
    }

    #[test]
    fn test_write_obj_to_vec() {
        let mut out: Vec<u8> = vec![];
        out.write_obj(&Pair { a: 1, b: 0.0 }).unwrap();
        out.write_u8(0).unwrap();
        assert_eq!(out, [1, 0, 0, 0, 0, 0, 0, 0, 0]);
    }
}
