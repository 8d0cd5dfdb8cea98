// SPDX-License-Identifier: GPL-3.0-or-later

use bytemuck::Pod;

pub trait ReadPartial {
    type Error;
    /// Not all requested bytes may be read. Returns the number of bytes read,
    /// 0 meaning the end of the stream.
    fn read_partial(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

pub trait Read {
    type Error;
    /// All bytes will be read. Otherwise, it errors.
    fn read(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Reads a plain-old-data record, laid out as it is in the file
    /// (little-endian, packed).
    fn read_obj<O: Pod>(&mut self) -> Result<O, Self::Error> {
        let mut obj = O::zeroed();
        self.read(bytemuck::bytes_of_mut(&mut obj))?;
        Ok(obj)
    }
}

pub trait Write {
    type Error;
    /// The entirety of the buffer will be written, otherwise an error is returned.
    fn write(&mut self, buf: &[u8]) -> Result<(), Self::Error>;

    fn write_obj<O: Pod>(&mut self, obj: &O) -> Result<(), Self::Error> {
        self.write(bytemuck::bytes_of(obj))
    }

    fn write_u8(&mut self, v: u8) -> Result<(), Self::Error> {
        self.write(&[v])
    }
}

pub trait Seek {
    fn seek_from_start(&mut self, pos: u32);
}
