// SPDX-License-Identifier: GPL-3.0-or-later

// The .photon layout is the one Chitubox uses for CTB v1, only the magic differs.
// Everything is little-endian and packed.

use bytemuck::{Pod, Zeroable};

use crate::consts::photon::MAGIC;
use crate::error::{ensure, LayerError, LayerResult};
use crate::util::io::{Read, Seek};

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Header {
    pub magic: u32, // 0x12FD0019
    pub version: u32,
    pub bed_size_x: f32,
    pub bed_size_y: f32,
    pub bed_size_z: f32,
    pub unknown1: u32,
    pub unknown2: u32,
    pub height_mm: f32,
    pub layer_height_mm: f32,
    pub normal_exposure_duration_sec: f32,
    pub bottom_exposure_duration_sec: f32,
    pub light_off_delay_duration_sec: f32,
    pub num_bottom_layers: u32,
    pub resolution_x: u32,
    pub resolution_y: u32,
    pub large_preview_offset: u32,
    pub layers_offset: u32,
    pub num_layers: u32,
    pub small_preview_offset: u32,
}

const _: () = assert!(core::mem::size_of::<Header>() == 76);

impl Header {
    pub fn read<R: Read<Error = LayerError> + Seek>(reader: &mut R) -> LayerResult<Self> {
        reader.seek_from_start(0);
        let header = reader.read_obj::<Header>()?;
        header.check_magic()?;
        Ok(header)
    }

    pub fn check_magic(&self) -> LayerResult<()> {
        let magic = self.magic;
        ensure!(magic == MAGIC, LayerError::Format(format!("bad magic: {:#010x}", magic)));
        Ok(())
    }
}

/// One entry of the layer definition table.
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct LayerDef {
    pub position_z_mm: f32,
    pub exposure_time_sec: f32,
    pub light_off_sec: f32,
    pub data_address: u32,
    pub data_size: u32,
    pub unknown1: u32,
    pub unknown2: u32,
    pub unknown3: u32,
    pub unknown4: u32,
}

const _: () = assert!(core::mem::size_of::<LayerDef>() == 36);

/// What a layer needs to know about the file it lives in.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StackContext {
    pub resolution_x: u32,
    pub resolution_y: u32,
    pub layer_count: u32,
    pub layers_offset: u32,
}

impl StackContext {
    pub fn new(resolution_x: u32, resolution_y: u32, layer_count: u32, layers_offset: u32) -> Self {
        Self { resolution_x, resolution_y, layer_count, layers_offset }
    }

    pub fn width(&self) -> usize {
        self.resolution_x as usize
    }

    pub fn height(&self) -> usize {
        self.resolution_y as usize
    }
}

impl From<&Header> for StackContext {
    fn from(header: &Header) -> Self {
        Self::new(header.resolution_x, header.resolution_y, header.num_layers, header.layers_offset)
    }
}
