// SPDX-License-Identifier: GPL-3.0-or-later

pub mod photon {
    pub const MAGIC: u32 = 0x12FD0019;
    // Each layer payload is followed by a single zero byte in the file.
    pub const PAYLOAD_TERMINATOR: u8 = 0x00;
}

pub mod rle {
    // bit 7 is the color, bits 6..0 the run length.
    pub const MAX_RUN_LENGTH: u32 = 0x7F;
}

pub mod grid {
    // Packed classification runs are u16: 2 bits of state, 14 bits of length.
    pub const STATE_SHIFT: u32 = 14;
    pub const MAX_PACKED_RUN: u32 = (1 << STATE_SHIFT) - 1;
}

pub mod analysis {
    // A margin of 0 disables the margin check.
    pub const DEFAULT_MARGIN: u32 = 0;
}
