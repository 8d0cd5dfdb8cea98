// SPDX-License-Identifier: GPL-3.0-or-later

pub mod bitmap;
pub mod classify;
pub mod grid;
pub mod margin;
pub mod rle;

mod record;
pub use record::*;
