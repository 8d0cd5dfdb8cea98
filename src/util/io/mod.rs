// SPDX-License-Identifier: GPL-3.0-or-later

mod traits;
pub use traits::*;

mod slice_io;
pub use slice_io::*;
