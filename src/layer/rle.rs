// SPDX-License-Identifier: GPL-3.0-or-later

// Layer images are stored as one byte per run, rows concatenated without
// any row markers.

use bitflags::bitflags;

use crate::consts::rle::MAX_RUN_LENGTH;
use super::bitmap::{Bitmap, Row};

bitflags! {
    pub struct RunByte: u8 {
        const LIT    = 1 << 7;
        const LENGTH = 0x7F;
    }
}

impl RunByte {
    pub fn new(lit: bool, length: u8) -> Self {
        let mut byte = Self::from_bits_truncate(length) & Self::LENGTH;
        if lit {
            byte |= Self::LIT;
        }
        byte
    }

    pub fn is_lit(self) -> bool {
        self.contains(Self::LIT)
    }

    pub fn length(self) -> u8 {
        (self & Self::LENGTH).bits()
    }
}

#[derive(Debug)]
pub struct Decoded {
    pub bitmap: Bitmap,
    /// Sum of all lit run lengths that were read, including the part of the
    /// run that hit the row limit.
    pub lit_pixels: u64,
    /// Payload bytes were left over when the row limit was reached.
    pub truncated: bool,
}

/// Decodes a layer payload into at most `height` rows of `width` columns.
pub fn decode(payload: &[u8], width: usize, height: usize) -> Decoded {
    let mut rows: Vec<Row> = Vec::new();
    let mut lit_pixels = 0u64;
    let mut truncated = false;

    if width == 0 || height == 0 {
        return Decoded { bitmap: Bitmap::from_rows(width, rows), lit_pixels, truncated: !payload.is_empty() };
    }

    let last_col = width as i64 - 1;
    let mut x: i64 = 0;
    rows.push(Row::new(width));

    for (i, byte) in payload.iter().enumerate() {
        let run = RunByte::from_bits_truncate(*byte);
        let lit = run.is_lit();
        let length = run.length() as i64;

        if lit {
            lit_pixels += length as u64;
        }

        // A zero length run gives end < x, which sets nothing and leaves x alone.
        let end = x + length - 1;
        let mut line_end = end.min(last_col);
        if lit && line_end >= x {
            current_row(&mut rows).set_range(x as usize, line_end as usize);
        }

        if end > last_col {
            // The run spills over the next row.
            if rows.len() == height {
                truncated = true;
                break;
            }
            rows.push(Row::new(width));
            line_end = end - width as i64;
            if lit {
                current_row(&mut rows).set_range(0, line_end as usize);
            }
        }

        x = line_end + 1;
        if x > last_col {
            if rows.len() == height {
                // Anything past the last row is garbage.
                truncated = i + 1 < payload.len();
                break;
            }
            rows.push(Row::new(width));
            x = 0;
        }
    }

    Decoded { bitmap: Bitmap::from_rows(width, rows), lit_pixels, truncated }
}

fn current_row(rows: &mut [Row]) -> &mut Row {
    let last = rows.len() - 1;
    &mut rows[last]
}

/// Accumulates pixels in raster order and emits run bytes.
///
/// Runs are capped to the image width so that a single run never spans more
/// than two rows when decoded.
pub struct RunEncoder {
    out: Vec<u8>,
    max_run: u32,
    lit: bool,
    length: u32,
}

impl RunEncoder {
    pub fn new(width: usize) -> Self {
        let max_run = (width.min(MAX_RUN_LENGTH as usize) as u32).max(1);
        Self { out: Vec::new(), max_run, lit: false, length: 0 }
    }

    pub fn push(&mut self, lit: bool, mut count: usize) {
        if count == 0 {
            return;
        }
        if lit != self.lit {
            self.flush();
            self.lit = lit;
        }
        while count > 0 {
            let take = ((self.max_run - self.length) as usize).min(count);
            self.length += take as u32;
            count -= take;
            if self.length == self.max_run {
                self.flush();
            }
        }
    }

    fn flush(&mut self) {
        if self.length > 0 {
            self.out.push(RunByte::new(self.lit, self.length as u8).bits());
            self.length = 0;
        }
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.flush();
        self.out
    }
}

/// Encodes `height` rows of the bitmap. Missing rows are encoded as unlit.
pub fn encode(bitmap: &Bitmap, height: usize) -> Vec<u8> {
    let width = bitmap.width();
    let mut encoder = RunEncoder::new(width);
    for y in 0..height {
        let row = match bitmap.row(y) {
            Some(row) => row,
            None => {
                encoder.push(false, width);
                continue;
            }
        };

        let mut x = 0;
        while x < width {
            let start = match row.next_set_bit(x) {
                Some(start) => start,
                None => {
                    encoder.push(false, width - x);
                    break;
                }
            };
            encoder.push(false, start - x);
            let mut end = start;
            while end < width && row.get(end) {
                end += 1;
            }
            encoder.push(true, end - start);
            x = end;
        }
    }
    encoder.finish()
}
