// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::{BTreeMap, VecDeque};

use crate::consts::grid::{MAX_PACKED_RUN, STATE_SHIFT};
use crate::error::{ensure, LayerError, LayerResult};
use super::rle::RunEncoder;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum PixelState {
    #[default]
    Off = 0,
    Supported = 1,
    Connected = 2,
    Island = 3,
}

impl PixelState {
    fn from_bits(v: u16) -> Self {
        match v & 0b11 {
            0 => PixelState::Off,
            1 => PixelState::Supported,
            2 => PixelState::Connected,
            _ => PixelState::Island,
        }
    }

    pub fn is_lit(self) -> bool {
        self != PixelState::Off
    }

    /// Something above this pixel can rest on it.
    pub fn is_solid(self) -> bool {
        matches!(self, PixelState::Supported | PixelState::Connected)
    }
}

/// Island pixels of a layer: row index to the ascending list of columns.
pub type IslandRows = BTreeMap<u32, Vec<u32>>;

/// The per-pixel classification of one layer.
pub trait ClassificationGrid {
    fn new(width: usize, height: usize) -> Self where Self: Sized;
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    /// Out of bounds pixels are `Off`.
    fn get(&self, x: usize, y: usize) -> PixelState;
    fn supported(&mut self, x: usize, y: usize);
    fn island(&mut self, x: usize, y: usize);
    /// Promotes islands touching supported or connected pixels to connected.
    fn reduce(&mut self);
    /// Returns the island pixels and how many there are.
    fn islands(&self) -> (IslandRows, usize);
    fn pack(&self) -> Vec<u8>;
    fn unpack(&mut self, packed: &[u8]) -> LayerResult<()>;
    /// Run-length encodes the lit pixels in the layer payload format.
    fn pack_image_data(&self) -> Vec<u8>;
}

/// A horizontal run of pixels sharing the same state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Span {
    pub x: u32,
    pub length: u32,
    pub state: PixelState,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelGrid {
    width: usize,
    height: usize,
    rows: Vec<Vec<PixelState>>,
}

impl PixelGrid {
    pub fn set(&mut self, x: usize, y: usize, state: PixelState) {
        if let Some(p) = self.rows.get_mut(y).and_then(|row| row.get_mut(x)) {
            *p = state;
        }
    }

    pub fn row(&self, y: usize) -> &[PixelState] {
        &self.rows[y]
    }

    fn neighbors(&self, x: usize, y: usize) -> impl Iterator<Item = (usize, usize)> {
        let (w, h) = (self.width, self.height);
        [
            (x > 0).then(|| (x - 1, y)),
            (x + 1 < w).then(|| (x + 1, y)),
            (y > 0).then(|| (x, y - 1)),
            (y + 1 < h).then(|| (x, y + 1)),
        ].into_iter().flatten()
    }

    /// Runs of equal state for each row, the runs of `Off` pixels left out.
    pub fn spans(&self) -> Vec<Vec<Span>> {
        self.rows.iter().map(|row| {
            row_runs(row)
                .filter(|span| span.state.is_lit())
                .collect()
        }).collect()
    }
}

fn row_runs(row: &[PixelState]) -> impl Iterator<Item = Span> + '_ {
    let mut x = 0;
    core::iter::from_fn(move || {
        let state = *row.get(x)?;
        let length = row[x..].iter().take_while(|s| **s == state).count();
        let span = Span { x: x as u32, length: length as u32, state };
        x += length;
        Some(span)
    })
}

impl ClassificationGrid for PixelGrid {
    fn new(width: usize, height: usize) -> Self {
        Self { width, height, rows: vec![vec![PixelState::Off; width]; height] }
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn get(&self, x: usize, y: usize) -> PixelState {
        self.rows.get(y).and_then(|row| row.get(x)).copied().unwrap_or_default()
    }

    fn supported(&mut self, x: usize, y: usize) {
        self.set(x, y, PixelState::Supported);
    }

    fn island(&mut self, x: usize, y: usize) {
        self.set(x, y, PixelState::Island);
    }

    fn reduce(&mut self) {
        let mut queue = VecDeque::new();

        for y in 0..self.height {
            for x in 0..self.width {
                if self.rows[y][x] == PixelState::Island
                    && self.neighbors(x, y).any(|(nx, ny)| self.rows[ny][nx].is_solid())
                {
                    self.rows[y][x] = PixelState::Connected;
                    queue.push_back((x, y));
                }
            }
        }

        // Islands touching what just got connected are connected as well.
        while let Some((x, y)) = queue.pop_front() {
            let next: Vec<_> = self.neighbors(x, y)
                .filter(|&(nx, ny)| self.rows[ny][nx] == PixelState::Island)
                .collect();
            for (nx, ny) in next {
                self.rows[ny][nx] = PixelState::Connected;
                queue.push_back((nx, ny));
            }
        }
    }

    fn islands(&self) -> (IslandRows, usize) {
        let mut islands = IslandRows::new();
        let mut count = 0;
        for (y, row) in self.rows.iter().enumerate() {
            let columns: Vec<u32> = row.iter().enumerate()
                .filter(|(_, s)| **s == PixelState::Island)
                .map(|(x, _)| x as u32)
                .collect();
            if !columns.is_empty() {
                count += columns.len();
                islands.insert(y as u32, columns);
            }
        }
        (islands, count)
    }

    fn pack(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for row in &self.rows {
            for span in row_runs(row) {
                let mut remaining = span.length;
                while remaining > 0 {
                    let length = remaining.min(MAX_PACKED_RUN);
                    let v = ((span.state as u16) << STATE_SHIFT) | length as u16;
                    out.extend_from_slice(&v.to_le_bytes());
                    remaining -= length;
                }
            }
        }
        out
    }

    fn unpack(&mut self, packed: &[u8]) -> LayerResult<()> {
        ensure!(packed.len() % 2 == 0,
            LayerError::Format(format!("packed classification has an odd length: {}", packed.len())));

        let mut runs = packed.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]]));
        for y in 0..self.height {
            let mut x = 0;
            while x < self.width {
                let v = runs.next().ok_or_else(|| LayerError::Format(
                    format!("packed classification ends at row {} column {}", y, x)))?;
                let state = PixelState::from_bits(v >> STATE_SHIFT);
                let length = (v as u32 & MAX_PACKED_RUN) as usize;
                ensure!(length > 0 && x + length <= self.width, LayerError::Format(
                    format!("packed classification run of {} at row {} column {} overflows the row", length, y, x)));
                self.rows[y][x..x + length].fill(state);
                x += length;
            }
        }
        ensure!(runs.next().is_none(),
            LayerError::Format("packed classification has trailing data".into()));
        Ok(())
    }

    fn pack_image_data(&self) -> Vec<u8> {
        let mut encoder = RunEncoder::new(self.width);
        for row in &self.rows {
            for span in row_runs(row) {
                encoder.push(span.state.is_lit(), span.length as usize);
            }
        }
        encoder.finish()
    }
}
