// SPDX-License-Identifier: GPL-3.0-or-later

use rayon::prelude::*;

use super::bitmap::Bitmap;
use super::grid::{ClassificationGrid, IslandRows};

/// What the layer below looks like, once resolved.
pub struct Previous<'a, G> {
    pub bitmap: &'a Bitmap,
    pub grid: &'a G,
}

pub struct Classification<G> {
    pub grid: G,
    pub islands: IslandRows,
    pub island_count: usize,
}

/// Classifies every lit pixel of `current` against the layer below.
///
/// Without a layer below, everything rests on the build plate. Otherwise a
/// pixel is supported when the same pixel below is lit and resolved as
/// supported or connected; it is an island otherwise, until the grid's
/// `reduce()` connects the islands that touch something solid.
pub fn classify<G>(
    current: &Bitmap,
    previous: Option<Previous<'_, G>>,
    width: usize,
    height: usize,
) -> Classification<G>
where
    G: ClassificationGrid + Sync,
{
    // Rows don't depend on each other until the reduce step.
    let marks: Vec<Vec<(usize, bool)>> = current.rows()
        .par_iter()
        .enumerate()
        .take(height)
        .map(|(y, row)| {
            row.iter().map(|x| {
                let supported = match &previous {
                    None => true,
                    Some(below) => below.bitmap.get(x, y) && below.grid.get(x, y).is_solid(),
                };
                (x, supported)
            }).collect()
        })
        .collect();

    let mut grid = G::new(width, height);
    for (y, row) in marks.into_iter().enumerate() {
        for (x, supported) in row {
            if supported {
                grid.supported(x, y);
            } else {
                grid.island(x, y);
            }
        }
    }

    grid.reduce();

    let (islands, island_count) = grid.islands();
    Classification { grid, islands, island_count }
}

/// Marks where the lit pixels are, without any notion of support.
pub fn locate_pixels<G: ClassificationGrid>(current: &Bitmap, width: usize, height: usize) -> G {
    let mut grid = G::new(width, height);
    for (y, row) in current.rows().iter().enumerate().take(height) {
        for x in row.iter() {
            grid.supported(x, y);
        }
    }
    grid
}
