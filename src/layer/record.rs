// SPDX-License-Identifier: GPL-3.0-or-later

use std::sync::Arc;

use crate::consts::photon::PAYLOAD_TERMINATOR;
use crate::error::{ensure, LayerError, LayerResult};
use crate::file_formats::photon::{LayerDef, StackContext};
use crate::util::io::{Read, Write};
use super::bitmap::Bitmap;
use super::classify::Classification;
use super::grid::{ClassificationGrid, IslandRows, PixelGrid, PixelState, Span};
use super::rle;

/// Results of the last support analysis of a layer.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Analysis {
    packed: Vec<u8>,
    islands: IslandRows,
    island_count: usize,
}

impl Analysis {
    fn from_grid(grid: &PixelGrid) -> Self {
        let (islands, island_count) = grid.islands();
        Self { packed: grid.pack(), islands, island_count }
    }
}

#[derive(Debug)]
pub struct LayerRecord {
    def: LayerDef,
    payload: Option<Vec<u8>>,
    analysis: Option<Analysis>,
    lit_pixels: u64,
    extends_margin: bool,
    context: Option<Arc<StackContext>>,
}

impl LayerRecord {
    pub const SIZE: usize = core::mem::size_of::<LayerDef>();

    /// A layer holding `payload`. `data_size` is taken from the payload,
    /// `data_address` is assigned when the stack is saved.
    pub fn new(def: LayerDef, payload: Vec<u8>) -> Self {
        let mut def = def;
        def.data_size = payload.len() as u32;
        Self {
            def,
            payload: Some(payload),
            analysis: None,
            lit_pixels: 0,
            extends_margin: false,
            context: None,
        }
    }

    /// Reads the layer definition. The payload is loaded separately with
    /// `load_payload()`.
    pub fn read<R: Read<Error = LayerError>>(reader: &mut R, context: Arc<StackContext>) -> LayerResult<Self> {
        let def = reader.read_obj::<LayerDef>()?;
        Ok(Self {
            def,
            payload: None,
            analysis: None,
            lit_pixels: 0,
            extends_margin: false,
            context: Some(context),
        })
    }

    pub fn load_payload(&mut self, file: &[u8]) -> LayerResult<()> {
        let start = self.def.data_address as usize;
        let end = start + self.def.data_size as usize;
        ensure!(end <= file.len(), LayerError::Range { what: "layer payload", start, end, limit: file.len() });
        self.payload = Some(file[start..end].to_vec());
        Ok(())
    }

    /// Writes the layer definition with its payload placed at `cursor`.
    /// Returns where the next payload goes.
    pub fn write<W: Write<Error = LayerError>>(&mut self, writer: &mut W, cursor: u32) -> LayerResult<u32> {
        self.check_payload_size()?;
        let next = self.next_address(cursor)?;
        self.def.data_address = cursor;
        writer.write_obj(&self.def)?;
        Ok(next)
    }

    pub fn write_payload<W: Write<Error = LayerError>>(&self, writer: &mut W) -> LayerResult<()> {
        self.check_payload_size()?;
        writer.write(self.payload()?)?;
        writer.write_u8(PAYLOAD_TERMINATOR)
    }

    /// Where the payload following this one goes when this one is placed at
    /// `cursor`, past the terminator.
    pub fn next_address(&self, cursor: u32) -> LayerResult<u32> {
        let data_size = self.def.data_size;
        cursor.checked_add(data_size).and_then(|c| c.checked_add(1))
            .ok_or(LayerError::Range {
                what: "data address",
                start: cursor as usize,
                end: cursor as usize + data_size as usize + 1,
                limit: u32::MAX as usize,
            })
    }

    pub(crate) fn check_payload_size(&self) -> LayerResult<()> {
        let data_size = self.def.data_size as usize;
        let len = self.payload()?.len();
        ensure!(len == data_size, LayerError::Consistency(
            format!("layer payload is {} bytes but its data size says {}", len, data_size)));
        Ok(())
    }

    /// A copy of this layer with its image and analysis re-derived from the
    /// resolved classification, rather than copied byte for byte.
    pub fn try_clone(&self) -> LayerResult<Self> {
        let grid = self.grid()?;
        let mut clone = Self {
            def: self.def,
            payload: None,
            analysis: None,
            lit_pixels: self.lit_pixels,
            extends_margin: self.extends_margin,
            context: self.context.clone(),
        };
        clone.save_grid(&grid)?;
        Ok(clone)
    }

    pub fn context(&self) -> LayerResult<&StackContext> {
        self.context.as_deref().ok_or_else(|| LayerError::Consistency("layer is not attached to a file".into()))
    }

    pub(crate) fn set_context(&mut self, context: Arc<StackContext>) {
        self.context = Some(context);
    }

    pub fn payload(&self) -> LayerResult<&[u8]> {
        self.payload.as_deref().ok_or_else(|| LayerError::Consistency("layer data was released".into()))
    }

    /// Decodes the layer image, updating the lit pixel count along the way.
    pub fn unpack_image(&mut self) -> LayerResult<Bitmap> {
        let ctx = self.context()?;
        let (width, height) = (ctx.width(), ctx.height());
        let decoded = rle::decode(self.payload()?, width, height);
        if decoded.truncated {
            warn!("Layer at z={:.3}mm has more data than {} rows, ignoring the rest",
                self.position_z(), height);
        }
        self.lit_pixels = decoded.lit_pixels;
        Ok(decoded.bitmap)
    }

    /// The resolved classification of the layer.
    pub fn grid(&self) -> LayerResult<PixelGrid> {
        let ctx = self.context()?;
        let mut grid = PixelGrid::new(ctx.width(), ctx.height());
        self.update_grid(&mut grid)?;
        Ok(grid)
    }

    pub fn update_grid(&self, grid: &mut PixelGrid) -> LayerResult<()> {
        let analysis = self.analysis()?;
        grid.unpack(&analysis.packed)
    }

    /// Replaces the layer content with `grid`, typically after an edit.
    pub fn save_grid(&mut self, grid: &PixelGrid) -> LayerResult<()> {
        let ctx = self.context()?;
        ensure!(grid.width() == ctx.width() && grid.height() == ctx.height(), LayerError::Consistency(
            format!("grid is {}x{} but the layers are {}x{}", grid.width(), grid.height(), ctx.width(), ctx.height())));

        let payload = grid.pack_image_data();
        self.def.data_size = payload.len() as u32;
        self.payload = Some(payload);
        self.analysis = Some(Analysis::from_grid(grid));
        Ok(())
    }

    /// Re-extracts the islands from an edited grid without touching the image.
    pub fn update_islands(&mut self, grid: &PixelGrid) -> LayerResult<()> {
        let analysis = self.analysis.as_mut()
            .ok_or_else(|| LayerError::Consistency("layer has not been calculated".into()))?;
        let (islands, island_count) = grid.islands();
        analysis.islands = islands;
        analysis.island_count = island_count;
        Ok(())
    }

    /// Stores the result of a classification and hands the grid back.
    pub(crate) fn set_analysis(&mut self, classification: Classification<PixelGrid>) -> PixelGrid {
        let Classification { grid, islands, island_count } = classification;
        self.analysis = Some(Analysis { packed: grid.pack(), islands, island_count });
        grid
    }

    pub(crate) fn set_extends_margin(&mut self, extends_margin: bool) {
        self.extends_margin = extends_margin;
    }

    /// Runs of lit pixels per row. Before the layer is calculated, every lit
    /// pixel is reported as supported.
    pub fn rows(&self) -> LayerResult<Vec<Vec<Span>>> {
        if self.is_calculated() {
            return Ok(self.grid()?.spans());
        }

        let ctx = self.context()?;
        let bitmap = rle::decode(self.payload()?, ctx.width(), ctx.height()).bitmap;
        Ok(bitmap.rows().iter().map(|row| {
            let mut spans: Vec<Span> = Vec::new();
            for x in row.iter() {
                match spans.last_mut() {
                    Some(span) if (span.x + span.length) as usize == x => span.length += 1,
                    _ => spans.push(Span { x: x as u32, length: 1, state: PixelState::Supported }),
                }
            }
            spans
        }).collect())
    }

    fn analysis(&self) -> LayerResult<&Analysis> {
        self.analysis.as_ref().ok_or_else(|| LayerError::Consistency("layer has not been calculated".into()))
    }

    /// Drops the image data and analysis, keeping only the layer definition.
    pub fn unlink(&mut self) {
        self.payload = None;
        self.analysis = None;
        self.context = None;
    }

    pub fn is_calculated(&self) -> bool {
        self.analysis.is_some()
    }

    pub fn packed_classification(&self) -> Option<&[u8]> {
        self.analysis.as_ref().map(|a| a.packed.as_slice())
    }

    pub fn island_rows(&self) -> Option<&IslandRows> {
        self.analysis.as_ref().map(|a| &a.islands)
    }

    pub fn island_count(&self) -> usize {
        self.analysis.as_ref().map_or(0, |a| a.island_count)
    }

    pub fn lit_pixels(&self) -> u64 {
        self.lit_pixels
    }

    pub fn extends_margin(&self) -> bool {
        self.extends_margin
    }

    pub fn def(&self) -> LayerDef {
        self.def
    }

    pub fn position_z(&self) -> f32 {
        self.def.position_z_mm
    }

    pub fn set_position_z(&mut self, position_z_mm: f32) {
        self.def.position_z_mm = position_z_mm;
    }

    pub fn exposure(&self) -> f32 {
        self.def.exposure_time_sec
    }

    pub fn set_exposure(&mut self, exposure_time_sec: f32) {
        self.def.exposure_time_sec = exposure_time_sec;
    }

    pub fn off_time(&self) -> f32 {
        self.def.light_off_sec
    }

    pub fn set_off_time(&mut self, light_off_sec: f32) {
        self.def.light_off_sec = light_off_sec;
    }

    pub fn data_address(&self) -> u32 {
        self.def.data_address
    }

    pub fn data_size(&self) -> u32 {
        self.def.data_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::io::SliceReader;

    fn context(width: u32, height: u32) -> Arc<StackContext> {
        Arc::new(StackContext::new(width, height, 1, 0))
    }

    fn def_bytes(def: &LayerDef) -> Vec<u8> {
        bytemuck::bytes_of(def).to_vec()
    }

    #[test]
    fn test_read_then_write_is_byte_identical() {
        let def = LayerDef {
            position_z_mm: 0.05,
            exposure_time_sec: 8.0,
            light_off_sec: 1.0,
            data_address: 200,
            data_size: 3,
            unknown1: 0xdeadbeef,
            unknown2: 1,
            unknown3: 2,
            unknown4: 0xffffffff,
        };
        let bytes = def_bytes(&def);
        assert_eq!(bytes.len(), LayerRecord::SIZE);

        let mut layer = LayerRecord::read(&mut SliceReader::new(&bytes), context(10, 10)).unwrap();
        let mut file = vec![0u8; 203];
        file[200..].copy_from_slice(&[0x85, 0x05, 0x8A]);
        layer.load_payload(&file).unwrap();
        assert_eq!(layer.payload().unwrap(), &[0x85, 0x05, 0x8A]);

        let mut out = vec![];
        let next = layer.write(&mut out, 200).unwrap();
        assert_eq!(out, bytes);
        assert_eq!(next, 204);

        let mut out = vec![];
        layer.write_payload(&mut out).unwrap();
        assert_eq!(out, vec![0x85, 0x05, 0x8A, 0x00]);
    }

    #[test]
    fn test_truncated_record() {
        let bytes = def_bytes(&LayerDef::default());
        let err = LayerRecord::read(&mut SliceReader::new(&bytes[..20]), context(10, 10)).unwrap_err();
        assert!(matches!(err, LayerError::Format(_)));
    }

    #[test]
    fn test_payload_out_of_range() {
        let def = LayerDef { data_address: 10, data_size: 8, ..Default::default() };
        let bytes = def_bytes(&def);
        let mut layer = LayerRecord::read(&mut SliceReader::new(&bytes), context(10, 10)).unwrap();
        let err = layer.load_payload(&[0u8; 17]).unwrap_err();
        assert_eq!(err, LayerError::Range { what: "layer payload", start: 10, end: 18, limit: 17 });
    }

    #[test]
    fn test_write_rejects_size_mismatch() {
        let def = LayerDef { data_size: 4, ..Default::default() };
        let bytes = def_bytes(&def);
        let mut layer = LayerRecord::read(&mut SliceReader::new(&bytes), context(10, 10)).unwrap();
        layer.load_payload(&[1, 2, 3, 4]).unwrap();
        layer.def.data_size = 5;

        let mut out = vec![];
        assert!(matches!(layer.write(&mut out, 0), Err(LayerError::Consistency(_))));
        assert!(matches!(layer.write_payload(&mut out), Err(LayerError::Consistency(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn test_next_address_overflow() {
        let layer = LayerRecord::new(LayerDef::default(), vec![0x01; 10]);
        assert_eq!(layer.next_address(100).unwrap(), 111);
        assert_eq!(layer.next_address(u32::MAX - 11).unwrap(), u32::MAX);
        assert!(matches!(layer.next_address(u32::MAX - 10), Err(LayerError::Range { .. })));

        let mut layer = layer;
        assert!(matches!(layer.write(&mut vec![], u32::MAX - 5), Err(LayerError::Range { .. })));
        assert_eq!(layer.data_address(), 0);
    }

    #[test]
    fn test_unpack_image_counts_lit_pixels() {
        let mut layer = LayerRecord::new(LayerDef::default(), vec![0x83, 0x02, 0x84]);
        assert!(matches!(layer.unpack_image(), Err(LayerError::Consistency(_))));

        layer.set_context(context(10, 2));
        let bitmap = layer.unpack_image().unwrap();
        assert_eq!(bitmap.count_ones(), 7);
        assert_eq!(layer.lit_pixels(), 7);
    }

    #[test]
    fn test_analysis_is_all_or_nothing() {
        let mut layer = LayerRecord::new(LayerDef::default(), vec![0x84]);
        layer.set_context(context(4, 1));
        assert!(!layer.is_calculated());
        assert!(layer.packed_classification().is_none());
        assert!(layer.island_rows().is_none());
        assert!(matches!(layer.grid(), Err(LayerError::Consistency(_))));

        let mut grid = PixelGrid::new(4, 1);
        grid.supported(0, 0);
        grid.island(3, 0);
        layer.save_grid(&grid).unwrap();
        assert!(layer.is_calculated());
        assert!(layer.packed_classification().is_some());
        assert_eq!(layer.island_count(), 1);
        assert_eq!(layer.grid().unwrap(), grid);

        layer.unlink();
        assert!(!layer.is_calculated());
        assert!(layer.island_rows().is_none());
        assert!(layer.payload().is_err());
    }

    #[test]
    fn test_save_grid_reencodes_payload() {
        let mut layer = LayerRecord::new(LayerDef::default(), vec![0x84]);
        layer.set_context(context(4, 2));

        let mut grid = PixelGrid::new(4, 2);
        grid.supported(1, 1);
        layer.save_grid(&grid).unwrap();
        assert_eq!(layer.payload().unwrap(), &[0x04, 0x01, 0x81, 0x02]);
        assert_eq!(layer.data_size(), 4);

        assert!(matches!(layer.save_grid(&PixelGrid::new(3, 2)), Err(LayerError::Consistency(_))));
    }

    #[test]
    fn test_update_islands_after_edit() {
        let mut layer = LayerRecord::new(LayerDef::default(), vec![]);
        layer.set_context(context(3, 1));
        let mut grid = PixelGrid::new(3, 1);
        grid.island(0, 0);
        grid.island(2, 0);
        layer.save_grid(&grid).unwrap();
        assert_eq!(layer.island_count(), 2);

        // A support was added under one of them.
        grid.supported(0, 0);
        layer.update_islands(&grid).unwrap();
        assert_eq!(layer.island_count(), 1);
        assert_eq!(layer.island_rows().unwrap().get(&0), Some(&vec![2]));
    }

    #[test]
    fn test_try_clone_rederives_content() {
        let mut layer = LayerRecord::new(LayerDef { exposure_time_sec: 6.5, ..Default::default() }, vec![]);
        layer.set_context(context(4, 1));
        assert!(matches!(layer.try_clone(), Err(LayerError::Consistency(_))));

        let mut grid = PixelGrid::new(4, 1);
        grid.supported(0, 0);
        grid.set(1, 0, PixelState::Connected);
        grid.island(3, 0);
        layer.save_grid(&grid).unwrap();

        let clone = layer.try_clone().unwrap();
        assert_eq!(clone.exposure(), 6.5);
        assert_eq!(clone.payload().unwrap(), layer.payload().unwrap());
        assert_eq!(clone.packed_classification(), layer.packed_classification());
        assert_eq!(clone.island_rows(), layer.island_rows());
        assert_eq!(clone.grid().unwrap(), grid);
    }

    #[test]
    fn test_rows() {
        let mut layer = LayerRecord::new(LayerDef::default(), vec![0x82, 0x01, 0x81]);
        layer.set_context(context(4, 1));
        assert_eq!(layer.rows().unwrap(), vec![vec![
            Span { x: 0, length: 2, state: PixelState::Supported },
            Span { x: 3, length: 1, state: PixelState::Supported },
        ]]);

        let mut grid = PixelGrid::new(4, 1);
        grid.island(2, 0);
        layer.save_grid(&grid).unwrap();
        assert_eq!(layer.rows().unwrap(), vec![vec![
            Span { x: 2, length: 1, state: PixelState::Island },
        ]]);
    }

    #[test]
    fn test_print_parameters() {
        let mut layer = LayerRecord::new(LayerDef::default(), vec![]);
        layer.set_position_z(1.25);
        layer.set_exposure(9.0);
        layer.set_off_time(0.5);
        assert_eq!((layer.position_z(), layer.exposure(), layer.off_time()), (1.25, 9.0, 0.5));
    }
}
