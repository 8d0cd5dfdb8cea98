// SPDX-License-Identifier: GPL-3.0-or-later

use std::sync::Arc;

use log::Level;

use crate::consts::analysis::DEFAULT_MARGIN;
use crate::error::{ensure, LayerError, LayerResult};
use crate::file_formats::photon::{Header, StackContext};
use crate::layer::bitmap::Bitmap;
use crate::layer::classify::{classify, locate_pixels, Previous};
use crate::layer::grid::PixelGrid;
use crate::layer::margin::check_margin;
use crate::layer::LayerRecord;
use crate::progress::Progress;
use crate::util::io::{Seek, SliceReader, Write};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AnalysisConfig {
    /// Width of the border, in pixels, that lit pixels should stay out of.
    /// 0 disables the check.
    pub margin: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { margin: DEFAULT_MARGIN }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PassOutcome {
    Completed,
    /// The pass stopped after `completed` layers, all of them consistent.
    Cancelled { completed: usize },
}

/// The resolved layer below the one being calculated.
struct Carry {
    bitmap: Bitmap,
    grid: PixelGrid,
}

#[derive(Debug)]
pub struct LayerStack {
    context: Arc<StackContext>,
    layers: Vec<LayerRecord>,
}

impl LayerStack {
    pub fn new(context: StackContext, mut layers: Vec<LayerRecord>) -> Self {
        let context = Arc::new(context);
        for layer in &mut layers {
            layer.set_context(context.clone());
        }
        Self { context, layers }
    }

    /// Parses the file header, then the layers.
    pub fn from_file(file: &[u8], progress: &dyn Progress) -> LayerResult<Self> {
        let header = Header::read(&mut SliceReader::new(file))?;
        Self::read(file, StackContext::from(&header), progress)
    }

    pub fn read(file: &[u8], context: StackContext, progress: &dyn Progress) -> LayerResult<Self> {
        let context = Arc::new(context);
        let num_layers = context.layer_count;

        // The layer count comes from the header, check it against the file
        // before trusting it with an allocation.
        let table_end = context.layers_offset as u64 + num_layers as u64 * LayerRecord::SIZE as u64;
        ensure!(table_end <= file.len() as u64, LayerError::Format(format!(
            "layer table of {} layers at {:#x} ends past the end of the file ({} bytes)",
            num_layers, context.layers_offset, file.len())));

        let mut reader = SliceReader::new(file);
        reader.seek_from_start(context.layers_offset);

        let mut layers = Vec::with_capacity(num_layers as usize);
        for i in 0..num_layers {
            progress.show_info(&format!("Reading photon file layer {}/{}", i, num_layers));
            let mut layer = LayerRecord::read(&mut reader, context.clone())?;
            layer.load_payload(file)?;
            layers.push(layer);
        }

        debug!("Read {} layers of {}x{}", layers.len(), context.resolution_x, context.resolution_y);
        Ok(Self { context, layers })
    }

    /// Writes the layer definitions then the payloads, the first payload at
    /// `base`. Returns the address following the last payload.
    /// Nothing is written and no address changes if any layer can't be saved.
    pub fn save<W: Write<Error = LayerError>>(&mut self, writer: &mut W, base: u32) -> LayerResult<u32> {
        for layer in &self.layers {
            layer.check_payload_size()?;
        }
        self.save_addresses(base)?;

        let mut cursor = base;
        for layer in &mut self.layers {
            cursor = layer.write(writer, cursor)?;
        }
        for layer in &self.layers {
            layer.write_payload(writer)?;
        }
        debug!("Saved {} layers, payloads span {:#x}..{:#x}", self.layers.len(), base, cursor);
        Ok(cursor)
    }

    /// Where each payload would land if the stack was saved at `base`.
    pub fn save_addresses(&self, base: u32) -> LayerResult<Vec<u32>> {
        let mut addresses = Vec::with_capacity(self.layers.len());
        let mut cursor = base;
        for layer in &self.layers {
            addresses.push(cursor);
            cursor = layer.next_address(cursor)?;
        }
        Ok(addresses)
    }

    /// Calculates every layer, bottom to top.
    pub fn calculate_all(&mut self, config: &AnalysisConfig, progress: &dyn Progress) -> LayerResult<PassOutcome> {
        let num_layers = self.layers.len();
        debug!("Calculating {} layers, margin={}", num_layers, config.margin);

        let mut carry: Option<Carry> = None;
        for (i, layer) in self.layers.iter_mut().enumerate() {
            if progress.is_cancelled() {
                info!("Calculation cancelled after {} layers", i);
                return Ok(PassOutcome::Cancelled { completed: i });
            }
            progress.show_info(&format!("Calculating photon file layer {}/{}", i, num_layers));
            carry = Some(step(i, layer, carry.as_ref(), config)?);
        }

        debug!("Calculation done, {} island pixels total", self.total_islands());
        Ok(PassOutcome::Completed)
    }

    /// Recalculates layer `index` and the one above it, after layer `index`
    /// was edited. These are the only two layers whose classification depends
    /// on the content of layer `index`. The layer below must be calculated.
    pub fn calculate_from(&mut self, index: usize, config: &AnalysisConfig, progress: &dyn Progress) -> LayerResult<PassOutcome> {
        let num_layers = self.layers.len();
        ensure!(index < num_layers, LayerError::index_out_of_range(index, num_layers));

        let mut carry = match index.checked_sub(1) {
            None => None,
            Some(below) => {
                let layer = &mut self.layers[below];
                ensure!(layer.is_calculated(), LayerError::Consistency(
                    format!("layer {} must be calculated before layer {}", below, index)));
                Some(Carry { bitmap: layer.unpack_image()?, grid: layer.grid()? })
            }
        };

        let end = (index + 2).min(num_layers);
        for i in index..end {
            if progress.is_cancelled() {
                info!("Calculation cancelled after {} layers", i - index);
                return Ok(PassOutcome::Cancelled { completed: i - index });
            }
            carry = Some(step(i, &mut self.layers[i], carry.as_ref(), config)?);
        }

        Ok(PassOutcome::Completed)
    }

    pub fn context(&self) -> &StackContext {
        &self.context
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[LayerRecord] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> LayerResult<&LayerRecord> {
        let len = self.layers.len();
        self.layers.get(index).ok_or_else(|| LayerError::index_out_of_range(index, len))
    }

    pub fn layer_mut(&mut self, index: usize) -> LayerResult<&mut LayerRecord> {
        let len = self.layers.len();
        self.layers.get_mut(index).ok_or_else(|| LayerError::index_out_of_range(index, len))
    }

    pub fn total_islands(&self) -> usize {
        self.layers.iter().map(LayerRecord::island_count).sum()
    }

    pub fn layers_with_islands(&self) -> Vec<usize> {
        self.layers.iter().enumerate()
            .filter(|(_, layer)| layer.island_count() > 0)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn margin_intrusions(&self) -> Vec<usize> {
        self.layers.iter().enumerate()
            .filter(|(_, layer)| layer.extends_margin())
            .map(|(i, _)| i)
            .collect()
    }
}

/// Calculates one layer against the one below it. Returns what the next
/// layer needs to be calculated.
fn step(index: usize, layer: &mut LayerRecord, below: Option<&Carry>, config: &AnalysisConfig) -> LayerResult<Carry> {
    let (width, height) = {
        let ctx = layer.context()?;
        (ctx.width(), ctx.height())
    };

    let bitmap = layer.unpack_image()?;

    if config.margin > 0 {
        layer.set_extends_margin(check_margin(&bitmap, config.margin as usize));
    }

    if log_enabled!(Level::Trace) {
        let located: PixelGrid = locate_pixels(&bitmap, width, height);
        let spans: usize = located.spans().iter().map(Vec::len).sum();
        trace!("Layer {}: {} lit pixels in {} spans", index, layer.lit_pixels(), spans);
    }

    let previous = below.map(|c| Previous { bitmap: &c.bitmap, grid: &c.grid });
    let classification = classify(&bitmap, previous, width, height);

    if classification.island_count > 0 {
        debug!("Layer {}: {} island pixels on {} rows",
            index, classification.island_count, classification.islands.len());
    }

    let grid = layer.set_analysis(classification);
    Ok(Carry { bitmap, grid })
}
