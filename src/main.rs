// SPDX-License-Identifier: GPL-3.0-or-later

#[macro_use]
extern crate log;

mod logging;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;

use resin_slice::{
    consts::analysis::DEFAULT_MARGIN,
    AnalysisConfig, LayerRecord, LayerStack, LogProgress, PassOutcome,
};

/// Finds the parts of a .photon print that have nothing to rest on.
#[derive(Parser)]
#[command(name = "resin-slice", version)]
struct Cli {
    /// The .photon file to check
    file: PathBuf,

    /// Also report layers with lit pixels this close to the border, in pixels
    #[arg(short, long, default_value_t = DEFAULT_MARGIN)]
    margin: u32,

    /// Print the island pixels of this layer
    #[arg(short, long)]
    layer: Option<usize>,

    /// Write the file back with freshly computed layer addresses
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// More logs. Repeat for even more
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logging(match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    });

    let file = std::fs::read(&cli.file)
        .with_context(|| format!("Failed to read {}", cli.file.display()))?;
    let mut stack = LayerStack::from_file(&file, &LogProgress)
        .with_context(|| format!("Failed to read the layers of {}", cli.file.display()))?;

    let config = AnalysisConfig { margin: cli.margin };
    if let PassOutcome::Cancelled { completed } = stack.calculate_all(&config, &LogProgress)? {
        warn!("Stopped after {} layers", completed);
    }

    for (i, layer) in stack.layers().iter().enumerate() {
        if layer.island_count() > 0 || layer.extends_margin() {
            println!("layer {:5}  z={:8.3}mm  islands={:7}{}",
                i, layer.position_z(), layer.island_count(),
                if layer.extends_margin() { "  (margin)" } else { "" });
        }
    }
    println!("{} layers, {} with islands, {} island pixels, {} within the margin",
        stack.len(), stack.layers_with_islands().len(), stack.total_islands(),
        stack.margin_intrusions().len());

    if let Some(index) = cli.layer {
        let layer = stack.layer(index)?;
        for (y, columns) in layer.island_rows().into_iter().flatten() {
            println!("  row {:5}: {:?}", y, columns);
        }
    }

    if let Some(output) = cli.output {
        let ctx = *stack.context();
        let layers_offset = ctx.layers_offset as usize;
        let mut out = file.get(..layers_offset)
            .context("Layer table is past the end of the file")?
            .to_vec();
        let payloads_offset = layers_offset + stack.len() * LayerRecord::SIZE;
        stack.save(&mut out, payloads_offset as u32)?;
        std::fs::write(&output, &out)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        info!("Wrote {} bytes to {}", out.len(), output.display());
    }

    Ok(())
}
