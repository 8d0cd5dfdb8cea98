// SPDX-License-Identifier: GPL-3.0-or-later

//! Reading, writing and support analysis of the layers of .photon files.
//!
//! Each layer of a print is a black and white image, run-length encoded.
//! Layers are checked against the layer below them to find the lit pixels
//! that have nothing to rest on (islands), and against the border of the
//! image (margin).

#[macro_use]
extern crate log;

pub mod consts;
pub mod error;
pub mod file_formats;
pub mod layer;
pub mod progress;
pub mod stack;
pub mod util;

pub use error::{LayerError, LayerResult};
pub use file_formats::photon::{Header, LayerDef, StackContext};
pub use layer::LayerRecord;
pub use progress::{CancelToken, Cancellable, LogProgress, Progress};
pub use stack::{AnalysisConfig, LayerStack, PassOutcome};
