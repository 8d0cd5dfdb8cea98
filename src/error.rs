// SPDX-License-Identifier: GPL-3.0-or-later

use thiserror::Error;

pub type LayerResult<T> = Result<T, LayerError>;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum LayerError {
    /// The stream ended early, or a fixed layout did not parse.
    #[error("format error: {0}")]
    Format(String),

    /// A payload slice or a layer index points outside of what exists.
    #[error("{what} out of range: {start}..{end} exceeds {limit}")]
    Range {
        what: &'static str,
        start: usize,
        end: usize,
        limit: usize,
    },

    /// An operation was requested before the state it needs was available.
    #[error("consistency error: {0}")]
    Consistency(String),
}

macro_rules! ensure {
    ($expr:expr, $err:expr) => {
        if !$expr {
            return Err($err);
        }
    };
}

pub(crate) use ensure;

impl LayerError {
    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        LayerError::Range { what: "layer index", start: index, end: index + 1, limit: len }
    }
}
