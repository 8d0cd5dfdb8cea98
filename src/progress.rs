// SPDX-License-Identifier: GPL-3.0-or-later

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Receives status updates during long passes, and tells them when to stop.
pub trait Progress {
    fn show_info(&self, message: &str);

    /// Checked between layers, never in the middle of one.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Forwards status updates to the log.
pub struct LogProgress;

impl Progress for LogProgress {
    fn show_info(&self, message: &str) {
        info!("{}", message);
    }
}

/// Can be cloned and handed to another thread to stop a pass.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub struct Cancellable<P> {
    pub inner: P,
    pub token: CancelToken,
}

impl<P: Progress> Cancellable<P> {
    pub fn new(inner: P, token: CancelToken) -> Self {
        Self { inner, token }
    }
}

impl<P: Progress> Progress for Cancellable<P> {
    fn show_info(&self, message: &str) {
        self.inner.show_info(message);
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.inner.is_cancelled()
    }
}
