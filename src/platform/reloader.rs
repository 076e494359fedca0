// SPDX-License-Identifier: GPL-3.0-only
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

use crate::platform::traits::PageReloader;

/// Reload request for the session loop in `main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadRequest;

/// Turns a reload into "tear the session down and build a fresh one".
pub struct SessionReloader {
    tx: UnboundedSender<ReloadRequest>,
}

impl SessionReloader {
    pub fn new() -> (Self, UnboundedReceiver<ReloadRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PageReloader for SessionReloader {
    fn reload(&self) {
        info!("Full reload requested");
        if self.tx.send(ReloadRequest).is_err() {
            warn!("Session loop is gone, reload dropped");
        }
    }
}
