// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;
use tracing::{info, warn};
use crate::outbox::Outbox;
use crate::sync::traits::Uploader;

const DEFAULT_BATCH_SIZE: u32 = 50;

/// Drains the outbox through an uploader, batch by batch.
pub struct OutboxFlusher {
    outbox: Arc<dyn Outbox>,
    uploader: Arc<dyn Uploader>,
    batch_size: u32,
}

impl OutboxFlusher {
    pub fn new(outbox: Arc<dyn Outbox>, uploader: Arc<dyn Uploader>) -> Self {
        Self {
            outbox,
            uploader,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Upload until the outbox is empty. Returns how many logs were uploaded.
    ///
    /// Stops at the first failing batch; the failure is recorded on the
    /// affected entries and they stay queued.
    pub async fn flush(&self) -> anyhow::Result<usize> {
        let mut uploaded = 0;

        loop {
            let batch = self.outbox.pending(self.batch_size).await?;
            if batch.is_empty() {
                break;
            }

            let ids: Vec<String> = batch.iter().map(|entry| entry.id.clone()).collect();
            match self.uploader.upload(&batch).await {
                Ok(()) => {
                    self.outbox.mark_uploaded(&ids).await?;
                    uploaded += ids.len();
                }
                Err(e) => {
                    warn!(error = %e, count = ids.len(), "Batch upload failed, keeping entries queued");
                    self.outbox.record_failure(&ids, &e.to_string()).await?;
                    return Err(e);
                }
            }
        }

        if uploaded > 0 {
            info!(uploaded, "Outbox flushed");
        }
        Ok(uploaded)
    }
}
