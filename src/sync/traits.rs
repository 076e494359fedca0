// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use crate::outbox::QueuedMealLog;

#[async_trait]
pub trait Uploader: Send + Sync {
    /// Push a batch of queued meal logs to the persistence service
    async fn upload(&self, batch: &[QueuedMealLog]) -> anyhow::Result<()>;
}
