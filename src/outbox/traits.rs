// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use crate::outbox::models::QueuedMealLog;

#[async_trait]
pub trait Outbox: Send + Sync {
    /// Queue a meal log for upload
    async fn enqueue(&self, entry: QueuedMealLog) -> anyhow::Result<()>;

    /// Oldest pending entries first, at most `limit`
    async fn pending(&self, limit: u32) -> anyhow::Result<Vec<QueuedMealLog>>;

    /// Remove entries that reached the server
    async fn mark_uploaded(&self, ids: &[String]) -> anyhow::Result<()>;

    /// Bump the attempt counter and remember why the upload failed
    async fn record_failure(&self, ids: &[String], error: &str) -> anyhow::Result<()>;

    /// Number of entries still waiting
    async fn count_pending(&self) -> anyhow::Result<u64>;
}
