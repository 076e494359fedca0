// SPDX-License-Identifier: GPL-3.0-only
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    Row,
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
};
use std::path::Path;
use tracing::{error, info, warn};
use crate::outbox::{models::{MealLogDraft, QueuedMealLog}, traits::Outbox};

/// SQLite-backed queue of meal logs written while offline.
pub struct SqliteOutbox {
    pool: SqlitePool,
}

impl SqliteOutbox {
    pub async fn new(db_path: &Path) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open outbox at {}", db_path.display()))?;

        let outbox = Self { pool };
        outbox.init_schema().await?;

        Ok(outbox)
    }

    async fn init_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS meal_log_outbox (
                id TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                queued_at TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS meal_log_dead_letter (
                id TEXT,
                payload TEXT,
                queued_at TEXT,
                reason TEXT NOT NULL,
                quarantined_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Initialized SQLite outbox schema");
        Ok(())
    }

    fn entry_from_row(row: &SqliteRow) -> anyhow::Result<QueuedMealLog> {
        let payload: MealLogDraft = serde_json::from_str(&row.try_get::<String, _>("payload")?)
            .context("Corrupt meal log payload")?;
        let attempts: i64 = row.try_get("attempts")?;

        Ok(QueuedMealLog {
            id: row.try_get("id")?,
            payload,
            queued_at: DateTime::parse_from_rfc3339(&row.try_get::<String, _>("queued_at")?)?
                .with_timezone(&Utc),
            attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
            last_error: row.try_get("last_error")?,
        })
    }

    /// Move unreadable rows out of the queue so they cannot block the
    /// entries behind them.
    async fn quarantine(&self, corrupt: &[(i64, String)]) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        for (rowid, reason) in corrupt {
            sqlx::query(
                r#"
                INSERT INTO meal_log_dead_letter (id, payload, queued_at, reason, quarantined_at)
                SELECT id, payload, queued_at, ?2, ?3 FROM meal_log_outbox WHERE rowid = ?1
                "#,
            )
            .bind(rowid)
            .bind(reason)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
            sqlx::query("DELETE FROM meal_log_outbox WHERE rowid = ?1")
                .bind(rowid)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        warn!(count = corrupt.len(), "Moved unreadable meal logs to the dead-letter table");
        Ok(())
    }
}

#[async_trait]
impl Outbox for SqliteOutbox {
    async fn enqueue(&self, entry: QueuedMealLog) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&entry.payload)?;

        sqlx::query(
            r#"
            INSERT INTO meal_log_outbox (id, payload, queued_at, attempts, last_error)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&entry.id)
        .bind(payload)
        .bind(entry.queued_at.to_rfc3339())
        .bind(i64::from(entry.attempts))
        .bind(&entry.last_error)
        .execute(&self.pool)
        .await?;

        info!(entry_id = %entry.id, "Queued meal log");
        Ok(())
    }

    async fn pending(&self, limit: u32) -> anyhow::Result<Vec<QueuedMealLog>> {
        // Every pass either returns or removes at least one row.
        loop {
            let rows = sqlx::query(
                "SELECT rowid, * FROM meal_log_outbox ORDER BY queued_at ASC, id ASC LIMIT ?1",
            )
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

            let mut entries = Vec::with_capacity(rows.len());
            let mut corrupt = Vec::new();
            for row in rows {
                match Self::entry_from_row(&row) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => {
                        error!(error = %e, "Failed to parse queued meal log");
                        corrupt.push((row.try_get::<i64, _>("rowid")?, format!("{e:#}")));
                    }
                }
            }

            if corrupt.is_empty() {
                return Ok(entries);
            }
            self.quarantine(&corrupt).await?;
        }
    }

    async fn mark_uploaded(&self, ids: &[String]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for id in ids {
            let result = sqlx::query("DELETE FROM meal_log_outbox WHERE id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            removed += result.rows_affected();
        }
        tx.commit().await?;

        if removed as usize != ids.len() {
            warn!(requested = ids.len(), removed, "Some uploaded meal logs were already gone");
        }
        Ok(())
    }

    async fn record_failure(&self, ids: &[String], error: &str) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query(
                "UPDATE meal_log_outbox SET attempts = attempts + 1, last_error = ?2 WHERE id = ?1",
            )
            .bind(id)
            .bind(error)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn count_pending(&self) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM meal_log_outbox")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}
