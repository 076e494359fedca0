// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};
use crate::outbox::{MealLogDraft, QueuedMealLog};
use crate::sync::traits::Uploader;

/// Uploads queued meal logs to the persistence service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpUploader {
    pub fn new(client: Client, endpoint: String, api_key: Option<String>) -> Self {
        Self {
            client,
            endpoint,
            api_key,
        }
    }

    fn build_post_request(&self) -> reqwest::RequestBuilder {
        let mut request = self.client.post(&self.endpoint);

        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        request
    }
}

#[derive(Serialize)]
struct UploadItem<'a> {
    client_id: &'a str,
    queued_at: DateTime<Utc>,
    #[serde(flatten)]
    meal: &'a MealLogDraft,
}

#[derive(Serialize)]
struct UploadRequest<'a> {
    meal_logs: Vec<UploadItem<'a>>,
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, batch: &[QueuedMealLog]) -> anyhow::Result<()> {
        info!(count = batch.len(), "Uploading queued meal logs");

        let request = UploadRequest {
            meal_logs: batch
                .iter()
                .map(|entry| UploadItem {
                    client_id: &entry.id,
                    queued_at: entry.queued_at,
                    meal: &entry.payload,
                })
                .collect(),
        };
        let response = self.build_post_request().json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(status = %status, body = %text, "Meal log upload failed");
            return Err(anyhow::anyhow!("Meal log upload failed: {} - {}", status, text));
        }

        info!(count = batch.len(), "Meal log upload completed");
        Ok(())
    }
}
