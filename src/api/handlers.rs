// SPDX-License-Identifier: GPL-3.0-only
use axum::Json;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::PlatformError;
use crate::notifications::NotificationGate;
use crate::outbox::{MealLogDraft, Outbox, QueuedMealLog};
use crate::platform::PermissionState;
use crate::session::AppSession;
use crate::sync::OutboxFlusher;
use crate::ui::StatusSnapshot;
use crate::utils::FixedWindowRateLimiter;

const MAX_DESCRIPTION_LEN: usize = 2000;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, StatusCode>;

pub struct ApiHandlers {
    sessions: watch::Receiver<Option<Arc<AppSession>>>,
    notifications: Arc<NotificationGate>,
    outbox: Arc<dyn Outbox>,
    flusher: Arc<OutboxFlusher>,
    limiter: Arc<FixedWindowRateLimiter>,
}

impl ApiHandlers {
    pub fn new(
        sessions: watch::Receiver<Option<Arc<AppSession>>>,
        notifications: Arc<NotificationGate>,
        outbox: Arc<dyn Outbox>,
        flusher: Arc<OutboxFlusher>,
        limiter: Arc<FixedWindowRateLimiter>,
    ) -> Self {
        Self {
            sessions,
            notifications,
            outbox,
            flusher,
            limiter,
        }
    }

    pub fn sessions(&self) -> watch::Receiver<Option<Arc<AppSession>>> {
        self.sessions.clone()
    }

    pub fn notifications(&self) -> &Arc<NotificationGate> {
        &self.notifications
    }

    /// Session currently serving the UI
    pub fn current_session(&self) -> Result<Arc<AppSession>, StatusCode> {
        self.sessions.borrow().clone().ok_or(StatusCode::SERVICE_UNAVAILABLE)
    }

    pub fn snapshot(&self) -> Result<StatusSnapshot, StatusCode> {
        let session = self.current_session()?;
        Ok(StatusSnapshot::capture(&session, &self.notifications))
    }
}

impl ApiHandlers {
    pub async fn health() -> Json<ApiResponse<&'static str>> {
        Json(ApiResponse::success("ok"))
    }

    pub async fn status(&self) -> ApiResult<StatusSnapshot> {
        Ok(Json(ApiResponse::success(self.snapshot()?)))
    }

    pub async fn accept_update(&self) -> ApiResult<bool> {
        let notice = self.current_session()?.update_notice();
        match notice.on_accept().await {
            Ok(accepted) => Ok(Json(ApiResponse::success(accepted))),
            Err(e) => {
                error!(error = %e, "Failed to accept update");
                Err(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    pub async fn dismiss_update(&self) -> ApiResult<bool> {
        let notice = self.current_session()?.update_notice();
        Ok(Json(ApiResponse::success(notice.on_dismiss())))
    }

    pub async fn check_for_update(&self, client: IpAddr) -> ApiResult<()> {
        // A request that cannot reach a session does not spend a check.
        let session = self.current_session()?;
        if !self.limiter.check(&client.to_string()) {
            warn!(client = %client, "Manual update check rate limited");
            return Err(StatusCode::TOO_MANY_REQUESTS);
        }

        match session.lifecycle().check_for_update().await {
            Ok(()) => Ok(Json(ApiResponse::success(()))),
            Err(PlatformError::NoRegistration) => Err(StatusCode::CONFLICT),
            Err(e) => {
                error!(error = %e, "Manual update check failed");
                Err(StatusCode::BAD_GATEWAY)
            }
        }
    }

    pub async fn enable_notifications(&self) -> Json<ApiResponse<PermissionState>> {
        Json(ApiResponse::success(self.notifications.request().await))
    }

    pub async fn queue_meal(&self, Json(draft): Json<MealLogDraft>) -> ApiResult<String> {
        let description = draft.description.trim();
        if description.is_empty() || description.len() > MAX_DESCRIPTION_LEN {
            return Err(StatusCode::BAD_REQUEST);
        }

        let entry = QueuedMealLog::new(draft);
        let id = entry.id.clone();
        if let Err(e) = self.outbox.enqueue(entry).await {
            error!(error = %e, "Failed to queue meal log");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
        info!(meal_id = %id, "Meal log queued");

        let online = self
            .current_session()
            .map(|session| session.connectivity().state().is_online())
            .unwrap_or(false);
        if online {
            let flusher = Arc::clone(&self.flusher);
            tokio::spawn(async move {
                if let Err(e) = flusher.flush().await {
                    warn!(error = %e, "Direct upload failed, meal log stays queued");
                }
            });
        }

        Ok(Json(ApiResponse::success(id)))
    }
}
