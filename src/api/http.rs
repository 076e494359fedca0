// SPDX-License-Identifier: GPL-3.0-only
use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::api::handlers::{ApiHandlers, ApiResponse};
use crate::api::websocket::ws_handler;
use crate::outbox::MealLogDraft;
use crate::platform::PermissionState;
use crate::ui::StatusSnapshot;

pub struct HttpServer {
    handlers: Arc<ApiHandlers>,
    addr: SocketAddr,
}

impl HttpServer {
    pub fn new(handlers: ApiHandlers, addr: SocketAddr) -> Self {
        Self {
            handlers: Arc::new(handlers),
            addr,
        }
    }

    pub fn router(handlers: Arc<ApiHandlers>) -> Router {
        Router::new()
            .route("/api/health", get(health_handler))
            .route("/api/status", get(status_handler))
            .route("/api/update/accept", post(accept_update_handler))
            .route("/api/update/dismiss", post(dismiss_update_handler))
            .route("/api/update/check", post(check_update_handler))
            .route("/api/notifications/enable", post(enable_notifications_handler))
            .route("/api/meals", post(queue_meal_handler))
            .route("/ws", get(ws_handler))
            .with_state(handlers)
    }

    pub async fn serve(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.addr).await?;
        Self::serve_on(listener, self.handlers).await
    }

    pub async fn serve_on(listener: TcpListener, handlers: Arc<ApiHandlers>) -> anyhow::Result<()> {
        info!(addr = %listener.local_addr()?, "Starting HTTP server");

        let app = Self::router(handlers);
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

        Ok(())
    }
}

async fn health_handler() -> Json<ApiResponse<&'static str>> {
    ApiHandlers::health().await
}

async fn status_handler(
    State(handlers): State<Arc<ApiHandlers>>,
) -> Result<Json<ApiResponse<StatusSnapshot>>, StatusCode> {
    handlers.status().await
}

async fn accept_update_handler(
    State(handlers): State<Arc<ApiHandlers>>,
) -> Result<Json<ApiResponse<bool>>, StatusCode> {
    handlers.accept_update().await
}

async fn dismiss_update_handler(
    State(handlers): State<Arc<ApiHandlers>>,
) -> Result<Json<ApiResponse<bool>>, StatusCode> {
    handlers.dismiss_update().await
}

async fn check_update_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Result<Json<ApiResponse<()>>, StatusCode> {
    handlers.check_for_update(peer.ip()).await
}

async fn enable_notifications_handler(
    State(handlers): State<Arc<ApiHandlers>>,
) -> Json<ApiResponse<PermissionState>> {
    handlers.enable_notifications().await
}

async fn queue_meal_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Json(draft): Json<MealLogDraft>,
) -> Result<Json<ApiResponse<String>>, StatusCode> {
    handlers.queue_meal(Json(draft)).await
}
