use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{BoxError, Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use shared::error::MainError;
use shared::point::PointRecord;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::pipelines;

/// Seconds; a preview reads every known holder.
const HTTP_TIMEOUT: u64 = 120;

#[derive(Serialize, Debug)]
pub struct SnapshotResponse {
    pub data: Vec<PointRecord>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Snapshot(#[from] MainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Snapshot(error) = self;
        let status = if error.is_transient()
            || error == MainError::ExternalService
        {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (status, Json(json!({ "error": error.to_string() }))).into_response()
    }
}

/// Dual core snapshot at the chain head, computed on demand.
pub async fn get_snapshot(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<SnapshotResponse>, ApiError> {
    let data = pipelines::dual_core_preview(&ctx, Utc::now()).await?;

    Ok(Json(SnapshotResponse { data }))
}

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/snapshot", get(get_snapshot))
        .with_state(ctx)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(HandleErrorLayer::new(handle_timeout_error))
                .timeout(Duration::from_secs(HTTP_TIMEOUT)),
        )
        .fallback(handle_404)
}

pub async fn serve(ctx: Arc<AppContext>, port: u16) -> Result<(), MainError> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let listener =
        tokio::net::TcpListener::bind(addr).await.map_err(|reason| {
            tracing::error!(%addr, ?reason, "Failed to bind snapshot server");
            MainError::ExternalService
        })?;

    tracing::info!(%addr, "Snapshot server listening");

    axum::serve(listener, router(ctx)).await.map_err(|reason| {
        tracing::error!(?reason, "Snapshot server stopped");
        MainError::ExternalService
    })
}

async fn handle_timeout_error(
    err: BoxError,
) -> (StatusCode, Json<serde_json::Value>) {
    if err.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            Json(json!({
                "error": format!(
                    "request took longer than the configured {} second timeout",
                    HTTP_TIMEOUT
                )
            })),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": format!("unhandled internal error: {}", err)
            })),
        )
    }
}

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "The requested resource does not exist on this server!"
        })),
    )
}
