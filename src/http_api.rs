use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{
    errors::MonitorError,
    export::{report_file_name, CsvExporter, CONTENT_TYPE},
    history::{HistorySample, HistoryStore},
    model::MonitorTarget,
    refresh::{RefreshHandle, RefreshStatus},
    table::TableSnapshot,
};

#[derive(Debug, Clone)]
pub struct ApiState {
    pub refresh: RefreshHandle,
    pub exporter: CsvExporter,
    pub history: HistoryStore,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    refresh: RefreshStatus,
}

#[derive(Debug, Serialize)]
struct StatusMessage {
    status: &'static str,
    message: String,
}

impl StatusMessage {
    fn success(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            status: "success",
            message: message.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct AutoRefreshRequest {
    enabled: bool,
}

/// Inclusive range, compared against `YYYY-MM-DD HH:MM:SS` timestamps
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportDataRequest {
    start_date: String,
    end_date: String,
}

#[derive(Debug, Serialize)]
struct ReportDataResponse {
    status: &'static str,
    data: Vec<HistorySample>,
}

struct ApiError(MonitorError);

impl From<MonitorError> for ApiError {
    fn from(err: MonitorError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("API request failed: {}", self.0);
        let status = match self.0 {
            MonitorError::ControllerGone => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(StatusMessage {
            status: "error",
            message: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

async fn health_handler(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let response = HealthResponse {
        status: "ok",
        refresh: state.refresh.status().await?,
    };

    Ok((StatusCode::OK, Json(response)))
}

async fn stats_handler(State(state): State<ApiState>) -> Result<Json<TableSnapshot>, ApiError> {
    let table = state.refresh.table().await?;
    Ok(Json(table.snapshot()))
}

async fn monitor_handler(
    State(state): State<ApiState>,
    Json(target): Json<MonitorTarget>,
) -> Result<impl IntoResponse, ApiError> {
    state.refresh.start(target).await?;
    Ok(StatusMessage::success("Monitoring started"))
}

async fn auto_refresh_handler(
    State(state): State<ApiState>,
    Json(request): Json<AutoRefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.refresh.set_enabled(request.enabled).await?;
    Ok(StatusMessage::success(if request.enabled {
        "Auto refresh enabled"
    } else {
        "Auto refresh disabled"
    }))
}

async fn stop_handler(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    state.refresh.stop().await?;
    Ok(StatusMessage::success("Monitoring stopped"))
}

async fn export_handler(State(state): State<ApiState>) -> Result<Response, ApiError> {
    let table = state.refresh.table().await?;
    let file_name = report_file_name(time::OffsetDateTime::now_utc())
        .map_err(|e| ApiError(MonitorError::Export(e)))?;

    info!("Serving CSV export with {} rows as {}", table.len(), file_name);

    Ok((
        [
            (header::CONTENT_TYPE, CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        state.exporter.to_csv(&table),
    )
        .into_response())
}

async fn report_data_handler(
    State(state): State<ApiState>,
    Json(request): Json<ReportDataRequest>,
) -> Result<Json<ReportDataResponse>, ApiError> {
    let data = state
        .history
        .query(&request.start_date, &request.end_date)
        .await
        .map_err(|e| ApiError(MonitorError::History(e)))?;

    info!(
        "Serving {} history samples between {} and {}",
        data.len(),
        request.start_date,
        request.end_date
    );

    Ok(Json(ReportDataResponse {
        status: "success",
        data,
    }))
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/monitor", post(monitor_handler))
        .route("/api/auto-refresh", post(auto_refresh_handler))
        .route("/api/stop", post(stop_handler))
        .route("/api/export.csv", get(export_handler))
        .route("/api/report-data", post(report_data_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

pub async fn start_http_server(
    address: String,
    port: u16,
    state: ApiState,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), MonitorError> {
    let addr = format!("{}:{}", address, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| MonitorError::http(&addr, e))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("HTTP server shutting down");
        })
        .await
        .map_err(|e| MonitorError::http(&addr, e))?;

    Ok(())
}
