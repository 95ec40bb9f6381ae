use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::admin::AdminState;
use crate::audit::AuditError;
use crate::config::GatewaySettings;
use crate::gateway::CacheStats;
use crate::security::{SecurityEvent, ThreatSummary};

/// Errors surfaced by admin handlers.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("audit flush failed: {0}")]
    Audit(#[from] AuditError),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match &self {
            AdminError::Audit(AuditError::ActorUnresolved) => StatusCode::CONFLICT,
            AdminError::Audit(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub settings: GatewaySettings,
    pub cache: CacheStats,
    pub threats: ThreatSummary,
}

#[derive(Serialize)]
pub struct InvalidateResponse {
    pub table: String,
    pub removed: usize,
}

#[derive(Deserialize)]
pub struct ThreatsQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct ThreatsResponse {
    pub summary: ThreatSummary,
    pub recent: Vec<SecurityEvent>,
}

#[derive(Serialize)]
pub struct FlushResponse {
    pub flushed: usize,
}

const DEFAULT_THREAT_LIMIT: usize = 50;

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        settings: (*state.gateway.settings()).clone(),
        cache: state.gateway.cache_stats(),
        threats: state.gateway.monitor().summary(),
    })
}

pub async fn get_cache(State(state): State<AdminState>) -> Json<CacheStats> {
    Json(state.gateway.cache_stats())
}

pub async fn invalidate_table(
    State(state): State<AdminState>,
    Path(table): Path<String>,
) -> Json<InvalidateResponse> {
    let removed = state.gateway.invalidate_table(&table);
    tracing::info!(table = %table, removed, "Cache invalidated via admin API");
    Json(InvalidateResponse { table, removed })
}

pub async fn get_threats(
    State(state): State<AdminState>,
    Query(query): Query<ThreatsQuery>,
) -> Json<ThreatsResponse> {
    let monitor = state.gateway.monitor();
    Json(ThreatsResponse {
        summary: monitor.summary(),
        recent: monitor.recent_threats(query.limit.unwrap_or(DEFAULT_THREAT_LIMIT)),
    })
}

pub async fn flush_audit(State(state): State<AdminState>) -> Result<Json<FlushResponse>, AdminError> {
    let flushed = state.gateway.audit().flush().await?;
    Ok(Json(FlushResponse { flushed }))
}
