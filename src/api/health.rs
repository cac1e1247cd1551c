// ============================================================================
// 健康检查接口
// ============================================================================
// 本模块提供服务健康检查处理器：
// - 数据库连通性
// - 服务运行时长
// - 版本信息
// ============================================================================

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::debug;

use crate::api::AppState;

/// 健康检查响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// 总体状态：ok / degraded
    pub status: String,
    /// 数据库状态：connected / disconnected
    pub database: String,
    /// 服务运行时长（秒）
    pub uptime_seconds: u64,
    /// 服务版本
    pub version: String,
}

/// GET /api/health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    debug!("收到健康检查请求");

    let database = match state.db.health_check().await {
        Ok(()) => "connected",
        Err(_) => "disconnected",
    };

    let status = if database == "connected" { "ok" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        database: database.to_string(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
