// ============================================================================
// 版本管理接口
// ============================================================================
// 本模块提供课表版本的列表、激活与删除处理器。
// 激活是原子切换：读取方要么看到旧活动版本，要么看到新活动版本。
// ============================================================================

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use tracing::info;

use crate::api::{ApiError, AppState};
use crate::db::{TimetableVersion, VersionRepository, VersionSummary};

/// 版本视图
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionView {
    /// 版本 ID
    pub id: i64,
    /// 版本名称
    pub name: String,
    /// 是否为活动版本
    pub is_active: bool,
    /// 来源标记
    pub source: String,
    /// 创建时间
    pub created_at: String,
    /// 条目数量
    pub entry_count: i64,
}

impl From<VersionSummary> for VersionView {
    fn from(summary: VersionSummary) -> Self {
        Self {
            id: summary.id,
            name: summary.name,
            is_active: summary.is_active != 0,
            source: summary.source,
            created_at: summary.created_at,
            entry_count: summary.entry_count,
        }
    }
}

/// 激活响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateResponse {
    /// 激活后的版本 ID
    pub id: i64,
    /// 版本名称
    pub name: String,
    /// 是否为活动版本
    pub is_active: bool,
}

impl From<TimetableVersion> for ActivateResponse {
    fn from(version: TimetableVersion) -> Self {
        Self {
            id: version.id,
            name: version.name,
            is_active: version.is_active != 0,
        }
    }
}

/// GET /api/versions
///
/// 全部版本及其条目数量，按创建时间倒序。
pub async fn list_versions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<VersionView>>, ApiError> {
    let summaries = VersionRepository::new(state.pool()).list().await?;
    Ok(Json(summaries.into_iter().map(VersionView::from).collect()))
}

/// POST /api/versions/{id}/activate
///
/// 激活指定版本（幂等）。
pub async fn activate_version(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ActivateResponse>, ApiError> {
    info!("收到版本激活请求，ID: {}", id);

    let version = VersionRepository::new(state.pool()).activate(id).await?;
    Ok(Json(ActivateResponse::from(version)))
}

/// DELETE /api/versions/{id}
///
/// 删除版本及其全部条目。删除活动版本后没有活动版本，
/// 直到显式激活另一个版本。
pub async fn delete_version(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    info!("收到版本删除请求，ID: {}", id);

    VersionRepository::new(state.pool()).delete(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}
