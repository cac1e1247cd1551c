// ============================================================================
// 条目调课接口
// ============================================================================
// 本模块把调课请求映射为调课编辑器的原语：
// - lock   : 翻转锁定标志
// - move   : 移动到新槽位
// - swap   : 成对交换
// - assign : 指定放置（实验块原子创建两节）
//
// 所有操作针对活动版本；约束违反以 409 返回且不改变数据。
// ============================================================================

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{ApiError, AppState};
use crate::db::TimetableEntry;
use crate::models::{DayOfWeek, SessionType};
use crate::solver::editor::{AssignInput, EditEngine};

// ============================================================================
// 请求与响应
// ============================================================================

/// 锁定请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRequest {
    /// 条目 ID
    pub entry_id: i64,
    /// 目标锁定状态
    pub locked: bool,
}

/// 移动请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    /// 条目 ID
    pub entry_id: i64,
    /// 目标星期
    pub day: DayOfWeek,
    /// 目标节次
    pub period: u8,
}

/// 交换请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    /// 第一个条目 ID
    pub first_id: i64,
    /// 第二个条目 ID
    pub second_id: i64,
}

/// 指定放置请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    /// 教学班（年级班级 ID）
    pub year_section_id: i64,
    /// 星期
    pub day: DayOfWeek,
    /// 节次（实验块为起始节次）
    pub period: u8,
    /// 课段类型
    pub kind: SessionType,
    /// 课程 ID（学术课段必填）
    pub subject_id: Option<i64>,
    /// 创建后立即锁定
    #[serde(default)]
    pub lock: bool,
}

/// 条目响应视图
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryResponse {
    /// 条目 ID
    pub id: i64,
    /// 星期
    pub day: String,
    /// 节次
    pub period: i64,
    /// 课段类型
    pub session_type: String,
    /// 是否锁定
    pub is_locked: bool,
}

impl From<TimetableEntry> for EntryResponse {
    fn from(row: TimetableEntry) -> Self {
        Self {
            id: row.id,
            day: row.day_of_week,
            period: row.period_number,
            session_type: row.session_type,
            is_locked: row.is_locked != 0,
        }
    }
}

// ============================================================================
// 处理器
// ============================================================================

/// POST /api/entries/lock
pub async fn lock_entry(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LockRequest>,
) -> Result<Json<EntryResponse>, ApiError> {
    info!("调课请求 lock: {:?}", request);

    let row = EditEngine::new(state.pool())
        .lock(request.entry_id, request.locked)
        .await?;
    Ok(Json(EntryResponse::from(row)))
}

/// POST /api/entries/move
pub async fn move_entry(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MoveRequest>,
) -> Result<Json<EntryResponse>, ApiError> {
    info!("调课请求 move: {:?}", request);

    let row = EditEngine::new(state.pool())
        .move_entry(request.entry_id, request.day, request.period)
        .await?;
    Ok(Json(EntryResponse::from(row)))
}

/// POST /api/entries/swap
pub async fn swap_entries(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SwapRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    info!("调课请求 swap: {:?}", request);

    EditEngine::new(state.pool())
        .swap(request.first_id, request.second_id)
        .await?;
    Ok(Json(serde_json::json!({
        "swapped": [request.first_id, request.second_id]
    })))
}

/// POST /api/entries/assign
pub async fn assign_entry(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<Vec<EntryResponse>>, ApiError> {
    info!("调课请求 assign: {:?}", request);

    let created = EditEngine::new(state.pool())
        .assign(AssignInput {
            year_section_id: request.year_section_id,
            day: request.day,
            period: request.period,
            kind: request.kind,
            subject_id: request.subject_id,
            lock: request.lock,
        })
        .await?;

    Ok(Json(created.into_iter().map(EntryResponse::from).collect()))
}
