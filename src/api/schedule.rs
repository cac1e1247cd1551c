// ============================================================================
// 生成与报表接口
// ============================================================================
// 本模块提供排课相关的 HTTP 处理器，包括：
// - generate   : 创建新版本并运行放置器
// - reshuffle  : 清除活动版本的非锁定条目后重新排课
// - validate   : 活动版本的验证报告
// - statistics : 运行统计
// - clear_all  : 删除全部版本与条目
//
// 生成流程：建版本 -> 取课程快照 -> 放置器运行 -> 批量落库 ->
// 冲突清点。超时或取消时删除未完成的版本，不留部分写入。
// ============================================================================

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::algorithm::placer::{
    CancelFlag, EngineConfig, FailedSubject, PlacerError, SchedulerEngine,
};
use crate::algorithm::types::ScheduleState;
use crate::api::{ApiError, AppState};
use crate::db::{EntryRepository, NewEntry, SubjectRepository, VersionRepository};
use crate::solver::editor::EditEngine;
use crate::solver::reporter::{Reporter, Statistics, ValidationReport};

// ============================================================================
// 请求与响应
// ============================================================================

/// 生成 / 重排请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateRequest {
    /// 随机种子（缺省取系统时钟）
    pub seed: Option<u64>,
    /// 是否插入周四社团时段
    pub include_clubs: bool,
    /// 是否填充课外活动
    pub fill_extracurricular: bool,
}

impl Default for GenerateRequest {
    fn default() -> Self {
        Self {
            seed: None,
            include_clubs: true,
            fill_extracurricular: true,
        }
    }
}

/// 生成 / 重排响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    /// 目标版本 ID
    pub version_id: i64,
    /// 是否全部排满
    pub success: bool,
    /// 整表扫描的冲突数量
    pub conflict_count: usize,
    /// 未排满的课程数量
    pub unallocated_count: usize,
    /// 生成耗时（毫秒）
    pub generation_time_ms: u64,
    /// 未排满的课程明细
    pub failed_subjects: Vec<FailedSubject>,
    /// 回溯计数
    pub backtrack_count: u32,
    /// 本次提交的条目数量
    pub placed_entries: usize,
    /// 实际使用的随机种子
    pub seed: u64,
}

/// 清空响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    /// 删除的版本数量
    pub deleted_versions: u64,
}

/// 缺省种子：系统时钟纳秒
fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// 根据服务配置与请求开关构造引擎配置
fn engine_config(state: &AppState, request: &GenerateRequest) -> EngineConfig {
    EngineConfig {
        attempt_factor: state.config.gen_attempt_factor,
        timeout_ms: state.config.gen_timeout_ms,
        include_clubs: request.include_clubs,
        fill_extracurricular: request.fill_extracurricular,
        restrict_tutorial_periods: false,
    }
}

// ============================================================================
// 处理器
// ============================================================================

/// POST /api/timetables/generate
///
/// 创建新的活动版本并运行放置器。未排满时版本保留供检查，
/// success 为 false；超时或取消时删除版本。
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let started = Instant::now();

    info!("========================================");
    info!("收到生成请求: {:?}", request);
    info!("========================================");

    let subjects = SubjectRepository::new(state.pool())
        .find_active_with_cohort()
        .await?;
    if subjects.is_empty() {
        return Err(ApiError::BadRequest("没有参与排课的课程".to_string()));
    }

    let seed = request.seed.unwrap_or_else(clock_seed);

    let versions = VersionRepository::new(state.pool());
    let version = versions
        .create(
            &format!("生成版本 {}", Utc::now().format("%Y-%m-%d %H:%M:%S")),
            "generated",
        )
        .await?;

    let mut engine = SchedulerEngine::new(engine_config(&state, &request), seed)
        .map_err(ApiError::BadRequest)?;
    let mut schedule_state = ScheduleState::new();

    let report = match engine.schedule_all(&subjects, &mut schedule_state, &CancelFlag::new()) {
        Ok(report) => report,
        Err(e) => {
            // 部分提交通过删除未完成版本丢弃
            warn!("生成中止: {}，删除版本 {}", e, version.id);
            versions.delete(version.id).await?;
            return Err(match e {
                PlacerError::Timeout { elapsed_ms } => {
                    ApiError::Timeout(format!("生成超时（已耗时 {} 毫秒）", elapsed_ms))
                }
                PlacerError::Cancelled => ApiError::Conflict {
                    message: "生成被取消".to_string(),
                    code: None,
                },
            });
        }
    };

    // 批量落库（新版本内全部条目都是新条目）
    let drafts: Vec<NewEntry> = schedule_state
        .entries()
        .iter()
        .map(|e| e.to_new_entry())
        .collect();
    EntryRepository::new(state.pool())
        .insert_batch(version.id, &drafts)
        .await?;

    // 冲突清点
    let validation = Reporter::new(state.pool()).validation_report().await?;

    let response = GenerateResponse {
        version_id: version.id,
        success: report.is_complete(),
        conflict_count: validation.conflict_count,
        unallocated_count: validation.unallocated_subjects.len(),
        generation_time_ms: started.elapsed().as_millis() as u64,
        failed_subjects: report.failed_subjects,
        backtrack_count: report.backtrack_count,
        placed_entries: report.placed_entries,
        seed,
    };

    info!(
        "生成完成 - 版本: {}, 成功: {}, 冲突: {}, 耗时: {} 毫秒",
        response.version_id, response.success, response.conflict_count, response.generation_time_ms
    );
    Ok(Json(response))
}

/// POST /api/timetables/reshuffle
///
/// 清除活动版本的非锁定条目后重新运行放置器。
/// 锁定条目保留在原槽位，其需求从任务中抵扣。
pub async fn reshuffle(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let started = Instant::now();

    info!("收到重排请求: {:?}", request);

    let versions = VersionRepository::new(state.pool());
    let version = versions
        .get_active()
        .await?
        .ok_or_else(|| ApiError::NotFound("没有活动的课表版本".to_string()))?;

    let subjects = SubjectRepository::new(state.pool())
        .find_active_with_cohort()
        .await?;
    if subjects.is_empty() {
        return Err(ApiError::BadRequest("没有参与排课的课程".to_string()));
    }

    let seed = request.seed.unwrap_or_else(clock_seed);

    // 清除非锁定条目，加载保留下来的锁定条目
    let removed = EditEngine::new(state.pool()).clear_unlocked().await?;
    info!("重排前清除了 {} 个非锁定条目", removed);

    let entries = EntryRepository::new(state.pool());
    let rows = entries.find_by_version(version.id).await?;
    let mut schedule_state =
        ScheduleState::from_rows(&rows).map_err(|e| ApiError::internal("条目数据损坏", e))?;

    let mut engine = SchedulerEngine::new(engine_config(&state, &request), seed)
        .map_err(ApiError::BadRequest)?;

    let report = match engine.schedule_all(&subjects, &mut schedule_state, &CancelFlag::new()) {
        Ok(report) => report,
        Err(e) => {
            // 内存态的部分结果直接丢弃，数据库只少了非锁定条目
            warn!("重排中止: {}", e);
            return Err(match e {
                PlacerError::Timeout { elapsed_ms } => {
                    ApiError::Timeout(format!("重排超时（已耗时 {} 毫秒）", elapsed_ms))
                }
                PlacerError::Cancelled => ApiError::Conflict {
                    message: "重排被取消".to_string(),
                    code: None,
                },
            });
        }
    };

    // 只落库本次运行新产生的条目（锁定条目已在库中）
    let drafts: Vec<NewEntry> = schedule_state
        .entries()
        .iter()
        .filter(|e| e.id.is_none())
        .map(|e| e.to_new_entry())
        .collect();
    entries.insert_batch(version.id, &drafts).await?;

    let validation = Reporter::new(state.pool()).validation_report().await?;

    let response = GenerateResponse {
        version_id: version.id,
        success: report.is_complete(),
        conflict_count: validation.conflict_count,
        unallocated_count: validation.unallocated_subjects.len(),
        generation_time_ms: started.elapsed().as_millis() as u64,
        failed_subjects: report.failed_subjects,
        backtrack_count: report.backtrack_count,
        placed_entries: report.placed_entries,
        seed,
    };

    info!(
        "重排完成 - 版本: {}, 成功: {}, 冲突: {}",
        response.version_id, response.success, response.conflict_count
    );
    Ok(Json(response))
}

/// POST /api/timetables/validate
///
/// 活动版本的验证报告。
pub async fn validate(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ValidationReport>, ApiError> {
    let report = Reporter::new(state.pool()).validation_report().await?;
    Ok(Json(report))
}

/// GET /api/statistics
///
/// 条目计数、目录实体计数与资源利用率。
pub async fn statistics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Statistics>, ApiError> {
    let stats = Reporter::new(state.pool()).statistics().await?;
    Ok(Json(stats))
}

/// DELETE /api/timetables/clear
///
/// 删除全部版本与条目。
pub async fn clear_all(State(state): State<Arc<AppState>>) -> Result<Json<ClearResponse>, ApiError> {
    warn!("收到清空请求，删除全部版本与条目");

    let deleted = VersionRepository::new(state.pool()).delete_all().await?;
    Ok(Json(ClearResponse {
        deleted_versions: deleted,
    }))
}
