// ============================================================================
// HTTP 接口层模块
// ============================================================================
// 本模块提供对外的 HTTP API，把外部请求映射为核心调用
//
// 模块组织：
// - mod.rs       : 应用状态、统一错误映射、路由构建
// - schedule.rs  : 生成 / 重排 / 验证 / 统计 / 清空
// - timetable.rs : 课表视图（按天分组、按教学班）
// - versions.rs  : 版本列表 / 激活 / 删除
// - entry.rs     : 条目调课（锁定 / 移动 / 交换 / 指定放置）
// - catalogue.rs : 目录实体 CRUD 与表格行导入
// - health.rs    : 健康检查
//
// 错误映射：
// - 资源缺失 / 无活动版本       -> 404
// - 约束校验拒绝 / 锁定条目     -> 409
// - 输入不合法                  -> 400
// - 生成超时                    -> 408
// - 存储故障与内部错误          -> 500（对外不暴露细节）
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::config::AppConfig;
use crate::db::DatabaseManager;
use crate::solver::editor::EditError;
use crate::solver::reporter::ReportError;

pub mod catalogue;
pub mod entry;
pub mod health;
pub mod schedule;
pub mod timetable;
pub mod versions;

// ============================================================================
// 应用状态
// ============================================================================

/// 应用状态，在全部处理器之间共享
pub struct AppState {
    /// 数据库管理器
    pub db: DatabaseManager,
    /// 服务配置
    pub config: AppConfig,
    /// 服务启动时间
    pub start_time: Instant,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(db: DatabaseManager, config: AppConfig) -> Self {
        Self {
            db,
            config,
            start_time: Instant::now(),
        }
    }

    /// 数据库连接池引用
    pub fn pool(&self) -> &sqlx::SqlitePool {
        self.db.pool()
    }

    /// 服务运行时长（秒）
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

// ============================================================================
// 统一错误类型
// ============================================================================

/// 错误响应体
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// 错误描述
    pub error: String,
    /// 机器可读代码（校验拒绝时为 kebab-case 拒绝代码）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// HTTP 接口错误
#[derive(Debug)]
pub enum ApiError {
    /// 资源不存在（404）
    NotFound(String),
    /// 输入不合法（400）
    BadRequest(String),
    /// 约束冲突或状态冲突（409）
    Conflict { message: String, code: Option<String> },
    /// 生成超时（408）
    Timeout(String),
    /// 内部错误（500，对外不暴露细节）
    Internal,
}

impl ApiError {
    /// 内部错误：记录细节后返回不透明的 500
    pub fn internal(context: &str, detail: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, detail);
        ApiError::Internal
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error: message,
                    code: None,
                },
            ),
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: message,
                    code: None,
                },
            ),
            ApiError::Conflict { message, code } => (
                StatusCode::CONFLICT,
                ErrorResponse {
                    error: message,
                    code,
                },
            ),
            ApiError::Timeout(message) => (
                StatusCode::REQUEST_TIMEOUT,
                ErrorResponse {
                    error: message,
                    code: None,
                },
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: "内部错误".to_string(),
                    code: None,
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => ApiError::NotFound("资源不存在".to_string()),
            other => ApiError::internal("数据库操作失败", other),
        }
    }
}

impl From<EditError> for ApiError {
    fn from(e: EditError) -> Self {
        match e {
            EditError::NoActiveVersion => ApiError::NotFound("没有活动的课表版本".to_string()),
            EditError::EntryNotFound(id) => ApiError::NotFound(format!("条目 {} 不存在", id)),
            EditError::MissingResource(message) => ApiError::NotFound(message),
            EditError::EntryLocked(id) => ApiError::Conflict {
                message: format!("条目 {} 已锁定", id),
                code: None,
            },
            EditError::LabMoveForbidden | EditError::LabSwapForbidden => ApiError::Conflict {
                message: e.to_string(),
                code: None,
            },
            EditError::Rejected(rejection) => ApiError::Conflict {
                message: rejection.message.clone(),
                code: Some(rejection.reason.code().to_string()),
            },
            EditError::InvalidInput(message) => ApiError::BadRequest(message),
            EditError::State(e) => ApiError::internal("条目数据损坏", e),
            EditError::Database(e) => ApiError::internal("数据库操作失败", e),
        }
    }
}

impl From<ReportError> for ApiError {
    fn from(e: ReportError) -> Self {
        match e {
            ReportError::NoActiveVersion => ApiError::NotFound("没有活动的课表版本".to_string()),
            ReportError::State(e) => ApiError::internal("条目数据损坏", e),
            ReportError::Database(e) => ApiError::internal("数据库操作失败", e),
        }
    }
}

// ============================================================================
// 路由构建
// ============================================================================

/// 构建服务路由
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // 健康检查
        .route("/api/health", get(health::health_check))
        // 生成与报表
        .route("/api/timetables/generate", post(schedule::generate))
        .route("/api/timetables/reshuffle", post(schedule::reshuffle))
        .route("/api/timetables/validate", post(schedule::validate))
        .route("/api/timetables/clear", delete(schedule::clear_all))
        .route("/api/statistics", get(schedule::statistics))
        // 课表视图
        .route("/api/timetables", get(timetable::active_timetable))
        .route(
            "/api/timetables/{branch}/{year}/{section}",
            get(timetable::cohort_timetable),
        )
        // 版本管理
        .route("/api/versions", get(versions::list_versions))
        .route("/api/versions/{id}/activate", post(versions::activate_version))
        .route("/api/versions/{id}", delete(versions::delete_version))
        // 条目调课
        .route("/api/entries/lock", post(entry::lock_entry))
        .route("/api/entries/move", post(entry::move_entry))
        .route("/api/entries/swap", post(entry::swap_entries))
        .route("/api/entries/assign", post(entry::assign_entry))
        // 目录实体
        .route(
            "/api/branches",
            get(catalogue::list_branches).post(catalogue::create_branch),
        )
        .route(
            "/api/year-sections",
            get(catalogue::list_year_sections).post(catalogue::create_year_section),
        )
        .route(
            "/api/faculty",
            get(catalogue::list_faculty).post(catalogue::create_faculty),
        )
        .route(
            "/api/classrooms",
            get(catalogue::list_classrooms).post(catalogue::create_classroom),
        )
        .route(
            "/api/labrooms",
            get(catalogue::list_labrooms).post(catalogue::create_labroom),
        )
        .route(
            "/api/subjects",
            get(catalogue::list_subjects).post(catalogue::create_subject),
        )
        // 表格行导入
        .route("/api/ingest/master", post(catalogue::ingest_master))
        .route("/api/ingest/assignments", post(catalogue::ingest_assignments))
        // 中间件
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
