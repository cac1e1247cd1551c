// ============================================================================
// 目录实体接口
// ============================================================================
// 本模块提供实体目录（专业、年级班级、教师、教室、实验室、课程）
// 的读写处理器，以及表格行导入入口。
//
// 实体目录在生成期间视为只读；目录变更会使进行中的生成失效，
// 由调用方负责重新发起。
// ============================================================================

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::info;

use crate::api::{ApiError, AppState};
use crate::db::{
    Branch, BranchRepository, Classroom, ClassroomRepository, CreateBranchInput,
    CreateClassroomInput, CreateFacultyInput, CreateLabRoomInput, CreateSubjectInput,
    CreateYearSectionInput, Faculty, FacultyRepository, LabRoom, LabRoomRepository, Subject,
    SubjectRepository, YearSection, YearSectionRepository,
};
use crate::ingest::{AssignmentRow, IngestReport, Ingestor, MasterRow};

// ============================================================================
// 专业与年级班级
// ============================================================================

/// GET /api/branches
pub async fn list_branches(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Branch>>, ApiError> {
    Ok(Json(BranchRepository::new(state.pool()).find_all().await?))
}

/// POST /api/branches
pub async fn create_branch(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreateBranchInput>,
) -> Result<Json<Branch>, ApiError> {
    if input.code.trim().is_empty() {
        return Err(ApiError::BadRequest("专业代码不能为空".to_string()));
    }

    let branch = BranchRepository::new(state.pool()).create(input).await?;
    Ok(Json(branch))
}

/// GET /api/year-sections
pub async fn list_year_sections(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<YearSection>>, ApiError> {
    Ok(Json(
        YearSectionRepository::new(state.pool()).find_all().await?,
    ))
}

/// POST /api/year-sections
pub async fn create_year_section(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreateYearSectionInput>,
) -> Result<Json<YearSection>, ApiError> {
    if !(1..=4).contains(&input.year) {
        return Err(ApiError::BadRequest("年级必须在 1-4 之间".to_string()));
    }

    let year_section = YearSectionRepository::new(state.pool()).create(input).await?;
    Ok(Json(year_section))
}

// ============================================================================
// 教师与房间
// ============================================================================

/// GET /api/faculty
pub async fn list_faculty(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Faculty>>, ApiError> {
    Ok(Json(FacultyRepository::new(state.pool()).find_all().await?))
}

/// POST /api/faculty
pub async fn create_faculty(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreateFacultyInput>,
) -> Result<Json<Faculty>, ApiError> {
    if input.employee_id.trim().is_empty() {
        return Err(ApiError::BadRequest("工号不能为空".to_string()));
    }

    let faculty = FacultyRepository::new(state.pool()).create(input).await?;
    Ok(Json(faculty))
}

/// GET /api/classrooms
pub async fn list_classrooms(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Classroom>>, ApiError> {
    Ok(Json(
        ClassroomRepository::new(state.pool()).find_all().await?,
    ))
}

/// POST /api/classrooms
pub async fn create_classroom(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreateClassroomInput>,
) -> Result<Json<Classroom>, ApiError> {
    if input.capacity <= 0 {
        return Err(ApiError::BadRequest("教室容量必须大于 0".to_string()));
    }

    let classroom = ClassroomRepository::new(state.pool()).create(input).await?;
    Ok(Json(classroom))
}

/// GET /api/labrooms
pub async fn list_labrooms(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LabRoom>>, ApiError> {
    Ok(Json(LabRoomRepository::new(state.pool()).find_all().await?))
}

/// POST /api/labrooms
pub async fn create_labroom(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreateLabRoomInput>,
) -> Result<Json<LabRoom>, ApiError> {
    if input.capacity <= 0 {
        return Err(ApiError::BadRequest("实验室容量必须大于 0".to_string()));
    }

    let labroom = LabRoomRepository::new(state.pool()).create(input).await?;
    Ok(Json(labroom))
}

// ============================================================================
// 课程
// ============================================================================

/// GET /api/subjects
pub async fn list_subjects(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Subject>>, ApiError> {
    Ok(Json(SubjectRepository::new(state.pool()).find_all().await?))
}

/// POST /api/subjects
pub async fn create_subject(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreateSubjectInput>,
) -> Result<Json<Subject>, ApiError> {
    if input.code.trim().is_empty() || input.name.trim().is_empty() {
        return Err(ApiError::BadRequest("课程代码与名称不能为空".to_string()));
    }
    if !(1..=4).contains(&input.year) {
        return Err(ApiError::BadRequest("年级必须在 1-4 之间".to_string()));
    }

    let subject = SubjectRepository::new(state.pool()).create(input).await?;
    Ok(Json(subject))
}

// ============================================================================
// 表格行导入
// ============================================================================

/// 主数据导入请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterIngestRequest {
    /// 已解析的主数据行
    pub rows: Vec<MasterRow>,
}

/// 任务数据导入请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentIngestRequest {
    /// 已解析的任务数据行
    pub rows: Vec<AssignmentRow>,
}

/// POST /api/ingest/master
///
/// 导入主数据行（教师 × 课程 × 教学班 × 房间）。
pub async fn ingest_master(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MasterIngestRequest>,
) -> Result<Json<IngestReport>, ApiError> {
    info!("收到主数据导入请求，共 {} 行", request.rows.len());

    if request.rows.is_empty() {
        return Err(ApiError::BadRequest("导入数据为空".to_string()));
    }

    let report = Ingestor::new(state.pool())
        .ingest_master(&request.rows)
        .await?;
    Ok(Json(report))
}

/// POST /api/ingest/assignments
///
/// 导入任务数据行（教师 × 课程 × 教学班 × 每周节数）。
pub async fn ingest_assignments(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AssignmentIngestRequest>,
) -> Result<Json<IngestReport>, ApiError> {
    info!("收到任务数据导入请求，共 {} 行", request.rows.len());

    if request.rows.is_empty() {
        return Err(ApiError::BadRequest("导入数据为空".to_string()));
    }

    let report = Ingestor::new(state.pool())
        .ingest_assignments(&request.rows)
        .await?;
    Ok(Json(report))
}
