// ============================================================================
// 课表视图接口
// ============================================================================
// 本模块提供活动版本的课表读取视图：
// - active_timetable : 全部条目按天分组
// - cohort_timetable : 单个教学班的条目，按 (天, 节次) 排序
//
// 视图中的资源以自然标识呈现（专业代码、工号、房间号），
// 不直接暴露存储层的行 ID 之外的内部结构。
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::api::{ApiError, AppState};
use crate::db::{
    BranchRepository, ClassroomRepository, EntryRepository, FacultyRepository, LabRoomRepository,
    SubjectRepository, TimetableEntry, VersionRepository, YearSectionRepository,
};
use crate::models::DayOfWeek;

// ============================================================================
// 视图类型
// ============================================================================

/// 课表条目视图
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    /// 条目 ID（调课操作的句柄）
    pub id: i64,
    /// 星期
    pub day: String,
    /// 节次
    pub period: i64,
    /// 专业代码
    pub branch: String,
    /// 年级
    pub year: i64,
    /// 班级
    pub section: String,
    /// 课程代码
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_code: Option<String>,
    /// 课程名称
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
    /// 教师姓名
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faculty_name: Option<String>,
    /// 房间号（教室或实验室）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    /// 课段类型
    pub session_type: String,
    /// 是否锁定
    pub is_locked: bool,
}

/// 单天的条目分组
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayGroup {
    /// 星期
    pub day: String,
    /// 该天的条目（按节次排序）
    pub entries: Vec<EntryView>,
}

/// 按天分组的课表视图
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableView {
    /// 版本 ID
    pub version_id: i64,
    /// 版本名称
    pub version_name: String,
    /// 条目总数
    pub entry_count: usize,
    /// 按周一到周六分组的条目
    pub days: Vec<DayGroup>,
}

// ============================================================================
// 自然标识解析
// ============================================================================

/// 目录查找表：行 ID 到展示字段
struct CatalogueMaps {
    branches: BTreeMap<i64, String>,
    year_sections: BTreeMap<i64, (i64, String)>,
    subjects: BTreeMap<i64, (String, String)>,
    faculty: BTreeMap<i64, String>,
    classrooms: BTreeMap<i64, String>,
    lab_rooms: BTreeMap<i64, String>,
}

impl CatalogueMaps {
    async fn load(pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        let branches = BranchRepository::new(pool)
            .find_all()
            .await?
            .into_iter()
            .map(|b| (b.id, b.code))
            .collect();

        let year_sections = YearSectionRepository::new(pool)
            .find_all()
            .await?
            .into_iter()
            .map(|ys| (ys.id, (ys.year, ys.section)))
            .collect();

        let subjects = SubjectRepository::new(pool)
            .find_all()
            .await?
            .into_iter()
            .map(|s| (s.id, (s.code, s.name)))
            .collect();

        let faculty = FacultyRepository::new(pool)
            .find_all()
            .await?
            .into_iter()
            .map(|f| (f.id, f.name))
            .collect();

        let classrooms = ClassroomRepository::new(pool)
            .find_all()
            .await?
            .into_iter()
            .map(|c| (c.id, c.room_number))
            .collect();

        let lab_rooms = LabRoomRepository::new(pool)
            .find_all()
            .await?
            .into_iter()
            .map(|l| (l.id, l.room_number))
            .collect();

        Ok(Self {
            branches,
            year_sections,
            subjects,
            faculty,
            classrooms,
            lab_rooms,
        })
    }

    fn view(&self, row: &TimetableEntry) -> EntryView {
        let (year, section) = self
            .year_sections
            .get(&row.year_section_id)
            .cloned()
            .unwrap_or((0, "?".to_string()));

        let (subject_code, subject_name) = match row.subject_id.and_then(|id| self.subjects.get(&id))
        {
            Some((code, name)) => (Some(code.clone()), Some(name.clone())),
            None => (None, None),
        };

        // 实验条目显示实验室，其余显示教室
        let room = row
            .labroom_id
            .and_then(|id| self.lab_rooms.get(&id).cloned())
            .or_else(|| {
                row.classroom_id
                    .and_then(|id| self.classrooms.get(&id).cloned())
            });

        EntryView {
            id: row.id,
            day: row.day_of_week.clone(),
            period: row.period_number,
            branch: self
                .branches
                .get(&row.branch_id)
                .cloned()
                .unwrap_or_else(|| "?".to_string()),
            year,
            section,
            subject_code,
            subject_name,
            faculty_name: row.faculty_id.and_then(|id| self.faculty.get(&id).cloned()),
            room,
            session_type: row.session_type.clone(),
            is_locked: row.is_locked != 0,
        }
    }
}

/// 按 (天序号, 节次, 条目 ID) 排序
fn sort_rows(rows: &mut [TimetableEntry]) {
    rows.sort_by_key(|row| {
        let day_index = DayOfWeek::parse(&row.day_of_week)
            .map(|d| d.index())
            .unwrap_or(usize::MAX);
        (day_index, row.period_number, row.id)
    });
}

// ============================================================================
// 处理器
// ============================================================================

/// GET /api/timetables
///
/// 活动版本的全部条目，按天分组。
pub async fn active_timetable(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TimetableView>, ApiError> {
    let version = VersionRepository::new(state.pool())
        .get_active()
        .await?
        .ok_or_else(|| ApiError::NotFound("没有活动的课表版本".to_string()))?;

    let mut rows = EntryRepository::new(state.pool())
        .find_by_version(version.id)
        .await?;
    sort_rows(&mut rows);

    let maps = CatalogueMaps::load(state.pool()).await?;

    // 按周一到周六分组，天内条目已按节次排序
    let mut days: Vec<DayGroup> = DayOfWeek::ALL
        .iter()
        .map(|day| DayGroup {
            day: day.as_str().to_string(),
            entries: Vec::new(),
        })
        .collect();

    for row in &rows {
        if let Some(day) = DayOfWeek::parse(&row.day_of_week) {
            days[day.index()].entries.push(maps.view(row));
        }
    }

    Ok(Json(TimetableView {
        version_id: version.id,
        version_name: version.name,
        entry_count: rows.len(),
        days,
    }))
}

/// GET /api/timetables/{branch}/{year}/{section}
///
/// 单个教学班的条目，按 (天, 节次) 排序。
pub async fn cohort_timetable(
    State(state): State<Arc<AppState>>,
    Path((branch_code, year, section)): Path<(String, i64, String)>,
) -> Result<Json<Vec<EntryView>>, ApiError> {
    let version = VersionRepository::new(state.pool())
        .get_active()
        .await?
        .ok_or_else(|| ApiError::NotFound("没有活动的课表版本".to_string()))?;

    let branch = BranchRepository::new(state.pool())
        .find_by_code(&branch_code.to_uppercase())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("专业 {} 不存在", branch_code)))?;

    let year_section = YearSectionRepository::new(state.pool())
        .find_by_cohort(branch.id, year, &section.to_uppercase())
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("教学班 {}-{}-{} 不存在", branch_code, year, section))
        })?;

    let mut rows = EntryRepository::new(state.pool())
        .find_by_cohort(version.id, year_section.id)
        .await?;
    sort_rows(&mut rows);

    let maps = CatalogueMaps::load(state.pool()).await?;
    let views = rows.iter().map(|row| maps.view(row)).collect();

    Ok(Json(views))
}
