// ============================================================================
// 报表统计模块
// ============================================================================
// 本模块基于活动版本生成验证报告与运行统计
//
// 功能说明：
// - 验证报告：整表扫描的冲突按种类分组，资源 ID 解析为
//   工号 / 房间号 / 班级标识等自然标识后对外暴露；
//   每门课程的排课完成度（已排节数 / 需求节数），
//   完成度不足 1 的课程列为未排满
// - 运行统计：按课段类型的条目计数、目录实体计数、
//   教师 / 教室 / 实验室的利用率（已用槽位 / (资源数 × 42)，
//   上限 100%）
// ============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};

use crate::algorithm::types::{ScheduleState, StateError};
use crate::db::{
    BranchRepository, ClassroomRepository, EntryRepository, FacultyRepository, LabRoomRepository,
    SubjectRepository, VersionRepository, YearSectionRepository,
};
use crate::models::SLOTS_PER_WEEK;
use crate::solver::conflict_detector::{ConflictKind, ConstraintValidator};

// ============================================================================
// 报表错误
// ============================================================================

/// 报表生成错误
#[derive(Debug, Error)]
pub enum ReportError {
    /// 没有活动版本
    #[error("没有活动的课表版本")]
    NoActiveVersion,

    /// 条目数据损坏
    #[error("条目数据损坏: {0}")]
    State(#[from] StateError),

    /// 存储故障
    #[error("数据库错误")]
    Database(#[from] sqlx::Error),
}

// ============================================================================
// 验证报告
// ============================================================================

/// 对外暴露的冲突描述
///
/// resource 为自然标识（工号、房间号、班级标识），不含存储 ID。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictDescriptor {
    /// 冲突种类标签
    pub kind: String,
    /// 涉及的资源自然标识
    pub resource: String,
    /// 星期
    pub day: String,
    /// 节次
    pub period: u8,
    /// 冲突描述
    pub description: String,
}

/// 按种类分组的冲突
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictGroup {
    /// 冲突种类标签
    pub kind: String,
    /// 该种类的冲突数量
    pub count: usize,
    /// 冲突明细
    pub items: Vec<ConflictDescriptor>,
}

/// 课程排课完成度
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAllocation {
    /// 课程代码
    pub subject_code: String,
    /// 课程名称
    pub subject_name: String,
    /// 需求节数（理论 + 习题 + 实验 + 研讨）
    pub required: i64,
    /// 已排节数
    pub placed: i64,
    /// 完成度（placed / required）
    pub ratio: f64,
}

/// 验证报告
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// 课表是否有效（无冲突）
    pub is_valid: bool,
    /// 冲突总数
    pub conflict_count: usize,
    /// 按种类分组的冲突
    pub conflict_groups: Vec<ConflictGroup>,
    /// 未排满的课程（完成度 < 1）
    pub unallocated_subjects: Vec<SubjectAllocation>,
}

// ============================================================================
// 运行统计
// ============================================================================

/// 资源利用率
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUtilization {
    /// 教师利用率（百分比，上限 100）
    pub faculty: f64,
    /// 教室利用率
    pub classrooms: f64,
    /// 实验室利用率
    pub lab_rooms: f64,
}

/// 目录实体计数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityCounts {
    /// 专业数量
    pub branches: i64,
    /// 年级班级数量
    pub year_sections: i64,
    /// 在职教师数量
    pub faculty: i64,
    /// 可用教室数量
    pub classrooms: i64,
    /// 可用实验室数量
    pub lab_rooms: i64,
    /// 参与排课的课程数量
    pub subjects: i64,
}

/// 运行统计
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    /// 活动版本的条目总数（没有活动版本时为 0）
    pub total_entries: i64,
    /// 按课段类型的条目计数
    pub entries_by_type: BTreeMap<String, i64>,
    /// 目录实体计数
    pub entity_counts: EntityCounts,
    /// 资源利用率
    pub utilization: ResourceUtilization,
}

// ============================================================================
// 报表生成器
// ============================================================================

/// 报表生成器
pub struct Reporter<'a> {
    pool: &'a SqlitePool,
}

impl<'a> Reporter<'a> {
    /// 创建新的报表生成器
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// 生成活动版本的验证报告
    ///
    /// # 返回
    /// - `Ok(ValidationReport)`: 验证报告
    /// - `Err(ReportError::NoActiveVersion)`: 没有活动版本
    pub async fn validation_report(&self) -> Result<ValidationReport, ReportError> {
        info!("生成验证报告");

        let version = VersionRepository::new(self.pool)
            .get_active()
            .await?
            .ok_or(ReportError::NoActiveVersion)?;

        let rows = EntryRepository::new(self.pool)
            .find_by_version(version.id)
            .await?;
        let state = ScheduleState::from_rows(&rows)?;

        let conflicts = ConstraintValidator::new(&state).validate_schedule();
        debug!("整表扫描发现 {} 个冲突", conflicts.len());

        // 资源 ID -> 自然标识
        let labels = ResourceLabels::load(self.pool).await?;

        let mut groups: BTreeMap<String, Vec<ConflictDescriptor>> = BTreeMap::new();
        for conflict in &conflicts {
            let resource = labels.resolve(conflict.kind, conflict.resource_id);
            groups
                .entry(conflict.kind.as_str().to_string())
                .or_default()
                .push(ConflictDescriptor {
                    kind: conflict.kind.as_str().to_string(),
                    resource,
                    day: conflict.slot.day.as_str().to_string(),
                    period: conflict.slot.period,
                    description: conflict.description.clone(),
                });
        }

        let conflict_groups: Vec<ConflictGroup> = groups
            .into_iter()
            .map(|(kind, items)| ConflictGroup {
                kind,
                count: items.len(),
                items,
            })
            .collect();

        // 每门课程的完成度
        let subjects = SubjectRepository::new(self.pool)
            .find_active_with_cohort()
            .await?;

        let mut unallocated = Vec::new();
        for subject in &subjects {
            let required = subject.lectures_per_week.max(0)
                + subject.tutorials_per_week.max(0)
                + subject.lab_periods_per_week.max(0)
                + subject.seminar_periods_per_week.max(0);
            if required == 0 {
                continue;
            }

            let placed = state
                .entries()
                .iter()
                .filter(|e| e.subject_id == Some(subject.id))
                .count() as i64;

            if placed < required {
                unallocated.push(SubjectAllocation {
                    subject_code: subject.code.clone(),
                    subject_name: subject.name.clone(),
                    required,
                    placed,
                    ratio: placed as f64 / required as f64,
                });
            }
        }

        let report = ValidationReport {
            is_valid: conflicts.is_empty(),
            conflict_count: conflicts.len(),
            conflict_groups,
            unallocated_subjects: unallocated,
        };

        info!(
            "验证报告完成 - 有效: {}, 冲突: {}, 未排满课程: {}",
            report.is_valid,
            report.conflict_count,
            report.unallocated_subjects.len()
        );
        Ok(report)
    }

    /// 生成运行统计
    ///
    /// 没有活动版本时条目计数为 0，目录计数照常返回。
    pub async fn statistics(&self) -> Result<Statistics, ReportError> {
        info!("生成运行统计");

        let active = VersionRepository::new(self.pool).get_active().await?;

        let state = match &active {
            Some(version) => {
                let rows = EntryRepository::new(self.pool)
                    .find_by_version(version.id)
                    .await?;
                ScheduleState::from_rows(&rows)?
            }
            None => ScheduleState::new(),
        };

        let mut entries_by_type: BTreeMap<String, i64> = BTreeMap::new();
        for entry in state.entries() {
            *entries_by_type
                .entry(entry.session_type.as_str().to_string())
                .or_insert(0) += 1;
        }

        let entity_counts = EntityCounts {
            branches: BranchRepository::new(self.pool).find_all().await?.len() as i64,
            year_sections: YearSectionRepository::new(self.pool).find_all().await?.len() as i64,
            faculty: FacultyRepository::new(self.pool).count_active().await?,
            classrooms: ClassroomRepository::new(self.pool).count_active().await?,
            lab_rooms: LabRoomRepository::new(self.pool).count_active().await?,
            subjects: SubjectRepository::new(self.pool).count_active().await?,
        };

        let utilization = ResourceUtilization {
            faculty: utilization_percent(
                state.faculty_postings().count() as i64,
                entity_counts.faculty,
            ),
            classrooms: utilization_percent(
                state.classroom_postings().count() as i64,
                entity_counts.classrooms,
            ),
            lab_rooms: utilization_percent(
                state.labroom_postings().count() as i64,
                entity_counts.lab_rooms,
            ),
        };

        Ok(Statistics {
            total_entries: state.len() as i64,
            entries_by_type,
            entity_counts,
            utilization,
        })
    }
}

/// 利用率百分比：已用槽位 / (资源数 × 每周槽位数)，上限 100%
fn utilization_percent(used_slots: i64, resource_count: i64) -> f64 {
    if resource_count <= 0 {
        return 0.0;
    }
    let capacity = (resource_count * SLOTS_PER_WEEK as i64) as f64;
    ((used_slots as f64 / capacity) * 100.0).min(100.0)
}

// ============================================================================
// 资源标识解析
// ============================================================================

/// 资源 ID 到自然标识的映射
///
/// 冲突描述对外不暴露存储 ID；缺失的映射退化为种类前缀 + 编号。
struct ResourceLabels {
    faculty: BTreeMap<i64, String>,
    classrooms: BTreeMap<i64, String>,
    lab_rooms: BTreeMap<i64, String>,
    cohorts: BTreeMap<i64, String>,
}

impl ResourceLabels {
    async fn load(pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        let faculty = FacultyRepository::new(pool)
            .find_all()
            .await?
            .into_iter()
            .map(|f| (f.id, f.employee_id))
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

        // 教学班标识：专业代码-年级-班级
        let branches: BTreeMap<i64, String> = BranchRepository::new(pool)
            .find_all()
            .await?
            .into_iter()
            .map(|b| (b.id, b.code))
            .collect();

        let cohorts = YearSectionRepository::new(pool)
            .find_all()
            .await?
            .into_iter()
            .map(|ys| {
                let branch_code = branches
                    .get(&ys.branch_id)
                    .cloned()
                    .unwrap_or_else(|| format!("B{}", ys.branch_id));
                (ys.id, format!("{}-{}-{}", branch_code, ys.year, ys.section))
            })
            .collect();

        Ok(Self {
            faculty,
            classrooms,
            lab_rooms,
            cohorts,
        })
    }

    fn resolve(&self, kind: ConflictKind, resource_id: Option<i64>) -> String {
        let id = match resource_id {
            Some(id) => id,
            None => return "-".to_string(),
        };

        let label = match kind {
            ConflictKind::FacultyClash => self.faculty.get(&id),
            ConflictKind::ClassroomClash => self.classrooms.get(&id),
            ConflictKind::LabroomClash => self.lab_rooms.get(&id),
            _ => self.cohorts.get(&id),
        };

        label.cloned().unwrap_or_else(|| format!("#{}", id))
    }
}
