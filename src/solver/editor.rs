// ============================================================================
// 调课编辑器模块
// ============================================================================
// 本模块实现活动版本上的增量编辑原语：锁定、移动、交换、
// 指定放置与清除非锁定条目
//
// 功能说明：
// - lock   : 翻转锁定标志，从不移动条目
// - move   : 单个条目移动到新槽位（实验条目禁止移动，保留块结构）
// - swap   : 两个非实验、非锁定条目成对交换
// - assign : 按不变式创建新条目（实验块原子地创建两节）
// - clear_unlocked : 清除全部非锁定条目，为"保留锁定重排"做准备
//
// 每个操作先加载活动版本的内存态课表并咨询约束校验器，
// 任何违反都以类型化错误中止且不触碰数据库；
// 落库通过单条语句或事务完成，不存在写一半的状态。
// ============================================================================

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::algorithm::types::{EntryData, ScheduleState, StateError};
use crate::db::{
    EntryRepository, NewEntry, SubjectRepository, TimetableEntry, TimetableVersion,
    VersionRepository, YearSectionRepository,
};
use crate::models::{candidate_periods, Cohort, DayOfWeek, SessionType, Slot, PERIODS_PER_DAY};
use crate::solver::conflict_detector::{ConstraintValidator, PlacementRejection, RejectReason};

// ============================================================================
// 编辑错误
// ============================================================================

/// 调课编辑错误
///
/// 约束违反与资源缺失是预期失败，以类型化错误返回给调用方；
/// 只有存储故障通过 Database 变体向上传播。
#[derive(Debug, Error)]
pub enum EditError {
    /// 没有活动版本
    #[error("没有活动的课表版本")]
    NoActiveVersion,

    /// 条目不存在（或不属于活动版本）
    #[error("条目 {0} 不存在")]
    EntryNotFound(i64),

    /// 条目被锁定
    #[error("条目 {0} 已锁定，不可修改")]
    EntryLocked(i64),

    /// 实验条目禁止单独移动
    #[error("实验条目禁止移动，请改用 assign 重新放置整个实验块")]
    LabMoveForbidden,

    /// 实验条目禁止参与交换
    #[error("实验条目禁止参与交换")]
    LabSwapForbidden,

    /// 约束校验拒绝
    #[error("放置被拒绝: {0}")]
    Rejected(PlacementRejection),

    /// 缺少必需的资源（课程、教室、实验室、教学班）
    #[error("缺少资源: {0}")]
    MissingResource(String),

    /// 输入不合法
    #[error("输入不合法: {0}")]
    InvalidInput(String),

    /// 条目数据损坏
    #[error("条目数据损坏: {0}")]
    State(#[from] StateError),

    /// 存储故障
    #[error("数据库错误")]
    Database(#[from] sqlx::Error),
}

/// 指定放置的输入
#[derive(Debug, Clone)]
pub struct AssignInput {
    /// 教学班（年级班级 ID）
    pub year_section_id: i64,
    /// 星期
    pub day: DayOfWeek,
    /// 节次（实验块为起始节次）
    pub period: u8,
    /// 课段类型
    pub kind: SessionType,
    /// 课程 ID（学术课段必填，CLUB/BREAK/EXTRACURRICULAR 可省略）
    pub subject_id: Option<i64>,
    /// 创建后立即锁定
    pub lock: bool,
}

// ============================================================================
// 调课编辑器
// ============================================================================

/// 调课编辑器
///
/// 所有操作针对当前活动版本执行。
pub struct EditEngine<'a> {
    pool: &'a SqlitePool,
}

impl<'a> EditEngine<'a> {
    /// 创建新的调课编辑器
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// 加载活动版本及其内存态课表
    async fn load_active(&self) -> Result<(TimetableVersion, ScheduleState), EditError> {
        let version = VersionRepository::new(self.pool)
            .get_active()
            .await?
            .ok_or(EditError::NoActiveVersion)?;

        let rows = EntryRepository::new(self.pool)
            .find_by_version(version.id)
            .await?;

        let state = ScheduleState::from_rows(&rows)?;
        Ok((version, state))
    }

    /// 翻转条目锁定标志
    ///
    /// 只改变标志位，从不移动条目。
    ///
    /// # 参数
    /// - `entry_id`: 条目 ID
    /// - `locked`: 目标锁定状态
    pub async fn lock(&self, entry_id: i64, locked: bool) -> Result<TimetableEntry, EditError> {
        info!("调课操作 lock: 条目 {} -> {}", entry_id, locked);

        let (version, state) = self.load_active().await?;
        if state.find_by_id(entry_id).is_none() {
            warn!("条目 {} 不属于活动版本 {}", entry_id, version.id);
            return Err(EditError::EntryNotFound(entry_id));
        }

        Ok(EntryRepository::new(self.pool)
            .set_locked(entry_id, locked)
            .await?)
    }

    /// 移动条目到新槽位
    ///
    /// 实验条目与锁定条目禁止移动；目标槽位不得是周四保留时段；
    /// 学术课段用 can_place_single（排除自身）校验，
    /// 无教师无教室的填充类条目只要求教学班空闲。
    ///
    /// # 参数
    /// - `entry_id`: 条目 ID
    /// - `day`: 目标星期
    /// - `period`: 目标节次
    pub async fn move_entry(
        &self,
        entry_id: i64,
        day: DayOfWeek,
        period: u8,
    ) -> Result<TimetableEntry, EditError> {
        info!("调课操作 move: 条目 {} -> {} P{}", entry_id, day, period);

        let (_, state) = self.load_active().await?;
        let entry = state
            .find_by_id(entry_id)
            .ok_or(EditError::EntryNotFound(entry_id))?;

        if entry.is_locked {
            return Err(EditError::EntryLocked(entry_id));
        }
        if entry.session_type == SessionType::Lab {
            return Err(EditError::LabMoveForbidden);
        }

        self.check_target_slot(&state, entry, day, period)?;

        Ok(EntryRepository::new(self.pool)
            .update_slot(entry_id, day.as_str(), period as i64)
            .await?)
    }

    /// 校验条目落到目标槽位的合法性（排除条目自身）
    fn check_target_slot(
        &self,
        state: &ScheduleState,
        entry: &EntryData,
        day: DayOfWeek,
        period: u8,
    ) -> Result<(), EditError> {
        let validator = ConstraintValidator::new(state);
        let exclude = entry.id;

        match (entry.faculty_id, entry.classroom_id) {
            // 学术课段：完整的组合检查
            (Some(faculty_id), Some(classroom_id)) => validator
                .can_place_single(
                    entry.cohort,
                    faculty_id,
                    classroom_id,
                    day,
                    period,
                    entry.session_type,
                    exclude,
                )
                .map_err(EditError::Rejected),
            // 填充类条目：槽位合法且教学班空闲
            _ => {
                if !(1..=PERIODS_PER_DAY).contains(&period) {
                    return Err(EditError::Rejected(PlacementRejection::new(
                        RejectReason::InvalidPeriod,
                        format!("节次 {} 超出 1-{} 范围", period, PERIODS_PER_DAY),
                    )));
                }
                let slot = Slot::new(day, period);
                if slot.is_reserved_club_slot() && entry.session_type != SessionType::Club {
                    return Err(EditError::Rejected(PlacementRejection::new(
                        RejectReason::ReservedSlot,
                        format!("{} 为周四保留的社团时段", slot),
                    )));
                }
                if !validator.cohort_slot_free(entry.cohort.year_section_id, day, period, exclude)
                {
                    return Err(EditError::Rejected(PlacementRejection::new(
                        RejectReason::CohortBusy,
                        format!("教学班在 {} 已有条目", slot),
                    )));
                }
                Ok(())
            }
        }
    }

    /// 成对交换两个条目的槽位
    ///
    /// 两个条目都必须是非实验、非锁定；每个条目落到对方槽位时
    /// 以对方为排除项做校验。两次更新在一个事务内完成。
    ///
    /// # 参数
    /// - `first_id`: 第一个条目 ID
    /// - `second_id`: 第二个条目 ID
    pub async fn swap(&self, first_id: i64, second_id: i64) -> Result<(), EditError> {
        info!("调课操作 swap: 条目 {} <-> {}", first_id, second_id);

        if first_id == second_id {
            return Err(EditError::InvalidInput("不能与自身交换".to_string()));
        }

        let (_, state) = self.load_active().await?;

        let first = state
            .find_by_id(first_id)
            .ok_or(EditError::EntryNotFound(first_id))?;
        let second = state
            .find_by_id(second_id)
            .ok_or(EditError::EntryNotFound(second_id))?;

        for entry in [first, second] {
            if entry.is_locked {
                return Err(EditError::EntryLocked(entry.id.unwrap_or_default()));
            }
            if entry.session_type == SessionType::Lab {
                return Err(EditError::LabSwapForbidden);
            }
        }

        // 每个条目的新槽位以对方为排除项校验
        self.check_swap_target(&state, first, second)?;
        self.check_swap_target(&state, second, first)?;

        EntryRepository::new(self.pool)
            .swap_slots(first_id, second_id)
            .await?;

        Ok(())
    }

    /// 校验 entry 落到 other 槽位的合法性（排除 other）
    fn check_swap_target(
        &self,
        state: &ScheduleState,
        entry: &EntryData,
        other: &EntryData,
    ) -> Result<(), EditError> {
        let validator = ConstraintValidator::new(state);
        let day = other.slot.day;
        let period = other.slot.period;

        match (entry.faculty_id, entry.classroom_id) {
            (Some(faculty_id), Some(classroom_id)) => validator
                .can_place_single(
                    entry.cohort,
                    faculty_id,
                    classroom_id,
                    day,
                    period,
                    entry.session_type,
                    other.id,
                )
                .map_err(EditError::Rejected),
            _ => {
                let slot = Slot::new(day, period);
                if slot.is_reserved_club_slot() && entry.session_type != SessionType::Club {
                    return Err(EditError::Rejected(PlacementRejection::new(
                        RejectReason::ReservedSlot,
                        format!("{} 为周四保留的社团时段", slot),
                    )));
                }
                if !validator.cohort_slot_free(
                    entry.cohort.year_section_id,
                    day,
                    period,
                    other.id,
                ) {
                    return Err(EditError::Rejected(PlacementRejection::new(
                        RejectReason::CohortBusy,
                        format!("教学班在 {} 已有条目", slot),
                    )));
                }
                Ok(())
            }
        }
    }

    /// 按不变式创建新条目
    ///
    /// 学术课段从课程行解析教师与教室/实验室；实验块原子地创建
    /// 起始节与后续节两个条目。CLUB 只能落在周四保留时段，
    /// EXTRACURRICULAR 只要求教学班空闲且不占用保留时段。
    ///
    /// # 参数
    /// - `input`: 指定放置的输入
    ///
    /// # 返回
    /// - `Ok(Vec<TimetableEntry>)`: 新建的条目（实验块为两条）
    /// - `Err(EditError)`: 校验失败或资源缺失
    pub async fn assign(&self, input: AssignInput) -> Result<Vec<TimetableEntry>, EditError> {
        info!(
            "调课操作 assign: 班级 {} {} P{} {}",
            input.year_section_id, input.day, input.period, input.kind
        );

        let (version, state) = self.load_active().await?;

        let year_section = YearSectionRepository::new(self.pool)
            .find_by_id(input.year_section_id)
            .await?
            .ok_or_else(|| {
                EditError::MissingResource(format!("教学班 {} 不存在", input.year_section_id))
            })?;
        let cohort = Cohort::new(year_section.branch_id, year_section.id);

        let drafts = match input.kind {
            SessionType::Lab => self.assign_lab_drafts(&state, cohort, &input).await?,
            SessionType::Lecture | SessionType::Tutorial | SessionType::Seminar => {
                self.assign_single_drafts(&state, cohort, &input).await?
            }
            SessionType::Club | SessionType::Break | SessionType::Extracurricular => {
                self.assign_marker_drafts(&state, cohort, &input)?
            }
        };

        let repo = EntryRepository::new(self.pool);
        let new_entries: Vec<NewEntry> = drafts.iter().map(|d| d.to_new_entry()).collect();
        repo.insert_batch(version.id, &new_entries).await?;

        // 读回落库后的行（批量写入按顺序追加在版本末尾）
        let mut rows = repo.find_by_version(version.id).await?;
        let created: Vec<TimetableEntry> = rows.split_off(rows.len() - new_entries.len());

        info!("assign 完成，创建 {} 个条目", created.len());
        Ok(created)
    }

    /// 构造实验块的两个条目草稿
    async fn assign_lab_drafts(
        &self,
        state: &ScheduleState,
        cohort: Cohort,
        input: &AssignInput,
    ) -> Result<Vec<EntryData>, EditError> {
        let subject_id = input
            .subject_id
            .ok_or_else(|| EditError::InvalidInput("实验块必须指定课程".to_string()))?;

        let subject = SubjectRepository::new(self.pool)
            .find_by_id(subject_id)
            .await?
            .ok_or_else(|| EditError::MissingResource(format!("课程 {} 不存在", subject_id)))?;

        let labroom_id = subject.labroom_id.ok_or_else(|| {
            EditError::MissingResource(format!("课程 {} 未配置实验室", subject.code))
        })?;

        ConstraintValidator::new(state)
            .can_place_lab(
                cohort,
                subject.faculty_id,
                labroom_id,
                input.day,
                input.period,
                None,
            )
            .map_err(EditError::Rejected)?;

        Ok((0..crate::models::LAB_DURATION)
            .map(|offset| EntryData {
                id: None,
                slot: Slot::new(input.day, input.period + offset),
                cohort,
                subject_id: Some(subject.id),
                faculty_id: Some(subject.faculty_id),
                classroom_id: None,
                labroom_id: Some(labroom_id),
                session_type: SessionType::Lab,
                is_locked: input.lock,
            })
            .collect())
    }

    /// 构造单节学术课段的条目草稿
    async fn assign_single_drafts(
        &self,
        state: &ScheduleState,
        cohort: Cohort,
        input: &AssignInput,
    ) -> Result<Vec<EntryData>, EditError> {
        let subject_id = input
            .subject_id
            .ok_or_else(|| EditError::InvalidInput("学术课段必须指定课程".to_string()))?;

        let subject = SubjectRepository::new(self.pool)
            .find_by_id(subject_id)
            .await?
            .ok_or_else(|| EditError::MissingResource(format!("课程 {} 不存在", subject_id)))?;

        let classroom_id = subject.classroom_id.ok_or_else(|| {
            EditError::MissingResource(format!("课程 {} 未配置教室", subject.code))
        })?;

        ConstraintValidator::new(state)
            .can_place_single(
                cohort,
                subject.faculty_id,
                classroom_id,
                input.day,
                input.period,
                input.kind,
                None,
            )
            .map_err(EditError::Rejected)?;

        Ok(vec![EntryData {
            id: None,
            slot: Slot::new(input.day, input.period),
            cohort,
            subject_id: Some(subject.id),
            faculty_id: Some(subject.faculty_id),
            classroom_id: Some(classroom_id),
            labroom_id: None,
            session_type: input.kind,
            is_locked: input.lock,
        }])
    }

    /// 构造填充类条目（CLUB / BREAK / EXTRACURRICULAR）草稿
    fn assign_marker_drafts(
        &self,
        state: &ScheduleState,
        cohort: Cohort,
        input: &AssignInput,
    ) -> Result<Vec<EntryData>, EditError> {
        if !(1..=PERIODS_PER_DAY).contains(&input.period) {
            return Err(EditError::Rejected(PlacementRejection::new(
                RejectReason::InvalidPeriod,
                format!("节次 {} 超出 1-{} 范围", input.period, PERIODS_PER_DAY),
            )));
        }

        let slot = Slot::new(input.day, input.period);

        match input.kind {
            // CLUB 只能落在周四保留时段
            SessionType::Club => {
                if !candidate_periods(input.day, SessionType::Club).contains(&input.period) {
                    return Err(EditError::Rejected(PlacementRejection::new(
                        RejectReason::PeriodNotAllowed,
                        format!("{} 不是社团时段", slot),
                    )));
                }
            }
            // 其余填充类条目不得占用保留时段
            _ => {
                if slot.is_reserved_club_slot() {
                    return Err(EditError::Rejected(PlacementRejection::new(
                        RejectReason::ReservedSlot,
                        format!("{} 为周四保留的社团时段", slot),
                    )));
                }
            }
        }

        if !ConstraintValidator::new(state).cohort_slot_free(
            cohort.year_section_id,
            input.day,
            input.period,
            None,
        ) {
            return Err(EditError::Rejected(PlacementRejection::new(
                RejectReason::CohortBusy,
                format!("教学班在 {} 已有条目", slot),
            )));
        }

        Ok(vec![EntryData {
            id: None,
            slot,
            cohort,
            subject_id: None,
            faculty_id: None,
            classroom_id: None,
            labroom_id: None,
            session_type: input.kind,
            is_locked: input.lock,
        }])
    }

    /// 清除活动版本的全部非锁定条目
    ///
    /// # 返回
    /// - `Ok(u64)`: 删除的条目数量
    pub async fn clear_unlocked(&self) -> Result<u64, EditError> {
        info!("调课操作 clear_unlocked");

        let (version, _) = self.load_active().await?;
        let removed = EntryRepository::new(self.pool)
            .delete_unlocked(version.id)
            .await?;

        debug!("版本 {} 清除了 {} 个非锁定条目", version.id, removed);
        Ok(removed)
    }
}
