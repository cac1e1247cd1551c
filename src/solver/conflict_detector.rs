// ============================================================================
// 约束校验器模块
// ============================================================================
// 本模块实现排课系统的约束校验功能，回答两类问题：
// "这个位置能不能放"（槽位级查询）与"整张课表是否有效"（整表扫描）
//
// 功能说明：
// - 槽位级查询：教学班 / 教师 / 教室 / 实验室在某槽位是否空闲
// - 组合查询：can_place_single（单节课段）与 can_place_lab（实验块）
// - 整表扫描：validate_schedule 汇总全部不变式违反
//
// 失败语义：所有查询都是全量且无副作用的，从不抛出异常；
// 否定结果携带机器可读的拒绝代码和人类可读的描述。
//
// 使用场景：
// 1. 放置器为每个候选槽位做可行性预检
// 2. 调课操作在落库前做合法性检查
// 3. 生成结束后的冲突清点与验证报告
// ============================================================================

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::algorithm::types::ScheduleState;
use crate::models::{
    candidate_periods, lab_end_limit, Cohort, DayOfWeek, SessionType, Slot, LAB_DURATION,
    PERIODS_PER_DAY,
};

// ============================================================================
// 拒绝代码
// ============================================================================

/// 放置拒绝代码
///
/// 机器可读的拒绝原因，随校验结果返回给调用方并出现在
/// 生成报告的 failed_subjects 里。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    /// 教学班在该槽位已有条目
    CohortBusy,
    /// 教师在该槽位已有条目
    FacultyBusy,
    /// 教室在该槽位已被占用
    ClassroomBusy,
    /// 实验室在该槽位已被占用
    LabroomBusy,
    /// 槽位为周四保留的社团时段
    ReservedSlot,
    /// 节次不在该课段类型的候选集合内
    PeriodNotAllowed,
    /// 节次超出网格范围
    InvalidPeriod,
    /// 实验块起始节次过早（第 1、2 节）
    LabStartTooEarly,
    /// 实验块结束节次超过当天上限
    LabEndsTooLate,
    /// 教学班当天已有实验块
    SingleLabPerDay,
    /// 课程未配置教室
    NoClassroom,
    /// 课程未配置实验室
    NoLabRoom,
    /// 尝试次数耗尽
    AttemptsExhausted,
}

impl RejectReason {
    /// 机器可读代码
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::CohortBusy => "cohort-busy",
            RejectReason::FacultyBusy => "faculty-busy",
            RejectReason::ClassroomBusy => "classroom-busy",
            RejectReason::LabroomBusy => "labroom-busy",
            RejectReason::ReservedSlot => "reserved-slot",
            RejectReason::PeriodNotAllowed => "period-not-allowed",
            RejectReason::InvalidPeriod => "invalid-period",
            RejectReason::LabStartTooEarly => "lab-start-too-early",
            RejectReason::LabEndsTooLate => "lab-ends-too-late",
            RejectReason::SingleLabPerDay => "single-lab-per-day",
            RejectReason::NoClassroom => "no-classroom",
            RejectReason::NoLabRoom => "no-lab-room",
            RejectReason::AttemptsExhausted => "attempts-exhausted",
        }
    }
}

/// 放置拒绝结果
///
/// 携带拒绝代码与人类可读描述。校验失败以值的形式返回，
/// 不是错误，调用方据此决定尝试下一个槽位或向上报告。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRejection {
    /// 拒绝代码
    pub reason: RejectReason,
    /// 人类可读描述
    pub message: String,
}

impl PlacementRejection {
    /// 创建新的拒绝结果
    pub fn new(reason: RejectReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for PlacementRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.reason.code(), self.message)
    }
}

// ============================================================================
// 冲突描述
// ============================================================================

/// 冲突种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    /// 教学班重复占用（不变式 1）
    CohortClash,
    /// 教师重复占用（不变式 2）
    FacultyClash,
    /// 教室重复占用（不变式 3）
    ClassroomClash,
    /// 实验室重复占用（不变式 4）
    LabroomClash,
    /// 实验块结构损坏（不变式 5：不成对或属性不一致）
    LabContiguity,
    /// 实验节次策略违反（不变式 6）
    LabPeriodPolicy,
    /// 每天每班多于一个实验块（不变式 7）
    MultipleLabsPerDay,
    /// 周四保留时段被非社团条目占用（不变式 8）
    ReservedSlotViolation,
}

impl ConflictKind {
    /// 冲突种类标签
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::CohortClash => "COHORT_CLASH",
            ConflictKind::FacultyClash => "FACULTY_CLASH",
            ConflictKind::ClassroomClash => "CLASSROOM_CLASH",
            ConflictKind::LabroomClash => "LABROOM_CLASH",
            ConflictKind::LabContiguity => "LAB_CONTIGUITY",
            ConflictKind::LabPeriodPolicy => "LAB_PERIOD_POLICY",
            ConflictKind::MultipleLabsPerDay => "MULTIPLE_LABS_PER_DAY",
            ConflictKind::ReservedSlotViolation => "RESERVED_SLOT_VIOLATION",
        }
    }
}

/// 冲突描述
///
/// 整表扫描的输出单元：冲突种类、涉及的资源、槽位与描述。
/// resource_id 是目录实体的内部引用，上层报告负责把它
/// 解析成工号、房间号等自然标识后再对外暴露。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictInfo {
    /// 冲突种类
    pub kind: ConflictKind,
    /// 涉及的资源 ID（教学班冲突为 year_section_id）
    pub resource_id: Option<i64>,
    /// 时间槽位
    pub slot: Slot,
    /// 冲突描述
    pub description: String,
}

// ============================================================================
// 约束校验器
// ============================================================================

/// 约束校验器
///
/// 针对一个版本的内存态课表回答可行性查询。
/// 校验器本身无状态，随用随建。
pub struct ConstraintValidator<'a> {
    state: &'a ScheduleState,
}

impl<'a> ConstraintValidator<'a> {
    /// 创建新的校验器
    ///
    /// # 参数
    /// - `state`: 要查询的版本内存态课表
    pub fn new(state: &'a ScheduleState) -> Self {
        Self { state }
    }

    /// 教学班在槽位上是否空闲（不变式 1）
    pub fn cohort_slot_free(
        &self,
        year_section_id: i64,
        day: DayOfWeek,
        period: u8,
        exclude: Option<i64>,
    ) -> bool {
        !self
            .state
            .cohort_slot_occupied(year_section_id, day, period, exclude)
    }

    /// 教师在槽位上是否空闲（不变式 2）
    pub fn faculty_free(
        &self,
        faculty_id: i64,
        day: DayOfWeek,
        period: u8,
        exclude: Option<i64>,
    ) -> bool {
        !self.state.faculty_occupied(faculty_id, day, period, exclude)
    }

    /// 教室在槽位上是否空闲（不变式 3，CLUB/BREAK 条目不计入占用）
    pub fn classroom_free(
        &self,
        classroom_id: i64,
        day: DayOfWeek,
        period: u8,
        exclude: Option<i64>,
    ) -> bool {
        !self
            .state
            .classroom_occupied(classroom_id, day, period, exclude)
    }

    /// 实验室在槽位上是否空闲（不变式 4）
    pub fn labroom_free(
        &self,
        labroom_id: i64,
        day: DayOfWeek,
        period: u8,
        exclude: Option<i64>,
    ) -> bool {
        !self.state.labroom_occupied(labroom_id, day, period, exclude)
    }

    /// 教学班当天是否已有实验块（不变式 7）
    pub fn has_lab_on_day(
        &self,
        year_section_id: i64,
        day: DayOfWeek,
        exclude: Option<i64>,
    ) -> bool {
        self.state.lab_on_day(year_section_id, day, exclude)
    }

    /// 单节课段（理论课 / 习题课 / 研讨课）的组合可行性检查
    ///
    /// 依次验证：节次范围、候选节次集合（含周四保留时段）、
    /// 教学班空闲、教师空闲、教室空闲。
    ///
    /// # 参数
    /// - `cohort`: 教学班标识
    /// - `faculty_id`: 教师 ID
    /// - `classroom_id`: 教室 ID
    /// - `day`: 星期
    /// - `period`: 节次
    /// - `kind`: 课段类型（LECTURE / TUTORIAL / SEMINAR）
    /// - `exclude`: 检查时排除的条目 ID（调课移动时排除自身）
    ///
    /// # 返回
    /// - `Ok(())`: 可以放置
    /// - `Err(PlacementRejection)`: 拒绝原因
    pub fn can_place_single(
        &self,
        cohort: Cohort,
        faculty_id: i64,
        classroom_id: i64,
        day: DayOfWeek,
        period: u8,
        kind: SessionType,
        exclude: Option<i64>,
    ) -> Result<(), PlacementRejection> {
        trace!(
            "单节课段可行性检查: 班级 {} {} P{} ({})",
            cohort.year_section_id,
            day,
            period,
            kind
        );

        if !(1..=PERIODS_PER_DAY).contains(&period) {
            return Err(PlacementRejection::new(
                RejectReason::InvalidPeriod,
                format!("节次 {} 超出 1-{} 范围", period, PERIODS_PER_DAY),
            ));
        }

        let slot = Slot::new(day, period);
        if slot.is_reserved_club_slot() {
            return Err(PlacementRejection::new(
                RejectReason::ReservedSlot,
                format!("{} 为周四保留的社团时段", slot),
            ));
        }

        if !candidate_periods(day, kind).contains(&period) {
            return Err(PlacementRejection::new(
                RejectReason::PeriodNotAllowed,
                format!("{} 不在 {} 的候选节次内", slot, kind),
            ));
        }

        if !self.cohort_slot_free(cohort.year_section_id, day, period, exclude) {
            return Err(PlacementRejection::new(
                RejectReason::CohortBusy,
                format!("教学班在 {} 已有条目", slot),
            ));
        }

        if !self.faculty_free(faculty_id, day, period, exclude) {
            return Err(PlacementRejection::new(
                RejectReason::FacultyBusy,
                format!("教师 {} 在 {} 已有课程", faculty_id, slot),
            ));
        }

        if !self.classroom_free(classroom_id, day, period, exclude) {
            return Err(PlacementRejection::new(
                RejectReason::ClassroomBusy,
                format!("教室 {} 在 {} 已被占用", classroom_id, slot),
            ));
        }

        Ok(())
    }

    /// 实验块的组合可行性检查
    ///
    /// 依次验证：起始节次不为第 1、2 节；结束节次不超过当天上限
    /// （周四第 6 节，其余第 7 节）；教学班当天没有其他实验块；
    /// 实验块覆盖的两个节次上教学班、教师、实验室全部空闲。
    ///
    /// # 参数
    /// - `cohort`: 教学班标识
    /// - `faculty_id`: 教师 ID
    /// - `labroom_id`: 实验室 ID
    /// - `day`: 星期
    /// - `start_period`: 起始节次
    /// - `exclude`: 检查时排除的条目 ID
    ///
    /// # 返回
    /// - `Ok(())`: 可以放置
    /// - `Err(PlacementRejection)`: 拒绝原因
    pub fn can_place_lab(
        &self,
        cohort: Cohort,
        faculty_id: i64,
        labroom_id: i64,
        day: DayOfWeek,
        start_period: u8,
        exclude: Option<i64>,
    ) -> Result<(), PlacementRejection> {
        trace!(
            "实验块可行性检查: 班级 {} {} P{}-P{}",
            cohort.year_section_id,
            day,
            start_period,
            start_period + LAB_DURATION - 1
        );

        if !(1..=PERIODS_PER_DAY).contains(&start_period) {
            return Err(PlacementRejection::new(
                RejectReason::InvalidPeriod,
                format!("节次 {} 超出 1-{} 范围", start_period, PERIODS_PER_DAY),
            ));
        }

        if start_period <= 2 {
            return Err(PlacementRejection::new(
                RejectReason::LabStartTooEarly,
                format!("实验块不能从第 {} 节开始", start_period),
            ));
        }

        let end_period = start_period + LAB_DURATION - 1;
        let limit = lab_end_limit(day);
        if end_period > limit {
            return Err(PlacementRejection::new(
                RejectReason::LabEndsTooLate,
                format!(
                    "{} 的实验块最晚到第 {} 节，P{}-P{} 超出",
                    day, limit, start_period, end_period
                ),
            ));
        }

        if self.has_lab_on_day(cohort.year_section_id, day, exclude) {
            return Err(PlacementRejection::new(
                RejectReason::SingleLabPerDay,
                format!("教学班在 {} 已有实验块", day),
            ));
        }

        for period in start_period..=end_period {
            let slot = Slot::new(day, period);

            if !self.cohort_slot_free(cohort.year_section_id, day, period, exclude) {
                return Err(PlacementRejection::new(
                    RejectReason::CohortBusy,
                    format!("教学班在 {} 已有条目", slot),
                ));
            }

            if !self.faculty_free(faculty_id, day, period, exclude) {
                return Err(PlacementRejection::new(
                    RejectReason::FacultyBusy,
                    format!("教师 {} 在 {} 已有课程", faculty_id, slot),
                ));
            }

            if !self.labroom_free(labroom_id, day, period, exclude) {
                return Err(PlacementRejection::new(
                    RejectReason::LabroomBusy,
                    format!("实验室 {} 在 {} 已被占用", labroom_id, slot),
                ));
            }
        }

        Ok(())
    }

    /// 整表扫描，汇总全部不变式违反
    ///
    /// 覆盖八条不变式：四类资源唯一性、实验块成对结构、
    /// 实验节次策略、每天单实验块、周四保留时段。
    /// 输出按（槽位, 种类, 资源）排序去重，结果确定。
    ///
    /// # 返回
    /// - `Vec<ConflictInfo>`: 冲突描述列表，空列表表示课表有效
    pub fn validate_schedule(&self) -> Vec<ConflictInfo> {
        debug!("开始整表扫描，共 {} 个条目", self.state.len());

        let mut conflicts = Vec::new();

        self.collect_uniqueness_conflicts(&mut conflicts);
        self.collect_reserved_slot_conflicts(&mut conflicts);
        self.collect_lab_conflicts(&mut conflicts);

        // 排序去重，保证输出确定
        conflicts.sort_by(|a, b| {
            (a.slot, a.kind, a.resource_id).cmp(&(b.slot, b.kind, b.resource_id))
        });
        conflicts.dedup();

        debug!("整表扫描完成，发现 {} 个冲突", conflicts.len());
        conflicts
    }

    /// 四类资源的唯一性冲突（不变式 1-4）
    fn collect_uniqueness_conflicts(&self, conflicts: &mut Vec<ConflictInfo>) {
        for (&(resource_id, day, period), postings) in self.state.cohort_postings() {
            if postings.len() > 1 {
                conflicts.push(ConflictInfo {
                    kind: ConflictKind::CohortClash,
                    resource_id: Some(resource_id),
                    slot: Slot::new(day, period),
                    description: format!(
                        "教学班 {} 在 {} P{} 有 {} 个条目",
                        resource_id,
                        day,
                        period,
                        postings.len()
                    ),
                });
            }
        }

        for (&(resource_id, day, period), postings) in self.state.faculty_postings() {
            if postings.len() > 1 {
                conflicts.push(ConflictInfo {
                    kind: ConflictKind::FacultyClash,
                    resource_id: Some(resource_id),
                    slot: Slot::new(day, period),
                    description: format!(
                        "教师 {} 在 {} P{} 有 {} 个条目",
                        resource_id,
                        day,
                        period,
                        postings.len()
                    ),
                });
            }
        }

        for (&(resource_id, day, period), postings) in self.state.classroom_postings() {
            if postings.len() > 1 {
                conflicts.push(ConflictInfo {
                    kind: ConflictKind::ClassroomClash,
                    resource_id: Some(resource_id),
                    slot: Slot::new(day, period),
                    description: format!(
                        "教室 {} 在 {} P{} 有 {} 个条目",
                        resource_id,
                        day,
                        period,
                        postings.len()
                    ),
                });
            }
        }

        for (&(resource_id, day, period), postings) in self.state.labroom_postings() {
            if postings.len() > 1 {
                conflicts.push(ConflictInfo {
                    kind: ConflictKind::LabroomClash,
                    resource_id: Some(resource_id),
                    slot: Slot::new(day, period),
                    description: format!(
                        "实验室 {} 在 {} P{} 有 {} 个条目",
                        resource_id,
                        day,
                        period,
                        postings.len()
                    ),
                });
            }
        }
    }

    /// 周四保留时段冲突（不变式 8）
    fn collect_reserved_slot_conflicts(&self, conflicts: &mut Vec<ConflictInfo>) {
        for entry in self.state.entries() {
            if entry.slot.is_reserved_club_slot() && entry.session_type != SessionType::Club {
                conflicts.push(ConflictInfo {
                    kind: ConflictKind::ReservedSlotViolation,
                    resource_id: Some(entry.cohort.year_section_id),
                    slot: entry.slot,
                    description: format!(
                        "周四保留时段 {} 上出现 {} 条目",
                        entry.slot, entry.session_type
                    ),
                });
            }
        }
    }

    /// 实验块结构与策略冲突（不变式 5-7）
    ///
    /// 每个 (教学班, 星期) 的实验条目必须恰好构成一个
    /// 连续两节、课程/教师/实验室一致的块。
    fn collect_lab_conflicts(&self, conflicts: &mut Vec<ConflictInfo>) {
        for (&(year_section_id, day), postings) in self.state.lab_day_postings() {
            let mut labs: Vec<_> = postings.iter().map(|&i| &self.state.entries()[i]).collect();
            labs.sort_by_key(|e| e.slot.period);

            // 每天最多一个实验块（两节）
            if labs.len() > LAB_DURATION as usize {
                conflicts.push(ConflictInfo {
                    kind: ConflictKind::MultipleLabsPerDay,
                    resource_id: Some(year_section_id),
                    slot: labs[0].slot,
                    description: format!(
                        "教学班 {} 在 {} 有 {} 节实验课，超过一个实验块",
                        year_section_id,
                        day,
                        labs.len()
                    ),
                });
            }

            // 成对结构：偶数个条目，依次两两配对
            if labs.len() % 2 != 0 {
                conflicts.push(ConflictInfo {
                    kind: ConflictKind::LabContiguity,
                    resource_id: Some(year_section_id),
                    slot: labs[0].slot,
                    description: format!(
                        "教学班 {} 在 {} 的实验条目数量为奇数（{}）",
                        year_section_id,
                        day,
                        labs.len()
                    ),
                });
            } else {
                for pair in labs.chunks(2) {
                    let (first, second) = (pair[0], pair[1]);
                    let consecutive = second.slot.period == first.slot.period + 1;
                    let consistent = first.subject_id == second.subject_id
                        && first.faculty_id == second.faculty_id
                        && first.labroom_id == second.labroom_id;

                    if !consecutive || !consistent {
                        conflicts.push(ConflictInfo {
                            kind: ConflictKind::LabContiguity,
                            resource_id: Some(year_section_id),
                            slot: first.slot,
                            description: format!(
                                "教学班 {} 在 {} 的实验条目 P{} 与 P{} 不构成一致的连续块",
                                year_section_id, day, first.slot.period, second.slot.period
                            ),
                        });
                    }
                }
            }

            // 节次策略：起始不为第 1、2 节，结束不超过当天上限
            if let Some(first) = labs.first() {
                if first.slot.period <= 2 {
                    conflicts.push(ConflictInfo {
                        kind: ConflictKind::LabPeriodPolicy,
                        resource_id: Some(year_section_id),
                        slot: first.slot,
                        description: format!(
                            "教学班 {} 在 {} 的实验块从第 {} 节开始",
                            year_section_id, day, first.slot.period
                        ),
                    });
                }
            }
            if let Some(last) = labs.last() {
                if last.slot.period > lab_end_limit(day) {
                    conflicts.push(ConflictInfo {
                        kind: ConflictKind::LabPeriodPolicy,
                        resource_id: Some(year_section_id),
                        slot: last.slot,
                        description: format!(
                            "教学班 {} 在 {} 的实验块到第 {} 节结束，超过上限第 {} 节",
                            year_section_id,
                            day,
                            last.slot.period,
                            lab_end_limit(day)
                        ),
                    });
                }
            }
        }
    }
}
