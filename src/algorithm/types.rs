// ============================================================================
// 排课引擎核心类型
// ============================================================================
// 本模块定义排课引擎的内存态课表与放置任务类型
//
// 主要类型：
// - EntryData     : 引擎内的课表条目（数据库行的类型化形式）
// - ScheduleState : 单个版本的内存态课表，带四类资源的占用索引
// - PlacementTask : 任务分解器输出的原子放置任务
//
// ScheduleState 是校验器与放置器的共同工作面：
// 从数据库行加载后，所有可行性查询都在内存索引上完成，
// 放置器与调课编辑器因此可以在没有存储后端的情况下做单元测试。
// ============================================================================

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{NewEntry, TimetableEntry};
use crate::models::{Cohort, DayOfWeek, SessionType, Slot};

// ============================================================================
// 引擎内课表条目
// ============================================================================

/// 引擎内的课表条目
///
/// 数据库行的类型化形式：星期与课段类型为枚举，
/// 新放置的条目在落库前 id 为 None。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryData {
    /// 数据库行 ID（尚未落库的条目为 None）
    pub id: Option<i64>,
    /// 时间槽位
    pub slot: Slot,
    /// 教学班标识
    pub cohort: Cohort,
    /// 课程 ID
    pub subject_id: Option<i64>,
    /// 教师 ID
    pub faculty_id: Option<i64>,
    /// 教室 ID
    pub classroom_id: Option<i64>,
    /// 实验室 ID
    pub labroom_id: Option<i64>,
    /// 课段类型
    pub session_type: SessionType,
    /// 是否锁定
    pub is_locked: bool,
}

/// 数据库行解析错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    /// 星期名称不合法
    #[error("非法的星期名称: {0}")]
    InvalidDay(String),

    /// 课段类型不合法
    #[error("非法的课段类型: {0}")]
    InvalidSessionType(String),

    /// 节次超出范围
    #[error("非法的节次: {0}")]
    InvalidPeriod(i64),
}

impl EntryData {
    /// 从数据库行解析引擎条目
    ///
    /// # 参数
    /// - `row`: 课表条目数据库行
    ///
    /// # 返回
    /// - `Ok(EntryData)`: 解析成功
    /// - `Err(StateError)`: 星期、课段类型或节次不合法
    pub fn from_row(row: &TimetableEntry) -> Result<Self, StateError> {
        let day = DayOfWeek::parse(&row.day_of_week)
            .ok_or_else(|| StateError::InvalidDay(row.day_of_week.clone()))?;

        let session_type = SessionType::parse(&row.session_type)
            .ok_or_else(|| StateError::InvalidSessionType(row.session_type.clone()))?;

        if !(1..=crate::models::PERIODS_PER_DAY as i64).contains(&row.period_number) {
            return Err(StateError::InvalidPeriod(row.period_number));
        }

        Ok(Self {
            id: Some(row.id),
            slot: Slot::new(day, row.period_number as u8),
            cohort: Cohort::new(row.branch_id, row.year_section_id),
            subject_id: row.subject_id,
            faculty_id: row.faculty_id,
            classroom_id: row.classroom_id,
            labroom_id: row.labroom_id,
            session_type,
            is_locked: row.is_locked != 0,
        })
    }

    /// 转换为数据库写入形式
    pub fn to_new_entry(&self) -> NewEntry {
        NewEntry {
            day_of_week: self.slot.day.as_str().to_string(),
            period_number: self.slot.period as i64,
            branch_id: self.cohort.branch_id,
            year_section_id: self.cohort.year_section_id,
            subject_id: self.subject_id,
            faculty_id: self.faculty_id,
            classroom_id: self.classroom_id,
            labroom_id: self.labroom_id,
            session_type: self.session_type.as_str().to_string(),
            is_locked: self.is_locked,
        }
    }
}

// ============================================================================
// 内存态课表
// ============================================================================

/// 资源占用索引键：(资源 ID, 星期, 节次)
pub type SlotKey = (i64, DayOfWeek, u8);

/// 单个版本的内存态课表
///
/// 条目按加入顺序保存在 entries 中，索引保存条目下标。
/// 四类资源索引分别覆盖教学班、教师、教室、实验室的占用情况，
/// 另有一个实验日索引支撑"每天每班最多一个实验块"的查询。
#[derive(Debug, Clone, Default)]
pub struct ScheduleState {
    /// 全部条目，下标即引擎内句柄
    entries: Vec<EntryData>,
    /// 教学班占用索引（year_section_id 为键）
    cohort_index: HashMap<SlotKey, Vec<usize>>,
    /// 教师占用索引
    faculty_index: HashMap<SlotKey, Vec<usize>>,
    /// 教室占用索引（CLUB/BREAK 条目不进入此索引）
    classroom_index: HashMap<SlotKey, Vec<usize>>,
    /// 实验室占用索引
    labroom_index: HashMap<SlotKey, Vec<usize>>,
    /// 实验日索引：(year_section_id, 星期) -> 实验条目下标
    lab_day_index: HashMap<(i64, DayOfWeek), Vec<usize>>,
}

impl ScheduleState {
    /// 创建空的内存态课表
    pub fn new() -> Self {
        Self::default()
    }

    /// 从数据库行批量加载
    ///
    /// # 参数
    /// - `rows`: 某个版本的全部条目行
    ///
    /// # 返回
    /// - `Ok(ScheduleState)`: 加载成功
    /// - `Err(StateError)`: 某一行解析失败
    pub fn from_rows(rows: &[TimetableEntry]) -> Result<Self, StateError> {
        let mut state = Self::new();
        for row in rows {
            let entry = EntryData::from_row(row)?;
            state.add_entry(entry);
        }
        Ok(state)
    }

    /// 加入条目并更新占用索引
    ///
    /// # 返回
    /// - `usize`: 条目在状态内的下标
    pub fn add_entry(&mut self, entry: EntryData) -> usize {
        let index = self.entries.len();
        let day = entry.slot.day;
        let period = entry.slot.period;

        self.cohort_index
            .entry((entry.cohort.year_section_id, day, period))
            .or_default()
            .push(index);

        if let Some(faculty_id) = entry.faculty_id {
            self.faculty_index
                .entry((faculty_id, day, period))
                .or_default()
                .push(index);
        }

        if let Some(classroom_id) = entry.classroom_id {
            if entry.session_type.occupies_classroom() {
                self.classroom_index
                    .entry((classroom_id, day, period))
                    .or_default()
                    .push(index);
            }
        }

        if let Some(labroom_id) = entry.labroom_id {
            self.labroom_index
                .entry((labroom_id, day, period))
                .or_default()
                .push(index);
        }

        if entry.session_type == SessionType::Lab {
            self.lab_day_index
                .entry((entry.cohort.year_section_id, day))
                .or_default()
                .push(index);
        }

        self.entries.push(entry);
        index
    }

    /// 全部条目
    pub fn entries(&self) -> &[EntryData] {
        &self.entries
    }

    /// 条目数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按数据库行 ID 查找条目
    pub fn find_by_id(&self, id: i64) -> Option<&EntryData> {
        self.entries.iter().find(|e| e.id == Some(id))
    }

    /// 索引命中判定：排除指定数据库行 ID 后是否仍有占用
    fn occupied(postings: Option<&Vec<usize>>, entries: &[EntryData], exclude: Option<i64>) -> bool {
        match postings {
            Some(indexes) => indexes.iter().any(|&i| match exclude {
                Some(id) => entries[i].id != Some(id),
                None => true,
            }),
            None => false,
        }
    }

    /// 教学班在槽位上是否已有条目（不变式 1）
    pub fn cohort_slot_occupied(
        &self,
        year_section_id: i64,
        day: DayOfWeek,
        period: u8,
        exclude: Option<i64>,
    ) -> bool {
        Self::occupied(
            self.cohort_index.get(&(year_section_id, day, period)),
            &self.entries,
            exclude,
        )
    }

    /// 教师在槽位上是否已有条目（不变式 2）
    pub fn faculty_occupied(
        &self,
        faculty_id: i64,
        day: DayOfWeek,
        period: u8,
        exclude: Option<i64>,
    ) -> bool {
        Self::occupied(
            self.faculty_index.get(&(faculty_id, day, period)),
            &self.entries,
            exclude,
        )
    }

    /// 教室在槽位上是否已被占用（不变式 3，CLUB/BREAK 不计入）
    pub fn classroom_occupied(
        &self,
        classroom_id: i64,
        day: DayOfWeek,
        period: u8,
        exclude: Option<i64>,
    ) -> bool {
        Self::occupied(
            self.classroom_index.get(&(classroom_id, day, period)),
            &self.entries,
            exclude,
        )
    }

    /// 实验室在槽位上是否已被占用（不变式 4）
    pub fn labroom_occupied(
        &self,
        labroom_id: i64,
        day: DayOfWeek,
        period: u8,
        exclude: Option<i64>,
    ) -> bool {
        Self::occupied(
            self.labroom_index.get(&(labroom_id, day, period)),
            &self.entries,
            exclude,
        )
    }

    /// 教学班当天是否已有实验块（不变式 7）
    pub fn lab_on_day(
        &self,
        year_section_id: i64,
        day: DayOfWeek,
        exclude: Option<i64>,
    ) -> bool {
        Self::occupied(
            self.lab_day_index.get(&(year_section_id, day)),
            &self.entries,
            exclude,
        )
    }

    /// 教学班本周是否已有第 1 节的条目
    ///
    /// 放置器在为理论课洗牌节次时使用：
    /// 还没有第 1 节条目的教学班优先尝试第 1 节。
    pub fn cohort_has_first_period(&self, year_section_id: i64) -> bool {
        DayOfWeek::ALL
            .iter()
            .any(|&day| self.cohort_slot_occupied(year_section_id, day, 1, None))
    }

    /// 统计某课程某课段类型的既有条目数量
    ///
    /// 任务分解器使用：部分重跑时从剩余需求继续而不是重复排课。
    pub fn count_for_subject(&self, subject_id: i64, kind: SessionType) -> usize {
        self.entries
            .iter()
            .filter(|e| e.subject_id == Some(subject_id) && e.session_type == kind)
            .count()
    }

    /// 教学班的全部条目
    pub fn entries_for_cohort(&self, year_section_id: i64) -> Vec<&EntryData> {
        self.entries
            .iter()
            .filter(|e| e.cohort.year_section_id == year_section_id)
            .collect()
    }

    /// 教学班占用索引的迭代视图（校验器整表扫描使用）
    pub fn cohort_postings(&self) -> impl Iterator<Item = (&SlotKey, &Vec<usize>)> {
        self.cohort_index.iter()
    }

    /// 教师占用索引的迭代视图
    pub fn faculty_postings(&self) -> impl Iterator<Item = (&SlotKey, &Vec<usize>)> {
        self.faculty_index.iter()
    }

    /// 教室占用索引的迭代视图
    pub fn classroom_postings(&self) -> impl Iterator<Item = (&SlotKey, &Vec<usize>)> {
        self.classroom_index.iter()
    }

    /// 实验室占用索引的迭代视图
    pub fn labroom_postings(&self) -> impl Iterator<Item = (&SlotKey, &Vec<usize>)> {
        self.labroom_index.iter()
    }

    /// 实验日索引的迭代视图
    pub fn lab_day_postings(&self) -> impl Iterator<Item = (&(i64, DayOfWeek), &Vec<usize>)> {
        self.lab_day_index.iter()
    }
}

// ============================================================================
// 放置任务
// ============================================================================

/// 原子放置任务
///
/// 任务分解器把课程的每周学时需求展开成按优先级排序的任务列表，
/// 放置器按顺序消费。remaining 对实验课以"块"为单位（一块 = 2 节）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementTask {
    /// 课程 ID
    pub subject_id: i64,
    /// 课程代码（报告使用）
    pub subject_code: String,
    /// 课段类型（LAB / LECTURE / TUTORIAL / SEMINAR）
    pub kind: SessionType,
    /// 剩余需求数量
    pub remaining: u32,
    /// 单次放置占用的连续节次数（实验课为 2，其余为 1）
    pub duration: u8,
    /// 优先级（越大越先放置）
    pub priority: u8,
}
