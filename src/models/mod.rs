// ============================================================================
// 领域模型模块
// ============================================================================
// 本模块定义排课系统的时间网格与领域类型
//
// 模块组织：
// - mod.rs        : 时间网格常量、星期、课段类型、时间槽位、候选节次计算
// - grid_tests.rs : 时间网格单元测试
//
// 网格约定：
// - 一周 6 天（周一至周六），每天 7 节，节次编号 1-7
// - 每个教学班每周共 42 个时间槽位
// - 实验课固定占用连续 2 节
// - 周四第 1 节和第 7 节保留给社团活动
// ============================================================================

use serde::{Deserialize, Serialize};

/// 每周排课天数
pub const CYCLE_DAYS: u8 = 6;

/// 每天节次数
pub const PERIODS_PER_DAY: u8 = 7;

/// 每个教学班每周时间槽位总数
pub const SLOTS_PER_WEEK: u8 = CYCLE_DAYS * PERIODS_PER_DAY;

/// 实验课固定时长（连续节次数）
pub const LAB_DURATION: u8 = 2;

// ============================================================================
// 星期定义
// ============================================================================

/// 星期几
///
/// 排课周期覆盖周一至周六，周日不排课。
/// 数据库中以全大写英文名称存储。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayOfWeek {
    /// 全部排课日，按周内顺序排列
    pub const ALL: [DayOfWeek; 6] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
    ];

    /// 数据库存储名称
    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "MONDAY",
            DayOfWeek::Tuesday => "TUESDAY",
            DayOfWeek::Wednesday => "WEDNESDAY",
            DayOfWeek::Thursday => "THURSDAY",
            DayOfWeek::Friday => "FRIDAY",
            DayOfWeek::Saturday => "SATURDAY",
        }
    }

    /// 从数据库存储名称解析
    ///
    /// # 参数
    /// - `s`: 全大写英文星期名称
    ///
    /// # 返回
    /// - `Some(DayOfWeek)`: 解析成功
    /// - `None`: 名称不合法
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MONDAY" => Some(DayOfWeek::Monday),
            "TUESDAY" => Some(DayOfWeek::Tuesday),
            "WEDNESDAY" => Some(DayOfWeek::Wednesday),
            "THURSDAY" => Some(DayOfWeek::Thursday),
            "FRIDAY" => Some(DayOfWeek::Friday),
            "SATURDAY" => Some(DayOfWeek::Saturday),
            _ => None,
        }
    }

    /// 周内序号（0-5），用于排序
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// 课段类型定义
// ============================================================================

/// 课段类型
///
/// 表示一个课表条目的性质。CLUB/BREAK/EXTRACURRICULAR 条目
/// 可以没有课程、教师和教室。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionType {
    /// 理论课
    Lecture,
    /// 习题课
    Tutorial,
    /// 实验课（固定连续 2 节）
    Lab,
    /// 研讨课
    Seminar,
    /// 社团活动（周四保留时段）
    Club,
    /// 课间休息
    Break,
    /// 课外活动（空闲槽位填充）
    Extracurricular,
}

impl SessionType {
    /// 数据库存储名称
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Lecture => "LECTURE",
            SessionType::Tutorial => "TUTORIAL",
            SessionType::Lab => "LAB",
            SessionType::Seminar => "SEMINAR",
            SessionType::Club => "CLUB",
            SessionType::Break => "BREAK",
            SessionType::Extracurricular => "EXTRACURRICULAR",
        }
    }

    /// 从数据库存储名称解析
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LECTURE" => Some(SessionType::Lecture),
            "TUTORIAL" => Some(SessionType::Tutorial),
            "LAB" => Some(SessionType::Lab),
            "SEMINAR" => Some(SessionType::Seminar),
            "CLUB" => Some(SessionType::Club),
            "BREAK" => Some(SessionType::Break),
            "EXTRACURRICULAR" => Some(SessionType::Extracurricular),
            _ => None,
        }
    }

    /// 是否为需要教师与教学资源的学术课段
    pub fn is_academic(&self) -> bool {
        matches!(
            self,
            SessionType::Lecture | SessionType::Tutorial | SessionType::Lab | SessionType::Seminar
        )
    }

    /// 是否参与教室唯一性检查
    ///
    /// CLUB 与 BREAK 条目不占用教室资源。
    pub fn occupies_classroom(&self) -> bool {
        !matches!(self, SessionType::Club | SessionType::Break)
    }
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// 时间槽位定义
// ============================================================================

/// 时间槽位
///
/// 一个 (星期, 节次) 二元组，节次从 1 开始编号。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slot {
    /// 星期几
    pub day: DayOfWeek,
    /// 节次（1-7）
    pub period: u8,
}

impl Slot {
    /// 创建新的时间槽位
    pub fn new(day: DayOfWeek, period: u8) -> Self {
        Self { day, period }
    }

    /// 节次是否在合法范围内
    pub fn is_valid(&self) -> bool {
        self.period >= 1 && self.period <= PERIODS_PER_DAY
    }

    /// 是否为周四保留的社团时段（周四第 1 节或第 7 节）
    pub fn is_reserved_club_slot(&self) -> bool {
        self.day == DayOfWeek::Thursday && (self.period == 1 || self.period == PERIODS_PER_DAY)
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} P{}", self.day, self.period)
    }
}

// ============================================================================
// 教学班标识
// ============================================================================

/// 教学班标识
///
/// 一个 (专业, 年级班级) 组合，同一教学班共享一张周课表。
/// year_section_id 已经在 (专业, 年级, 班级) 三元组上唯一，
/// branch_id 随条目一并携带以便查询。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cohort {
    /// 专业 ID
    pub branch_id: i64,
    /// 年级班级 ID
    pub year_section_id: i64,
}

impl Cohort {
    /// 创建新的教学班标识
    pub fn new(branch_id: i64, year_section_id: i64) -> Self {
        Self {
            branch_id,
            year_section_id,
        }
    }
}

// ============================================================================
// 候选节次计算
// ============================================================================

/// 实验课在给定星期的结束节次上限
///
/// 周四实验课最晚到第 6 节（第 7 节为社团时段），其余天到第 7 节。
pub fn lab_end_limit(day: DayOfWeek) -> u8 {
    if day == DayOfWeek::Thursday {
        PERIODS_PER_DAY - 1
    } else {
        PERIODS_PER_DAY
    }
}

/// 枚举课段类型在给定星期的合法起始节次
///
/// 调用方不得在返回集合之外放置课段。
///
/// 规则：
/// - LAB: 起始节次不得为第 1、2 节；周四返回 [3,4,5]，其余天返回 [3,4,5,6]
/// - LECTURE/TUTORIAL/SEMINAR: 第 1-7 节，周四排除保留的第 1、7 节
/// - CLUB: 仅周四第 1、7 节
/// - BREAK/EXTRACURRICULAR: 不通过本函数放置，返回空集合
///
/// # 参数
/// - `day`: 星期几
/// - `kind`: 课段类型
///
/// # 返回
/// - `Vec<u8>`: 升序排列的合法起始节次列表
pub fn candidate_periods(day: DayOfWeek, kind: SessionType) -> Vec<u8> {
    match kind {
        SessionType::Lab => {
            let max_start = lab_end_limit(day) - LAB_DURATION + 1;
            (3..=max_start).collect()
        }
        SessionType::Lecture | SessionType::Tutorial | SessionType::Seminar => (1
            ..=PERIODS_PER_DAY)
            .filter(|&p| !Slot::new(day, p).is_reserved_club_slot())
            .collect(),
        SessionType::Club => {
            if day == DayOfWeek::Thursday {
                vec![1, PERIODS_PER_DAY]
            } else {
                Vec::new()
            }
        }
        SessionType::Break | SessionType::Extracurricular => Vec::new(),
    }
}

/// 习题课限制策略下的合法节次（第 3-6 节）
///
/// 仅在引擎配置开启 `restrict_tutorial_periods` 时由放置器使用。
pub fn restricted_tutorial_periods(day: DayOfWeek) -> Vec<u8> {
    candidate_periods(day, SessionType::Tutorial)
        .into_iter()
        .filter(|&p| (3..=6).contains(&p))
        .collect()
}

// 测试模块
#[cfg(test)]
mod grid_tests;
