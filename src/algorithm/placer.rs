// ============================================================================
// 回溯放置器模块
// ============================================================================
// 本模块实现排课引擎的核心搜索：按优先级消费放置任务，
// 在随机化的日序与节次序上寻找可行槽位并提交
//
// 算法流程（单个任务）：
// 1. remaining 为剩余需求，重复直到 remaining = 0 或尝试次数达到上限
// 2. 用种子随机数打乱日序；逐日取该课段类型的候选节次并打乱
//    （理论课在教学班还没有第 1 节条目时把第 1 节提到队首）
// 3. 实验块询问 can_place_lab 并提交两个条目；
//    其余课段询问 can_place_single 并提交一个条目
// 4. 一整轮没有任何放置时累加回溯计数并继续（已提交的条目保留，
//    不做深度撤销）
// 5. 尝试耗尽时课程进入 failed_subjects，原因取最近一次拒绝代码
//
// 调度模型：每次生成在单一控制线程上运行；任务之间检查取消标志
// 与墙钟截止时间，超时或取消由调用方丢弃未完成的版本。
//
// 确定性：给定 (种子, 课程快照, 版本初始内容, 开关)，输出逐位一致。
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::algorithm::decomposer::build_tasks;
use crate::algorithm::types::{EntryData, PlacementTask, ScheduleState};
use crate::db::SubjectWithCohort;
use crate::models::{
    candidate_periods, restricted_tutorial_periods, Cohort, DayOfWeek, SessionType, Slot,
    CYCLE_DAYS, PERIODS_PER_DAY,
};
use crate::solver::conflict_detector::{ConstraintValidator, PlacementRejection, RejectReason};

// ============================================================================
// 引擎配置
// ============================================================================

/// 排课引擎配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// 尝试上限系数：单任务尝试上限 = 天数 × 节数 × 系数
    pub attempt_factor: u32,

    /// 墙钟预算（毫秒），超出后生成中止
    pub timeout_ms: u64,

    /// 是否在生成后插入周四社团时段
    pub include_clubs: bool,

    /// 是否把剩余空闲槽位填充为课外活动
    pub fill_extracurricular: bool,

    /// 是否把习题课限制在第 3-6 节
    pub restrict_tutorial_periods: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            attempt_factor: 2,
            timeout_ms: 30_000,
            include_clubs: true,
            fill_extracurricular: true,
            restrict_tutorial_periods: false,
        }
    }
}

impl EngineConfig {
    /// 校验配置合法性
    ///
    /// # 返回
    /// - `Ok(())`: 配置有效
    /// - `Err(String)`: 配置错误描述
    pub fn validate(&self) -> Result<(), String> {
        if self.attempt_factor == 0 {
            return Err("尝试上限系数必须大于 0".to_string());
        }
        if self.timeout_ms == 0 {
            return Err("墙钟预算必须大于 0".to_string());
        }
        Ok(())
    }

    /// 单任务的尝试次数上限
    pub fn attempt_limit(&self) -> u32 {
        CYCLE_DAYS as u32 * PERIODS_PER_DAY as u32 * self.attempt_factor
    }
}

// ============================================================================
// 取消标志
// ============================================================================

/// 生成取消标志
///
/// 跨线程共享的布尔开关；放置器在任务边界检查，
/// 命中后丢弃当前生成并返回取消结果。
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// 创建未触发的取消标志
    pub fn new() -> Self {
        Self::default()
    }

    /// 触发取消
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// 是否已触发
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// 放置器错误与报告
// ============================================================================

/// 放置器错误
///
/// 仅超时与取消通过错误通道返回；排不满属于预期结果，
/// 体现在报告的 failed_subjects 里。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlacerError {
    /// 墙钟预算耗尽
    #[error("生成超时（已耗时 {elapsed_ms} 毫秒）")]
    Timeout {
        /// 已耗时（毫秒）
        elapsed_ms: u64,
    },

    /// 外部取消
    #[error("生成被取消")]
    Cancelled,
}

/// 未排满的课程记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedSubject {
    /// 课程代码
    pub subject_code: String,
    /// 课段类型
    pub kind: SessionType,
    /// 机器可读的失败原因代码
    pub reason: String,
    /// 人类可读描述
    pub detail: String,
}

/// 生成报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    /// 本次运行提交的条目数量
    pub placed_entries: usize,
    /// 回溯计数（一整轮没有任何放置的次数）
    pub backtrack_count: u32,
    /// 未排满的课程列表
    pub failed_subjects: Vec<FailedSubject>,
}

impl GenerationReport {
    /// 是否全部排满
    pub fn is_complete(&self) -> bool {
        self.failed_subjects.is_empty()
    }
}

/// 拒绝原因的具体程度
///
/// 未排满的课程只报告一个原因；领域策略类拒绝
/// 比普通的资源占用更能说明失败的根源。
fn rejection_rank(reason: RejectReason) -> u8 {
    match reason {
        RejectReason::SingleLabPerDay => 5,
        RejectReason::LabStartTooEarly | RejectReason::LabEndsTooLate => 4,
        RejectReason::FacultyBusy | RejectReason::ClassroomBusy | RejectReason::LabroomBusy => 3,
        RejectReason::CohortBusy => 2,
        _ => 1,
    }
}

// ============================================================================
// 回溯放置器
// ============================================================================

/// 回溯放置器
///
/// 持有种子随机数生成器；同一个实例只服务一次生成请求。
pub struct SchedulerEngine {
    config: EngineConfig,
    rng: StdRng,
    seed: u64,
    backtrack_count: u32,
    failed: Vec<FailedSubject>,
}

impl SchedulerEngine {
    /// 创建新的放置器
    ///
    /// # 参数
    /// - `config`: 引擎配置
    /// - `seed`: 随机种子，相同种子产生相同结果
    ///
    /// # 返回
    /// - `Ok(SchedulerEngine)`: 创建成功
    /// - `Err(String)`: 配置无效
    pub fn new(config: EngineConfig, seed: u64) -> Result<Self, String> {
        config.validate()?;

        info!(
            "创建放置器 - 种子: {}, 尝试上限: {}, 预算: {} 毫秒",
            seed,
            config.attempt_limit(),
            config.timeout_ms
        );

        Ok(Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            seed,
            backtrack_count: 0,
            failed: Vec::new(),
        })
    }

    /// 引擎配置
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 随机种子
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// 对状态内的课程集合执行完整排课
    ///
    /// 任务之间检查取消标志与墙钟截止时间；
    /// 两个后置步骤（社团插入、课外活动填充）由配置开关控制。
    ///
    /// # 参数
    /// - `subjects`: 参与排课的课程
    /// - `state`: 目标版本的内存态课表（已有条目保留，需求抵扣）
    /// - `cancel`: 取消标志
    ///
    /// # 返回
    /// - `Ok(GenerationReport)`: 生成完成（可能有未排满的课程）
    /// - `Err(PlacerError)`: 超时或被取消，调用方应丢弃该版本
    pub fn schedule_all(
        &mut self,
        subjects: &[SubjectWithCohort],
        state: &mut ScheduleState,
        cancel: &CancelFlag,
    ) -> Result<GenerationReport, PlacerError> {
        let started = Instant::now();
        let deadline = started + Duration::from_millis(self.config.timeout_ms);
        let initial_len = state.len();

        info!("========================================");
        info!("开始排课 - 课程数: {}, 种子: {}", subjects.len(), self.seed);
        info!("========================================");

        let subject_map: HashMap<i64, &SubjectWithCohort> =
            subjects.iter().map(|s| (s.id, s)).collect();

        let tasks = build_tasks(subjects, state);
        info!("待放置任务数: {}", tasks.len());

        for (index, task) in tasks.iter().enumerate() {
            self.check_interrupted(cancel, started, deadline)?;

            let subject = match subject_map.get(&task.subject_id) {
                Some(subject) => *subject,
                None => continue,
            };

            debug!(
                "处理任务 {}/{} - {} {} x{}",
                index + 1,
                tasks.len(),
                task.subject_code,
                task.kind,
                task.remaining
            );

            self.place_task(state, subject, task);
        }

        // 后置步骤 1：周四社团时段
        if self.config.include_clubs {
            self.check_interrupted(cancel, started, deadline)?;
            self.insert_clubs(state, subjects);
        }

        // 后置步骤 2：空闲槽位填充
        if self.config.fill_extracurricular {
            self.check_interrupted(cancel, started, deadline)?;
            self.fill_extracurricular(state, subjects);
        }

        let report = GenerationReport {
            placed_entries: state.len() - initial_len,
            backtrack_count: self.backtrack_count,
            failed_subjects: self.failed.clone(),
        };

        info!(
            "排课完成 - 提交条目: {}, 回溯: {}, 未排满课程: {}",
            report.placed_entries,
            report.backtrack_count,
            report.failed_subjects.len()
        );

        Ok(report)
    }

    /// 任务边界的中断检查
    fn check_interrupted(
        &self,
        cancel: &CancelFlag,
        started: Instant,
        deadline: Instant,
    ) -> Result<(), PlacerError> {
        if cancel.is_cancelled() {
            warn!("生成在任务边界被取消");
            return Err(PlacerError::Cancelled);
        }
        if Instant::now() >= deadline {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            warn!("生成超出墙钟预算，已耗时 {} 毫秒", elapsed_ms);
            return Err(PlacerError::Timeout { elapsed_ms });
        }
        Ok(())
    }

    /// 放置单个任务
    fn place_task(
        &mut self,
        state: &mut ScheduleState,
        subject: &SubjectWithCohort,
        task: &PlacementTask,
    ) {
        // 资源缺失的课程立即失败
        if task.kind == SessionType::Lab && subject.labroom_id.is_none() {
            warn!("课程 {} 未配置实验室，跳过", task.subject_code);
            self.failed.push(FailedSubject {
                subject_code: task.subject_code.clone(),
                kind: task.kind,
                reason: RejectReason::NoLabRoom.code().to_string(),
                detail: "课程未配置实验室".to_string(),
            });
            return;
        }
        if task.kind != SessionType::Lab && subject.classroom_id.is_none() {
            warn!("课程 {} 未配置教室，跳过", task.subject_code);
            self.failed.push(FailedSubject {
                subject_code: task.subject_code.clone(),
                kind: task.kind,
                reason: RejectReason::NoClassroom.code().to_string(),
                detail: "课程未配置教室".to_string(),
            });
            return;
        }

        let cohort = subject.cohort();
        let limit = self.config.attempt_limit();
        let mut remaining = task.remaining;
        let mut attempts: u32 = 0;
        let mut reported_rejection: Option<PlacementRejection> = None;

        while remaining > 0 && attempts < limit {
            attempts += 1;

            let mut days = DayOfWeek::ALL.to_vec();
            days.shuffle(&mut self.rng);

            let mut placed_this_round = false;

            'day: for day in days {
                let periods = self.shuffled_periods(state, cohort, day, task.kind);

                for period in periods {
                    let result = if task.kind == SessionType::Lab {
                        ConstraintValidator::new(state).can_place_lab(
                            cohort,
                            subject.faculty_id,
                            subject.labroom_id.unwrap_or_default(),
                            day,
                            period,
                            None,
                        )
                    } else {
                        ConstraintValidator::new(state).can_place_single(
                            cohort,
                            subject.faculty_id,
                            subject.classroom_id.unwrap_or_default(),
                            day,
                            period,
                            task.kind,
                            None,
                        )
                    };

                    match result {
                        Ok(()) => {
                            self.commit_placement(state, subject, task.kind, day, period);
                            remaining -= 1;
                            placed_this_round = true;
                            break 'day;
                        }
                        Err(rejection) => {
                            // 保留最具体的拒绝原因用于报告
                            let keep = reported_rejection
                                .as_ref()
                                .map(|kept| {
                                    rejection_rank(rejection.reason) >= rejection_rank(kept.reason)
                                })
                                .unwrap_or(true);
                            if keep {
                                reported_rejection = Some(rejection);
                            }
                        }
                    }
                }
            }

            // 一整轮没有任何放置：累加回溯计数，保留已提交条目继续
            if !placed_this_round {
                self.backtrack_count += 1;
            }
        }

        if remaining > 0 {
            let (reason, detail) = match reported_rejection {
                Some(rejection) => (rejection.reason.code().to_string(), rejection.message),
                None => (
                    RejectReason::AttemptsExhausted.code().to_string(),
                    format!("尝试 {} 次后仍有 {} 个需求未放置", attempts, remaining),
                ),
            };

            warn!(
                "课程 {} 的 {} 未排满，剩余 {} - 原因: {}",
                task.subject_code, task.kind, remaining, reason
            );

            self.failed.push(FailedSubject {
                subject_code: task.subject_code.clone(),
                kind: task.kind,
                reason,
                detail,
            });
        }
    }

    /// 取该课段类型当天的候选节次并洗牌
    ///
    /// 理论课带轻度头部偏置：教学班本周还没有第 1 节条目时，
    /// 把第 1 节提到队首，使每个教学班尽量获得一次第 1 节课。
    fn shuffled_periods(
        &mut self,
        state: &ScheduleState,
        cohort: Cohort,
        day: DayOfWeek,
        kind: SessionType,
    ) -> Vec<u8> {
        let mut periods = if kind == SessionType::Tutorial && self.config.restrict_tutorial_periods
        {
            restricted_tutorial_periods(day)
        } else {
            candidate_periods(day, kind)
        };

        periods.shuffle(&mut self.rng);

        if kind == SessionType::Lecture
            && !state.cohort_has_first_period(cohort.year_section_id)
        {
            if let Some(pos) = periods.iter().position(|&p| p == 1) {
                periods.swap(0, pos);
            }
        }

        periods
    }

    /// 提交一次放置
    fn commit_placement(
        &self,
        state: &mut ScheduleState,
        subject: &SubjectWithCohort,
        kind: SessionType,
        day: DayOfWeek,
        period: u8,
    ) {
        let cohort = subject.cohort();

        if kind == SessionType::Lab {
            // 实验块提交两个连续条目
            for offset in 0..crate::models::LAB_DURATION {
                state.add_entry(EntryData {
                    id: None,
                    slot: Slot::new(day, period + offset),
                    cohort,
                    subject_id: Some(subject.id),
                    faculty_id: Some(subject.faculty_id),
                    classroom_id: None,
                    labroom_id: subject.labroom_id,
                    session_type: SessionType::Lab,
                    is_locked: false,
                });
            }
            debug!(
                "提交实验块: {} {} P{}-P{}",
                subject.code,
                day,
                period,
                period + 1
            );
        } else {
            state.add_entry(EntryData {
                id: None,
                slot: Slot::new(day, period),
                cohort,
                subject_id: Some(subject.id),
                faculty_id: Some(subject.faculty_id),
                classroom_id: subject.classroom_id,
                labroom_id: None,
                session_type: kind,
                is_locked: false,
            });
            debug!("提交课段: {} {} {} P{}", subject.code, kind, day, period);
        }
    }

    /// 课程集合覆盖的教学班，按 year_section_id 升序（保证确定性）
    fn sorted_cohorts(subjects: &[SubjectWithCohort]) -> Vec<Cohort> {
        let mut cohorts: Vec<Cohort> = Vec::new();
        for subject in subjects {
            let cohort = subject.cohort();
            if !cohorts.contains(&cohort) {
                cohorts.push(cohort);
            }
        }
        cohorts.sort_by_key(|c| c.year_section_id);
        cohorts
    }

    /// 后置步骤：为每个教学班在周四第 1、7 节插入社团时段
    ///
    /// 槽位已被占用时跳过；社团条目不占用教师和教室。
    fn insert_clubs(&mut self, state: &mut ScheduleState, subjects: &[SubjectWithCohort]) {
        let mut inserted = 0;

        for cohort in Self::sorted_cohorts(subjects) {
            for period in candidate_periods(DayOfWeek::Thursday, SessionType::Club) {
                if state.cohort_slot_occupied(
                    cohort.year_section_id,
                    DayOfWeek::Thursday,
                    period,
                    None,
                ) {
                    continue;
                }

                state.add_entry(EntryData {
                    id: None,
                    slot: Slot::new(DayOfWeek::Thursday, period),
                    cohort,
                    subject_id: None,
                    faculty_id: None,
                    classroom_id: None,
                    labroom_id: None,
                    session_type: SessionType::Club,
                    is_locked: false,
                });
                inserted += 1;
            }
        }

        info!("社团时段插入完成，共 {} 个条目", inserted);
    }

    /// 后置步骤：把剩余空闲槽位填充为课外活动
    ///
    /// 第 1 节保持空闲（保留第一节的学术用途），
    /// 周四保留时段不填充。
    fn fill_extracurricular(&mut self, state: &mut ScheduleState, subjects: &[SubjectWithCohort]) {
        let mut filled = 0;

        for cohort in Self::sorted_cohorts(subjects) {
            for day in DayOfWeek::ALL {
                for period in 2..=PERIODS_PER_DAY {
                    let slot = Slot::new(day, period);
                    if slot.is_reserved_club_slot() {
                        continue;
                    }
                    if state.cohort_slot_occupied(cohort.year_section_id, day, period, None) {
                        continue;
                    }

                    state.add_entry(EntryData {
                        id: None,
                        slot,
                        cohort,
                        subject_id: None,
                        faculty_id: None,
                        classroom_id: None,
                        labroom_id: None,
                        session_type: SessionType::Extracurricular,
                        is_locked: false,
                    });
                    filled += 1;
                }
            }
        }

        info!("课外活动填充完成，共 {} 个条目", filled);
    }
}
