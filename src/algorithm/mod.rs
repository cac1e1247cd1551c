// ============================================================================
// 排课引擎模块
// ============================================================================
// 本模块提供排课系统的核心引擎实现，包括：
// - 内存态课表与占用索引
// - 任务分解器（每周学时需求 -> 原子放置任务）
// - 回溯放置器（随机化搜索 + 约束预检 + 后置填充）
//
// 使用示例：
// ```rust,no_run
// use college_timetable_system::algorithm::{
//     CancelFlag, EngineConfig, ScheduleState, SchedulerEngine,
// };
//
// let mut engine = SchedulerEngine::new(EngineConfig::default(), 42).unwrap();
// let mut state = ScheduleState::new();
// let subjects = vec![];
// let report = engine
//     .schedule_all(&subjects, &mut state, &CancelFlag::new())
//     .unwrap();
// ```
// ============================================================================

pub mod decomposer;
pub mod placer;
pub mod types;


#[cfg(test)]
mod placer_tests;

// 重新导出常用类型
pub use decomposer::build_tasks;
pub use placer::{
    CancelFlag, EngineConfig, FailedSubject, GenerationReport, PlacerError, SchedulerEngine,
};
pub use types::{EntryData, PlacementTask, ScheduleState, StateError};
