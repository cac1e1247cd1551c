// ============================================================================
// 高校排课系统 Rust 库
// ============================================================================
// 本库提供高校周课表生成与调课的核心功能，可以被 HTTP 服务
// 或其他 Rust 项目使用
//
// 主要模块：
// - models    : 领域模型（时间网格、课段类型、候选节次）
// - db        : 数据访问层（实体目录、版本、条目）
// - algorithm : 排课引擎（任务分解、回溯放置）
// - solver    : 约束校验、调课编辑与报表统计
// - api       : HTTP 接口层
// - ingest    : 表格行导入规范化
//
// 使用示例：
// ```rust,no_run
// use college_timetable_system::algorithm::{
//     CancelFlag, EngineConfig, ScheduleState, SchedulerEngine,
// };
//
// // 创建放置器并对课程集合排课
// let mut engine = SchedulerEngine::new(EngineConfig::default(), 42).unwrap();
// let mut state = ScheduleState::new();
// let report = engine
//     .schedule_all(&[], &mut state, &CancelFlag::new())
//     .unwrap();
// assert!(report.is_complete());
// ```
// ============================================================================

// 模块声明
pub mod algorithm;
pub mod api;
pub mod config;
pub mod db;
pub mod ingest;
pub mod logging;
pub mod models;
pub mod solver;

// 重新导出常用类型，方便外部使用
pub use algorithm::{CancelFlag, EngineConfig, ScheduleState, SchedulerEngine};
pub use config::AppConfig;
pub use db::DatabaseManager;
pub use logging::{init_default_logging, init_logging, sanitize_sensitive_data, LogConfig};
pub use models::{DayOfWeek, SessionType, Slot};
pub use solver::{ConstraintValidator, EditEngine, Reporter};

// 版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
