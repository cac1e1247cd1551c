// ============================================================================
// 约束校验与调课模块
// ============================================================================
// 本模块实现排课系统的约束校验、增量调课与报表统计
//
// 模块组织：
// - conflict_detector.rs : 约束校验器，回答槽位级可行性与整表有效性
// - editor.rs            : 调课编辑器，活动版本上的锁定/移动/交换/指定/清除
// - reporter.rs          : 报表统计，验证报告与资源利用率
//
// 设计要点：
// 1. 校验器针对内存态课表工作，查询全量、无副作用、从不抛出
// 2. 否定结果携带机器可读拒绝代码（kebab-case）与人类可读描述
// 3. 调课操作先校验后落库，违反约束时不触碰数据库
// 4. 报表把内部资源 ID 解析为自然标识后才对外暴露
// ============================================================================

pub mod conflict_detector;
pub mod editor;
pub mod reporter;

// 测试模块
#[cfg(test)]
mod conflict_detector_tests;


// 重新导出核心类型
pub use conflict_detector::{
    ConflictInfo, ConflictKind, ConstraintValidator, PlacementRejection, RejectReason,
};
pub use editor::{AssignInput, EditEngine, EditError};
pub use reporter::{ReportError, Reporter, Statistics, ValidationReport};
