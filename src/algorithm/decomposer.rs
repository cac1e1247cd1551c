// ============================================================================
// 任务分解器模块
// ============================================================================
// 本模块把课程的每周学时需求展开成按优先级排序的原子放置任务
//
// 规则：
// - 实验课需求以"块"为单位：每块 2 节，需求节数与既有条目数都
//   除以 2 向上取整后相减
// - 其余课段类型的剩余需求 = 每周需求 - 目标版本中的既有条目数，
//   因此部分重跑会从剩余需求继续而不是重复排课
// - 优先级：LAB > LECTURE > TUTORIAL > SEMINAR
// - 同优先级按课程插入顺序稳定排序，保证同种子可复现
// ============================================================================

use tracing::{debug, info};

use crate::algorithm::types::{PlacementTask, ScheduleState};
use crate::db::SubjectWithCohort;
use crate::models::{SessionType, LAB_DURATION};

/// 课段类型的放置优先级（越大越先放置）
fn priority_of(kind: SessionType) -> u8 {
    match kind {
        SessionType::Lab => 3,
        SessionType::Lecture => 2,
        SessionType::Tutorial => 1,
        _ => 0,
    }
}

/// 节数需求换算为实验块数（2 节一块，向上取整）
fn lab_blocks(periods: i64) -> u32 {
    if periods <= 0 {
        return 0;
    }
    ((periods as u32) + LAB_DURATION as u32 - 1) / LAB_DURATION as u32
}

/// 为单门课程的某个课段类型构造任务
///
/// 剩余需求为 0 时返回 None（需求为零或已经排满）。
fn task_for(
    subject: &SubjectWithCohort,
    kind: SessionType,
    state: &ScheduleState,
) -> Option<PlacementTask> {
    let existing = state.count_for_subject(subject.id, kind);

    let (remaining, duration) = if kind == SessionType::Lab {
        // 实验课以块为单位：既有条目数也换算成块
        let demanded = lab_blocks(subject.lab_periods_per_week);
        let placed = lab_blocks(existing as i64);
        (demanded.saturating_sub(placed), LAB_DURATION)
    } else {
        let demand = match kind {
            SessionType::Lecture => subject.lectures_per_week,
            SessionType::Tutorial => subject.tutorials_per_week,
            SessionType::Seminar => subject.seminar_periods_per_week,
            _ => 0,
        };
        let demand = demand.max(0) as u32;
        (demand.saturating_sub(existing as u32), 1)
    };

    if remaining == 0 {
        return None;
    }

    Some(PlacementTask {
        subject_id: subject.id,
        subject_code: subject.code.clone(),
        kind,
        remaining,
        duration,
        priority: priority_of(kind),
    })
}

/// 把课程集合展开成按优先级排序的放置任务列表
///
/// # 参数
/// - `subjects`: 参与排课的课程（按插入顺序）
/// - `state`: 目标版本的内存态课表（既有条目抵扣需求）
///
/// # 返回
/// - `Vec<PlacementTask>`: 按优先级降序、同级按插入顺序的任务列表
pub fn build_tasks(subjects: &[SubjectWithCohort], state: &ScheduleState) -> Vec<PlacementTask> {
    debug!("开始任务分解，课程数: {}", subjects.len());

    let mut tasks = Vec::new();

    for subject in subjects {
        for kind in [
            SessionType::Lab,
            SessionType::Lecture,
            SessionType::Tutorial,
            SessionType::Seminar,
        ] {
            if let Some(task) = task_for(subject, kind, state) {
                debug!(
                    "任务: {} {} x{} (时长 {})",
                    task.subject_code, task.kind, task.remaining, task.duration
                );
                tasks.push(task);
            }
        }
    }

    // 稳定排序：优先级降序，同级保持课程插入顺序
    tasks.sort_by_key(|t| std::cmp::Reverse(t.priority));

    info!("任务分解完成，共 {} 个任务", tasks.len());
    tasks
}
