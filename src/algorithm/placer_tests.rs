// ============================================================================
// 回溯放置器单元测试
// ============================================================================
// 本测试模块验证放置器的搜索正确性与确定性
//
// 测试场景：
// 1. 最小可行场景：单课程 3 节理论课，全部落位且避开保留时段
// 2. 实验块场景：连续两节、同教师同实验室、起始节次合法
// 3. 教师共享场景：两门课共享教师，无教师冲突
// 4. 资源缺失场景：未配置教室/实验室的课程立即失败
// 5. 每天单实验块：仅一天可用时第二块失败并报告原因
// 6. 确定性：同种子两次运行输出逐位一致
// 7. 后置步骤：社团插入与课外活动填充
// 8. 取消：任务边界观察取消标志
// ============================================================================

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::algorithm::placer::{CancelFlag, EngineConfig, PlacerError, SchedulerEngine};
    use crate::algorithm::types::{EntryData, ScheduleState};
    use crate::db::SubjectWithCohort;
    use crate::models::{Cohort, DayOfWeek, SessionType, Slot};
    use crate::solver::conflict_detector::ConstraintValidator;

    /// 关闭后置步骤的基准配置
    fn bare_config() -> EngineConfig {
        EngineConfig {
            include_clubs: false,
            fill_extracurricular: false,
            ..EngineConfig::default()
        }
    }

    /// 构造课程输入行
    fn subject(
        id: i64,
        code: &str,
        year_section_id: i64,
        faculty_id: i64,
        lectures: i64,
        lab_periods: i64,
    ) -> SubjectWithCohort {
        SubjectWithCohort {
            id,
            code: code.to_string(),
            name: code.to_string(),
            branch_id: 1,
            year_section_id,
            lectures_per_week: lectures,
            tutorials_per_week: 0,
            lab_periods_per_week: lab_periods,
            seminar_periods_per_week: 0,
            faculty_id,
            classroom_id: Some(1),
            labroom_id: Some(1),
        }
    }

    /// 占位条目（用于预先占用教学班槽位）
    fn blocker(year_section_id: i64, day: DayOfWeek, period: u8) -> EntryData {
        EntryData {
            id: None,
            slot: Slot::new(day, period),
            cohort: Cohort::new(1, year_section_id),
            subject_id: None,
            faculty_id: None,
            classroom_id: None,
            labroom_id: None,
            session_type: SessionType::Extracurricular,
            is_locked: false,
        }
    }

    // ========================================================================
    // 测试组 1：基本放置
    // ========================================================================

    #[test]
    fn test_minimal_feasible_three_lectures() {
        let subjects = vec![subject(1, "CS101", 1, 1, 3, 0)];
        let mut state = ScheduleState::new();
        let mut engine = SchedulerEngine::new(bare_config(), 42).unwrap();

        let report = engine
            .schedule_all(&subjects, &mut state, &CancelFlag::new())
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.placed_entries, 3);
        assert_eq!(state.len(), 3);

        // 三个不同槽位，全部是理论课，不落在周四保留时段
        let mut slots = Vec::new();
        for entry in state.entries() {
            assert_eq!(entry.session_type, SessionType::Lecture);
            assert!(!entry.slot.is_reserved_club_slot());
            assert!(!slots.contains(&entry.slot));
            slots.push(entry.slot);
        }

        // 生成结果无任何冲突
        assert!(ConstraintValidator::new(&state).validate_schedule().is_empty());
    }

    #[test]
    fn test_lab_block_contiguity() {
        let subjects = vec![subject(1, "OSLAB", 1, 1, 0, 2)];
        let mut state = ScheduleState::new();
        let mut engine = SchedulerEngine::new(bare_config(), 7).unwrap();

        let report = engine
            .schedule_all(&subjects, &mut state, &CancelFlag::new())
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(state.len(), 2);

        let mut labs: Vec<_> = state.entries().iter().collect();
        labs.sort_by_key(|e| e.slot.period);

        let (first, second) = (labs[0], labs[1]);
        assert_eq!(first.session_type, SessionType::Lab);
        assert_eq!(second.session_type, SessionType::Lab);
        assert_eq!(first.slot.day, second.slot.day);
        assert_eq!(second.slot.period, first.slot.period + 1);
        assert!(first.slot.period >= 3);
        assert_eq!(first.faculty_id, second.faculty_id);
        assert_eq!(first.labroom_id, second.labroom_id);

        // 周四实验块不超过第 6 节
        if first.slot.day == DayOfWeek::Thursday {
            assert!(second.slot.period <= 6);
        }
    }

    #[test]
    fn test_shared_faculty_no_conflicts() {
        // 两门课共享教师，各 5 节理论课
        let subjects = vec![
            subject(1, "MATH-A", 1, 9, 5, 0),
            subject(2, "MATH-B", 2, 9, 5, 0),
        ];
        let mut state = ScheduleState::new();
        let mut engine = SchedulerEngine::new(bare_config(), 11).unwrap();

        let report = engine
            .schedule_all(&subjects, &mut state, &CancelFlag::new())
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(state.len(), 10);
        assert!(ConstraintValidator::new(&state).validate_schedule().is_empty());
    }

    // ========================================================================
    // 测试组 2：资源缺失与失败报告
    // ========================================================================

    #[test]
    fn test_missing_labroom_fails_immediately() {
        let mut lab_subject = subject(1, "OSLAB", 1, 1, 0, 2);
        lab_subject.labroom_id = None;

        let mut state = ScheduleState::new();
        let mut engine = SchedulerEngine::new(bare_config(), 3).unwrap();

        let report = engine
            .schedule_all(&[lab_subject], &mut state, &CancelFlag::new())
            .unwrap();

        assert!(state.is_empty());
        assert_eq!(report.failed_subjects.len(), 1);
        assert_eq!(report.failed_subjects[0].reason, "no-lab-room");
    }

    #[test]
    fn test_missing_classroom_fails_immediately() {
        let mut lecture_subject = subject(1, "CS101", 1, 1, 3, 0);
        lecture_subject.classroom_id = None;

        let mut state = ScheduleState::new();
        let mut engine = SchedulerEngine::new(bare_config(), 3).unwrap();

        let report = engine
            .schedule_all(&[lecture_subject], &mut state, &CancelFlag::new())
            .unwrap();

        assert!(state.is_empty());
        assert_eq!(report.failed_subjects.len(), 1);
        assert_eq!(report.failed_subjects[0].reason, "no-classroom");
    }

    #[test]
    fn test_single_lab_per_day_reported() {
        // 需求两个实验块，但只有周一的实验时段空闲：
        // 其余五天的 P3-P7 全部被预先占用
        let subjects = vec![subject(1, "CNLAB", 1, 1, 0, 4)];

        let mut state = ScheduleState::new();
        for day in DayOfWeek::ALL {
            if day == DayOfWeek::Monday {
                continue;
            }
            for period in 3..=7 {
                state.add_entry(blocker(1, day, period));
            }
        }

        let mut engine = SchedulerEngine::new(bare_config(), 5).unwrap();
        let report = engine
            .schedule_all(&subjects, &mut state, &CancelFlag::new())
            .unwrap();

        // 周一放下一个块，第二个块失败并报告单实验块限制
        let labs: Vec<_> = state
            .entries()
            .iter()
            .filter(|e| e.session_type == SessionType::Lab)
            .collect();
        assert_eq!(labs.len(), 2);
        assert!(labs.iter().all(|e| e.slot.day == DayOfWeek::Monday));

        assert_eq!(report.failed_subjects.len(), 1);
        assert_eq!(report.failed_subjects[0].reason, "single-lab-per-day");
    }

    // ========================================================================
    // 测试组 3：确定性
    // ========================================================================

    #[test]
    fn test_same_seed_identical_output() {
        let subjects = vec![
            subject(1, "CS101", 1, 1, 4, 2),
            subject(2, "CS102", 1, 2, 3, 0),
            subject(3, "CS201", 2, 1, 3, 2),
        ];

        let mut first_state = ScheduleState::new();
        SchedulerEngine::new(EngineConfig::default(), 99)
            .unwrap()
            .schedule_all(&subjects, &mut first_state, &CancelFlag::new())
            .unwrap();

        let mut second_state = ScheduleState::new();
        SchedulerEngine::new(EngineConfig::default(), 99)
            .unwrap()
            .schedule_all(&subjects, &mut second_state, &CancelFlag::new())
            .unwrap();

        assert_eq!(first_state.entries(), second_state.entries());
    }

    // ========================================================================
    // 测试组 4：后置步骤
    // ========================================================================

    #[test]
    fn test_club_insertion_on_thursday() {
        let subjects = vec![subject(1, "CS101", 1, 1, 2, 0)];
        let config = EngineConfig {
            include_clubs: true,
            fill_extracurricular: false,
            ..EngineConfig::default()
        };

        let mut state = ScheduleState::new();
        SchedulerEngine::new(config, 13)
            .unwrap()
            .schedule_all(&subjects, &mut state, &CancelFlag::new())
            .unwrap();

        let clubs: Vec<_> = state
            .entries()
            .iter()
            .filter(|e| e.session_type == SessionType::Club)
            .collect();
        assert_eq!(clubs.len(), 2);

        for club in clubs {
            assert_eq!(club.slot.day, DayOfWeek::Thursday);
            assert!(club.slot.period == 1 || club.slot.period == 7);
            assert!(club.subject_id.is_none());
            assert!(club.faculty_id.is_none());
        }
    }

    #[test]
    fn test_extracurricular_fill_leaves_first_period() {
        let subjects = vec![subject(1, "CS101", 1, 1, 2, 0)];
        let config = EngineConfig {
            include_clubs: true,
            fill_extracurricular: true,
            ..EngineConfig::default()
        };

        let mut state = ScheduleState::new();
        SchedulerEngine::new(config, 17)
            .unwrap()
            .schedule_all(&subjects, &mut state, &CancelFlag::new())
            .unwrap();

        // 第 1 节不做课外活动填充
        for entry in state.entries() {
            if entry.session_type == SessionType::Extracurricular {
                assert!(entry.slot.period >= 2);
                assert!(!entry.slot.is_reserved_club_slot());
            }
        }

        // 第 2-7 节（除周四保留时段外）全部被占用
        for day in DayOfWeek::ALL {
            for period in 2..=7u8 {
                if Slot::new(day, period).is_reserved_club_slot() {
                    continue;
                }
                assert!(
                    state.cohort_slot_occupied(1, day, period, None),
                    "槽位 {} P{} 应当被占用",
                    day,
                    period
                );
            }
        }
    }

    // ========================================================================
    // 测试组 5：取消与配置校验
    // ========================================================================

    #[test]
    fn test_cancelled_before_first_task() {
        let subjects = vec![subject(1, "CS101", 1, 1, 3, 0)];
        let mut state = ScheduleState::new();
        let mut engine = SchedulerEngine::new(bare_config(), 1).unwrap();

        let cancel = CancelFlag::new();
        cancel.cancel();

        let result = engine.schedule_all(&subjects, &mut state, &cancel);
        assert_eq!(result.unwrap_err(), PlacerError::Cancelled);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            attempt_factor: 0,
            ..EngineConfig::default()
        };
        assert!(SchedulerEngine::new(config, 1).is_err());

        let config = EngineConfig {
            timeout_ms: 0,
            ..EngineConfig::default()
        };
        assert!(SchedulerEngine::new(config, 1).is_err());
    }

    #[test]
    fn test_attempt_limit_scales_with_grid() {
        let config = EngineConfig::default();
        // 6 天 × 7 节 × 系数 2
        assert_eq!(config.attempt_limit(), 84);
    }
}
