// ============================================================================
// 约束校验器单元测试
// ============================================================================
// 本测试模块验证槽位级查询、组合检查与整表扫描的正确性
//
// 测试覆盖：
// 1. 四类资源的空闲查询与排除语义
// 2. can_place_single 的节次范围、保留时段与资源占用检查
// 3. can_place_lab 的起始/结束节次策略与每天单实验块限制
// 4. validate_schedule 对八条不变式的整表扫描
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::algorithm::types::{EntryData, ScheduleState};
    use crate::models::{Cohort, DayOfWeek, SessionType, Slot};
    use crate::solver::conflict_detector::{ConflictKind, ConstraintValidator, RejectReason};

    const COHORT: Cohort = Cohort {
        branch_id: 1,
        year_section_id: 10,
    };

    /// 构造学术课段条目
    fn lecture(id: i64, day: DayOfWeek, period: u8, faculty: i64, classroom: i64) -> EntryData {
        EntryData {
            id: Some(id),
            slot: Slot::new(day, period),
            cohort: COHORT,
            subject_id: Some(100),
            faculty_id: Some(faculty),
            classroom_id: Some(classroom),
            labroom_id: None,
            session_type: SessionType::Lecture,
            is_locked: false,
        }
    }

    /// 构造实验条目
    fn lab(id: i64, day: DayOfWeek, period: u8, faculty: i64, labroom: i64) -> EntryData {
        EntryData {
            id: Some(id),
            slot: Slot::new(day, period),
            cohort: COHORT,
            subject_id: Some(200),
            faculty_id: Some(faculty),
            classroom_id: None,
            labroom_id: Some(labroom),
            session_type: SessionType::Lab,
            is_locked: false,
        }
    }

    /// 构造社团条目
    fn club(id: i64, period: u8) -> EntryData {
        EntryData {
            id: Some(id),
            slot: Slot::new(DayOfWeek::Thursday, period),
            cohort: COHORT,
            subject_id: None,
            faculty_id: None,
            classroom_id: None,
            labroom_id: None,
            session_type: SessionType::Club,
            is_locked: false,
        }
    }

    // ========================================================================
    // 测试组 1：槽位级查询
    // ========================================================================

    #[test]
    fn test_resource_free_queries() {
        let mut state = ScheduleState::new();
        state.add_entry(lecture(1, DayOfWeek::Monday, 2, 5, 7));

        let validator = ConstraintValidator::new(&state);

        assert!(!validator.cohort_slot_free(10, DayOfWeek::Monday, 2, None));
        assert!(validator.cohort_slot_free(10, DayOfWeek::Monday, 3, None));
        assert!(validator.cohort_slot_free(11, DayOfWeek::Monday, 2, None));

        assert!(!validator.faculty_free(5, DayOfWeek::Monday, 2, None));
        assert!(validator.faculty_free(6, DayOfWeek::Monday, 2, None));

        assert!(!validator.classroom_free(7, DayOfWeek::Monday, 2, None));
        assert!(validator.classroom_free(8, DayOfWeek::Monday, 2, None));
    }

    #[test]
    fn test_exclude_entry_semantics() {
        let mut state = ScheduleState::new();
        state.add_entry(lecture(1, DayOfWeek::Monday, 2, 5, 7));

        let validator = ConstraintValidator::new(&state);

        // 排除条目自身后槽位视为空闲（移动条目时的自检）
        assert!(validator.cohort_slot_free(10, DayOfWeek::Monday, 2, Some(1)));
        assert!(validator.faculty_free(5, DayOfWeek::Monday, 2, Some(1)));
        assert!(validator.classroom_free(7, DayOfWeek::Monday, 2, Some(1)));

        // 排除其他条目不影响结果
        assert!(!validator.cohort_slot_free(10, DayOfWeek::Monday, 2, Some(99)));
    }

    #[test]
    fn test_club_does_not_occupy_classroom() {
        let mut state = ScheduleState::new();
        let mut entry = club(1, 1);
        entry.classroom_id = Some(7);
        state.add_entry(entry);

        // CLUB 条目不计入教室占用
        let validator = ConstraintValidator::new(&state);
        assert!(validator.classroom_free(7, DayOfWeek::Thursday, 1, None));
    }

    #[test]
    fn test_has_lab_on_day() {
        let mut state = ScheduleState::new();
        state.add_entry(lab(1, DayOfWeek::Tuesday, 3, 5, 9));
        state.add_entry(lab(2, DayOfWeek::Tuesday, 4, 5, 9));

        let validator = ConstraintValidator::new(&state);
        assert!(validator.has_lab_on_day(10, DayOfWeek::Tuesday, None));
        assert!(!validator.has_lab_on_day(10, DayOfWeek::Wednesday, None));
    }

    // ========================================================================
    // 测试组 2：单节课段组合检查
    // ========================================================================

    #[test]
    fn test_can_place_single_on_free_slot() {
        let state = ScheduleState::new();
        let validator = ConstraintValidator::new(&state);

        let result = validator.can_place_single(
            COHORT,
            5,
            7,
            DayOfWeek::Monday,
            1,
            SessionType::Lecture,
            None,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_can_place_single_rejects_invalid_period() {
        let state = ScheduleState::new();
        let validator = ConstraintValidator::new(&state);

        let result = validator.can_place_single(
            COHORT,
            5,
            7,
            DayOfWeek::Monday,
            8,
            SessionType::Lecture,
            None,
        );
        assert_eq!(result.unwrap_err().reason, RejectReason::InvalidPeriod);
    }

    #[test]
    fn test_can_place_single_rejects_reserved_slot() {
        let state = ScheduleState::new();
        let validator = ConstraintValidator::new(&state);

        for period in [1u8, 7] {
            let result = validator.can_place_single(
                COHORT,
                5,
                7,
                DayOfWeek::Thursday,
                period,
                SessionType::Lecture,
                None,
            );
            assert_eq!(result.unwrap_err().reason, RejectReason::ReservedSlot);
        }
    }

    #[test]
    fn test_can_place_single_rejects_busy_resources() {
        let mut state = ScheduleState::new();
        state.add_entry(lecture(1, DayOfWeek::Monday, 2, 5, 7));

        let validator = ConstraintValidator::new(&state);

        // 同教学班
        let result = validator.can_place_single(
            COHORT,
            6,
            8,
            DayOfWeek::Monday,
            2,
            SessionType::Lecture,
            None,
        );
        assert_eq!(result.unwrap_err().reason, RejectReason::CohortBusy);

        // 其他教学班、同教师
        let other = Cohort::new(1, 11);
        let result = validator.can_place_single(
            other,
            5,
            8,
            DayOfWeek::Monday,
            2,
            SessionType::Lecture,
            None,
        );
        assert_eq!(result.unwrap_err().reason, RejectReason::FacultyBusy);

        // 其他教学班、其他教师、同教室
        let result = validator.can_place_single(
            other,
            6,
            7,
            DayOfWeek::Monday,
            2,
            SessionType::Lecture,
            None,
        );
        assert_eq!(result.unwrap_err().reason, RejectReason::ClassroomBusy);
    }

    // ========================================================================
    // 测试组 3：实验块组合检查
    // ========================================================================

    #[test]
    fn test_can_place_lab_valid_start() {
        let state = ScheduleState::new();
        let validator = ConstraintValidator::new(&state);

        for start in [3u8, 4, 5, 6] {
            assert!(validator
                .can_place_lab(COHORT, 5, 9, DayOfWeek::Monday, start, None)
                .is_ok());
        }
    }

    #[test]
    fn test_can_place_lab_rejects_early_start() {
        let state = ScheduleState::new();
        let validator = ConstraintValidator::new(&state);

        for start in [1u8, 2] {
            let result = validator.can_place_lab(COHORT, 5, 9, DayOfWeek::Monday, start, None);
            assert_eq!(result.unwrap_err().reason, RejectReason::LabStartTooEarly);
        }
    }

    #[test]
    fn test_can_place_lab_thursday_end_limit() {
        let state = ScheduleState::new();
        let validator = ConstraintValidator::new(&state);

        // 周四 P6 开始意味着到 P7 结束，超过上限
        let result = validator.can_place_lab(COHORT, 5, 9, DayOfWeek::Thursday, 6, None);
        assert_eq!(result.unwrap_err().reason, RejectReason::LabEndsTooLate);

        // 周四 P5 开始（P5-P6）合法
        assert!(validator
            .can_place_lab(COHORT, 5, 9, DayOfWeek::Thursday, 5, None)
            .is_ok());

        // 其他天 P6 开始（P6-P7）合法
        assert!(validator
            .can_place_lab(COHORT, 5, 9, DayOfWeek::Friday, 6, None)
            .is_ok());
    }

    #[test]
    fn test_can_place_lab_single_per_day() {
        let mut state = ScheduleState::new();
        state.add_entry(lab(1, DayOfWeek::Tuesday, 3, 5, 9));
        state.add_entry(lab(2, DayOfWeek::Tuesday, 4, 5, 9));

        let validator = ConstraintValidator::new(&state);

        let result = validator.can_place_lab(COHORT, 6, 8, DayOfWeek::Tuesday, 5, None);
        assert_eq!(result.unwrap_err().reason, RejectReason::SingleLabPerDay);

        // 其他天不受影响
        assert!(validator
            .can_place_lab(COHORT, 6, 8, DayOfWeek::Wednesday, 5, None)
            .is_ok());
    }

    #[test]
    fn test_can_place_lab_checks_both_periods() {
        let mut state = ScheduleState::new();
        // P4 被理论课占用
        state.add_entry(lecture(1, DayOfWeek::Monday, 4, 5, 7));

        let validator = ConstraintValidator::new(&state);

        // P3-P4 与 P4-P5 都覆盖 P4
        let result = validator.can_place_lab(COHORT, 6, 9, DayOfWeek::Monday, 3, None);
        assert_eq!(result.unwrap_err().reason, RejectReason::CohortBusy);

        let result = validator.can_place_lab(COHORT, 6, 9, DayOfWeek::Monday, 4, None);
        assert_eq!(result.unwrap_err().reason, RejectReason::CohortBusy);

        // P5-P6 不受影响
        assert!(validator
            .can_place_lab(COHORT, 6, 9, DayOfWeek::Monday, 5, None)
            .is_ok());
    }

    // ========================================================================
    // 测试组 4：整表扫描
    // ========================================================================

    #[test]
    fn test_validate_schedule_clean() {
        let mut state = ScheduleState::new();
        state.add_entry(lecture(1, DayOfWeek::Monday, 1, 5, 7));
        state.add_entry(lecture(2, DayOfWeek::Monday, 2, 5, 7));
        state.add_entry(lab(3, DayOfWeek::Tuesday, 3, 5, 9));
        state.add_entry(lab(4, DayOfWeek::Tuesday, 4, 5, 9));
        state.add_entry(club(5, 1));
        state.add_entry(club(6, 7));

        let conflicts = ConstraintValidator::new(&state).validate_schedule();
        assert!(conflicts.is_empty());
    }

    #[test]
    fn test_validate_schedule_detects_faculty_clash() {
        let mut state = ScheduleState::new();
        state.add_entry(lecture(1, DayOfWeek::Monday, 2, 5, 7));
        let mut other = lecture(2, DayOfWeek::Monday, 2, 5, 8);
        other.cohort = Cohort::new(1, 11);
        state.add_entry(other);

        let conflicts = ConstraintValidator::new(&state).validate_schedule();
        assert!(conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::FacultyClash && c.resource_id == Some(5)));
    }

    #[test]
    fn test_validate_schedule_detects_cohort_clash() {
        let mut state = ScheduleState::new();
        state.add_entry(lecture(1, DayOfWeek::Monday, 2, 5, 7));
        state.add_entry(lecture(2, DayOfWeek::Monday, 2, 6, 8));

        let conflicts = ConstraintValidator::new(&state).validate_schedule();
        assert!(conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::CohortClash && c.resource_id == Some(10)));
    }

    #[test]
    fn test_validate_schedule_detects_orphan_lab_entry() {
        let mut state = ScheduleState::new();
        // 单节孤立实验条目
        state.add_entry(lab(1, DayOfWeek::Tuesday, 3, 5, 9));

        let conflicts = ConstraintValidator::new(&state).validate_schedule();
        assert!(conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::LabContiguity));
    }

    #[test]
    fn test_validate_schedule_detects_nonconsecutive_lab() {
        let mut state = ScheduleState::new();
        state.add_entry(lab(1, DayOfWeek::Tuesday, 3, 5, 9));
        state.add_entry(lab(2, DayOfWeek::Tuesday, 5, 5, 9));

        let conflicts = ConstraintValidator::new(&state).validate_schedule();
        assert!(conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::LabContiguity));
    }

    #[test]
    fn test_validate_schedule_detects_lab_period_policy() {
        let mut state = ScheduleState::new();
        // 从第 1 节开始的实验块
        state.add_entry(lab(1, DayOfWeek::Tuesday, 1, 5, 9));
        state.add_entry(lab(2, DayOfWeek::Tuesday, 2, 5, 9));

        let conflicts = ConstraintValidator::new(&state).validate_schedule();
        assert!(conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::LabPeriodPolicy));
    }

    #[test]
    fn test_validate_schedule_detects_thursday_lab_overrun() {
        let mut state = ScheduleState::new();
        // 周四 P6-P7 的实验块（P7 超过周四上限且占用保留时段）
        state.add_entry(lab(1, DayOfWeek::Thursday, 6, 5, 9));
        state.add_entry(lab(2, DayOfWeek::Thursday, 7, 5, 9));

        let conflicts = ConstraintValidator::new(&state).validate_schedule();
        assert!(conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::LabPeriodPolicy));
        assert!(conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::ReservedSlotViolation));
    }

    #[test]
    fn test_validate_schedule_detects_multiple_labs_per_day() {
        let mut state = ScheduleState::new();
        state.add_entry(lab(1, DayOfWeek::Tuesday, 3, 5, 9));
        state.add_entry(lab(2, DayOfWeek::Tuesday, 4, 5, 9));
        // 第二个实验块使用其他教师与实验室，仍违反每天单实验块
        state.add_entry(lab(3, DayOfWeek::Tuesday, 5, 6, 8));
        state.add_entry(lab(4, DayOfWeek::Tuesday, 6, 6, 8));

        let conflicts = ConstraintValidator::new(&state).validate_schedule();
        assert!(conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::MultipleLabsPerDay));
    }

    #[test]
    fn test_validate_schedule_reserved_slot_violation() {
        let mut state = ScheduleState::new();
        state.add_entry(lecture(1, DayOfWeek::Thursday, 1, 5, 7));

        let conflicts = ConstraintValidator::new(&state).validate_schedule();
        assert!(conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::ReservedSlotViolation));
    }

    #[test]
    fn test_validate_schedule_deterministic_order() {
        let mut state = ScheduleState::new();
        state.add_entry(lecture(1, DayOfWeek::Monday, 2, 5, 7));
        state.add_entry(lecture(2, DayOfWeek::Monday, 2, 6, 8));
        state.add_entry(lecture(3, DayOfWeek::Thursday, 1, 5, 7));

        let first = ConstraintValidator::new(&state).validate_schedule();
        let second = ConstraintValidator::new(&state).validate_schedule();
        assert_eq!(first, second);
    }
}
