// ============================================================================
// 时间网格单元测试
// ============================================================================
// 本测试模块验证星期、课段类型与候选节次计算的正确性
//
// 测试覆盖：
// 1. 星期与课段类型的存储名称往返解析
// 2. 周四保留时段的判定
// 3. 各课段类型的候选节次边界
// 4. 实验课结束节次上限
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::models::{
        candidate_periods, lab_end_limit, restricted_tutorial_periods, Cohort, DayOfWeek,
        SessionType, Slot, CYCLE_DAYS, LAB_DURATION, PERIODS_PER_DAY, SLOTS_PER_WEEK,
    };

    // ========================================================================
    // 测试组 1：常量与往返解析
    // ========================================================================

    #[test]
    fn test_grid_constants() {
        assert_eq!(CYCLE_DAYS, 6);
        assert_eq!(PERIODS_PER_DAY, 7);
        assert_eq!(SLOTS_PER_WEEK, 42);
        assert_eq!(LAB_DURATION, 2);
        assert_eq!(DayOfWeek::ALL.len(), 6);
    }

    #[test]
    fn test_day_of_week_roundtrip() {
        for day in DayOfWeek::ALL {
            assert_eq!(DayOfWeek::parse(day.as_str()), Some(day));
        }
        assert_eq!(DayOfWeek::parse("SUNDAY"), None);
        assert_eq!(DayOfWeek::parse("monday"), None);
    }

    #[test]
    fn test_day_of_week_index_order() {
        assert_eq!(DayOfWeek::Monday.index(), 0);
        assert_eq!(DayOfWeek::Thursday.index(), 3);
        assert_eq!(DayOfWeek::Saturday.index(), 5);
    }

    #[test]
    fn test_session_type_roundtrip() {
        let kinds = [
            SessionType::Lecture,
            SessionType::Tutorial,
            SessionType::Lab,
            SessionType::Seminar,
            SessionType::Club,
            SessionType::Break,
            SessionType::Extracurricular,
        ];
        for kind in kinds {
            assert_eq!(SessionType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SessionType::parse("EXAM"), None);
    }

    #[test]
    fn test_session_type_classification() {
        assert!(SessionType::Lecture.is_academic());
        assert!(SessionType::Lab.is_academic());
        assert!(!SessionType::Club.is_academic());
        assert!(!SessionType::Extracurricular.is_academic());

        // CLUB 与 BREAK 不占用教室
        assert!(!SessionType::Club.occupies_classroom());
        assert!(!SessionType::Break.occupies_classroom());
        assert!(SessionType::Lecture.occupies_classroom());
        assert!(SessionType::Extracurricular.occupies_classroom());
    }

    // ========================================================================
    // 测试组 2：时间槽位与保留时段
    // ========================================================================

    #[test]
    fn test_slot_validity() {
        assert!(Slot::new(DayOfWeek::Monday, 1).is_valid());
        assert!(Slot::new(DayOfWeek::Saturday, 7).is_valid());
        assert!(!Slot::new(DayOfWeek::Monday, 0).is_valid());
        assert!(!Slot::new(DayOfWeek::Monday, 8).is_valid());
    }

    #[test]
    fn test_reserved_club_slots_thursday_only() {
        // 周四第 1、7 节为保留时段
        assert!(Slot::new(DayOfWeek::Thursday, 1).is_reserved_club_slot());
        assert!(Slot::new(DayOfWeek::Thursday, 7).is_reserved_club_slot());
        assert!(!Slot::new(DayOfWeek::Thursday, 2).is_reserved_club_slot());

        // 其余天不保留
        assert!(!Slot::new(DayOfWeek::Monday, 1).is_reserved_club_slot());
        assert!(!Slot::new(DayOfWeek::Friday, 7).is_reserved_club_slot());
    }

    #[test]
    fn test_cohort_identity() {
        let a = Cohort::new(1, 10);
        let b = Cohort::new(1, 10);
        let c = Cohort::new(1, 11);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    // ========================================================================
    // 测试组 3：候选节次边界
    // ========================================================================

    #[test]
    fn test_lab_candidate_starts_weekday() {
        // 非周四：起始节次 3-6（结束节次最晚第 7 节）
        let starts = candidate_periods(DayOfWeek::Monday, SessionType::Lab);
        assert_eq!(starts, vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_lab_candidate_starts_thursday() {
        // 周四：起始节次 3-5（结束节次最晚第 6 节）
        let starts = candidate_periods(DayOfWeek::Thursday, SessionType::Lab);
        assert_eq!(starts, vec![3, 4, 5]);
    }

    #[test]
    fn test_lab_end_limit() {
        assert_eq!(lab_end_limit(DayOfWeek::Thursday), 6);
        assert_eq!(lab_end_limit(DayOfWeek::Monday), 7);
        assert_eq!(lab_end_limit(DayOfWeek::Saturday), 7);
    }

    #[test]
    fn test_lecture_candidates_exclude_thursday_reserved() {
        let weekday = candidate_periods(DayOfWeek::Monday, SessionType::Lecture);
        assert_eq!(weekday, vec![1, 2, 3, 4, 5, 6, 7]);

        let thursday = candidate_periods(DayOfWeek::Thursday, SessionType::Lecture);
        assert_eq!(thursday, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_tutorial_and_seminar_follow_lecture_rule() {
        for kind in [SessionType::Tutorial, SessionType::Seminar] {
            assert_eq!(
                candidate_periods(DayOfWeek::Thursday, kind),
                vec![2, 3, 4, 5, 6]
            );
            assert_eq!(
                candidate_periods(DayOfWeek::Friday, kind),
                vec![1, 2, 3, 4, 5, 6, 7]
            );
        }
    }

    #[test]
    fn test_club_candidates_only_thursday() {
        assert_eq!(
            candidate_periods(DayOfWeek::Thursday, SessionType::Club),
            vec![1, 7]
        );
        assert!(candidate_periods(DayOfWeek::Monday, SessionType::Club).is_empty());
    }

    #[test]
    fn test_fill_kinds_have_no_candidates() {
        assert!(candidate_periods(DayOfWeek::Monday, SessionType::Break).is_empty());
        assert!(candidate_periods(DayOfWeek::Monday, SessionType::Extracurricular).is_empty());
    }

    #[test]
    fn test_restricted_tutorial_periods() {
        assert_eq!(
            restricted_tutorial_periods(DayOfWeek::Monday),
            vec![3, 4, 5, 6]
        );
        // 周四的保留时段排除不影响 3-6 区间
        assert_eq!(
            restricted_tutorial_periods(DayOfWeek::Thursday),
            vec![3, 4, 5, 6]
        );
    }
}
