// ============================================================================
// 排课流程集成测试
// ============================================================================
// 本测试文件验证"建版本 -> 放置器 -> 落库 -> 报表"的完整流程
//
// 测试场景：
// 1. 最小可行：单课程 3 节理论课，三个不同槽位且避开保留时段
// 2. 实验块：连续两节、同教师同实验室、起始节次合法
// 3. 教师共享：两门课共享教师，无教师冲突
// 4. 完整一周：社团插入 + 课外活动填充后的槽位分布
// 5. 锁定保留：锁定条目在重排后留在原槽位
// 6. 可复现：同种子两次生成得到相同的条目多重集
// ============================================================================

use std::collections::BTreeSet;

use pretty_assertions::assert_eq;

use college_timetable_system::algorithm::{
    CancelFlag, EngineConfig, GenerationReport, ScheduleState, SchedulerEngine,
};
use college_timetable_system::db::migrations::MigrationManager;
use college_timetable_system::db::{
    BranchRepository, ClassroomRepository, CreateBranchInput, CreateClassroomInput,
    CreateFacultyInput, CreateLabRoomInput, CreateSubjectInput, CreateYearSectionInput,
    EntryRepository, FacultyRepository, LabRoomRepository, NewEntry, SubjectRepository,
    VersionRepository, YearSectionRepository,
};
use college_timetable_system::solver::{EditEngine, Reporter};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// 创建测试数据库连接池并执行迁移
async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("创建测试数据库失败");

    let migrations_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
    MigrationManager::new(&pool, migrations_dir)
        .await
        .expect("初始化迁移管理器失败")
        .run_migrations()
        .await
        .expect("执行迁移失败");

    pool
}

/// 课程需求描述：(代码, 教师工号, 理论节数, 实验节数)
struct SubjectFixture {
    code: &'static str,
    employee_id: &'static str,
    lectures: i64,
    lab_periods: i64,
}

/// 建立一个教学班的目录：专业 CSE、2 年级 A 班、教室 R201、实验室 CC-LAB1
async fn seed_catalogue(pool: &SqlitePool, subjects: &[SubjectFixture]) {
    let branch = BranchRepository::new(pool)
        .create(CreateBranchInput {
            code: "CSE".to_string(),
            name: "计算机科学与工程".to_string(),
        })
        .await
        .unwrap();

    YearSectionRepository::new(pool)
        .create(CreateYearSectionInput {
            branch_id: branch.id,
            year: 2,
            section: "A".to_string(),
        })
        .await
        .unwrap();

    let classroom = ClassroomRepository::new(pool)
        .create(CreateClassroomInput {
            room_number: "R201".to_string(),
            capacity: 60,
            building: None,
        })
        .await
        .unwrap();

    let labroom = LabRoomRepository::new(pool)
        .create(CreateLabRoomInput {
            room_number: "CC-LAB1".to_string(),
            lab_type: "General Lab".to_string(),
            capacity: 30,
            building: None,
        })
        .await
        .unwrap();

    let faculty_repo = FacultyRepository::new(pool);
    let subject_repo = SubjectRepository::new(pool);

    for fixture in subjects {
        let faculty = match faculty_repo.find_by_name(fixture.employee_id).await.unwrap() {
            Some(f) => f,
            None => faculty_repo
                .create(CreateFacultyInput {
                    employee_id: fixture.employee_id.to_string(),
                    name: fixture.employee_id.to_string(),
                    department: None,
                    email: None,
                })
                .await
                .unwrap(),
        };

        subject_repo
            .create(CreateSubjectInput {
                code: fixture.code.to_string(),
                name: fixture.code.to_string(),
                branch_id: branch.id,
                year: 2,
                section: "A".to_string(),
                lectures_per_week: fixture.lectures,
                tutorials_per_week: 0,
                lab_periods_per_week: fixture.lab_periods,
                seminar_periods_per_week: 0,
                faculty_id: faculty.id,
                classroom_id: Some(classroom.id),
                labroom_id: if fixture.lab_periods > 0 {
                    Some(labroom.id)
                } else {
                    None
                },
            })
            .await
            .unwrap();
    }
}

/// 完整生成流程：建版本 -> 放置器 -> 批量落库
async fn run_generation(
    pool: &SqlitePool,
    seed: u64,
    include_clubs: bool,
    fill_extracurricular: bool,
) -> (i64, GenerationReport) {
    let subjects = SubjectRepository::new(pool)
        .find_active_with_cohort()
        .await
        .unwrap();

    let version = VersionRepository::new(pool)
        .create(&format!("测试版本 (种子 {})", seed), "generated")
        .await
        .unwrap();

    let config = EngineConfig {
        include_clubs,
        fill_extracurricular,
        ..EngineConfig::default()
    };

    let mut state = ScheduleState::new();
    let report = SchedulerEngine::new(config, seed)
        .unwrap()
        .schedule_all(&subjects, &mut state, &CancelFlag::new())
        .unwrap();

    let drafts: Vec<NewEntry> = state.entries().iter().map(|e| e.to_new_entry()).collect();
    EntryRepository::new(pool)
        .insert_batch(version.id, &drafts)
        .await
        .unwrap();

    (version.id, report)
}

/// 条目的可比较形式：(天, 节次, 课程, 类型, 锁定)
fn entry_key(
    row: &college_timetable_system::db::TimetableEntry,
) -> (String, i64, Option<i64>, String, i64) {
    (
        row.day_of_week.clone(),
        row.period_number,
        row.subject_id,
        row.session_type.clone(),
        row.is_locked,
    )
}

// ============================================================================
// 场景 1：最小可行
// ============================================================================

#[tokio::test]
async fn test_minimal_feasible_generation() {
    let pool = setup_test_db().await;
    seed_catalogue(
        &pool,
        &[SubjectFixture {
            code: "CS201",
            employee_id: "F001",
            lectures: 3,
            lab_periods: 0,
        }],
    )
    .await;

    let (version_id, report) = run_generation(&pool, 42, false, false).await;
    assert!(report.is_complete());

    let rows = EntryRepository::new(&pool)
        .find_by_version(version_id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);

    let mut slots = BTreeSet::new();
    for row in &rows {
        assert_eq!(row.session_type, "LECTURE");
        // 三个不同槽位
        assert!(slots.insert((row.day_of_week.clone(), row.period_number)));
        // 不落在周四保留时段
        if row.day_of_week == "THURSDAY" {
            assert!(row.period_number != 1 && row.period_number != 7);
        }
    }

    // 验证报告无冲突、无未排满课程
    let validation = Reporter::new(&pool).validation_report().await.unwrap();
    assert!(validation.is_valid);
    assert!(validation.unallocated_subjects.is_empty());
}

// ============================================================================
// 场景 2：实验块
// ============================================================================

#[tokio::test]
async fn test_lab_block_generation() {
    let pool = setup_test_db().await;
    seed_catalogue(
        &pool,
        &[SubjectFixture {
            code: "CNLAB",
            employee_id: "F001",
            lectures: 0,
            lab_periods: 2,
        }],
    )
    .await;

    let (version_id, report) = run_generation(&pool, 7, false, false).await;
    assert!(report.is_complete());

    let mut rows = EntryRepository::new(&pool)
        .find_by_version(version_id)
        .await
        .unwrap();
    rows.sort_by_key(|r| r.period_number);
    assert_eq!(rows.len(), 2);

    // 连续两节、同天、同教师、同实验室
    assert_eq!(rows[0].day_of_week, rows[1].day_of_week);
    assert_eq!(rows[1].period_number, rows[0].period_number + 1);
    assert!(rows[0].period_number >= 3);
    assert_eq!(rows[0].faculty_id, rows[1].faculty_id);
    assert_eq!(rows[0].labroom_id, rows[1].labroom_id);
    assert!(rows[0].labroom_id.is_some());

    // 周四实验块不越过第 6 节
    if rows[0].day_of_week == "THURSDAY" {
        assert!(rows[1].period_number <= 6);
    }

    let validation = Reporter::new(&pool).validation_report().await.unwrap();
    assert!(validation.is_valid);
}

// ============================================================================
// 场景 3：教师共享
// ============================================================================

#[tokio::test]
async fn test_shared_faculty_generation() {
    let pool = setup_test_db().await;

    // 两个教学班共享一位教师需要两个年级班级；
    // 此处用同班两门课共享教师验证教师唯一性
    seed_catalogue(
        &pool,
        &[
            SubjectFixture {
                code: "MATH-A",
                employee_id: "F009",
                lectures: 5,
                lab_periods: 0,
            },
            SubjectFixture {
                code: "MATH-B",
                employee_id: "F009",
                lectures: 5,
                lab_periods: 0,
            },
        ],
    )
    .await;

    let (version_id, report) = run_generation(&pool, 11, false, false).await;
    assert!(report.is_complete());

    let rows = EntryRepository::new(&pool)
        .find_by_version(version_id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 10);

    // 教师在任意槽位最多一个条目
    let mut faculty_slots = BTreeSet::new();
    for row in &rows {
        assert!(faculty_slots.insert((
            row.faculty_id,
            row.day_of_week.clone(),
            row.period_number
        )));
    }

    let validation = Reporter::new(&pool).validation_report().await.unwrap();
    assert!(validation.is_valid);
}

// ============================================================================
// 场景 4：完整一周（社团 + 课外活动填充）
// ============================================================================

#[tokio::test]
async fn test_full_week_with_clubs_and_fill() {
    let pool = setup_test_db().await;
    seed_catalogue(
        &pool,
        &[SubjectFixture {
            code: "CS201",
            employee_id: "F001",
            lectures: 4,
            lab_periods: 2,
        }],
    )
    .await;

    let (version_id, report) = run_generation(&pool, 23, true, true).await;
    assert!(report.is_complete());

    let rows = EntryRepository::new(&pool)
        .find_by_version(version_id)
        .await
        .unwrap();

    // 周四保留时段只有社团条目
    for row in &rows {
        if row.day_of_week == "THURSDAY" && (row.period_number == 1 || row.period_number == 7) {
            assert_eq!(row.session_type, "CLUB");
        }
        // 课外活动不占第 1 节
        if row.session_type == "EXTRACURRICULAR" {
            assert!(row.period_number >= 2);
        }
    }

    // 社团恰好两条（周四 P1、P7）
    let clubs = rows.iter().filter(|r| r.session_type == "CLUB").count();
    assert_eq!(clubs, 2);

    // 第 2-7 节（除保留时段外）全部被占用：6 天 × 6 节 = 36，
    // 其中周四 P7 为社团；加上周四 P1 社团与理论课可能占用的第 1 节
    let occupied: BTreeSet<(String, i64)> = rows
        .iter()
        .map(|r| (r.day_of_week.clone(), r.period_number))
        .collect();
    for day in [
        "MONDAY", "TUESDAY", "WEDNESDAY", "THURSDAY", "FRIDAY", "SATURDAY",
    ] {
        for period in 2..=7i64 {
            assert!(
                occupied.contains(&(day.to_string(), period)),
                "槽位 {} P{} 应当被占用",
                day,
                period
            );
        }
    }

    let validation = Reporter::new(&pool).validation_report().await.unwrap();
    assert!(validation.is_valid);
}

// ============================================================================
// 场景 5：锁定保留与重排
// ============================================================================

#[tokio::test]
async fn test_reshuffle_preserves_locked_entry() {
    let pool = setup_test_db().await;
    seed_catalogue(
        &pool,
        &[SubjectFixture {
            code: "CS201",
            employee_id: "F001",
            lectures: 3,
            lab_periods: 0,
        }],
    )
    .await;

    let (version_id, _) = run_generation(&pool, 42, false, false).await;

    // 锁定第一个条目
    let entries = EntryRepository::new(&pool);
    let rows = entries.find_by_version(version_id).await.unwrap();
    let target = &rows[0];
    let locked_slot = (target.day_of_week.clone(), target.period_number);

    let editor = EditEngine::new(&pool);
    editor.lock(target.id, true).await.unwrap();

    // 重排：清除非锁定条目后重新运行放置器
    let removed = editor.clear_unlocked().await.unwrap();
    assert_eq!(removed, 2);

    let remaining = entries.find_by_version(version_id).await.unwrap();
    let mut state = ScheduleState::from_rows(&remaining).unwrap();

    let subjects = SubjectRepository::new(&pool)
        .find_active_with_cohort()
        .await
        .unwrap();
    let config = EngineConfig {
        include_clubs: false,
        fill_extracurricular: false,
        ..EngineConfig::default()
    };
    let report = SchedulerEngine::new(config, 99)
        .unwrap()
        .schedule_all(&subjects, &mut state, &CancelFlag::new())
        .unwrap();
    assert!(report.is_complete());

    let drafts: Vec<NewEntry> = state
        .entries()
        .iter()
        .filter(|e| e.id.is_none())
        .map(|e| e.to_new_entry())
        .collect();
    entries.insert_batch(version_id, &drafts).await.unwrap();

    // 锁定条目留在原槽位，总数回到 3
    let after = entries.find_by_version(version_id).await.unwrap();
    assert_eq!(after.len(), 3);

    let locked_rows: Vec<_> = after.iter().filter(|r| r.is_locked != 0).collect();
    assert_eq!(locked_rows.len(), 1);
    assert_eq!(
        (
            locked_rows[0].day_of_week.clone(),
            locked_rows[0].period_number
        ),
        locked_slot
    );

    let validation = Reporter::new(&pool).validation_report().await.unwrap();
    assert!(validation.is_valid);
}

// ============================================================================
// 场景 6：可复现
// ============================================================================

#[tokio::test]
async fn test_same_seed_reproducible_end_to_end() {
    let pool = setup_test_db().await;
    seed_catalogue(
        &pool,
        &[
            SubjectFixture {
                code: "CS201",
                employee_id: "F001",
                lectures: 4,
                lab_periods: 2,
            },
            SubjectFixture {
                code: "CS202",
                employee_id: "F002",
                lectures: 3,
                lab_periods: 0,
            },
        ],
    )
    .await;

    let entries = EntryRepository::new(&pool);

    let (first_version, _) = run_generation(&pool, 1234, true, true).await;
    let first_rows = entries.find_by_version(first_version).await.unwrap();

    let (second_version, _) = run_generation(&pool, 1234, true, true).await;
    let second_rows = entries.find_by_version(second_version).await.unwrap();

    // 两个版本的条目多重集（不含版本/行 ID）逐位一致
    let first_keys: Vec<_> = first_rows.iter().map(entry_key).collect();
    let second_keys: Vec<_> = second_rows.iter().map(entry_key).collect();
    assert_eq!(first_keys, second_keys);

    // 不同种子也能完整生成（排列可以不同，仅作烟雾检查）
    let (third_version, third_report) = run_generation(&pool, 5678, true, true).await;
    let third_rows = entries.find_by_version(third_version).await.unwrap();
    assert!(third_report.is_complete());
    assert!(!third_rows.is_empty());
}
