// ============================================================================
// 目录导入模块
// ============================================================================
// 本模块实现表格行到实体目录的导入规范化
//
// 行来源（表格文件的解析由外部协作方完成，本模块只接收已解析的行）：
// - 主数据行   : (教师, 课程, 年级, 专业, 教室 [, 班级])
// - 任务数据行 : (教师, 课程, 年级, 专业, 每周节数 [, 班级])
//
// 规范化规则：
// - 专业代码别名归一（CS / C.S. / COMPUTER SCIENCE -> CSE），统一大写
// - 年级从自由文本中取第一段数字（"3rd Year" -> 3），缺失默认 1
// - 班级默认 "A"，统一大写
// - 课程按名称关键词分类：lab -> LAB，tutorial -> TUTORIAL，
//   seminar -> SEMINAR，其余 -> LECTURE
// - 房间标识含 "LAB" 或以 "CC" 开头时按实验室入库，否则按教室入库
//
// 导入只使用目录的变更原语，不触碰放置器。
// ============================================================================

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::db::{
    BranchRepository, ClassroomRepository, CreateSubjectInput, FacultyRepository,
    LabRoomRepository, SubjectRepository, UpdateSubjectInput, YearSectionRepository,
};
use crate::models::SessionType;

// ============================================================================
// 规范化函数
// ============================================================================

/// 专业代码别名归一
///
/// # 参数
/// - `raw`: 原始专业文本
///
/// # 返回
/// - `String`: 归一化后的专业代码（统一大写）
pub fn normalize_branch(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    match upper.as_str() {
        "CS" | "C.S." | "COMPUTER SCIENCE" => "CSE".to_string(),
        _ => upper,
    }
}

/// 从自由文本解析年级
///
/// 取第一段连续数字："3rd Year" -> 3，"Year-2" -> 2。
///
/// # 返回
/// - `Some(i64)`: 解析出的年级
/// - `None`: 文本中没有数字
pub fn parse_year(raw: &str) -> Option<i64> {
    let re = regex::Regex::new(r"(\d+)").unwrap();
    re.captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// 班级归一：缺失默认 "A"，统一大写
pub fn normalize_section(raw: Option<&str>) -> String {
    match raw.map(|s| s.trim()).filter(|s| !s.is_empty()) {
        Some(section) => section.to_uppercase(),
        None => "A".to_string(),
    }
}

/// 按课程名称关键词分类课段类型
pub fn classify_session(subject_name: &str) -> SessionType {
    let lower = subject_name.to_lowercase();
    if lower.contains("lab") {
        SessionType::Lab
    } else if lower.contains("tutorial") {
        SessionType::Tutorial
    } else if lower.contains("seminar") {
        SessionType::Seminar
    } else {
        SessionType::Lecture
    }
}

/// 房间标识是否为实验室
///
/// 含 "LAB" 或以 "CC" 开头的房间按实验室处理。
pub fn is_lab_room(room: &str) -> bool {
    let upper = room.trim().to_uppercase();
    upper.contains("LAB") || upper.starts_with("CC")
}

/// 从课程名称派生课程代码（前 8 个字符，大写）
fn derive_subject_code(name: &str) -> String {
    name.chars().take(8).collect::<String>().to_uppercase()
}

// ============================================================================
// 行类型与导入报告
// ============================================================================

/// 主数据行：教师 × 课程 × 教学班 × 房间
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterRow {
    /// 教师姓名
    pub teacher: String,
    /// 课程名称
    pub subject: String,
    /// 年级（自由文本）
    pub year: String,
    /// 专业（原始文本）
    pub branch: String,
    /// 房间标识
    pub classroom: String,
    /// 班级（缺省 "A"）
    pub section: Option<String>,
}

/// 任务数据行：教师 × 课程 × 教学班 × 每周节数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRow {
    /// 教师姓名
    pub teacher: String,
    /// 课程名称
    pub subject: String,
    /// 年级（自由文本）
    pub year: String,
    /// 专业（原始文本）
    pub branch: String,
    /// 每周节数（1-20）
    pub lectures_per_week: i64,
    /// 班级（缺省 "A"）
    pub section: Option<String>,
}

/// 导入报告
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    /// 成功导入的行数
    pub rows_imported: usize,
    /// 跳过或自动修正的行说明
    pub warnings: Vec<String>,
}

// ============================================================================
// 导入器
// ============================================================================

/// 目录导入器
pub struct Ingestor<'a> {
    pool: &'a SqlitePool,
}

impl<'a> Ingestor<'a> {
    /// 创建新的导入器
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// 导入主数据行
    ///
    /// 逐行建立专业 / 教学班 / 教师 / 房间 / 课程，
    /// 课程按房间标识关联教室或实验室。
    ///
    /// # 参数
    /// - `rows`: 已解析的主数据行
    ///
    /// # 返回
    /// - `Ok(IngestReport)`: 导入结果
    /// - `Err(sqlx::Error)`: 存储故障
    pub async fn ingest_master(&self, rows: &[MasterRow]) -> Result<IngestReport, sqlx::Error> {
        info!("开始导入主数据，共 {} 行", rows.len());

        let mut imported = 0;
        let mut warnings = Vec::new();

        for (index, row) in rows.iter().enumerate() {
            let line = index + 2;

            if row.subject.trim().is_empty() || row.teacher.trim().is_empty() {
                warnings.push(format!("第 {} 行缺少课程或教师，已跳过", line));
                continue;
            }

            let branch_code = normalize_branch(&row.branch);
            let branch = BranchRepository::new(self.pool)
                .get_or_create(&branch_code)
                .await?;

            let year = match parse_year(&row.year) {
                Some(year) => year,
                None => {
                    warnings.push(format!("第 {} 行年级 {:?} 无法解析，按 1 处理", line, row.year));
                    1
                }
            };

            let section = normalize_section(row.section.as_deref());
            YearSectionRepository::new(self.pool)
                .get_or_create(branch.id, year, &section)
                .await?;

            let faculty = FacultyRepository::new(self.pool)
                .get_or_create_by_name(row.teacher.trim())
                .await?;

            // 房间按标识分流到教室或实验室
            let room = row.classroom.trim();
            let (classroom_id, labroom_id) = if room.is_empty() {
                (None, None)
            } else if is_lab_room(room) {
                let labroom = LabRoomRepository::new(self.pool)
                    .get_or_create(room, "General Lab")
                    .await?;
                (None, Some(labroom.id))
            } else {
                let classroom = ClassroomRepository::new(self.pool)
                    .get_or_create(room)
                    .await?;
                (Some(classroom.id), None)
            };

            let subjects = SubjectRepository::new(self.pool);
            let subject_name = row.subject.trim();

            match subjects
                .find_by_name_in_cohort(subject_name, branch.id, year, &section)
                .await?
            {
                Some(existing) => {
                    subjects
                        .update(
                            existing.id,
                            UpdateSubjectInput {
                                faculty_id: Some(faculty.id),
                                classroom_id: classroom_id.or(existing.classroom_id),
                                labroom_id: labroom_id.or(existing.labroom_id),
                                ..empty_update()
                            },
                        )
                        .await?;
                }
                None => {
                    subjects
                        .create(CreateSubjectInput {
                            code: derive_subject_code(subject_name),
                            name: subject_name.to_string(),
                            branch_id: branch.id,
                            year,
                            section: section.clone(),
                            lectures_per_week: 0,
                            tutorials_per_week: 0,
                            lab_periods_per_week: 0,
                            seminar_periods_per_week: 0,
                            faculty_id: faculty.id,
                            classroom_id,
                            labroom_id,
                        })
                        .await?;
                }
            }

            imported += 1;
        }

        info!(
            "主数据导入完成 - 成功 {} 行，警告 {} 条",
            imported,
            warnings.len()
        );
        Ok(IngestReport {
            rows_imported: imported,
            warnings,
        })
    }

    /// 导入任务数据行
    ///
    /// 每周节数按课程名称关键词落到对应的需求字段：
    /// lab -> 实验节数，tutorial -> 习题节数，
    /// seminar -> 研讨节数，其余 -> 理论节数。
    ///
    /// # 参数
    /// - `rows`: 已解析的任务数据行
    pub async fn ingest_assignments(
        &self,
        rows: &[AssignmentRow],
    ) -> Result<IngestReport, sqlx::Error> {
        info!("开始导入任务数据，共 {} 行", rows.len());

        let mut imported = 0;
        let mut warnings = Vec::new();

        for (index, row) in rows.iter().enumerate() {
            let line = index + 2;

            if row.subject.trim().is_empty() {
                warnings.push(format!("第 {} 行缺少课程名称，已跳过", line));
                continue;
            }

            if !(1..=20).contains(&row.lectures_per_week) {
                warnings.push(format!(
                    "第 {} 行每周节数 {} 不在 1-20 范围，已跳过",
                    line, row.lectures_per_week
                ));
                continue;
            }

            let branch_code = normalize_branch(&row.branch);
            let branch = BranchRepository::new(self.pool)
                .get_or_create(&branch_code)
                .await?;

            let year = parse_year(&row.year).unwrap_or(1);
            let section = normalize_section(row.section.as_deref());
            YearSectionRepository::new(self.pool)
                .get_or_create(branch.id, year, &section)
                .await?;

            let faculty = FacultyRepository::new(self.pool)
                .get_or_create_by_name(row.teacher.trim())
                .await?;

            let subjects = SubjectRepository::new(self.pool);
            let subject_name = row.subject.trim();

            let subject = match subjects
                .find_by_name_in_cohort(subject_name, branch.id, year, &section)
                .await?
            {
                Some(subject) => subject,
                None => {
                    warnings.push(format!(
                        "第 {} 行课程 {} 不在主数据中，已自动创建",
                        line, subject_name
                    ));
                    subjects
                        .create(CreateSubjectInput {
                            code: derive_subject_code(subject_name),
                            name: subject_name.to_string(),
                            branch_id: branch.id,
                            year,
                            section: section.clone(),
                            lectures_per_week: 0,
                            tutorials_per_week: 0,
                            lab_periods_per_week: 0,
                            seminar_periods_per_week: 0,
                            faculty_id: faculty.id,
                            classroom_id: None,
                            labroom_id: None,
                        })
                        .await?
                }
            };

            // 每周节数按课程名称关键词落到对应需求字段
            let mut update = UpdateSubjectInput {
                faculty_id: Some(faculty.id),
                ..empty_update()
            };
            match classify_session(subject_name) {
                SessionType::Lab => update.lab_periods_per_week = Some(row.lectures_per_week),
                SessionType::Tutorial => update.tutorials_per_week = Some(row.lectures_per_week),
                SessionType::Seminar => {
                    update.seminar_periods_per_week = Some(row.lectures_per_week)
                }
                _ => update.lectures_per_week = Some(row.lectures_per_week),
            }

            subjects.update(subject.id, update).await?;
            debug!("任务行导入: {} ({} 节/周)", subject_name, row.lectures_per_week);
            imported += 1;
        }

        if !warnings.is_empty() {
            warn!("任务数据导入产生 {} 条警告", warnings.len());
        }

        info!("任务数据导入完成 - 成功 {} 行", imported);
        Ok(IngestReport {
            rows_imported: imported,
            warnings,
        })
    }
}

/// 全空的课程更新输入
fn empty_update() -> UpdateSubjectInput {
    UpdateSubjectInput {
        name: None,
        lectures_per_week: None,
        tutorials_per_week: None,
        lab_periods_per_week: None,
        seminar_periods_per_week: None,
        faculty_id: None,
        classroom_id: None,
        labroom_id: None,
        is_active: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // 测试组 1：规范化函数
    // ========================================================================

    #[test]
    fn test_normalize_branch_aliases() {
        assert_eq!(normalize_branch("CS"), "CSE");
        assert_eq!(normalize_branch("c.s."), "CSE");
        assert_eq!(normalize_branch("Computer Science"), "CSE");
        assert_eq!(normalize_branch(" ece "), "ECE");
        assert_eq!(normalize_branch("ME"), "ME");
    }

    #[test]
    fn test_parse_year_from_free_text() {
        assert_eq!(parse_year("3"), Some(3));
        assert_eq!(parse_year("3rd Year"), Some(3));
        assert_eq!(parse_year("Year-2"), Some(2));
        assert_eq!(parse_year("second"), None);
        assert_eq!(parse_year(""), None);
    }

    #[test]
    fn test_normalize_section_defaults() {
        assert_eq!(normalize_section(None), "A");
        assert_eq!(normalize_section(Some("")), "A");
        assert_eq!(normalize_section(Some(" b ")), "B");
        assert_eq!(normalize_section(Some("C")), "C");
    }

    #[test]
    fn test_classify_session_by_keyword() {
        assert_eq!(classify_session("DSA Lab"), SessionType::Lab);
        assert_eq!(classify_session("Maths Tutorial"), SessionType::Tutorial);
        assert_eq!(classify_session("Research Seminar"), SessionType::Seminar);
        assert_eq!(classify_session("Operating Systems"), SessionType::Lecture);
    }

    #[test]
    fn test_is_lab_room_detection() {
        assert!(is_lab_room("DSA LAB"));
        assert!(is_lab_room("cn lab 2"));
        assert!(is_lab_room("CC-101"));
        assert!(!is_lab_room("R101"));
        assert!(!is_lab_room("Block-C 204"));
    }

    #[test]
    fn test_derive_subject_code() {
        assert_eq!(derive_subject_code("Operating Systems"), "OPERATIN");
        assert_eq!(derive_subject_code("OS"), "OS");
    }

    // ========================================================================
    // 测试组 2：导入流程（内存数据库）
    // ========================================================================

    use crate::db::migrations::MigrationManager;
    use crate::db::SubjectRepository;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    async fn setup_pool() -> SqlitePool {
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

    fn master_row(teacher: &str, subject: &str, branch: &str, room: &str) -> MasterRow {
        MasterRow {
            teacher: teacher.to_string(),
            subject: subject.to_string(),
            year: "2nd Year".to_string(),
            branch: branch.to_string(),
            classroom: room.to_string(),
            section: None,
        }
    }

    #[tokio::test]
    async fn test_ingest_master_creates_catalogue() {
        let pool = setup_pool().await;
        let ingestor = Ingestor::new(&pool);

        let rows = vec![
            master_row("张老师", "Operating Systems", "CS", "R101"),
            master_row("李老师", "CN Lab", "CS", "CC-LAB2"),
        ];

        let report = ingestor.ingest_master(&rows).await.unwrap();
        assert_eq!(report.rows_imported, 2);

        // 专业别名归一为 CSE
        let branch = crate::db::BranchRepository::new(&pool)
            .find_by_code("CSE")
            .await
            .unwrap()
            .unwrap();

        // 实验课程关联实验室，理论课程关联教室
        let subjects = SubjectRepository::new(&pool);
        let os = subjects
            .find_by_name_in_cohort("Operating Systems", branch.id, 2, "A")
            .await
            .unwrap()
            .unwrap();
        assert!(os.classroom_id.is_some());
        assert!(os.labroom_id.is_none());

        let lab = subjects
            .find_by_name_in_cohort("CN Lab", branch.id, 2, "A")
            .await
            .unwrap()
            .unwrap();
        assert!(lab.labroom_id.is_some());
        assert!(lab.classroom_id.is_none());
    }

    #[tokio::test]
    async fn test_ingest_assignments_fills_demand_by_keyword() {
        let pool = setup_pool().await;
        let ingestor = Ingestor::new(&pool);

        ingestor
            .ingest_master(&[
                master_row("张老师", "Operating Systems", "CSE", "R101"),
                master_row("李老师", "CN Lab", "CSE", "CC-LAB2"),
            ])
            .await
            .unwrap();

        let rows = vec![
            AssignmentRow {
                teacher: "张老师".to_string(),
                subject: "Operating Systems".to_string(),
                year: "2".to_string(),
                branch: "CSE".to_string(),
                lectures_per_week: 3,
                section: None,
            },
            AssignmentRow {
                teacher: "李老师".to_string(),
                subject: "CN Lab".to_string(),
                year: "2".to_string(),
                branch: "CSE".to_string(),
                lectures_per_week: 2,
                section: None,
            },
        ];

        let report = ingestor.ingest_assignments(&rows).await.unwrap();
        assert_eq!(report.rows_imported, 2);

        let branch = crate::db::BranchRepository::new(&pool)
            .find_by_code("CSE")
            .await
            .unwrap()
            .unwrap();

        let subjects = SubjectRepository::new(&pool);
        let os = subjects
            .find_by_name_in_cohort("Operating Systems", branch.id, 2, "A")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(os.lectures_per_week, 3);
        assert_eq!(os.lab_periods_per_week, 0);

        let lab = subjects
            .find_by_name_in_cohort("CN Lab", branch.id, 2, "A")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lab.lab_periods_per_week, 2);
        assert_eq!(lab.lectures_per_week, 0);
    }

    #[tokio::test]
    async fn test_ingest_assignments_validates_range() {
        let pool = setup_pool().await;
        let ingestor = Ingestor::new(&pool);

        let rows = vec![AssignmentRow {
            teacher: "张老师".to_string(),
            subject: "Operating Systems".to_string(),
            year: "2".to_string(),
            branch: "CSE".to_string(),
            lectures_per_week: 25,
            section: None,
        }];

        let report = ingestor.ingest_assignments(&rows).await.unwrap();
        assert_eq!(report.rows_imported, 0);
        assert_eq!(report.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_ingest_assignments_autocreates_missing_subject() {
        let pool = setup_pool().await;
        let ingestor = Ingestor::new(&pool);

        let rows = vec![AssignmentRow {
            teacher: "王老师".to_string(),
            subject: "Discrete Maths".to_string(),
            year: "1".to_string(),
            branch: "ECE".to_string(),
            lectures_per_week: 4,
            section: Some("b".to_string()),
        }];

        let report = ingestor.ingest_assignments(&rows).await.unwrap();
        assert_eq!(report.rows_imported, 1);
        assert_eq!(report.warnings.len(), 1);

        let branch = crate::db::BranchRepository::new(&pool)
            .find_by_code("ECE")
            .await
            .unwrap()
            .unwrap();
        let subject = SubjectRepository::new(&pool)
            .find_by_name_in_cohort("Discrete Maths", branch.id, 1, "B")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(subject.lectures_per_week, 4);
    }
}
