// ============================================================================
// 课程数据访问模块
// ============================================================================
// 本模块提供课程相关的数据库操作接口
//
// 功能：
// - 课程的 CRUD 操作
// - 每周学时需求向量的读写
// - 按教学班（专业, 年级, 班级）查询
// - 排课引擎使用的"课程 + 教学班标识"联合查询
// ============================================================================

use serde::{Deserialize, Serialize};
use sqlx::{Error as SqlxError, FromRow, SqlitePool};
use tracing::{debug, error, info, warn};

use crate::models::Cohort;

/// 课程信息
///
/// 课程在 (专业, 年级, 班级) 内唯一，属于一位主讲教师，
/// 可选地关联一间教室和/或一间实验室。
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subject {
    /// 课程 ID
    pub id: i64,
    /// 课程代码
    pub code: String,
    /// 课程名称
    pub name: String,
    /// 所属专业 ID
    pub branch_id: i64,
    /// 年级（1-4）
    pub year: i64,
    /// 班级
    pub section: String,
    /// 每周理论课节数
    pub lectures_per_week: i64,
    /// 每周习题课节数
    pub tutorials_per_week: i64,
    /// 每周实验课节数（以节为单位，每个实验块占 2 节）
    pub lab_periods_per_week: i64,
    /// 每周研讨课节数
    pub seminar_periods_per_week: i64,
    /// 实验块时长（固定为 2）
    pub lab_duration: i64,
    /// 主讲教师 ID
    pub faculty_id: i64,
    /// 教室 ID（理论课、习题课、研讨课使用）
    pub classroom_id: Option<i64>,
    /// 实验室 ID（实验课使用）
    pub labroom_id: Option<i64>,
    /// 是否参与排课
    pub is_active: i64,
    /// 创建时间
    pub created_at: String,
}

/// 课程及其教学班标识
///
/// 排课引擎的输入行：课程字段连同解析好的 year_section_id，
/// 使 cohort_of 查询保持常数时间。
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubjectWithCohort {
    /// 课程 ID
    pub id: i64,
    /// 课程代码
    pub code: String,
    /// 课程名称
    pub name: String,
    /// 所属专业 ID
    pub branch_id: i64,
    /// 年级班级 ID
    pub year_section_id: i64,
    /// 每周理论课节数
    pub lectures_per_week: i64,
    /// 每周习题课节数
    pub tutorials_per_week: i64,
    /// 每周实验课节数
    pub lab_periods_per_week: i64,
    /// 每周研讨课节数
    pub seminar_periods_per_week: i64,
    /// 主讲教师 ID
    pub faculty_id: i64,
    /// 教室 ID
    pub classroom_id: Option<i64>,
    /// 实验室 ID
    pub labroom_id: Option<i64>,
}

impl SubjectWithCohort {
    /// 课程所属的教学班标识
    pub fn cohort(&self) -> Cohort {
        Cohort::new(self.branch_id, self.year_section_id)
    }
}

/// 创建课程的输入数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubjectInput {
    /// 课程代码
    pub code: String,
    /// 课程名称
    pub name: String,
    /// 所属专业 ID
    pub branch_id: i64,
    /// 年级
    pub year: i64,
    /// 班级
    pub section: String,
    /// 每周理论课节数
    pub lectures_per_week: i64,
    /// 每周习题课节数
    pub tutorials_per_week: i64,
    /// 每周实验课节数
    pub lab_periods_per_week: i64,
    /// 每周研讨课节数
    pub seminar_periods_per_week: i64,
    /// 主讲教师 ID
    pub faculty_id: i64,
    /// 教室 ID
    pub classroom_id: Option<i64>,
    /// 实验室 ID
    pub labroom_id: Option<i64>,
}

/// 更新课程的输入数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSubjectInput {
    /// 课程名称
    pub name: Option<String>,
    /// 每周理论课节数
    pub lectures_per_week: Option<i64>,
    /// 每周习题课节数
    pub tutorials_per_week: Option<i64>,
    /// 每周实验课节数
    pub lab_periods_per_week: Option<i64>,
    /// 每周研讨课节数
    pub seminar_periods_per_week: Option<i64>,
    /// 主讲教师 ID
    pub faculty_id: Option<i64>,
    /// 教室 ID
    pub classroom_id: Option<i64>,
    /// 实验室 ID
    pub labroom_id: Option<i64>,
    /// 是否参与排课
    pub is_active: Option<bool>,
}

const SUBJECT_COLUMNS: &str = "id, code, name, branch_id, year, section, \
    lectures_per_week, tutorials_per_week, lab_periods_per_week, seminar_periods_per_week, \
    lab_duration, faculty_id, classroom_id, labroom_id, is_active, created_at";

/// 课程数据访问接口
pub struct SubjectRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SubjectRepository<'a> {
    /// 创建新的课程数据访问实例
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// 创建课程
    ///
    /// # 参数
    /// - `input`: 创建课程的输入数据
    ///
    /// # 返回
    /// - `Ok(Subject)`: 创建成功
    /// - `Err(SqlxError)`: 创建失败（如课程在教学班内重复）
    pub async fn create(&self, input: CreateSubjectInput) -> Result<Subject, SqlxError> {
        info!(
            "创建课程: {} ({}) - 专业 {} {} 年级 {} 班",
            input.name, input.code, input.branch_id, input.year, input.section
        );

        let sql = format!(
            r#"
            INSERT INTO subjects (
                code, name, branch_id, year, section,
                lectures_per_week, tutorials_per_week, lab_periods_per_week,
                seminar_periods_per_week, lab_duration, faculty_id,
                classroom_id, labroom_id, is_active, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 2, ?, ?, ?, 1, datetime('now'))
            RETURNING {SUBJECT_COLUMNS}
            "#
        );

        let result = sqlx::query_as::<_, Subject>(&sql)
            .bind(&input.code)
            .bind(&input.name)
            .bind(input.branch_id)
            .bind(input.year)
            .bind(&input.section)
            .bind(input.lectures_per_week)
            .bind(input.tutorials_per_week)
            .bind(input.lab_periods_per_week)
            .bind(input.seminar_periods_per_week)
            .bind(input.faculty_id)
            .bind(input.classroom_id)
            .bind(input.labroom_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| {
                error!("创建课程失败: {}", e);
                e
            })?;

        info!("课程创建成功，ID: {}", result.id);
        Ok(result)
    }

    /// 根据 ID 查询课程
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Subject>, SqlxError> {
        debug!("查询课程，ID: {}", id);

        let sql = format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE id = ?");
        sqlx::query_as::<_, Subject>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
    }

    /// 按名称与教学班查询课程
    ///
    /// 导入流程使用：课程名称在 (专业, 年级, 班级) 内唯一。
    pub async fn find_by_name_in_cohort(
        &self,
        name: &str,
        branch_id: i64,
        year: i64,
        section: &str,
    ) -> Result<Option<Subject>, SqlxError> {
        debug!(
            "按名称查询课程: {} - 专业 {} {} 年级 {} 班",
            name, branch_id, year, section
        );

        let sql = format!(
            "SELECT {SUBJECT_COLUMNS} FROM subjects \
             WHERE name = ? AND branch_id = ? AND year = ? AND section = ?"
        );
        sqlx::query_as::<_, Subject>(&sql)
            .bind(name)
            .bind(branch_id)
            .bind(year)
            .bind(section)
            .fetch_optional(self.pool)
            .await
    }

    /// 查询所有课程
    pub async fn find_all(&self) -> Result<Vec<Subject>, SqlxError> {
        debug!("查询所有课程");

        let sql = format!(
            "SELECT {SUBJECT_COLUMNS} FROM subjects ORDER BY branch_id, year, section, code"
        );
        let result = sqlx::query_as::<_, Subject>(&sql)
            .fetch_all(self.pool)
            .await?;

        info!("查询到 {} 门课程", result.len());
        Ok(result)
    }

    /// 查询参与排课的课程及其教学班标识
    ///
    /// 排课引擎的输入集合：仅包含 is_active 的课程，
    /// 按插入顺序（ID 升序）返回以保证任务分解的确定性。
    ///
    /// # 返回
    /// - `Ok(Vec<SubjectWithCohort>)`: 课程及教学班标识列表
    /// - `Err(SqlxError)`: 查询失败
    pub async fn find_active_with_cohort(&self) -> Result<Vec<SubjectWithCohort>, SqlxError> {
        debug!("查询参与排课的课程");

        let result = sqlx::query_as::<_, SubjectWithCohort>(
            r#"
            SELECT
                s.id, s.code, s.name, s.branch_id, ys.id AS year_section_id,
                s.lectures_per_week, s.tutorials_per_week, s.lab_periods_per_week,
                s.seminar_periods_per_week, s.faculty_id, s.classroom_id, s.labroom_id
            FROM subjects s
            JOIN year_sections ys
                ON ys.branch_id = s.branch_id
                AND ys.year = s.year
                AND ys.section = s.section
            WHERE s.is_active = 1
            ORDER BY s.id
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        info!("查询到 {} 门参与排课的课程", result.len());
        Ok(result)
    }

    /// 查询参与排课的课程数量
    pub async fn count_active(&self) -> Result<i64, SqlxError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subjects WHERE is_active = 1")
            .fetch_one(self.pool)
            .await?;
        Ok(row.0)
    }

    /// 更新课程信息
    ///
    /// # 参数
    /// - `id`: 课程 ID
    /// - `input`: 更新课程的输入数据
    ///
    /// # 返回
    /// - `Ok(Subject)`: 更新成功
    /// - `Err(SqlxError)`: 更新失败
    pub async fn update(&self, id: i64, input: UpdateSubjectInput) -> Result<Subject, SqlxError> {
        info!("更新课程信息，ID: {}", id);

        let mut updates = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(name) = &input.name {
            updates.push("name = ?");
            params.push(name.clone());
        }
        if let Some(v) = input.lectures_per_week {
            updates.push("lectures_per_week = ?");
            params.push(v.to_string());
        }
        if let Some(v) = input.tutorials_per_week {
            updates.push("tutorials_per_week = ?");
            params.push(v.to_string());
        }
        if let Some(v) = input.lab_periods_per_week {
            updates.push("lab_periods_per_week = ?");
            params.push(v.to_string());
        }
        if let Some(v) = input.seminar_periods_per_week {
            updates.push("seminar_periods_per_week = ?");
            params.push(v.to_string());
        }
        if let Some(v) = input.faculty_id {
            updates.push("faculty_id = ?");
            params.push(v.to_string());
        }
        if let Some(v) = input.classroom_id {
            updates.push("classroom_id = ?");
            params.push(v.to_string());
        }
        if let Some(v) = input.labroom_id {
            updates.push("labroom_id = ?");
            params.push(v.to_string());
        }
        if let Some(v) = input.is_active {
            updates.push("is_active = ?");
            params.push(if v { "1" } else { "0" }.to_string());
        }

        if updates.is_empty() {
            warn!("没有需要更新的字段");
            return self.find_by_id(id).await?.ok_or_else(|| {
                error!("课程不存在，ID: {}", id);
                SqlxError::RowNotFound
            });
        }

        let sql = format!(
            "UPDATE subjects SET {} WHERE id = ? RETURNING {SUBJECT_COLUMNS}",
            updates.join(", ")
        );

        let mut query = sqlx::query_as::<_, Subject>(&sql);
        for param in params {
            query = query.bind(param);
        }
        query = query.bind(id);

        let result = query.fetch_one(self.pool).await.map_err(|e| {
            error!("更新课程失败: {}", e);
            e
        })?;

        info!("课程信息更新成功，ID: {}", id);
        Ok(result)
    }

    /// 删除课程
    pub async fn delete(&self, id: i64) -> Result<(), SqlxError> {
        info!("删除课程，ID: {}", id);

        let result = sqlx::query("DELETE FROM subjects WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            warn!("课程不存在，ID: {}", id);
            return Err(SqlxError::RowNotFound);
        }

        Ok(())
    }
}
