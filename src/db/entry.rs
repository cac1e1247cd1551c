// ============================================================================
// 课表条目数据访问模块
// ============================================================================
// 本模块提供课表条目的数据库操作接口
//
// 功能：
// - 条目的单条与批量写入（批量写入在事务内完成）
// - 按版本、按教学班查询
// - 锁定标志读写
// - 调课使用的槽位更新与成对交换
// - 清除非锁定条目（重排前置步骤）
//
// 条目只存在于某个版本内部；所有查询都以 version_id 为前缀条件，
// 配合迁移脚本中的组合索引保证查找是次线性的。
// ============================================================================

use serde::{Deserialize, Serialize};
use sqlx::{Error as SqlxError, FromRow, SqlitePool};
use tracing::{debug, error, info, warn};

/// 课表条目行
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TimetableEntry {
    /// 条目 ID
    pub id: i64,
    /// 所属版本 ID
    pub version_id: i64,
    /// 星期（全大写英文名称）
    pub day_of_week: String,
    /// 节次（1-7）
    pub period_number: i64,
    /// 专业 ID
    pub branch_id: i64,
    /// 年级班级 ID
    pub year_section_id: i64,
    /// 课程 ID（CLUB/BREAK/EXTRACURRICULAR 条目可为空）
    pub subject_id: Option<i64>,
    /// 教师 ID
    pub faculty_id: Option<i64>,
    /// 教室 ID
    pub classroom_id: Option<i64>,
    /// 实验室 ID
    pub labroom_id: Option<i64>,
    /// 课段类型（全大写英文名称）
    pub session_type: String,
    /// 是否锁定（锁定条目不参与重排）
    pub is_locked: i64,
    /// 创建时间
    pub created_at: String,
}

/// 写入课表条目的输入数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEntry {
    /// 星期
    pub day_of_week: String,
    /// 节次（1-7）
    pub period_number: i64,
    /// 专业 ID
    pub branch_id: i64,
    /// 年级班级 ID
    pub year_section_id: i64,
    /// 课程 ID
    pub subject_id: Option<i64>,
    /// 教师 ID
    pub faculty_id: Option<i64>,
    /// 教室 ID
    pub classroom_id: Option<i64>,
    /// 实验室 ID
    pub labroom_id: Option<i64>,
    /// 课段类型
    pub session_type: String,
    /// 是否锁定
    pub is_locked: bool,
}

const ENTRY_COLUMNS: &str = "id, version_id, day_of_week, period_number, branch_id, \
    year_section_id, subject_id, faculty_id, classroom_id, labroom_id, session_type, \
    is_locked, created_at";

/// 课表条目数据访问接口
pub struct EntryRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> EntryRepository<'a> {
    /// 创建新的条目数据访问实例
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// 写入单个条目
    ///
    /// # 参数
    /// - `version_id`: 所属版本 ID
    /// - `entry`: 条目内容
    ///
    /// # 返回
    /// - `Ok(TimetableEntry)`: 写入成功，返回完整行
    /// - `Err(SqlxError)`: 写入失败
    pub async fn insert(
        &self,
        version_id: i64,
        entry: &NewEntry,
    ) -> Result<TimetableEntry, SqlxError> {
        debug!(
            "写入课表条目: 版本 {} {} P{} 班级 {}",
            version_id, entry.day_of_week, entry.period_number, entry.year_section_id
        );

        let sql = format!(
            r#"
            INSERT INTO timetable_entries (
                version_id, day_of_week, period_number, branch_id, year_section_id,
                subject_id, faculty_id, classroom_id, labroom_id, session_type,
                is_locked, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))
            RETURNING {ENTRY_COLUMNS}
            "#
        );

        sqlx::query_as::<_, TimetableEntry>(&sql)
            .bind(version_id)
            .bind(&entry.day_of_week)
            .bind(entry.period_number)
            .bind(entry.branch_id)
            .bind(entry.year_section_id)
            .bind(entry.subject_id)
            .bind(entry.faculty_id)
            .bind(entry.classroom_id)
            .bind(entry.labroom_id)
            .bind(&entry.session_type)
            .bind(entry.is_locked as i64)
            .fetch_one(self.pool)
            .await
            .map_err(|e| {
                error!("写入课表条目失败: {}", e);
                e
            })
    }

    /// 批量写入条目
    ///
    /// 整批写入在一个事务内完成：要么全部提交，要么全部回滚。
    /// 排课引擎在生成结束后用本方法一次性落库。
    ///
    /// # 参数
    /// - `version_id`: 所属版本 ID
    /// - `entries`: 条目列表
    ///
    /// # 返回
    /// - `Ok(usize)`: 成功写入的条目数量
    /// - `Err(SqlxError)`: 写入失败（整批回滚）
    pub async fn insert_batch(
        &self,
        version_id: i64,
        entries: &[NewEntry],
    ) -> Result<usize, SqlxError> {
        info!("批量写入 {} 个课表条目到版本 {}", entries.len(), version_id);

        let mut tx = self.pool.begin().await?;

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO timetable_entries (
                    version_id, day_of_week, period_number, branch_id, year_section_id,
                    subject_id, faculty_id, classroom_id, labroom_id, session_type,
                    is_locked, created_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))
                "#,
            )
            .bind(version_id)
            .bind(&entry.day_of_week)
            .bind(entry.period_number)
            .bind(entry.branch_id)
            .bind(entry.year_section_id)
            .bind(entry.subject_id)
            .bind(entry.faculty_id)
            .bind(entry.classroom_id)
            .bind(entry.labroom_id)
            .bind(&entry.session_type)
            .bind(entry.is_locked as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("批量写入课表条目失败: {}", e);
                e
            })?;
        }

        tx.commit().await?;

        info!("批量写入完成，共 {} 个条目", entries.len());
        Ok(entries.len())
    }

    /// 根据 ID 查询条目
    pub async fn find_by_id(&self, id: i64) -> Result<Option<TimetableEntry>, SqlxError> {
        debug!("查询课表条目，ID: {}", id);

        let sql = format!("SELECT {ENTRY_COLUMNS} FROM timetable_entries WHERE id = ?");
        sqlx::query_as::<_, TimetableEntry>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
    }

    /// 查询版本的全部条目
    pub async fn find_by_version(&self, version_id: i64) -> Result<Vec<TimetableEntry>, SqlxError> {
        debug!("查询版本 {} 的全部条目", version_id);

        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM timetable_entries \
             WHERE version_id = ? ORDER BY id"
        );
        let result = sqlx::query_as::<_, TimetableEntry>(&sql)
            .bind(version_id)
            .fetch_all(self.pool)
            .await?;

        debug!("版本 {} 共有 {} 个条目", version_id, result.len());
        Ok(result)
    }

    /// 查询版本内某个教学班的条目
    pub async fn find_by_cohort(
        &self,
        version_id: i64,
        year_section_id: i64,
    ) -> Result<Vec<TimetableEntry>, SqlxError> {
        debug!(
            "查询版本 {} 教学班 {} 的条目",
            version_id, year_section_id
        );

        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM timetable_entries \
             WHERE version_id = ? AND year_section_id = ? ORDER BY id"
        );
        sqlx::query_as::<_, TimetableEntry>(&sql)
            .bind(version_id)
            .bind(year_section_id)
            .fetch_all(self.pool)
            .await
    }

    /// 设置条目锁定标志
    ///
    /// # 参数
    /// - `id`: 条目 ID
    /// - `locked`: 目标锁定状态
    pub async fn set_locked(&self, id: i64, locked: bool) -> Result<TimetableEntry, SqlxError> {
        info!("设置条目 {} 锁定状态: {}", id, locked);

        let sql = format!(
            "UPDATE timetable_entries SET is_locked = ? WHERE id = ? RETURNING {ENTRY_COLUMNS}"
        );
        sqlx::query_as::<_, TimetableEntry>(&sql)
            .bind(locked as i64)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| {
                warn!("条目不存在，ID: {}", id);
                SqlxError::RowNotFound
            })
    }

    /// 更新条目的时间槽位（调课移动）
    pub async fn update_slot(
        &self,
        id: i64,
        day_of_week: &str,
        period_number: i64,
    ) -> Result<TimetableEntry, SqlxError> {
        info!("移动条目 {} 到 {} P{}", id, day_of_week, period_number);

        let sql = format!(
            "UPDATE timetable_entries SET day_of_week = ?, period_number = ? \
             WHERE id = ? RETURNING {ENTRY_COLUMNS}"
        );
        sqlx::query_as::<_, TimetableEntry>(&sql)
            .bind(day_of_week)
            .bind(period_number)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| {
                warn!("条目不存在，ID: {}", id);
                SqlxError::RowNotFound
            })
    }

    /// 成对交换两个条目的时间槽位
    ///
    /// 两次更新在一个事务内完成，不会出现只交换一半的状态。
    pub async fn swap_slots(&self, first_id: i64, second_id: i64) -> Result<(), SqlxError> {
        info!("交换条目 {} 与 {} 的时间槽位", first_id, second_id);

        let mut tx = self.pool.begin().await?;

        let first: Option<(String, i64)> = sqlx::query_as(
            "SELECT day_of_week, period_number FROM timetable_entries WHERE id = ?",
        )
        .bind(first_id)
        .fetch_optional(&mut *tx)
        .await?;

        let second: Option<(String, i64)> = sqlx::query_as(
            "SELECT day_of_week, period_number FROM timetable_entries WHERE id = ?",
        )
        .bind(second_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (first, second) = match (first, second) {
            (Some(f), Some(s)) => (f, s),
            _ => {
                warn!("交换失败，条目不存在: {} / {}", first_id, second_id);
                return Err(SqlxError::RowNotFound);
            }
        };

        sqlx::query(
            "UPDATE timetable_entries SET day_of_week = ?, period_number = ? WHERE id = ?",
        )
        .bind(&second.0)
        .bind(second.1)
        .bind(first_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE timetable_entries SET day_of_week = ?, period_number = ? WHERE id = ?",
        )
        .bind(&first.0)
        .bind(first.1)
        .bind(second_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!("条目交换完成: {} <-> {}", first_id, second_id);
        Ok(())
    }

    /// 删除条目
    pub async fn delete(&self, id: i64) -> Result<(), SqlxError> {
        info!("删除课表条目，ID: {}", id);

        let result = sqlx::query("DELETE FROM timetable_entries WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            warn!("条目不存在，ID: {}", id);
            return Err(SqlxError::RowNotFound);
        }

        Ok(())
    }

    /// 清除版本内全部非锁定条目
    ///
    /// 重排前置步骤：锁定条目保留，其余条目删除后重新运行放置器。
    ///
    /// # 返回
    /// - `Ok(u64)`: 删除的条目数量
    pub async fn delete_unlocked(&self, version_id: i64) -> Result<u64, SqlxError> {
        info!("清除版本 {} 的非锁定条目", version_id);

        let result =
            sqlx::query("DELETE FROM timetable_entries WHERE version_id = ? AND is_locked = 0")
                .bind(version_id)
                .execute(self.pool)
                .await?;

        info!("已清除 {} 个非锁定条目", result.rows_affected());
        Ok(result.rows_affected())
    }

    /// 查询版本的条目数量
    pub async fn count_by_version(&self, version_id: i64) -> Result<i64, SqlxError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM timetable_entries WHERE version_id = ?")
                .bind(version_id)
                .fetch_one(self.pool)
                .await?;
        Ok(row.0)
    }
}
