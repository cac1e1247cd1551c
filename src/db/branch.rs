// ============================================================================
// 专业与年级班级数据访问模块
// ============================================================================
// 本模块提供专业（branch）与年级班级（year_section）的数据库操作接口
//
// 功能：
// - 专业的 CRUD 操作与按代码查找
// - 年级班级的 CRUD 操作与 (专业, 年级, 班级) 三元组查找
// - 导入流程使用的 get_or_create 语义
//
// 设计原则：
// 1. 所有操作都返回 Result<T, sqlx::Error>
// 2. 使用参数化查询防止 SQL 注入
// 3. 关键操作记录日志
// ============================================================================

use serde::{Deserialize, Serialize};
use sqlx::{Error as SqlxError, FromRow, SqlitePool};
use tracing::{debug, error, info, warn};

/// 专业信息
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Branch {
    /// 专业 ID
    pub id: i64,
    /// 专业代码（如 CSE、ECE）
    pub code: String,
    /// 专业名称
    pub name: String,
    /// 创建时间
    pub created_at: String,
}

/// 创建专业的输入数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBranchInput {
    /// 专业代码
    pub code: String,
    /// 专业名称
    pub name: String,
}

/// 年级班级信息
///
/// (branch_id, year, section) 三元组唯一，对应一个教学班。
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct YearSection {
    /// 年级班级 ID
    pub id: i64,
    /// 所属专业 ID
    pub branch_id: i64,
    /// 年级（1-4）
    pub year: i64,
    /// 班级（A、B、C...）
    pub section: String,
    /// 创建时间
    pub created_at: String,
}

/// 创建年级班级的输入数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateYearSectionInput {
    /// 所属专业 ID
    pub branch_id: i64,
    /// 年级（1-4）
    pub year: i64,
    /// 班级
    pub section: String,
}

/// 专业数据访问接口
pub struct BranchRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> BranchRepository<'a> {
    /// 创建新的专业数据访问实例
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// 创建专业
    ///
    /// # 参数
    /// - `input`: 创建专业的输入数据
    ///
    /// # 返回
    /// - `Ok(Branch)`: 创建成功，返回专业信息
    /// - `Err(SqlxError)`: 创建失败（如代码重复）
    pub async fn create(&self, input: CreateBranchInput) -> Result<Branch, SqlxError> {
        info!("创建专业: {} ({})", input.name, input.code);

        let result = sqlx::query_as::<_, Branch>(
            r#"
            INSERT INTO branches (code, name, created_at)
            VALUES (?, ?, datetime('now'))
            RETURNING id, code, name, created_at
            "#,
        )
        .bind(&input.code)
        .bind(&input.name)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            error!("创建专业失败: {}", e);
            e
        })?;

        info!("专业创建成功，ID: {}", result.id);
        Ok(result)
    }

    /// 根据 ID 查询专业
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Branch>, SqlxError> {
        debug!("查询专业，ID: {}", id);

        sqlx::query_as::<_, Branch>(
            "SELECT id, code, name, created_at FROM branches WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
    }

    /// 根据专业代码查询
    pub async fn find_by_code(&self, code: &str) -> Result<Option<Branch>, SqlxError> {
        debug!("按代码查询专业: {}", code);

        sqlx::query_as::<_, Branch>(
            "SELECT id, code, name, created_at FROM branches WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(self.pool)
        .await
    }

    /// 查询所有专业
    pub async fn find_all(&self) -> Result<Vec<Branch>, SqlxError> {
        debug!("查询所有专业");

        let result = sqlx::query_as::<_, Branch>(
            "SELECT id, code, name, created_at FROM branches ORDER BY code",
        )
        .fetch_all(self.pool)
        .await?;

        info!("查询到 {} 个专业", result.len());
        Ok(result)
    }

    /// 按代码查找专业，不存在时创建
    ///
    /// 导入流程使用：代码已经过别名规范化。
    ///
    /// # 参数
    /// - `code`: 规范化后的专业代码
    ///
    /// # 返回
    /// - `Ok(Branch)`: 已存在或新建的专业
    /// - `Err(SqlxError)`: 操作失败
    pub async fn get_or_create(&self, code: &str) -> Result<Branch, SqlxError> {
        if let Some(branch) = self.find_by_code(code).await? {
            return Ok(branch);
        }

        debug!("专业 {} 不存在，自动创建", code);
        self.create(CreateBranchInput {
            code: code.to_string(),
            name: code.to_string(),
        })
        .await
    }

    /// 删除专业
    pub async fn delete(&self, id: i64) -> Result<(), SqlxError> {
        info!("删除专业，ID: {}", id);

        let result = sqlx::query("DELETE FROM branches WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            warn!("专业不存在，ID: {}", id);
            return Err(SqlxError::RowNotFound);
        }

        info!("专业删除成功，ID: {}", id);
        Ok(())
    }
}

/// 年级班级数据访问接口
pub struct YearSectionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> YearSectionRepository<'a> {
    /// 创建新的年级班级数据访问实例
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// 创建年级班级
    ///
    /// # 参数
    /// - `input`: 创建年级班级的输入数据
    ///
    /// # 返回
    /// - `Ok(YearSection)`: 创建成功
    /// - `Err(SqlxError)`: 创建失败（如三元组重复）
    pub async fn create(&self, input: CreateYearSectionInput) -> Result<YearSection, SqlxError> {
        info!(
            "创建年级班级: 专业 {} {} 年级 {} 班",
            input.branch_id, input.year, input.section
        );

        let result = sqlx::query_as::<_, YearSection>(
            r#"
            INSERT INTO year_sections (branch_id, year, section, created_at)
            VALUES (?, ?, ?, datetime('now'))
            RETURNING id, branch_id, year, section, created_at
            "#,
        )
        .bind(input.branch_id)
        .bind(input.year)
        .bind(&input.section)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            error!("创建年级班级失败: {}", e);
            e
        })?;

        info!("年级班级创建成功，ID: {}", result.id);
        Ok(result)
    }

    /// 根据 ID 查询年级班级
    pub async fn find_by_id(&self, id: i64) -> Result<Option<YearSection>, SqlxError> {
        debug!("查询年级班级，ID: {}", id);

        sqlx::query_as::<_, YearSection>(
            "SELECT id, branch_id, year, section, created_at FROM year_sections WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
    }

    /// 根据 (专业, 年级, 班级) 三元组查询
    pub async fn find_by_cohort(
        &self,
        branch_id: i64,
        year: i64,
        section: &str,
    ) -> Result<Option<YearSection>, SqlxError> {
        debug!(
            "按三元组查询年级班级: 专业 {} {} 年级 {} 班",
            branch_id, year, section
        );

        sqlx::query_as::<_, YearSection>(
            r#"
            SELECT id, branch_id, year, section, created_at
            FROM year_sections
            WHERE branch_id = ? AND year = ? AND section = ?
            "#,
        )
        .bind(branch_id)
        .bind(year)
        .bind(section)
        .fetch_optional(self.pool)
        .await
    }

    /// 查询某个专业的全部年级班级
    pub async fn find_by_branch(&self, branch_id: i64) -> Result<Vec<YearSection>, SqlxError> {
        debug!("查询专业 {} 的全部年级班级", branch_id);

        sqlx::query_as::<_, YearSection>(
            r#"
            SELECT id, branch_id, year, section, created_at
            FROM year_sections
            WHERE branch_id = ?
            ORDER BY year, section
            "#,
        )
        .bind(branch_id)
        .fetch_all(self.pool)
        .await
    }

    /// 查询所有年级班级
    pub async fn find_all(&self) -> Result<Vec<YearSection>, SqlxError> {
        debug!("查询所有年级班级");

        sqlx::query_as::<_, YearSection>(
            r#"
            SELECT id, branch_id, year, section, created_at
            FROM year_sections
            ORDER BY branch_id, year, section
            "#,
        )
        .fetch_all(self.pool)
        .await
    }

    /// 按三元组查找年级班级，不存在时创建
    pub async fn get_or_create(
        &self,
        branch_id: i64,
        year: i64,
        section: &str,
    ) -> Result<YearSection, SqlxError> {
        if let Some(ys) = self.find_by_cohort(branch_id, year, section).await? {
            return Ok(ys);
        }

        debug!(
            "年级班级不存在，自动创建: 专业 {} {} 年级 {} 班",
            branch_id, year, section
        );
        self.create(CreateYearSectionInput {
            branch_id,
            year,
            section: section.to_string(),
        })
        .await
    }

    /// 删除年级班级
    pub async fn delete(&self, id: i64) -> Result<(), SqlxError> {
        info!("删除年级班级，ID: {}", id);

        let result = sqlx::query("DELETE FROM year_sections WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            warn!("年级班级不存在，ID: {}", id);
            return Err(SqlxError::RowNotFound);
        }

        Ok(())
    }
}
