// ============================================================================
// 教师数据访问模块
// ============================================================================
// 本模块提供教师相关的数据库操作接口
//
// 功能：
// - 教师的 CRUD 操作
// - 按工号、姓名查找
// - 导入流程使用的 get_or_create 语义
// ============================================================================

use serde::{Deserialize, Serialize};
use sqlx::{Error as SqlxError, FromRow, SqlitePool};
use tracing::{debug, error, info, warn};

/// 教师信息
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Faculty {
    /// 教师 ID
    pub id: i64,
    /// 工号（全局唯一）
    pub employee_id: String,
    /// 姓名
    pub name: String,
    /// 院系
    pub department: Option<String>,
    /// 邮箱
    pub email: Option<String>,
    /// 是否在职
    pub is_active: i64,
    /// 创建时间
    pub created_at: String,
}

/// 创建教师的输入数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFacultyInput {
    /// 工号
    pub employee_id: String,
    /// 姓名
    pub name: String,
    /// 院系
    pub department: Option<String>,
    /// 邮箱
    pub email: Option<String>,
}

/// 更新教师的输入数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateFacultyInput {
    /// 姓名
    pub name: Option<String>,
    /// 院系
    pub department: Option<String>,
    /// 邮箱
    pub email: Option<String>,
    /// 是否在职
    pub is_active: Option<bool>,
}

/// 教师数据访问接口
pub struct FacultyRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FacultyRepository<'a> {
    /// 创建新的教师数据访问实例
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// 创建教师
    ///
    /// # 参数
    /// - `input`: 创建教师的输入数据
    ///
    /// # 返回
    /// - `Ok(Faculty)`: 创建成功，返回教师信息
    /// - `Err(SqlxError)`: 创建失败（如工号重复）
    pub async fn create(&self, input: CreateFacultyInput) -> Result<Faculty, SqlxError> {
        info!("创建教师: {} ({})", input.name, input.employee_id);

        let result = sqlx::query_as::<_, Faculty>(
            r#"
            INSERT INTO faculty (employee_id, name, department, email, is_active, created_at)
            VALUES (?, ?, ?, ?, 1, datetime('now'))
            RETURNING id, employee_id, name, department, email, is_active, created_at
            "#,
        )
        .bind(&input.employee_id)
        .bind(&input.name)
        .bind(&input.department)
        .bind(&input.email)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            error!("创建教师失败: {}", e);
            e
        })?;

        info!("教师创建成功，ID: {}", result.id);
        Ok(result)
    }

    /// 根据 ID 查询教师
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Faculty>, SqlxError> {
        debug!("查询教师，ID: {}", id);

        sqlx::query_as::<_, Faculty>(
            r#"
            SELECT id, employee_id, name, department, email, is_active, created_at
            FROM faculty
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
    }

    /// 根据姓名查询教师
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Faculty>, SqlxError> {
        debug!("按姓名查询教师: {}", name);

        sqlx::query_as::<_, Faculty>(
            r#"
            SELECT id, employee_id, name, department, email, is_active, created_at
            FROM faculty
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await
    }

    /// 查询所有教师
    pub async fn find_all(&self) -> Result<Vec<Faculty>, SqlxError> {
        debug!("查询所有教师");

        let result = sqlx::query_as::<_, Faculty>(
            r#"
            SELECT id, employee_id, name, department, email, is_active, created_at
            FROM faculty
            ORDER BY employee_id
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        info!("查询到 {} 位教师", result.len());
        Ok(result)
    }

    /// 查询在职教师数量
    pub async fn count_active(&self) -> Result<i64, SqlxError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM faculty WHERE is_active = 1")
            .fetch_one(self.pool)
            .await?;
        Ok(row.0)
    }

    /// 按姓名查找教师，不存在时以截断姓名作为工号创建
    ///
    /// 导入流程使用：任务行只携带教师姓名。
    pub async fn get_or_create_by_name(&self, name: &str) -> Result<Faculty, SqlxError> {
        if let Some(faculty) = self.find_by_name(name).await? {
            return Ok(faculty);
        }

        debug!("教师 {} 不存在，自动创建", name);
        let employee_id: String = name.chars().take(10).collect();
        self.create(CreateFacultyInput {
            employee_id,
            name: name.to_string(),
            department: None,
            email: None,
        })
        .await
    }

    /// 更新教师信息
    ///
    /// # 参数
    /// - `id`: 教师 ID
    /// - `input`: 更新教师的输入数据
    ///
    /// # 返回
    /// - `Ok(Faculty)`: 更新成功，返回更新后的教师信息
    /// - `Err(SqlxError)`: 更新失败
    pub async fn update(&self, id: i64, input: UpdateFacultyInput) -> Result<Faculty, SqlxError> {
        info!("更新教师信息，ID: {}", id);

        let mut updates = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(name) = &input.name {
            updates.push("name = ?");
            params.push(name.clone());
        }

        if let Some(department) = &input.department {
            updates.push("department = ?");
            params.push(department.clone());
        }

        if let Some(email) = &input.email {
            updates.push("email = ?");
            params.push(email.clone());
        }

        if let Some(is_active) = input.is_active {
            updates.push("is_active = ?");
            params.push(if is_active { "1" } else { "0" }.to_string());
        }

        if updates.is_empty() {
            warn!("没有需要更新的字段");
            return self.find_by_id(id).await?.ok_or_else(|| {
                error!("教师不存在，ID: {}", id);
                SqlxError::RowNotFound
            });
        }

        let sql = format!(
            "UPDATE faculty SET {} WHERE id = ? \
             RETURNING id, employee_id, name, department, email, is_active, created_at",
            updates.join(", ")
        );

        let mut query = sqlx::query_as::<_, Faculty>(&sql);
        for param in params {
            query = query.bind(param);
        }
        query = query.bind(id);

        let result = query.fetch_one(self.pool).await.map_err(|e| {
            error!("更新教师失败: {}", e);
            e
        })?;

        info!("教师信息更新成功，ID: {}", id);
        Ok(result)
    }

    /// 删除教师
    pub async fn delete(&self, id: i64) -> Result<(), SqlxError> {
        info!("删除教师，ID: {}", id);

        let result = sqlx::query("DELETE FROM faculty WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            warn!("教师不存在，ID: {}", id);
            return Err(SqlxError::RowNotFound);
        }

        info!("教师删除成功，ID: {}", id);
        Ok(())
    }
}
