// ============================================================================
// 课表版本数据访问模块
// ============================================================================
// 本模块提供课表版本的生命周期管理
//
// 功能：
// - 版本创建（创建即激活，原子清除其他版本的活动标志）
// - 活动版本查询与切换
// - 版本删除（级联删除其条目）
// - 版本列表（附带条目数量）
//
// 跨模块不变式：任意时刻最多一个版本处于活动状态，
// 由 create / activate 内部的两步写事务保证。
// ============================================================================

use serde::{Deserialize, Serialize};
use sqlx::{Error as SqlxError, FromRow, SqlitePool};
use tracing::{debug, error, info, warn};

/// 课表版本信息
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TimetableVersion {
    /// 版本 ID
    pub id: i64,
    /// 版本名称
    pub name: String,
    /// 是否为活动版本
    pub is_active: i64,
    /// 来源标记：generated / manual / imported
    pub source: String,
    /// 创建时间
    pub created_at: String,
}

/// 版本摘要（附带条目数量）
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VersionSummary {
    /// 版本 ID
    pub id: i64,
    /// 版本名称
    pub name: String,
    /// 是否为活动版本
    pub is_active: i64,
    /// 来源标记
    pub source: String,
    /// 创建时间
    pub created_at: String,
    /// 条目数量
    pub entry_count: i64,
}

/// 课表版本数据访问接口
pub struct VersionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> VersionRepository<'a> {
    /// 创建新的版本数据访问实例
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// 创建新版本并激活
    ///
    /// 在同一事务内先清除所有版本的活动标志，再插入活动的新版本，
    /// 保证"最多一个活动版本"不变式。
    ///
    /// # 参数
    /// - `name`: 版本名称
    /// - `source`: 来源标记（generated / manual / imported）
    ///
    /// # 返回
    /// - `Ok(TimetableVersion)`: 新建的活动版本
    /// - `Err(SqlxError)`: 创建失败
    pub async fn create(&self, name: &str, source: &str) -> Result<TimetableVersion, SqlxError> {
        info!("创建课表版本: {} (来源: {})", name, source);

        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE timetable_versions SET is_active = 0 WHERE is_active = 1")
            .execute(&mut *tx)
            .await?;

        let version = sqlx::query_as::<_, TimetableVersion>(
            r#"
            INSERT INTO timetable_versions (name, is_active, source, created_at)
            VALUES (?, 1, ?, datetime('now'))
            RETURNING id, name, is_active, source, created_at
            "#,
        )
        .bind(name)
        .bind(source)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            error!("创建课表版本失败: {}", e);
            e
        })?;

        tx.commit().await?;

        info!("课表版本创建成功，ID: {}", version.id);
        Ok(version)
    }

    /// 根据 ID 查询版本
    pub async fn find_by_id(&self, id: i64) -> Result<Option<TimetableVersion>, SqlxError> {
        debug!("查询课表版本，ID: {}", id);

        sqlx::query_as::<_, TimetableVersion>(
            "SELECT id, name, is_active, source, created_at FROM timetable_versions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
    }

    /// 查询当前活动版本
    ///
    /// # 返回
    /// - `Ok(Some(TimetableVersion))`: 当前活动版本
    /// - `Ok(None)`: 没有活动版本
    /// - `Err(SqlxError)`: 查询失败
    pub async fn get_active(&self) -> Result<Option<TimetableVersion>, SqlxError> {
        debug!("查询活动课表版本");

        sqlx::query_as::<_, TimetableVersion>(
            r#"
            SELECT id, name, is_active, source, created_at
            FROM timetable_versions
            WHERE is_active = 1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(self.pool)
        .await
    }

    /// 激活指定版本
    ///
    /// 幂等操作：重复激活同一版本不产生变化。
    /// 在同一事务内先清除其他版本的活动标志再设置目标版本。
    ///
    /// # 参数
    /// - `id`: 要激活的版本 ID
    ///
    /// # 返回
    /// - `Ok(TimetableVersion)`: 激活后的版本
    /// - `Err(SqlxError::RowNotFound)`: 版本不存在
    pub async fn activate(&self, id: i64) -> Result<TimetableVersion, SqlxError> {
        info!("激活课表版本，ID: {}", id);

        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE timetable_versions SET is_active = 0 WHERE is_active = 1")
            .execute(&mut *tx)
            .await?;

        let version = sqlx::query_as::<_, TimetableVersion>(
            r#"
            UPDATE timetable_versions SET is_active = 1 WHERE id = ?
            RETURNING id, name, is_active, source, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let version = match version {
            Some(v) => v,
            None => {
                warn!("课表版本不存在，ID: {}", id);
                return Err(SqlxError::RowNotFound);
            }
        };

        tx.commit().await?;

        info!("课表版本激活成功，ID: {}", id);
        Ok(version)
    }

    /// 删除版本及其全部条目
    ///
    /// 条目随版本一起删除。被删除的版本若是活动版本，
    /// 删除后系统暂时没有活动版本，直到显式激活另一个版本。
    ///
    /// # 参数
    /// - `id`: 要删除的版本 ID
    pub async fn delete(&self, id: i64) -> Result<(), SqlxError> {
        info!("删除课表版本，ID: {}", id);

        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM timetable_entries WHERE version_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        debug!("删除版本 {} 的 {} 个条目", id, removed.rows_affected());

        let result = sqlx::query("DELETE FROM timetable_versions WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            warn!("课表版本不存在，ID: {}", id);
            return Err(SqlxError::RowNotFound);
        }

        tx.commit().await?;

        info!("课表版本删除成功，ID: {}", id);
        Ok(())
    }

    /// 删除全部版本与条目
    pub async fn delete_all(&self) -> Result<u64, SqlxError> {
        info!("删除全部课表版本与条目");

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM timetable_entries")
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM timetable_versions")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("已删除 {} 个课表版本", result.rows_affected());
        Ok(result.rows_affected())
    }

    /// 列出全部版本及其条目数量
    ///
    /// # 返回
    /// - `Ok(Vec<VersionSummary>)`: 按创建时间倒序的版本摘要列表
    pub async fn list(&self) -> Result<Vec<VersionSummary>, SqlxError> {
        debug!("查询课表版本列表");

        let result = sqlx::query_as::<_, VersionSummary>(
            r#"
            SELECT
                v.id, v.name, v.is_active, v.source, v.created_at,
                COUNT(e.id) AS entry_count
            FROM timetable_versions v
            LEFT JOIN timetable_entries e ON e.version_id = v.id
            GROUP BY v.id
            ORDER BY v.created_at DESC, v.id DESC
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        info!("查询到 {} 个课表版本", result.len());
        Ok(result)
    }
}
