// ============================================================================
// 数据库迁移工具模块
// ============================================================================
// 本模块实现基于文件的数据库迁移
//
// 功能：
// 1. 扫描迁移目录下的 SQL 文件，按文件名顺序执行
// 2. 已执行的迁移版本记录在 schema_migrations 表中，重复运行为空操作
// 3. 单个迁移在事务内执行，失败整体回滚
//
// 使用方法：
// ```rust
// let migrator = MigrationManager::new(&pool, "migrations").await?;
// migrator.run_migrations().await?;
// ```
// ============================================================================

use sqlx::{Error as SqlxError, Row, SqlitePool};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// 迁移管理器
///
/// 负责扫描、执行和记录数据库迁移脚本
pub struct MigrationManager {
    pool: SqlitePool,
    migrations_dir: PathBuf,
}

/// 迁移脚本信息
#[derive(Debug, Clone)]
pub struct Migration {
    /// 版本号（不含扩展名的文件名）
    pub version: String,
    /// SQL 内容
    pub sql: String,
}

impl MigrationManager {
    /// 创建新的迁移管理器
    ///
    /// # 参数
    /// - `pool`: 数据库连接池
    /// - `migrations_dir`: 迁移脚本目录路径
    ///
    /// # 返回
    /// - `Ok(MigrationManager)`: 成功创建管理器
    /// - `Err(SqlxError)`: 目录不存在或初始化失败
    pub async fn new<P: AsRef<Path>>(
        pool: &SqlitePool,
        migrations_dir: P,
    ) -> Result<Self, SqlxError> {
        let migrations_dir = migrations_dir.as_ref().to_path_buf();

        info!("初始化迁移管理器，迁移目录: {}", migrations_dir.display());

        if !migrations_dir.exists() {
            error!("迁移目录不存在: {}", migrations_dir.display());
            return Err(SqlxError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("迁移目录不存在: {}", migrations_dir.display()),
            )));
        }

        Self::ensure_migrations_table(pool).await?;

        Ok(Self {
            pool: pool.clone(),
            migrations_dir,
        })
    }

    /// 确保 schema_migrations 表存在
    async fn ensure_migrations_table(pool: &SqlitePool) -> Result<(), SqlxError> {
        debug!("确保 schema_migrations 表存在");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// 运行所有待执行的迁移
    ///
    /// # 返回
    /// - `Ok(usize)`: 本次执行的迁移数量
    /// - `Err(SqlxError)`: 迁移执行失败
    pub async fn run_migrations(&self) -> Result<usize, SqlxError> {
        info!("开始执行数据库迁移");

        let all_migrations = self.scan_migrations()?;
        let applied = self.get_applied_migrations().await?;

        let pending: Vec<Migration> = all_migrations
            .into_iter()
            .filter(|m| !applied.contains(&m.version))
            .collect();

        if pending.is_empty() {
            info!("数据库已是最新版本，无需迁移");
            return Ok(0);
        }

        info!("待执行 {} 个迁移", pending.len());

        let mut executed = 0;
        for migration in pending {
            info!("执行迁移: {}", migration.version);
            self.execute_migration(&migration).await.map_err(|e| {
                error!("迁移 {} 执行失败: {}", migration.version, e);
                e
            })?;
            executed += 1;
        }

        info!("数据库迁移完成，共执行 {} 个迁移", executed);
        Ok(executed)
    }

    /// 扫描迁移目录，返回按版本号排序的迁移列表
    pub fn scan_migrations(&self) -> Result<Vec<Migration>, SqlxError> {
        debug!("扫描迁移目录: {}", self.migrations_dir.display());

        let mut migrations = Vec::new();

        let entries = fs::read_dir(&self.migrations_dir).map_err(|e| {
            error!("读取迁移目录失败: {}", e);
            SqlxError::Io(e)
        })?;

        for entry in entries {
            let path = entry.map_err(SqlxError::Io)?.path();

            if path.extension().and_then(|s| s.to_str()) != Some("sql") {
                continue;
            }

            let sql = fs::read_to_string(&path).map_err(|e| {
                error!("读取迁移文件失败: {}", path.display());
                SqlxError::Io(e)
            })?;

            let version = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| {
                    SqlxError::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("无效的迁移文件名: {}", path.display()),
                    ))
                })?
                .to_string();

            debug!("发现迁移脚本: {}", version);
            migrations.push(Migration { version, sql });
        }

        migrations.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(migrations)
    }

    /// 获取已执行的迁移版本列表
    async fn get_applied_migrations(&self) -> Result<Vec<String>, SqlxError> {
        let rows = sqlx::query("SELECT version FROM schema_migrations ORDER BY version")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("version")).collect())
    }

    /// 在事务内执行单个迁移脚本并记录版本
    ///
    /// SQLite 的单次 execute 只接受一条语句，
    /// 脚本按分号结尾拆分后逐条执行。
    async fn execute_migration(&self, migration: &Migration) -> Result<(), SqlxError> {
        let mut tx = self.pool.begin().await?;

        for statement in split_sql(&migration.sql) {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                continue;
            }

            sqlx::query(trimmed).execute(&mut *tx).await.map_err(|e| {
                error!("执行 SQL 语句失败: {}", e);
                error!("失败的语句: {}", trimmed);
                e
            })?;
        }

        sqlx::query(
            "INSERT INTO schema_migrations (version) VALUES (?)
             ON CONFLICT(version) DO NOTHING",
        )
        .bind(&migration.version)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// 获取当前数据库版本（最后执行的迁移版本）
    pub async fn get_current_version(&self) -> Result<Option<String>, SqlxError> {
        let row =
            sqlx::query("SELECT version FROM schema_migrations ORDER BY version DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|r| r.get("version")))
    }
}

/// 按语句拆分 SQL 脚本
///
/// 跳过纯注释行，以分号结尾作为语句边界。
fn split_sql(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }

        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            statements.push(current.clone());
            current.clear();
        }
    }

    if !current.trim().is_empty() {
        statements.push(current);
    }

    statements
}
