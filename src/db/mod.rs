// ============================================================================
// 数据访问层模块
// ============================================================================
// 本模块封装 SQLite 数据库操作，提供类型安全的数据访问接口
//
// 模块组织：
// - mod.rs       : DatabaseManager 核心结构，管理数据库连接池
// - migrations.rs : 数据库迁移工具
// - branch.rs    : 专业与年级班级数据访问
// - faculty.rs   : 教师数据访问
// - room.rs      : 教室与实验室数据访问
// - subject.rs   : 课程数据访问
// - version.rs   : 课表版本生命周期管理
// - entry.rs     : 课表条目数据访问
//
// 设计原则：
// 1. 使用 sqlx 提供的异步 API
// 2. 所有数据库操作返回 Result<T, sqlx::Error>
// 3. 多步写入使用事务确保数据一致性
// 4. 使用参数化查询防止 SQL 注入
// 5. 关键操作记录日志
// ============================================================================

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Error as SqlxError, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, error, info};

use crate::db::migrations::MigrationManager;

/// 数据库管理器
///
/// 负责管理 SQLite 连接池、执行迁移并提供健康检查接口。
///
/// # 示例
/// ```rust,no_run
/// use college_timetable_system::db::DatabaseManager;
///
/// #[tokio::main]
/// async fn main() -> Result<(), sqlx::Error> {
///     let db = DatabaseManager::new("sqlite://data/timetable.db", "migrations").await?;
///     db.health_check().await?;
///     db.close().await;
///     Ok(())
/// }
/// ```
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// 创建新的数据库管理器
    ///
    /// 此方法会：
    /// 1. 建立数据库连接池（数据库文件不存在时自动创建，外键约束开启）
    /// 2. 自动执行数据库迁移
    /// 3. 验证数据库连接
    ///
    /// # 参数
    /// - `database_url`: 数据库连接字符串，例如 "sqlite://data/timetable.db"
    /// - `migrations_dir`: 迁移脚本目录路径，例如 "migrations"
    ///
    /// # 返回
    /// - `Ok(DatabaseManager)`: 成功创建管理器
    /// - `Err(SqlxError)`: 连接失败或迁移失败
    pub async fn new<P: AsRef<Path>>(
        database_url: &str,
        migrations_dir: P,
    ) -> Result<Self, SqlxError> {
        info!("初始化数据库管理器");
        info!("数据库连接字符串: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| {
                error!("数据库连接字符串解析失败: {}", e);
                e
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| {
                error!("数据库连接失败: {}", e);
                e
            })?;
        info!("数据库连接成功");

        let migrator = MigrationManager::new(&pool, migrations_dir).await?;
        match migrator.run_migrations().await {
            Ok(count) if count > 0 => info!("数据库迁移完成，执行了 {} 个迁移", count),
            Ok(_) => info!("数据库已是最新版本，无需迁移"),
            Err(e) => {
                error!("数据库迁移失败: {}", e);
                return Err(e);
            }
        }

        sqlx::query("SELECT 1").fetch_one(&pool).await.map_err(|e| {
            error!("数据库连接验证失败: {}", e);
            e
        })?;

        info!("数据库管理器初始化完成");
        Ok(Self { pool })
    }

    /// 获取数据库连接池引用
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 执行数据库健康检查
    ///
    /// # 返回
    /// - `Ok(())`: 数据库连接正常
    /// - `Err(SqlxError)`: 数据库连接异常
    pub async fn health_check(&self) -> Result<(), SqlxError> {
        debug!("执行数据库健康检查");

        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("数据库健康检查失败: {}", e);
                e
            })?;

        Ok(())
    }

    /// 获取数据库连接池统计信息
    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
        }
    }

    /// 关闭数据库连接池
    ///
    /// 在应用退出时调用，等待所有活动连接完成后关闭。
    pub async fn close(&self) {
        info!("正在关闭数据库连接池...");

        let stats = self.pool_stats();
        debug!(
            "连接池状态 - 总连接数: {}, 空闲连接数: {}",
            stats.size, stats.idle
        );

        self.pool.close().await;
        info!("数据库连接池已关闭");
    }
}

/// 连接池统计信息
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// 总连接数
    pub size: u32,
    /// 空闲连接数
    pub idle: usize,
}

// 子模块声明
pub mod branch;
pub mod entry;
pub mod faculty;
pub mod migrations;
pub mod room;
pub mod subject;
pub mod version;



// 重新导出常用类型
pub use branch::{
    Branch, BranchRepository, CreateBranchInput, CreateYearSectionInput, YearSection,
    YearSectionRepository,
};

pub use faculty::{CreateFacultyInput, Faculty, FacultyRepository, UpdateFacultyInput};

pub use room::{
    Classroom, ClassroomRepository, CreateClassroomInput, CreateLabRoomInput, LabRoom,
    LabRoomRepository,
};

pub use subject::{
    CreateSubjectInput, Subject, SubjectRepository, SubjectWithCohort, UpdateSubjectInput,
};

pub use version::{TimetableVersion, VersionRepository, VersionSummary};

pub use entry::{EntryRepository, NewEntry, TimetableEntry};
