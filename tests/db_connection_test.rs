// ============================================================================
// 数据库连接集成测试
// ============================================================================
// 本测试文件验证 DatabaseManager 的初始化、迁移与健康检查
//
// 测试策略：
// 1. 使用临时目录中的数据库文件，验证文件自动创建
// 2. 验证迁移在初始化时自动执行
// 3. 验证健康检查与连接池统计
// ============================================================================

use college_timetable_system::db::DatabaseManager;
use tempfile::TempDir;

/// 迁移脚本目录（仓库根目录下的 migrations/）
fn migrations_dir() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
}

#[tokio::test]
async fn test_manager_creates_database_file() {
    let temp_dir = TempDir::new().expect("创建临时目录失败");
    let db_path = temp_dir.path().join("timetable.db");
    let db_url = format!("sqlite://{}", db_path.display());

    let db = DatabaseManager::new(&db_url, migrations_dir())
        .await
        .expect("初始化数据库管理器失败");

    assert!(db_path.exists());
    db.close().await;
}

#[tokio::test]
async fn test_manager_runs_migrations() {
    let temp_dir = TempDir::new().expect("创建临时目录失败");
    let db_url = format!("sqlite://{}", temp_dir.path().join("timetable.db").display());

    let db = DatabaseManager::new(&db_url, migrations_dir())
        .await
        .expect("初始化数据库管理器失败");

    // 核心表在迁移后存在
    for table in [
        "branches",
        "year_sections",
        "faculty",
        "classrooms",
        "lab_rooms",
        "subjects",
        "timetable_versions",
        "timetable_entries",
    ] {
        let row = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
            .bind(table)
            .fetch_optional(db.pool())
            .await
            .expect("查询表失败");
        assert!(row.is_some(), "缺少数据表 {}", table);
    }

    db.close().await;
}

#[tokio::test]
async fn test_manager_reopen_is_idempotent() {
    let temp_dir = TempDir::new().expect("创建临时目录失败");
    let db_url = format!("sqlite://{}", temp_dir.path().join("timetable.db").display());

    let first = DatabaseManager::new(&db_url, migrations_dir())
        .await
        .expect("首次初始化失败");
    first.close().await;

    // 再次打开同一数据库不重复执行迁移
    let second = DatabaseManager::new(&db_url, migrations_dir())
        .await
        .expect("再次初始化失败");
    second.health_check().await.expect("健康检查失败");
    second.close().await;
}

#[tokio::test]
async fn test_health_check_and_pool_stats() {
    let temp_dir = TempDir::new().expect("创建临时目录失败");
    let db_url = format!("sqlite://{}", temp_dir.path().join("timetable.db").display());

    let db = DatabaseManager::new(&db_url, migrations_dir())
        .await
        .expect("初始化数据库管理器失败");

    db.health_check().await.expect("健康检查失败");

    let stats = db.pool_stats();
    assert!(stats.size >= 1);

    db.close().await;
}

#[tokio::test]
async fn test_missing_migrations_dir_fails() {
    let temp_dir = TempDir::new().expect("创建临时目录失败");
    let db_url = format!("sqlite://{}", temp_dir.path().join("timetable.db").display());

    let result = DatabaseManager::new(&db_url, "/nonexistent/migrations").await;
    assert!(result.is_err());
}
