// 高校排课系统服务入口
// 初始化日志与数据库后启动 HTTP 服务

use std::sync::Arc;

use tracing::info;

use college_timetable_system::api::{build_router, AppState};
use college_timetable_system::{
    init_logging, AppConfig, DatabaseManager, LogConfig, DESCRIPTION, NAME, VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    // 根据编译模式自动选择开发或生产配置
    let log_config = if cfg!(debug_assertions) {
        LogConfig::development()
    } else {
        LogConfig::production()
    };

    if let Err(e) = init_logging(log_config) {
        eprintln!("日志系统初始化失败: {}", e);
        std::process::exit(1);
    }

    info!("排课服务启动中...");
    info!("名称: {} - {}", NAME, DESCRIPTION);
    info!("版本: {}", VERSION);
    info!(
        "编译模式: {}",
        if cfg!(debug_assertions) {
            "开发"
        } else {
            "生产"
        }
    );

    // 加载配置
    let config = AppConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;

    // 初始化数据库（自动执行迁移）
    let db = DatabaseManager::new(&config.database_url, &config.migrations_dir).await?;
    db.health_check().await?;

    // 构建路由并启动服务
    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState::new(db, config));
    let router = build_router(state);

    info!("HTTP 服务监听: {}", bind_address);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
