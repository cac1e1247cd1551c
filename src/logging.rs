// ============================================================================
// 日志系统模块
// ============================================================================
// 本模块实现基于 tracing 框架的结构化日志记录系统
//
// 功能特性：
// - 支持 DEBUG / INFO / WARN / ERROR 日志级别
// - 控制台输出（pretty）与文件输出（JSON）可独立开关
// - 日志文件按日期自动轮转，过期文件自动清理
// - 敏感信息过滤，避免密钥类内容落盘
//
// 使用示例：
// ```rust
// use tracing::{info, warn};
//
// info!("排课服务启动");
// info!(version_id = 3, "课表版本已激活");
// warn!(subject = "CS201", "课程未排满");
// ```
// ============================================================================

use std::path::PathBuf;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 日志级别
    pub level: Level,
    /// 日志目录
    pub log_dir: PathBuf,
    /// 是否输出到控制台
    pub console_output: bool,
    /// 是否输出到文件
    pub file_output: bool,
    /// 日志文件名前缀
    pub file_prefix: String,
    /// 是否包含目标模块
    pub with_target: bool,
    /// 是否包含文件和行号
    pub with_location: bool,
    /// 是否包含线程信息
    pub with_thread_info: bool,
    /// 日志文件保留天数（0 表示不自动清理）
    pub retention_days: u32,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: if cfg!(debug_assertions) {
                Level::DEBUG
            } else {
                Level::INFO
            },
            log_dir: PathBuf::from("logs"),
            console_output: true,
            file_output: true,
            file_prefix: "college-timetable".to_string(),
            with_target: true,
            with_location: true,
            with_thread_info: false,
            retention_days: 30,
        }
    }
}

impl LogConfig {
    /// 创建开发环境配置
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            console_output: true,
            file_output: true,
            with_thread_info: true,
            retention_days: 7,
            ..Default::default()
        }
    }

    /// 创建生产环境配置
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            console_output: false,
            file_output: true,
            with_thread_info: false,
            retention_days: 30,
            ..Default::default()
        }
    }

    /// 创建测试环境配置
    pub fn test() -> Self {
        Self {
            level: Level::DEBUG,
            console_output: true,
            file_output: false,
            retention_days: 0,
            ..Default::default()
        }
    }
}

/// 初始化日志系统
///
/// 根据配置初始化 tracing 订阅器。RUST_LOG 环境变量优先于
/// 配置中的级别。
///
/// # 参数
/// - `config`: 日志配置
///
/// # 错误
/// 日志目录创建失败或文件 appender 构建失败时返回错误
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.file_output {
        std::fs::create_dir_all(&config.log_dir)?;

        if config.retention_days > 0 {
            cleanup_old_logs(&config.log_dir, &config.file_prefix, config.retention_days)?;
        }
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{}={},sqlx=warn",
            env!("CARGO_PKG_NAME").replace('-', "_"),
            config.level
        ))
    });

    // 控制台输出：pretty 格式
    let console_layer = config.console_output.then(|| {
        fmt::layer()
            .with_target(config.with_target)
            .with_file(config.with_location)
            .with_line_number(config.with_location)
            .with_thread_ids(config.with_thread_info)
            .with_thread_names(config.with_thread_info)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(true)
            .pretty()
    });

    // 文件输出：JSON 格式，按日轮转
    let file_layer = if config.file_output {
        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(&config.file_prefix)
            .filename_suffix("log")
            .build(&config.log_dir)?;

        Some(
            fmt::layer()
                .with_writer(file_appender)
                .with_target(config.with_target)
                .with_file(config.with_location)
                .with_line_number(config.with_location)
                .with_thread_ids(config.with_thread_info)
                .with_thread_names(config.with_thread_info)
                .with_span_events(FmtSpan::CLOSE)
                .with_ansi(false)
                .json(),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}

/// 快速初始化日志系统
///
/// 根据编译模式选择开发或生产配置。
pub fn init_default_logging() {
    let config = if cfg!(debug_assertions) {
        LogConfig::development()
    } else {
        LogConfig::production()
    };

    if let Err(e) = init_logging(config) {
        eprintln!("日志系统初始化失败: {}", e);
    }
}

/// 敏感信息过滤器
///
/// 过滤日志中的密码、密钥类内容。
///
/// # 示例
/// ```rust
/// use college_timetable_system::logging::sanitize_sensitive_data;
///
/// let data = "password=secret123&api_key=abc123";
/// let sanitized = sanitize_sensitive_data(data);
/// assert_eq!(sanitized, "password=***&api_key=***");
/// ```
pub fn sanitize_sensitive_data(data: &str) -> String {
    let sensitive_patterns = [
        "password",
        "passwd",
        "pwd",
        "secret",
        "token",
        "api_key",
        "apikey",
        "access_key",
        "private_key",
        "authorization",
    ];

    let mut result = data.to_string();

    for pattern in &sensitive_patterns {
        // key=value 格式
        let re = regex::Regex::new(&format!(r"(?i){}=[^&\s]*", pattern)).unwrap();
        result = re
            .replace_all(&result, &format!("{}=***", pattern))
            .to_string();

        // "key": "value" 格式（JSON）
        let re = regex::Regex::new(&format!(r#"(?i)"{}"\s*:\s*"[^"]*""#, pattern)).unwrap();
        result = re
            .replace_all(&result, &format!(r#""{}": "***""#, pattern))
            .to_string();
    }

    result
}

/// 清理旧日志文件
///
/// 删除超过保留期限的日志文件。
///
/// # 参数
/// - `log_dir`: 日志目录路径
/// - `file_prefix`: 日志文件名前缀
/// - `retention_days`: 保留天数
pub fn cleanup_old_logs(
    log_dir: &PathBuf,
    file_prefix: &str,
    retention_days: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let cutoff_time = now.saturating_sub(retention_days as u64 * 24 * 60 * 60);

    let entries = std::fs::read_dir(log_dir)?;
    let mut deleted_count = 0;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if !file_name.starts_with(file_prefix) || !file_name.ends_with(".log") {
            continue;
        }

        if let Ok(metadata) = entry.metadata() {
            if let Ok(modified) = metadata.modified() {
                let modified_secs = modified
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();

                if modified_secs < cutoff_time {
                    match std::fs::remove_file(&path) {
                        Ok(_) => {
                            deleted_count += 1;
                            eprintln!("已删除旧日志文件: {:?}", path);
                        }
                        Err(e) => {
                            eprintln!("删除日志文件失败 {:?}: {}", path, e);
                        }
                    }
                }
            }
        }
    }

    if deleted_count > 0 {
        eprintln!("清理完成，共删除 {} 个旧日志文件", deleted_count);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert!(config.console_output);
        assert!(config.file_output);
        assert_eq!(config.file_prefix, "college-timetable");
    }

    #[test]
    fn test_log_config_development() {
        let config = LogConfig::development();
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.console_output);
        assert!(config.with_thread_info);
        assert_eq!(config.retention_days, 7);
    }

    #[test]
    fn test_log_config_production() {
        let config = LogConfig::production();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.console_output);
        assert!(!config.with_thread_info);
        assert_eq!(config.retention_days, 30);
    }

    #[test]
    fn test_log_config_test_profile() {
        let config = LogConfig::test();
        assert!(!config.file_output);
        assert_eq!(config.retention_days, 0);
    }

    #[test]
    fn test_sanitize_sensitive_data() {
        let data = "username=admin&password=secret123&api_key=abc123";
        let sanitized = sanitize_sensitive_data(data);
        assert!(sanitized.contains("password=***"));
        assert!(sanitized.contains("api_key=***"));
        assert!(sanitized.contains("username=admin"));
    }

    #[test]
    fn test_sanitize_json_data() {
        let data = r#"{"username": "admin", "password": "secret123", "token": "abc123"}"#;
        let sanitized = sanitize_sensitive_data(data);
        assert!(sanitized.contains(r#""password": "***""#));
        assert!(sanitized.contains(r#""token": "***""#));
        assert!(sanitized.contains(r#""username": "admin""#));
    }

    #[test]
    fn test_cleanup_old_logs_runs() {
        use std::fs::File;
        use std::io::Write;
        use tempfile::TempDir;

        let temp_dir = TempDir::new().expect("创建临时目录失败");
        let log_dir = temp_dir.path().to_path_buf();

        let new_file = log_dir.join("college-timetable.2026-01-15.log");
        File::create(&new_file)
            .expect("创建日志文件失败")
            .write_all(b"log line")
            .expect("写入失败");

        // 新文件不会被删除
        cleanup_old_logs(&log_dir, "college-timetable", 30).expect("清理失败");
        assert!(new_file.exists());
    }
}
