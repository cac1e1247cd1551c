// ============================================================================
// 服务配置模块
// ============================================================================
// 本模块从环境变量加载服务配置（.env 文件优先加载）
//
// 环境变量：
// - DATABASE_URL       : 数据库连接字符串（默认 sqlite://data/timetable.db）
// - BIND_ADDRESS       : HTTP 监听地址（默认 0.0.0.0:8000）
// - MIGRATIONS_DIR     : 迁移脚本目录（默认 migrations）
// - GEN_TIMEOUT_MS     : 生成墙钟预算，毫秒（默认 30000）
// - GEN_ATTEMPT_FACTOR : 尝试上限系数（默认 2）
//
// 认证相关的 JWT_* 变量属于外部网关，本服务不读取。
// ============================================================================

use serde::{Deserialize, Serialize};
use tracing::info;

/// 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 数据库连接字符串
    pub database_url: String,
    /// HTTP 监听地址
    pub bind_address: String,
    /// 迁移脚本目录
    pub migrations_dir: String,
    /// 生成墙钟预算（毫秒）
    pub gen_timeout_ms: u64,
    /// 放置器尝试上限系数
    pub gen_attempt_factor: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://data/timetable.db".to_string(),
            bind_address: "0.0.0.0:8000".to_string(),
            migrations_dir: "migrations".to_string(),
            gen_timeout_ms: 30_000,
            gen_attempt_factor: 2,
        }
    }
}

impl AppConfig {
    /// 从环境变量加载配置
    ///
    /// 先尝试加载 .env 文件（不存在时忽略），未设置的变量取默认值。
    ///
    /// # 返回
    /// - `Ok(AppConfig)`: 配置加载成功
    /// - `Err(String)`: 数值变量解析失败或配置非法
    pub fn from_env() -> Result<Self, String> {
        // .env 缺失不是错误
        let _ = dotenvy::dotenv();

        let defaults = Self::default();

        let config = Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_address: std::env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            migrations_dir: std::env::var("MIGRATIONS_DIR").unwrap_or(defaults.migrations_dir),
            gen_timeout_ms: parse_env("GEN_TIMEOUT_MS", defaults.gen_timeout_ms)?,
            gen_attempt_factor: parse_env("GEN_ATTEMPT_FACTOR", defaults.gen_attempt_factor)?,
        };

        config.validate()?;

        info!(
            "配置加载完成 - 监听: {}, 预算: {} 毫秒, 尝试系数: {}",
            config.bind_address, config.gen_timeout_ms, config.gen_attempt_factor
        );
        Ok(config)
    }

    /// 校验配置合法性
    pub fn validate(&self) -> Result<(), String> {
        if self.database_url.is_empty() {
            return Err("DATABASE_URL 不能为空".to_string());
        }
        if self.gen_timeout_ms == 0 {
            return Err("GEN_TIMEOUT_MS 必须大于 0".to_string());
        }
        if self.gen_attempt_factor == 0 {
            return Err("GEN_ATTEMPT_FACTOR 必须大于 0".to_string());
        }
        Ok(())
    }
}

/// 解析数值型环境变量，未设置时取默认值
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, String> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| format!("环境变量 {} 的值 {} 无法解析", name, value)),
        Err(_) => Ok(default),
    }
}
