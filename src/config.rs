use std::time::Duration;

use tracing::warn;

use crate::models::MAX_FILE_SIZE_BYTES;
use crate::services::ProcessingMode;

/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 分析服务地址
    pub api_base_url: String,
    /// 提交方式
    pub processing_mode: ProcessingMode,
    /// 轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 单个文件大小上限
    pub max_file_size_bytes: u64,
    /// 单个请求超时（秒），不作用于推送通道
    pub request_timeout_secs: u64,
    /// 结果缓存目录
    pub result_cache_dir: String,
    /// 完成后是否保存结果
    pub save_results: bool,
    /// 存在失败文件时自动重试的轮数，0 表示不自动重试
    pub auto_retry_rounds: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5001".to_string(),
            processing_mode: ProcessingMode::ImmediateBatch,
            poll_interval_ms: 2000,
            max_file_size_bytes: MAX_FILE_SIZE_BYTES,
            request_timeout_secs: 600,
            result_cache_dir: ".analysis_cache".to_string(),
            save_results: false,
            auto_retry_rounds: 0,
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            api_base_url: std::env::var("ANALYSIS_API_BASE_URL").unwrap_or(default.api_base_url),
            processing_mode: parse_processing_mode(std::env::var("PROCESSING_MODE").ok())
                .unwrap_or_else(|| {
                    ProcessingMode::select(env_flag("USE_SEQUENTIAL"), env_flag("USE_ITERATOR"))
                }),
            poll_interval_ms: std::env::var("POLL_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.poll_interval_ms),
            max_file_size_bytes: std::env::var("MAX_FILE_SIZE_BYTES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_file_size_bytes),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.request_timeout_secs),
            result_cache_dir: std::env::var("RESULT_CACHE_DIR").unwrap_or(default.result_cache_dir),
            save_results: std::env::var("SAVE_RESULTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.save_results),
            auto_retry_rounds: std::env::var("AUTO_RETRY_ROUNDS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.auto_retry_rounds),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// 解析 `PROCESSING_MODE`，无法识别的值记录警告后忽略
fn parse_processing_mode(value: Option<String>) -> Option<ProcessingMode> {
    match value?.parse() {
        Ok(mode) => Some(mode),
        Err(e) => {
            warn!("⚠️ {}，改用 USE_SEQUENTIAL / USE_ITERATOR 开关", e);
            None
        }
    }
}

/// 读取布尔开关，未设置或无法解析时为 false
fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false)
}
