/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use tracing::info;

use crate::config::Config;

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 图片分析提交");
    info!("🌐 分析服务: {}", config.api_base_url);
    info!("📊 处理模式: {}", config.processing_mode);
    info!("{}", "=".repeat(60));
}

/// 记录候选文件加载信息
pub fn log_candidates_loaded(total: usize, skipped: usize) {
    info!("✓ 找到 {} 个候选文件", total);
    if skipped > 0 {
        info!("⚠️ 有 {} 个路径无法读取，已跳过", skipped);
    }
}

/// 打印最终统计信息
///
/// # 参数
/// - `succeeded`: 成功数量
/// - `failed`: 失败数量
/// - `total`: 总数
pub fn print_final_stats(succeeded: usize, failed: usize, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", succeeded, total);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

/// 把字节数格式化为可读文本
///
/// 以 1024 为底，最多保留两位小数并去掉末尾的 0，例如 `1.5 MB`、`2 KB`
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut scale: u64 = 1;
    while unit < UNITS.len() - 1 && bytes >= scale * 1024 {
        scale *= 1024;
        unit += 1;
    }

    let value = format!("{:.2}", bytes as f64 / scale as f64);
    let value = value.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", value, UNITS[unit])
}
