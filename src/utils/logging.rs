/// 日志工具模块
///
/// 提供日志初始化和格式化输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::RunReport;

/// 初始化日志
///
/// `RUST_LOG` 优先；否则 `verbose` 为真时使用 debug 级别。
/// 重复调用是安全的。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 分块评分模式");
    info!(
        "📊 分块大小: {} | 最大并发: {} | 最大尝试次数: {}",
        config.chunk_size, config.max_concurrent_chunks, config.retry.max_retries
    );
    info!("📄 检查点: {}", config.checkpoint_path.display());
    info!("{}", "=".repeat(60));
}

/// 记录分块规划信息
///
/// # 参数
/// - `total_records`: 记录总数
/// - `total_chunks`: 分块总数
/// - `already_scored`: 检查点中已有的结果数
pub fn log_chunks_planned(total_records: usize, total_chunks: usize, already_scored: usize) {
    info!("✓ 共 {} 条记录，分为 {} 个分块", total_records, total_chunks);
    if already_scored > 0 {
        info!("💡 检查点中已有 {} 条结果，已完成的分块将被跳过", already_scored);
    }
}

/// 打印最终统计信息
pub fn print_final_stats(report: &RunReport) {
    let stats = &report.stats;
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计 ({})", report.state);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!(
        "📦 分块: 成功 {} / 跳过 {} / 失败 {} / 未处理 {} (共 {})",
        stats.succeeded, stats.skipped, stats.failed, stats.not_processed, stats.total_chunks
    );
    info!(
        "✅ 已评分记录: {}/{}",
        stats.scored_records, stats.total_records
    );
    info!("❌ 未解决记录: {}", stats.unresolved_records);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（字符数）
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
