use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use batch_scorer::config::Config;
use batch_scorer::error::FileError;
use batch_scorer::infrastructure::OpenAiBackend;
use batch_scorer::models::load_records;
use batch_scorer::orchestrator::Engine;
use batch_scorer::services::ReportWriter;
use batch_scorer::utils::logging;

const DEFAULT_TASK: &str = "请根据每条记录的内容质量打分，分数越高代表质量越好，并用一句话说明理由。";

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env().context("读取环境变量配置失败")?;

    // 初始化日志
    logging::init(config.verbose_logging);

    config.validate()?;
    config.validate_backend()?;
    logging::log_startup(&config);

    // 加载记录与任务说明
    info!("\n📁 正在加载记录: {}", config.records_path.display());
    let records = load_records(&config.records_path, &config.id_field).await?;
    if records.is_empty() {
        warn!("⚠️ 没有找到待评分的记录，程序结束");
        return Ok(());
    }
    let task = load_task(&config).await?;

    // 运行
    let backend = Arc::new(OpenAiBackend::new(&config));
    let writer = ReportWriter::new(&config.output_path, &config.unresolved_path);
    let engine = Engine::new(config, backend);

    let report = engine
        .run_until(&records, &task, async {
            if tokio::signal::ctrl_c().await.is_err() {
                // 无法监听信号时不响应取消
                std::future::pending::<()>().await;
            }
        })
        .await?;

    writer.write(&report)?;
    logging::print_final_stats(&report);

    Ok(())
}

/// 任务说明：TASK_FILE 优先，其次 TASK_DESCRIPTION，最后使用内置默认值
async fn load_task(config: &Config) -> Result<String> {
    if let Some(path) = &config.task_file {
        return read_task_file(path).await;
    }
    Ok(config
        .task_description
        .clone()
        .unwrap_or_else(|| DEFAULT_TASK.to_string()))
}

async fn read_task_file(path: &Path) -> Result<String> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| FileError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(text.trim().to_string())
}
