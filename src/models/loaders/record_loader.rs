use crate::error::{AppResult, FileError};
use crate::models::record::{ensure_unique_ids, Record};
use serde_json::Value as JsonValue;
use std::path::Path;
use tokio::fs;

/// 从文件加载记录
///
/// 支持的格式（按扩展名判断）：
/// - `.json`：对象数组
/// - `.jsonl`：每行一个对象
/// - `.toml`：`[[records]]` 表数组
///
/// 缺少 ID、ID 类型不合法或 ID 重复都会返回配置错误。
pub async fn load_records(path: &Path, id_field: &str) -> AppResult<Vec<Record>> {
    if !path.exists() {
        return Err(FileError::NotFound {
            path: path.to_path_buf(),
        }
        .into());
    }

    let content = fs::read_to_string(path)
        .await
        .map_err(|source| FileError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;

    let values = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => parse_json_array(path, &content)?,
        Some("jsonl") => parse_json_lines(path, &content)?,
        Some("toml") => parse_toml_table(path, &content)?,
        _ => {
            return Err(FileError::UnsupportedFormat {
                path: path.to_path_buf(),
            }
            .into())
        }
    };

    let records = values
        .into_iter()
        .enumerate()
        .map(|(index, value)| Record::from_json(index, value, id_field))
        .collect::<Result<Vec<_>, _>>()?;

    ensure_unique_ids(&records)?;

    tracing::info!(
        "成功加载 {} 条记录: {}",
        records.len(),
        path.file_name().unwrap_or_default().to_string_lossy()
    );

    Ok(records)
}

fn parse_json_array(path: &Path, content: &str) -> Result<Vec<JsonValue>, FileError> {
    serde_json::from_str::<Vec<JsonValue>>(content).map_err(|e| FileError::ParseFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn parse_json_lines(path: &Path, content: &str) -> Result<Vec<JsonValue>, FileError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(line_no, line)| {
            serde_json::from_str::<JsonValue>(line).map_err(|e| FileError::ParseFailed {
                path: path.to_path_buf(),
                message: format!("第 {} 行: {}", line_no + 1, e),
            })
        })
        .collect()
}

fn parse_toml_table(path: &Path, content: &str) -> Result<Vec<JsonValue>, FileError> {
    #[derive(serde::Deserialize)]
    struct RecordFile {
        #[serde(default)]
        records: Vec<toml::Table>,
    }

    let file: RecordFile = toml::from_str(content).map_err(|e| FileError::ParseFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    file.records
        .into_iter()
        .map(|table| {
            serde_json::to_value(table).map_err(|e| FileError::ParseFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        })
        .collect()
}
