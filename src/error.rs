//! 错误类型
//!
//! 按关注点分组：配置 / 评分服务 / 检查点 / 文件。
//! 只有 `ConfigError` 和 `CheckpointError::Corrupt` 会中止整个运行，
//! 其余错误都被限制在单个分块内部。

use std::path::PathBuf;
use thiserror::Error;

use crate::models::RecordId;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误（致命）
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 评分服务错误（可重试，作用域为单个分块）
    #[error("评分服务错误: {0}")]
    Scoring(#[from] ScoringError),
    /// 检查点错误
    #[error("检查点错误: {0}")]
    Checkpoint(#[from] CheckpointError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
}

impl AppError {
    /// 是否属于会中止运行的错误
    pub fn is_fatal(&self) -> bool {
        match self {
            AppError::Config(_) | AppError::File(_) => true,
            AppError::Checkpoint(CheckpointError::WriteFailed { .. }) => false,
            AppError::Checkpoint(_) => true,
            AppError::Scoring(_) => false,
        }
    }
}

/// 配置错误（InvalidConfig）
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 分块大小必须为正
    #[error("分块大小必须大于 0")]
    NonPositiveChunkSize,
    /// 重试次数必须为正
    #[error("最大尝试次数必须大于 0")]
    ZeroRetries,
    /// 并发数必须为正
    #[error("最大并发分块数必须大于 0")]
    ZeroConcurrency,
    /// 超时时间必须为正
    #[error("分块超时时间必须大于 0")]
    ZeroTimeout,
    /// 退避参数不合法
    #[error("退避参数不合法: {reason}")]
    InvalidBackoff { reason: String },
    /// 分数区间不合法
    #[error("分数区间不合法: [{min}, {max}]")]
    InvalidScoreBounds { min: i64, max: i64 },
    /// 记录缺少 ID 字段
    #[error("第 {index} 条记录缺少 ID 字段 '{field}'")]
    MissingRecordId { index: usize, field: String },
    /// 记录 ID 类型不合法（只能是字符串或整数）
    #[error("第 {index} 条记录的 ID 不是字符串或整数: {value}")]
    InvalidRecordId { index: usize, value: String },
    /// 记录不是对象
    #[error("第 {index} 条记录不是 JSON 对象")]
    RecordNotObject { index: usize },
    /// 记录 ID 重复
    #[error("记录 ID 重复: {id}")]
    DuplicateRecordId { id: RecordId },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 缺少必需的配置项
    #[error("缺少必需的配置项: {name}")]
    MissingSetting { name: String },
}

/// 评分服务错误
#[derive(Debug, Error)]
pub enum ScoringError {
    /// 网络或服务端失败（TransportError）
    #[error("评分服务调用失败 (模型: {model}): {source}")]
    Transport {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 服务返回空内容
    #[error("评分服务返回内容为空 (模型: {model})")]
    EmptyResponse { model: String },
    /// 响应中找不到可解析的结果列表（ParseFailure）
    #[error("响应解析失败: {0}")]
    Parse(#[from] ParseFailure),
}

impl ScoringError {
    /// 包装任意传输层错误
    pub fn transport(
        model: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        ScoringError::Transport {
            model: model.into(),
            source: source.into(),
        }
    }
}

/// 响应解析失败
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// 响应中没有任何 `[` 开头的列表
    #[error("响应中没有找到列表 (响应: {preview})")]
    NoList { preview: String },
    /// 找到了列表，但都不是合法的结果记录列表
    #[error("响应中的列表都不是合法的评分结果 (候选数: {candidates}, 响应: {preview})")]
    NoWellFormedList { candidates: usize, preview: String },
}

/// 单条结果校验失败（ValidationFailure），只会被记录并丢弃
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    /// 分数超出区间
    #[error("记录 {id} 的分数 {score} 超出区间 [{min}, {max}]")]
    ScoreOutOfRange {
        id: String,
        score: i64,
        min: i64,
        max: i64,
    },
    /// 记录 ID 不属于当前分块
    #[error("记录 {id} 不属于当前分块")]
    ForeignRecord { id: String },
}

/// 分块用尽所有尝试仍失败（ChunkExhausted），运行继续
#[derive(Debug, Error)]
#[error("分块在 {attempts} 次尝试后仍失败: {last_error}")]
pub struct ChunkExhausted {
    pub attempts: usize,
    #[source]
    pub last_error: ScoringError,
}

/// 检查点错误
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// 检查点存在但无法反序列化（CorruptCheckpoint）
    #[error("检查点已损坏 ({}, 第 {line} 行): {source}", path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    /// 读取检查点失败
    #[error("读取检查点失败 ({}): {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 写入检查点失败
    #[error("写入检查点失败 ({}): {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {}", path.display())]
    NotFound { path: PathBuf },
    /// 读取文件失败
    #[error("读取文件失败 ({}): {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({}): {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 文件内容无法解析
    #[error("解析文件失败 ({}): {message}", path.display())]
    ParseFailed { path: PathBuf, message: String },
    /// 不支持的文件格式
    #[error("不支持的文件格式: {}", path.display())]
    UnsupportedFormat { path: PathBuf },
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(AppError::from(ConfigError::NonPositiveChunkSize).is_fatal());

        let corrupt = CheckpointError::Corrupt {
            path: PathBuf::from("run.jsonl"),
            line: 3,
            source: serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
        };
        assert!(AppError::from(corrupt).is_fatal());

        let parse = ScoringError::Parse(ParseFailure::NoList {
            preview: "好的".to_string(),
        });
        assert!(!AppError::from(parse).is_fatal());

        let write = CheckpointError::WriteFailed {
            path: PathBuf::from("run.jsonl"),
            source: std::io::Error::other("disk full"),
        };
        assert!(!AppError::from(write).is_fatal());
    }

    #[test]
    fn test_corrupt_message_mentions_line() {
        let err = CheckpointError::Corrupt {
            path: PathBuf::from("run.jsonl"),
            line: 7,
            source: serde_json::from_str::<serde_json::Value>("nope").unwrap_err(),
        };
        let msg = err.to_string();
        assert!(msg.contains("run.jsonl"));
        assert!(msg.contains("第 7 行"));
    }
}
