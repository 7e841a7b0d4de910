//! 检查点存储 - 业务能力层
//!
//! 持久化本次运行已得到的全部评分结果，崩溃或重启后不会重复评分。
//!
//! ## 文件格式
//!
//! JSON Lines，每行一个 `{"id": ..., "score": ..., "rationale": ...}`，按 ID 排序。
//! 空行被忽略；任何一行无法解析都视为检查点损坏。
//!
//! ## 写入
//!
//! 每次合并都完整重写文件（临时文件 → fsync → rename），
//! 写入失败时磁盘文件和内存状态都保持合并前的样子。

use std::collections::{BTreeMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::CheckpointError;
use crate::infrastructure::write_file_atomic;
use crate::models::{RecordId, ScoreResult};

/// 合并统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    /// 新增的记录数
    pub inserted: usize,
    /// 覆盖已有结果的记录数
    pub replaced: usize,
}

/// 检查点存储
///
/// 职责：
/// - 加载 / 查询 / 合并评分结果
/// - 保证同一个 ID 只有一条结果
/// - 不关心分块和重试
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    results: BTreeMap<RecordId, ScoreResult>,
}

impl CheckpointStore {
    /// 加载检查点，文件不存在时返回空检查点
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let path = path.into();

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("📄 检查点不存在，从空白开始: {}", path.display());
                return Ok(Self {
                    path,
                    results: BTreeMap::new(),
                });
            }
            Err(source) => return Err(CheckpointError::ReadFailed { path, source }),
        };

        let results = decode(&path, &content)?;
        info!(
            "📄 已加载检查点: {} 条结果 ({})",
            results.len(),
            path.display()
        );

        Ok(Self { path, results })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, id: &RecordId) -> Option<&ScoreResult> {
        self.results.get(id)
    }

    /// 返回给定 ID 中已经有结果的部分
    pub fn already_scored<'a, I>(&self, ids: I) -> HashSet<RecordId>
    where
        I: IntoIterator<Item = &'a RecordId>,
    {
        ids.into_iter()
            .filter(|id| self.results.contains_key(*id))
            .cloned()
            .collect()
    }

    /// 合并结果并原子地重写检查点文件
    ///
    /// 按 ID 覆盖（后写入者胜出）。写入失败时返回错误，内存状态不变。
    pub fn merge<I>(&mut self, results: I) -> Result<MergeSummary, CheckpointError>
    where
        I: IntoIterator<Item = ScoreResult>,
    {
        let mut next = self.results.clone();
        let mut summary = MergeSummary::default();

        for result in results {
            if next.insert(result.id.clone(), result).is_some() {
                summary.replaced += 1;
            } else {
                summary.inserted += 1;
            }
        }

        let encoded = encode(&next);
        write_file_atomic(&self.path, encoded.as_bytes()).map_err(|source| {
            CheckpointError::WriteFailed {
                path: self.path.clone(),
                source,
            }
        })?;

        self.results = next;
        debug!(
            "检查点已写入: 新增 {}, 覆盖 {}, 共 {} 条",
            summary.inserted,
            summary.replaced,
            self.results.len()
        );

        Ok(summary)
    }

    /// 全部结果，按 ID 排序
    pub fn results(&self) -> Vec<ScoreResult> {
        self.results.values().cloned().collect()
    }
}

fn encode(results: &BTreeMap<RecordId, ScoreResult>) -> String {
    let mut out = String::new();
    for result in results.values() {
        // ScoreResult 只包含字符串和整数，序列化不会失败
        if let Ok(line) = serde_json::to_string(result) {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

fn decode(path: &Path, content: &str) -> Result<BTreeMap<RecordId, ScoreResult>, CheckpointError> {
    let mut results = BTreeMap::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let result: ScoreResult =
            serde_json::from_str(line).map_err(|source| CheckpointError::Corrupt {
                path: path.to_path_buf(),
                line: index + 1,
                source,
            })?;
        results.insert(result.id.clone(), result);
    }
    Ok(results)
}
