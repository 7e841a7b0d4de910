//! 运行状态、分块事件与最终报告

use serde::Serialize;
use std::fmt;

use crate::models::{RecordId, ScoreResult};

/// 运行状态机
///
/// `NotStarted → Loading → Running → Completed`，
/// 配置或检查点错误时进入 `Aborted`，外部取消时进入 `Cancelled`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Loading,
    Running,
    Completed,
    Aborted,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Aborted | RunState::Cancelled
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::NotStarted => "未开始",
            RunState::Loading => "加载检查点",
            RunState::Running => "处理中",
            RunState::Completed => "已完成",
            RunState::Aborted => "已中止",
            RunState::Cancelled => "已取消",
        };
        f.write_str(name)
    }
}

/// 单个分块的处理状态
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChunkStatus {
    /// 评分并合并成功（结果可能少于分块记录数）
    Succeeded {
        accepted: usize,
        dropped: usize,
        attempts: usize,
    },
    /// 检查点已覆盖全部记录，跳过
    Skipped,
    /// 所有尝试均失败
    Exhausted { attempts: usize, last_error: String },
    /// 超过分块超时时间
    TimedOut { after_ms: u64 },
    /// 评分成功但检查点写入失败，结果未保存
    PersistFailed { error: String },
}

impl ChunkStatus {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ChunkStatus::Exhausted { .. }
                | ChunkStatus::TimedOut { .. }
                | ChunkStatus::PersistFailed { .. }
        )
    }
}

/// 分块状态事件，供日志 / UI 消费
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkEvent {
    pub chunk_index: usize,
    pub record_ids: Vec<RecordId>,
    #[serde(flatten)]
    pub status: ChunkStatus,
}

/// 记录未得到结果的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// 所在分块重试耗尽
    ChunkExhausted,
    /// 所在分块超时
    ChunkTimedOut,
    /// 检查点写入失败
    PersistFailed,
    /// 服务没有返回该记录的合法结果
    NotReturned,
    /// 运行被取消，所在分块未完成
    NotProcessed,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnresolvedReason::ChunkExhausted => "分块重试耗尽",
            UnresolvedReason::ChunkTimedOut => "分块超时",
            UnresolvedReason::PersistFailed => "检查点写入失败",
            UnresolvedReason::NotReturned => "服务未返回有效结果",
            UnresolvedReason::NotProcessed => "运行取消，未处理",
        };
        f.write_str(text)
    }
}

impl From<&ChunkStatus> for UnresolvedReason {
    fn from(status: &ChunkStatus) -> Self {
        match status {
            ChunkStatus::Exhausted { .. } => UnresolvedReason::ChunkExhausted,
            ChunkStatus::TimedOut { .. } => UnresolvedReason::ChunkTimedOut,
            ChunkStatus::PersistFailed { .. } => UnresolvedReason::PersistFailed,
            ChunkStatus::Succeeded { .. } | ChunkStatus::Skipped => UnresolvedReason::NotReturned,
        }
    }
}

/// 本次运行没有结果的记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnresolvedRecord {
    pub id: RecordId,
    pub chunk_index: usize,
    pub reason: UnresolvedReason,
}

/// 运行统计
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub total_records: usize,
    pub total_chunks: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// 因取消而未完成的分块
    pub not_processed: usize,
    pub scored_records: usize,
    pub unresolved_records: usize,
}

/// 最终报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub state: RunState,
    /// 检查点中的全部结果，按 ID 排序
    pub results: Vec<ScoreResult>,
    /// 没有结果的记录，按输入顺序
    pub unresolved: Vec<UnresolvedRecord>,
    /// 各分块状态，按分块序号排序
    pub chunks: Vec<ChunkEvent>,
    pub stats: RunStats,
}

impl RunReport {
    pub fn unresolved_ids(&self) -> Vec<RecordId> {
        self.unresolved.iter().map(|u| u.id.clone()).collect()
    }

    pub fn result_for(&self, id: &RecordId) -> Option<&ScoreResult> {
        self.results.iter().find(|r| &r.id == id)
    }
}
