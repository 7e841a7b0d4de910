//! 分块处理流程 - 流程层
//!
//! 核心职责：定义"一个分块"的完整处理流程
//!
//! 流程顺序：
//! 1. 查询检查点，全部已评分则跳过
//! 2. 评分（含重试，整体受超时限制）
//! 3. 合并进检查点并落盘

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::models::{Chunk, ChunkStatus};
use crate::services::{CheckpointStore, ScoringClient};
use crate::workflow::chunk_ctx::ChunkCtx;

/// 分块处理流程
///
/// - 编排单个分块的跳过 / 评分 / 合并
/// - 不感知其他分块，也不控制并发
/// - 检查点是唯一的共享可变资源，合并通过互斥锁串行化
pub struct ChunkFlow {
    client: ScoringClient,
    store: Arc<Mutex<CheckpointStore>>,
    task_description: String,
    chunk_timeout: Duration,
}

impl ChunkFlow {
    pub fn new(
        client: ScoringClient,
        store: Arc<Mutex<CheckpointStore>>,
        task_description: impl Into<String>,
        chunk_timeout: Duration,
    ) -> Self {
        Self {
            client,
            store,
            task_description: task_description.into(),
            chunk_timeout,
        }
    }

    pub async fn run(&self, chunk: &Chunk, ctx: &ChunkCtx) -> ChunkStatus {
        let ids = chunk.record_ids();

        // ========== 步骤 1: 检查点查询 ==========
        let pending = {
            let store = self.store.lock().await;
            let scored = store.already_scored(&ids);
            ids.len() - scored.len()
        };

        if pending == 0 {
            info!("{} ⏭️ 检查点已覆盖全部 {} 条记录，跳过", ctx, ids.len());
            return ChunkStatus::Skipped;
        }

        // 服务按分块评分，即使只有部分记录缺失也发送整个分块
        info!(
            "{} 🔍 开始评分: 记录 {}-{}，待评分 {}/{}",
            ctx,
            chunk.start + 1,
            chunk.start + chunk.len(),
            pending,
            chunk.len()
        );

        // ========== 步骤 2: 评分 ==========
        let scores = match timeout(
            self.chunk_timeout,
            self.client.score_chunk(chunk, &self.task_description),
        )
        .await
        {
            Ok(Ok(scores)) => scores,
            Ok(Err(exhausted)) => {
                error!("{} ❌ {}", ctx, exhausted);
                return ChunkStatus::Exhausted {
                    attempts: exhausted.attempts,
                    last_error: exhausted.last_error.to_string(),
                };
            }
            Err(_) => {
                error!("{} ❌ 超过 {:?} 仍未完成，放弃该分块", ctx, self.chunk_timeout);
                return ChunkStatus::TimedOut {
                    after_ms: self.chunk_timeout.as_millis() as u64,
                };
            }
        };

        if scores.results.len() < chunk.len() {
            warn!(
                "{} ⚠️ 服务只返回了 {}/{} 条有效结果",
                ctx,
                scores.results.len(),
                chunk.len()
            );
        }

        // ========== 步骤 3: 合并 ==========
        let accepted = scores.results.len();
        if accepted > 0 {
            // 取得锁之后直到写盘完成都没有 await 点，取消不会留下半个分块
            let mut store = self.store.lock().await;
            if let Err(e) = store.merge(scores.results) {
                error!("{} ❌ {}", ctx, e);
                return ChunkStatus::PersistFailed {
                    error: e.to_string(),
                };
            }
        }

        info!(
            "{} ✓ 完成: 接受 {} 条，丢弃 {} 条，尝试 {} 次",
            ctx,
            accepted,
            scores.dropped.len(),
            scores.attempts
        );

        ChunkStatus::Succeeded {
            accepted,
            dropped: scores.dropped.len(),
            attempts: scores.attempts,
        }
    }
}
