//! 批量评分引擎 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个批处理的入口，负责一次运行的生命周期。
//!
//! ## 核心功能
//!
//! 1. **前置校验**：配置与记录 ID 唯一性，失败则在任何服务调用之前中止
//! 2. **加载检查点**：损坏的检查点同样中止运行
//! 3. **分块**：委托 `splitter` 按输入顺序切分
//! 4. **并发控制**：使用 Semaphore 限制同时处理的分块数量
//! 5. **取消**：收到取消信号后终止所有未完成的分块，已落盘的结果保留
//! 6. **汇总报告**：结果、未解决记录及其原因、各分块状态
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个分块的细节，委托 `ChunkFlow`
//! - **失败隔离**：单个分块失败只影响该分块的记录
//! - **状态可观察**：运行状态通过 watch 通道发布

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::ScoringService;
use crate::models::{
    ensure_unique_ids, ChunkEvent, ChunkStatus, Record, RecordId, RunReport, RunState, RunStats,
    ScoreResult, UnresolvedReason, UnresolvedRecord,
};
use crate::orchestrator::splitter::{chunk_index_of, split};
use crate::services::{CheckpointStore, ScoringClient};
use crate::utils::logging::log_chunks_planned;
use crate::workflow::{ChunkCtx, ChunkFlow};

/// 批量评分引擎
pub struct Engine {
    config: Config,
    service: Arc<dyn ScoringService>,
    events: Option<mpsc::UnboundedSender<ChunkEvent>>,
    state: watch::Sender<RunState>,
}

impl Engine {
    pub fn new(config: Config, service: Arc<dyn ScoringService>) -> Self {
        let (state, _) = watch::channel(RunState::NotStarted);
        Self {
            config,
            service,
            events: None,
            state,
        }
    }

    /// 每个分块结束时向该通道发送一条 `ChunkEvent`
    pub fn with_event_sink(mut self, sink: mpsc::UnboundedSender<ChunkEvent>) -> Self {
        self.events = Some(sink);
        self
    }

    /// 订阅运行状态变化
    pub fn subscribe_state(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 运行到结束（不可取消）
    pub async fn run(&self, records: &[Record], task_description: &str) -> AppResult<RunReport> {
        self.run_until(records, task_description, std::future::pending())
            .await
    }

    /// 运行到结束，或直到 `shutdown` 完成
    ///
    /// - 配置非法、ID 重复、检查点损坏：返回 `Err`，状态为 `Aborted`
    /// - 正常结束：`Completed`；被取消：`Cancelled`
    /// - 分块级失败不会让本函数返回 `Err`，而是体现在报告里
    pub async fn run_until<F>(
        &self,
        records: &[Record],
        task_description: &str,
        shutdown: F,
    ) -> AppResult<RunReport>
    where
        F: Future<Output = ()>,
    {
        match self.execute(records, task_description, shutdown).await {
            Ok(report) => {
                self.set_state(report.state);
                Ok(report)
            }
            Err(e) => {
                error!("❌ 运行中止: {}", e);
                self.set_state(RunState::Aborted);
                Err(e)
            }
        }
    }

    async fn execute<F>(
        &self,
        records: &[Record],
        task_description: &str,
        shutdown: F,
    ) -> AppResult<RunReport>
    where
        F: Future<Output = ()>,
    {
        // ========== 前置校验 ==========
        self.config.validate()?;
        ensure_unique_ids(records)?;
        let chunks = split(records, self.config.chunk_size)?;

        // ========== 加载检查点 ==========
        self.set_state(RunState::Loading);
        let store = CheckpointStore::load(&self.config.checkpoint_path)?;
        log_chunks_planned(records.len(), chunks.len(), store.len());
        let store = Arc::new(Mutex::new(store));

        let flow = Arc::new(ChunkFlow::new(
            ScoringClient::new(Arc::clone(&self.service), &self.config),
            Arc::clone(&store),
            task_description,
            self.config.chunk_timeout,
        ));

        // ========== 并发处理分块 ==========
        self.set_state(RunState::Running);
        let total_chunks = chunks.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_chunks));
        let mut tasks = JoinSet::new();

        for chunk in chunks {
            let semaphore = Arc::clone(&semaphore);
            let flow = Arc::clone(&flow);

            tasks.spawn(async move {
                // Semaphore 从不关闭，acquire 只会成功
                let _permit = semaphore.acquire_owned().await.ok();
                let ctx = ChunkCtx::new(chunk.index, total_chunks);
                let status = flow.run(&chunk, &ctx).await;
                ChunkEvent {
                    chunk_index: chunk.index,
                    record_ids: chunk.record_ids(),
                    status,
                }
            });
        }

        let mut events = Vec::with_capacity(total_chunks);
        let mut cancelled = false;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown, if !cancelled => {
                    warn!("⚠️ 收到取消信号，停止所有未完成的分块");
                    cancelled = true;
                    tasks.abort_all();
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok(event)) => {
                        self.emit(&event);
                        events.push(event);
                    }
                    Some(Err(e)) if e.is_cancelled() => {
                        debug!("分块任务已取消");
                    }
                    Some(Err(e)) => {
                        error!("❌ 分块任务执行失败: {}", e);
                    }
                }
            }
        }

        // 所有任务均已结束，合并不会再发生
        let results = store.lock().await.results();
        let state = if cancelled {
            RunState::Cancelled
        } else {
            RunState::Completed
        };

        Ok(build_report(
            state,
            records,
            self.config.chunk_size,
            total_chunks,
            events,
            results,
        ))
    }

    fn emit(&self, event: &ChunkEvent) {
        if let Some(sink) = &self.events {
            // 接收端已关闭时忽略
            let _ = sink.send(event.clone());
        }
    }

    fn set_state(&self, state: RunState) {
        info!("🔄 运行状态: {}", state);
        self.state.send_replace(state);
    }
}

/// 汇总最终报告
///
/// 没有结果的输入记录按输入顺序列出，原因取自所在分块的状态；
/// 所在分块没有状态（被取消）的记录标记为未处理。
fn build_report(
    state: RunState,
    records: &[Record],
    chunk_size: usize,
    total_chunks: usize,
    mut events: Vec<ChunkEvent>,
    results: Vec<ScoreResult>,
) -> RunReport {
    events.sort_by_key(|e| e.chunk_index);

    let status_by_chunk: HashMap<usize, &ChunkStatus> =
        events.iter().map(|e| (e.chunk_index, &e.status)).collect();
    let scored: HashSet<&RecordId> = results.iter().map(|r| &r.id).collect();

    let unresolved: Vec<UnresolvedRecord> = records
        .iter()
        .enumerate()
        .filter(|(_, record)| !scored.contains(record.id()))
        .map(|(position, record)| {
            let chunk_index = chunk_index_of(position, chunk_size);
            let reason = status_by_chunk
                .get(&chunk_index)
                .map(|status| UnresolvedReason::from(*status))
                .unwrap_or(UnresolvedReason::NotProcessed);
            UnresolvedRecord {
                id: record.id().clone(),
                chunk_index,
                reason,
            }
        })
        .collect();

    let stats = RunStats {
        total_records: records.len(),
        total_chunks,
        succeeded: count(&events, |s| matches!(s, ChunkStatus::Succeeded { .. })),
        skipped: count(&events, |s| matches!(s, ChunkStatus::Skipped)),
        failed: count(&events, ChunkStatus::is_failure),
        not_processed: total_chunks - events.len(),
        scored_records: records.len() - unresolved.len(),
        unresolved_records: unresolved.len(),
    };

    RunReport {
        state,
        results,
        unresolved,
        chunks: events,
        stats,
    }
}

fn count(events: &[ChunkEvent], pred: impl Fn(&ChunkStatus) -> bool) -> usize {
    events.iter().filter(|e| pred(&e.status)).count()
}
