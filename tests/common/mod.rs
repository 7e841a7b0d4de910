//! 集成测试共用的评分服务替身

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use batch_scorer::config::{Backoff, Config, RetryPolicy};
use batch_scorer::error::ScoringError;
use batch_scorer::infrastructure::{ScoringRequest, ScoringService};
use batch_scorer::models::{Record, RecordId};

type Responder = Box<dyn Fn(&ScoringRequest) -> String + Send + Sync>;

/// 可编排的评分服务
///
/// 默认按请求中的记录 ID 逐条返回分数 7
pub struct MockScorer {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    failing_chunks: HashSet<usize>,
    slow_chunks: HashSet<usize>,
    delay: Duration,
    responder: Responder,
}

impl MockScorer {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            failing_chunks: HashSet::new(),
            slow_chunks: HashSet::new(),
            delay: Duration::ZERO,
            responder: Box::new(|request| scores_for(&request.record_ids, 7)),
        }
    }

    /// 这些分块的每次调用都返回传输错误
    pub fn failing(mut self, chunks: &[usize]) -> Self {
        self.failing_chunks.extend(chunks);
        self
    }

    /// 这些分块的调用永远不会按时返回
    pub fn stalling(mut self, chunks: &[usize]) -> Self {
        self.slow_chunks.extend(chunks);
        self
    }

    /// 每次调用的固定延迟
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_responder(
        mut self,
        responder: impl Fn(&ScoringRequest) -> String + Send + Sync + 'static,
    ) -> Self {
        self.responder = Box::new(responder);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoringService for MockScorer {
    async fn complete(&self, request: &ScoringRequest) -> Result<String, ScoringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        if self.slow_chunks.contains(&request.chunk_index) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.failing_chunks.contains(&request.chunk_index) {
            return Err(ScoringError::transport("mock", "connection refused"));
        }

        Ok((self.responder)(request))
    }
}

/// 任务被取消时也能正确减少计数
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 为给定 ID 生成一个 JSON 数组回复，包在说明文字里
pub fn scores_for(ids: &[RecordId], score: i64) -> String {
    let items: Vec<Value> = ids
        .iter()
        .map(|id| json!({ "ID": id.to_json(), "score": score, "rationale": "looks fine" }))
        .collect();
    format!(
        "好的，以下是评分结果：\n```json\n{}\n```",
        Value::Array(items)
    )
}

/// 生成 ID 为 1..=n 的记录
pub fn records(n: i64) -> Vec<Record> {
    (1..=n)
        .map(|i| {
            let mut fields = Map::new();
            fields.insert("text".into(), json!(format!("record number {i}")));
            Record::new(i, fields)
        })
        .collect()
}

pub fn ids(range: std::ops::RangeInclusive<i64>) -> Vec<RecordId> {
    range.map(RecordId::Int).collect()
}

/// 测试用配置：重试间隔极短，检查点位于临时目录
pub fn test_config(dir: &Path, chunk_size: usize) -> Config {
    Config {
        chunk_size,
        retry: RetryPolicy {
            max_retries: 3,
            retry_delay: Duration::from_millis(1),
            backoff: Backoff::Fixed,
            max_retry_delay: Duration::from_millis(10),
        },
        max_concurrent_chunks: 4,
        chunk_timeout: Duration::from_secs(10),
        checkpoint_path: dir.join("checkpoint.jsonl"),
        output_path: dir.join("scores.json"),
        unresolved_path: dir.join("unresolved.txt"),
        ..Config::default()
    }
}
