//! 评分客户端 - 业务能力层
//!
//! 只负责"给一个分块打分"的能力：组装请求、调用服务、解析、校验、重试。
//! 不关心检查点，也不关心其他分块。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::{Config, RetryPolicy};
use crate::error::{ChunkExhausted, ScoringError, ValidationFailure};
use crate::infrastructure::{ScoringRequest, ScoringService};
use crate::models::{Chunk, RecordId, ScoreBounds, ScoreResult};
use crate::services::response_parser::{parse_scores, RawScore};

const SYSTEM_MESSAGE: &str = "你是一个严谨的评分助手。你会收到一组记录和一段评分任务说明，\
                              需要逐条为记录打分并给出简短理由。\
                              最终答案必须是一个 JSON 数组，不要输出数组以外的解释。";

/// 单个分块的评分结果
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkScores {
    /// 通过校验的结果，按分块内记录顺序排列
    pub results: Vec<ScoreResult>,
    /// 被丢弃的结果
    pub dropped: Vec<ValidationFailure>,
    /// 实际使用的尝试次数
    pub attempts: usize,
}

/// 评分客户端
///
/// 职责：
/// - 把分块序列化进一次请求
/// - 在同一个分块上按策略重试
/// - 逐条丢弃不合法的结果，保留其余部分
pub struct ScoringClient {
    service: Arc<dyn ScoringService>,
    retry: RetryPolicy,
    bounds: ScoreBounds,
}

impl ScoringClient {
    pub fn new(service: Arc<dyn ScoringService>, config: &Config) -> Self {
        Self {
            service,
            retry: config.retry.clone(),
            bounds: config.score_bounds,
        }
    }

    /// 给一个分块打分
    ///
    /// 传输失败和解析失败都会重试，最多 `max_retries` 次尝试；
    /// 用尽后返回 `ChunkExhausted`，由调用方决定如何上报。
    pub async fn score_chunk(
        &self,
        chunk: &Chunk,
        task_description: &str,
    ) -> Result<ChunkScores, ChunkExhausted> {
        let request = self.build_request(chunk, task_description);
        let max_attempts = self.retry.max_retries.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.attempt(&request, chunk).await {
                Ok((results, dropped)) => {
                    return Ok(ChunkScores {
                        results,
                        dropped,
                        attempts: attempt,
                    });
                }
                Err(e) if attempt >= max_attempts => {
                    return Err(ChunkExhausted {
                        attempts: attempt,
                        last_error: e,
                    });
                }
                Err(e) => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        "[分块 {}] 尝试 {}/{} 失败: {}，{:?} 后重试...",
                        chunk.index + 1,
                        attempt,
                        max_attempts,
                        e,
                        delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    /// 一次尝试：调用 → 解析 → 校验
    async fn attempt(
        &self,
        request: &ScoringRequest,
        chunk: &Chunk,
    ) -> Result<(Vec<ScoreResult>, Vec<ValidationFailure>), ScoringError> {
        let response = self.service.complete(request).await?;
        let raw = parse_scores(&response)?;
        debug!(
            "[分块 {}] 解析到 {} 条结果 (分块记录数: {})",
            chunk.index + 1,
            raw.len(),
            chunk.len()
        );
        Ok(validate_scores(raw, chunk, self.bounds))
    }

    /// 构建请求
    pub fn build_request(&self, chunk: &Chunk, task_description: &str) -> ScoringRequest {
        let lines: Vec<String> = chunk.records.iter().map(|r| r.to_prompt_line()).collect();

        let user_message = format!(
            r#"{task}

【待评分记录】（共 {count} 条，每行一个 JSON 对象）
{records}

【输出格式】
只返回一个 JSON 数组，每条记录对应一个对象：
[{{"ID": <记录ID>, "score": <{min} 到 {max} 之间的整数>, "rationale": "<评分理由>"}}]
不要遗漏记录，不要改动记录ID。"#,
            task = task_description,
            count = chunk.len(),
            records = lines.join("\n"),
            min = self.bounds.min,
            max = self.bounds.max,
        );

        ScoringRequest {
            chunk_index: chunk.index,
            record_ids: chunk.record_ids(),
            system_message: SYSTEM_MESSAGE.to_string(),
            user_message,
        }
    }
}

/// 逐条校验结果
///
/// 分数越界或 ID 不属于本分块的结果被单独丢弃，其余保留；
/// 同一个 ID 出现多次时后出现的覆盖先出现的。
pub fn validate_scores(
    raw: Vec<RawScore>,
    chunk: &Chunk,
    bounds: ScoreBounds,
) -> (Vec<ScoreResult>, Vec<ValidationFailure>) {
    let members: HashMap<String, &RecordId> = chunk
        .records
        .iter()
        .map(|r| (r.id().match_key(), r.id()))
        .collect();

    let mut accepted: HashMap<&RecordId, ScoreResult> = HashMap::new();
    let mut dropped = Vec::new();

    for item in raw {
        let key = item.id.match_key();
        let Some(&id) = members.get(&key) else {
            let failure = ValidationFailure::ForeignRecord { id: key };
            warn!("[分块 {}] 丢弃结果: {}", chunk.index + 1, failure);
            dropped.push(failure);
            continue;
        };

        if !bounds.contains(item.score) {
            let failure = ValidationFailure::ScoreOutOfRange {
                id: key,
                score: item.score,
                min: bounds.min,
                max: bounds.max,
            };
            warn!("[分块 {}] 丢弃结果: {}", chunk.index + 1, failure);
            dropped.push(failure);
            continue;
        }

        let result = ScoreResult::new(id.clone(), item.score, item.rationale);
        if accepted.insert(id, result).is_some() {
            warn!(
                "[分块 {}] 记录 {} 在响应中重复出现，保留最后一次",
                chunk.index + 1,
                id
            );
        }
    }

    let results = chunk
        .records
        .iter()
        .filter_map(|r| accepted.remove(r.id()))
        .collect();

    (results, dropped)
}
