//! 评分结果

use serde::{Deserialize, Serialize};

use crate::models::RecordId;

/// 单条记录的评分结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub id: RecordId,
    pub score: i64,
    pub rationale: String,
}

impl ScoreResult {
    pub fn new(id: impl Into<RecordId>, score: i64, rationale: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            score,
            rationale: rationale.into(),
        }
    }
}

/// 分数区间（闭区间）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreBounds {
    pub min: i64,
    pub max: i64,
}

impl ScoreBounds {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, score: i64) -> bool {
        (self.min..=self.max).contains(&score)
    }
}

impl Default for ScoreBounds {
    fn default() -> Self {
        Self { min: 1, max: 10 }
    }
}
