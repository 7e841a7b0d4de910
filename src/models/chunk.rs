//! 分块：一次请求发送给评分服务的一组连续记录

use crate::models::{Record, RecordId};

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 分块序号（从 0 开始）
    pub index: usize,
    /// 第一条记录在原始输入中的位置
    pub start: usize,
    pub records: Vec<Record>,
}

impl Chunk {
    pub fn new(index: usize, start: usize, records: Vec<Record>) -> Self {
        Self {
            index,
            start,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 按输入顺序返回本块所有记录 ID
    pub fn record_ids(&self) -> Vec<RecordId> {
        self.records.iter().map(|r| r.id().clone()).collect()
    }

    /// 原始输入中的区间 [start, end)
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.records.len()
    }
}
