//! 分块处理上下文
//!
//! 封装"我正在处理第几个分块"这一信息

use std::fmt::Display;

/// 分块处理上下文
#[derive(Debug, Clone, Copy)]
pub struct ChunkCtx {
    /// 分块序号（从 0 开始）
    pub chunk_index: usize,

    /// 分块总数（仅用于日志显示）
    pub total_chunks: usize,
}

impl ChunkCtx {
    pub fn new(chunk_index: usize, total_chunks: usize) -> Self {
        Self {
            chunk_index,
            total_chunks,
        }
    }
}

impl Display for ChunkCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[分块 {}/{}]", self.chunk_index + 1, self.total_chunks)
    }
}
