//! 分块切分
//!
//! 按输入顺序把记录切成连续、不重叠的分块，最后一块可以不满

use crate::error::ConfigError;
use crate::models::{Chunk, Record};

/// 把记录切分为大小为 `chunk_size` 的分块
///
/// - 所有分块按顺序拼接后与输入完全一致
/// - 分块数为 `ceil(N / chunk_size)`，空输入得到零个分块
/// - `chunk_size` 为 0 时返回 `ConfigError::NonPositiveChunkSize`
pub fn split(records: &[Record], chunk_size: usize) -> Result<Vec<Chunk>, ConfigError> {
    if chunk_size == 0 {
        return Err(ConfigError::NonPositiveChunkSize);
    }

    Ok(records
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, slice)| Chunk::new(index, index * chunk_size, slice.to_vec()))
        .collect())
}

/// 记录所在分块的序号
pub fn chunk_index_of(position: usize, chunk_size: usize) -> usize {
    position / chunk_size.max(1)
}
