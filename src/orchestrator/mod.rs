//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责一次批量评分运行的调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `splitter` - 分块切分
//! - 按输入顺序切分为连续分块
//!
//! ### `batch_processor` - 批量评分引擎
//! - 前置校验（配置、ID 唯一性、检查点）
//! - 控制并发数量（Semaphore）
//! - 响应取消信号
//! - 汇总最终报告
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<Chunk>)
//!     ↓
//! workflow::ChunkFlow (处理单个 Chunk)
//!     ↓
//! services (能力层：scoring / checkpoint / report)
//!     ↓
//! infrastructure (基础设施：ScoringService / 原子写入)
//! ```

pub mod batch_processor;
pub mod splitter;

// 重新导出主要类型
pub use batch_processor::Engine;
pub use splitter::split;
