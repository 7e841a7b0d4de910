//! # Batch Scorer
//!
//! 把大量记录分块发送给 LLM 评分服务，并把结果持久化到可恢复的检查点
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 外部能力的最小封装
//! - `ScoringService` - 评分服务抽象，`OpenAiBackend` 为默认实现
//! - `write_file_atomic` - 临时文件 + rename 的原子写入
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `ScoringClient` - 给一个分块打分（重试、解析、校验）
//! - `CheckpointStore` - 已完成结果的持久化
//! - `ReportWriter` - 写最终报告和未解决列表
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个分块"的完整处理流程
//! - `ChunkCtx` - 上下文封装（分块序号）
//! - `ChunkFlow` - 流程编排（跳过检查 → 评分 → 合并）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/splitter` - 分块切分
//! - `orchestrator/batch_processor` - 批量评分引擎，管理并发与取消
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Backoff, Config, RetryPolicy};
pub use error::{AppError, AppResult};
pub use infrastructure::{OpenAiBackend, ScoringRequest, ScoringService};
pub use models::{Record, RecordId, RunReport, RunState, ScoreResult};
pub use orchestrator::Engine;
pub use services::{CheckpointStore, ReportWriter, ScoringClient};
pub use workflow::{ChunkCtx, ChunkFlow};
