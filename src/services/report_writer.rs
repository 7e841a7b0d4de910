//! 报告写入服务 - 业务能力层
//!
//! 只负责把最终报告落盘，不关心报告怎么产生

use chrono::Local;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{AppResult, FileError};
use crate::infrastructure::write_file_atomic;
use crate::models::{RunReport, RunState, RunStats, ScoreResult, UnresolvedRecord};

/// 报告写入服务
///
/// 职责：
/// - 写结果 JSON（结果 + 未解决记录 + 统计）
/// - 写未解决记录清单（每行一条，附原因）
pub struct ReportWriter {
    output_path: PathBuf,
    unresolved_path: PathBuf,
}

#[derive(Serialize)]
struct ReportFile<'a> {
    generated_at: String,
    state: RunState,
    results: &'a [ScoreResult],
    unresolved: &'a [UnresolvedRecord],
    stats: &'a RunStats,
}

impl ReportWriter {
    pub fn new(output_path: impl Into<PathBuf>, unresolved_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            unresolved_path: unresolved_path.into(),
        }
    }

    /// 写入全部报告文件
    pub fn write(&self, report: &RunReport) -> AppResult<()> {
        let file = ReportFile {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            state: report.state,
            results: &report.results,
            unresolved: &report.unresolved,
            stats: &report.stats,
        };

        let json = serde_json::to_string_pretty(&file).map_err(|e| FileError::ParseFailed {
            path: self.output_path.clone(),
            message: e.to_string(),
        })?;
        write_to(&self.output_path, json.as_bytes())?;
        info!(
            "💾 结果已写入: {} ({} 条)",
            self.output_path.display(),
            report.results.len()
        );

        let listing = render_unresolved(&report.unresolved);
        write_to(&self.unresolved_path, listing.as_bytes())?;
        debug!(
            "未解决记录清单已写入: {} ({} 条)",
            self.unresolved_path.display(),
            report.unresolved.len()
        );

        Ok(())
    }
}

fn write_to(path: &Path, content: &[u8]) -> Result<(), FileError> {
    write_file_atomic(path, content).map_err(|source| FileError::WriteFailed {
        path: path.to_path_buf(),
        source,
    })
}

fn render_unresolved(unresolved: &[UnresolvedRecord]) -> String {
    unresolved
        .iter()
        .map(|u| format!("{} | 分块 {} | {}\n", u.id, u.chunk_index + 1, u.reason))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordId, UnresolvedReason};

    fn sample_report() -> RunReport {
        RunReport {
            state: RunState::Completed,
            results: vec![ScoreResult::new(1, 7, "bien")],
            unresolved: vec![UnresolvedRecord {
                id: RecordId::Int(2),
                chunk_index: 0,
                reason: UnresolvedReason::ChunkExhausted,
            }],
            chunks: Vec::new(),
            stats: RunStats {
                total_records: 2,
                total_chunks: 1,
                succeeded: 1,
                scored_records: 1,
                unresolved_records: 1,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_writes_report_and_unresolved_listing() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("scores.json"), dir.path().join("unresolved.txt"));

        writer.write(&sample_report()).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("scores.json")).unwrap())
                .unwrap();
        assert_eq!(json["state"], "completed");
        assert_eq!(json["results"][0]["score"], 7);
        assert_eq!(json["unresolved"][0]["id"], 2);
        assert_eq!(json["unresolved"][0]["reason"], "chunk_exhausted");
        assert!(json["generated_at"].is_string());

        let listing = std::fs::read_to_string(dir.path().join("unresolved.txt")).unwrap();
        assert_eq!(listing, "2 | 分块 1 | 分块重试耗尽\n");
    }
}
