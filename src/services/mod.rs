pub mod checkpoint_store;
pub mod report_writer;
pub mod response_parser;
pub mod scoring_client;

pub use checkpoint_store::{CheckpointStore, MergeSummary};
pub use report_writer::ReportWriter;
pub use response_parser::{parse_scores, RawScore};
pub use scoring_client::{ChunkScores, ScoringClient};
