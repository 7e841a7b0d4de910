pub mod chunk;
pub mod loaders;
pub mod record;
pub mod report;
pub mod score;

pub use chunk::Chunk;
pub use loaders::load_records;
pub use record::{ensure_unique_ids, Record, RecordId};
pub use report::{
    ChunkEvent, ChunkStatus, RunReport, RunState, RunStats, UnresolvedReason, UnresolvedRecord,
};
pub use score::{ScoreBounds, ScoreResult};
