pub mod atomic_write;
pub mod scoring_backend;

pub use atomic_write::write_file_atomic;
pub use scoring_backend::{OpenAiBackend, ScoringRequest, ScoringService};
