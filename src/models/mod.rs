pub mod evaluation;
pub mod job;
pub mod transcript;

pub use evaluation::{EvaluationResult, FaultLevel, Hit, HitSource, ProcessedText, Sentence};
pub use job::{Job, JobStatus, ProcessRequest, ProcessResponse, StatusResponse, UploadResponse};
pub use transcript::TranscriptFile;
