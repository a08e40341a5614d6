pub mod cancel;
pub mod job_flow;
pub mod sequence_ctx;
pub mod state;

pub use cancel::{sequence_token, CancelHandle, SequenceToken};
pub use job_flow::{JobFlow, PollPolicy, DEFAULT_POLL_INTERVAL};
pub use sequence_ctx::{SequenceCtx, SequenceSink};
pub use state::{reduce, Phase, WorkflowEvent, WorkflowState};
