//! The tarot reading pipeline.
//!
//! A linear state machine per reading request:
//!
//! ```text
//! START -> question filter -> card picker -> question analyzer -> reading agent -> END
//! ```
//!
//! Each stage is a function of the incoming [`state::ReadingState`] producing
//! a state delta; after the graph completes, [`state::classify`] computes the
//! terminal verdict (success / invalid / error). The whole run races a fixed
//! wall-clock timeout. Stages execute strictly sequentially within one
//! invocation; many invocations run concurrently as independent tasks
//! sharing the store, provider manager and monitor.

pub mod parse;
pub mod state;
pub mod workflow;

mod stages;

pub use state::{QuestionAnalysis, ReadingOutcome, ReadingState, StructuredReading};
pub use workflow::{
    PipelineError, PromptSource, ReadingOutput, ReadingPipeline, ReadingResponse,
    PIPELINE_TIMEOUT,
};
