//! The three-stage generative pipeline and the executor that drives a job
//! through it.

mod executor;
mod pool;
mod stage;

pub use executor::{ExecutionReport, PipelineExecutor};
pub use pool::{ClientLease, ClientPool, PoolClosed};
pub use stage::{
    CallError, GenerativeClient, Stage, StageResult, produce_checklist, produce_diagram,
    produce_summary, strip_mermaid_fence,
};
