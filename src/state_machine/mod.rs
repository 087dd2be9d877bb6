mod job;
mod state;

pub use job::{Artifacts, Job, JobResult, JobStatus, Payload};
pub use state::{RejectReason, StateMachine, Transition};
