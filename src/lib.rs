//! Asynchronous guideline ingestion.
//!
//! A client submits a job and gets its id back immediately. A worker later
//! runs the job through three generative stages (summary, checklist, Mermaid
//! diagram), each fed by the previous ones, and the client polls the job's
//! status until it is completed or failed.
//!
//! The core is the [`state_machine`], the [`pipeline`] executor and the
//! [`queue::QueueMonitor`]. Storage, queueing, the model client and HTTP sit
//! behind traits or thin adapters.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod openai;
pub mod pipeline;
pub mod queue;
pub mod service;
pub mod state_machine;
pub mod store;

#[cfg(test)]
mod test_support;

pub use error::IngestError;
