use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::openai::OpenAiError;

/// Why a generative call produced no usable text.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("timeout")]
    Timeout,

    #[error(transparent)]
    Provider(OpenAiError),

    #[error("{0}")]
    Other(String),
}

impl From<OpenAiError> for CallError {
    fn from(err: OpenAiError) -> Self {
        match err {
            OpenAiError::Timeout => CallError::Timeout,
            other => CallError::Provider(other),
        }
    }
}

/// The opaque external model call every stage is built on.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    async fn call(&self, instructions: &str, input: &str) -> Result<String, CallError>;
}

/// The three pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Summary,
    Checklist,
    Diagram,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Summary => write!(f, "summary"),
            Stage::Checklist => write!(f, "checklist"),
            Stage::Diagram => write!(f, "diagram"),
        }
    }
}

/// Output of one stage. Success is decided by the variant alone; the text is
/// never inspected, so generated content starting with "Error" is still a
/// success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageResult {
    Success(String),
    Failure { cause: String },
}

const SUMMARY_INSTRUCTIONS: &str =
    "You are an expert at summarizing guidelines and best practices. \
Create a concise summary of key guidelines for web development and project management.";

const SUMMARY_INPUT: &str = "Please provide a comprehensive summary of web development guidelines, \
include accessibility, security, performance, and deployment practices.";

const CHECKLIST_INSTRUCTIONS: &str = "You are an expert at creating actionable checklists. \
Convert guidelines and summaries into clear, actionable checklist items.";

const DIAGRAM_INSTRUCTIONS: &str = "You are an expert at creating Mermaid diagrams. \
Generate a flowchart that visualizes the workflow or process described in the summary and checklist.

Use Mermaid syntax and create a clear, professional diagram that shows:
- Main process steps
- Decision points
- Key activities from the checklist

Example format:
flowchart TD
    A[Start] --> B[Process]
    B --> C[End]

Return ONLY the raw Mermaid syntax, no markdown formatting, no ```mermaid or ``` blocks, \
no explanations.";

fn checklist_input(summary: &str) -> String {
    format!(
        "Based on this summary of guidelines:\n\n{summary}\n\n\
         Please create a comprehensive checklist of actionable items that teams should follow. \
         Format as a numbered list with clear, specific tasks."
    )
}

fn diagram_input(summary: &str, checklist: &str) -> String {
    format!(
        "Based on this summary and checklist, create a Mermaid flowchart:\n\n\
         SUMMARY:\n{summary}\n\n\
         CHECKLIST:\n{checklist}\n\n\
         Generate a Mermaid flowchart that visualizes this workflow. \
         Return ONLY the raw Mermaid syntax without any markdown formatting or code blocks."
    )
}

/// Remove a surrounding ```mermaid / ``` fence the model may add anyway.
pub fn strip_mermaid_fence(raw: &str) -> String {
    let mut code = raw.trim();
    if let Some(rest) = code.strip_prefix("```mermaid") {
        code = rest;
    } else if let Some(rest) = code.strip_prefix("```") {
        code = rest;
    }
    if let Some(rest) = code.strip_suffix("```") {
        code = rest;
    }
    code.trim().to_string()
}

/// Issue exactly one model call with a bounded wait, converting every fault
/// into a failure marker.
async fn run_stage(
    client: &dyn GenerativeClient,
    stage: Stage,
    instructions: &str,
    input: &str,
    timeout: Duration,
) -> StageResult {
    let outcome = match tokio::time::timeout(timeout, client.call(instructions, input)).await {
        Ok(result) => result,
        Err(_) => Err(CallError::Timeout),
    };
    match outcome {
        Ok(text) if text.trim().is_empty() => {
            warn!(%stage, "stage returned no text");
            StageResult::Failure {
                cause: format!("{stage} stage returned no text"),
            }
        }
        Ok(text) => {
            debug!(%stage, chars = text.len(), "stage succeeded");
            StageResult::Success(text)
        }
        Err(err) => {
            warn!(%stage, error = %err, "stage failed");
            let cause = err.to_string();
            let cause = if cause.trim().is_empty() {
                format!("{stage} stage failed")
            } else {
                cause
            };
            StageResult::Failure { cause }
        }
    }
}

pub async fn produce_summary(client: &dyn GenerativeClient, timeout: Duration) -> StageResult {
    run_stage(
        client,
        Stage::Summary,
        SUMMARY_INSTRUCTIONS,
        SUMMARY_INPUT,
        timeout,
    )
    .await
}

pub async fn produce_checklist(
    client: &dyn GenerativeClient,
    summary: &str,
    timeout: Duration,
) -> StageResult {
    run_stage(
        client,
        Stage::Checklist,
        CHECKLIST_INSTRUCTIONS,
        &checklist_input(summary),
        timeout,
    )
    .await
}

pub async fn produce_diagram(
    client: &dyn GenerativeClient,
    summary: &str,
    checklist: &str,
    timeout: Duration,
) -> StageResult {
    let result = run_stage(
        client,
        Stage::Diagram,
        DIAGRAM_INSTRUCTIONS,
        &diagram_input(summary, checklist),
        timeout,
    )
    .await;
    match result {
        StageResult::Success(raw) => {
            let code = strip_mermaid_fence(&raw);
            if code.is_empty() {
                warn!("diagram reply held only a code fence");
                StageResult::Failure {
                    cause: "empty diagram".into(),
                }
            } else {
                StageResult::Success(code)
            }
        }
        failure => failure,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Records every call and answers from a fixed script.
    struct RecordingClient {
        reply: Result<String, String>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl RecordingClient {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.into()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GenerativeClient for RecordingClient {
        async fn call(&self, instructions: &str, input: &str) -> Result<String, CallError> {
            self.calls
                .lock()
                .unwrap()
                .push((instructions.to_string(), input.to_string()));
            self.reply.clone().map_err(CallError::Other)
        }
    }

    struct HangingClient;

    #[async_trait]
    impl GenerativeClient for HangingClient {
        async fn call(&self, _instructions: &str, _input: &str) -> Result<String, CallError> {
            std::future::pending().await
        }
    }

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn summary_issues_one_call() {
        let client = RecordingClient::replying("Test summary content");
        let result = produce_summary(&client, WAIT).await;
        assert_eq!(result, StageResult::Success("Test summary content".into()));
        assert_eq!(client.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn checklist_input_interpolates_summary() {
        let client = RecordingClient::replying("1. Test checklist item");
        let result = produce_checklist(&client, "Test summary", WAIT).await;
        assert_eq!(result, StageResult::Success("1. Test checklist item".into()));

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1.contains("Test summary"));
        assert!(calls[0].0.contains("checklists"));
    }

    #[tokio::test]
    async fn diagram_input_interpolates_both_and_strips_fence() {
        let client = RecordingClient::replying("```mermaid\nflowchart TD A[Start] --> B[End]\n```");
        let result = produce_diagram(&client, "the summary", "the checklist", WAIT).await;
        assert_eq!(
            result,
            StageResult::Success("flowchart TD A[Start] --> B[End]".into())
        );

        let calls = client.calls.lock().unwrap();
        assert!(calls[0].1.contains("SUMMARY:\nthe summary"));
        assert!(calls[0].1.contains("CHECKLIST:\nthe checklist"));
    }

    #[tokio::test]
    async fn text_starting_with_error_is_still_success() {
        let client = RecordingClient::replying("Error handling should be centralized.");
        let result = produce_summary(&client, WAIT).await;
        assert_eq!(
            result,
            StageResult::Success("Error handling should be centralized.".into())
        );
    }

    #[tokio::test]
    async fn call_fault_becomes_failure_marker() {
        let client = RecordingClient {
            reply: Err("quota exceeded".into()),
            calls: Mutex::new(Vec::new()),
        };
        let result = produce_summary(&client, WAIT).await;
        assert_eq!(
            result,
            StageResult::Failure {
                cause: "quota exceeded".into()
            }
        );
    }

    #[tokio::test]
    async fn hung_call_times_out() {
        let result = produce_summary(&HangingClient, Duration::from_millis(20)).await;
        assert_eq!(
            result,
            StageResult::Failure {
                cause: "timeout".into()
            }
        );
    }

    #[tokio::test]
    async fn blank_reply_is_a_failure() {
        let client = RecordingClient::replying("  \n ");
        let result = produce_checklist(&client, "the summary", WAIT).await;
        assert_eq!(
            result,
            StageResult::Failure {
                cause: "checklist stage returned no text".into()
            }
        );
    }

    #[tokio::test]
    async fn fence_only_diagram_is_a_failure() {
        let client = RecordingClient::replying("```mermaid\n```");
        let result = produce_diagram(&client, "the summary", "the checklist", WAIT).await;
        assert_eq!(
            result,
            StageResult::Failure {
                cause: "empty diagram".into()
            }
        );
    }

    #[tokio::test]
    async fn empty_cause_gets_stage_name() {
        let client = RecordingClient {
            reply: Err(String::new()),
            calls: Mutex::new(Vec::new()),
        };
        let result = produce_summary(&client, WAIT).await;
        assert_eq!(
            result,
            StageResult::Failure {
                cause: "summary stage failed".into()
            }
        );
    }

    #[test]
    fn fence_stripping() {
        assert_eq!(strip_mermaid_fence("```\ngraph LR\n```"), "graph LR");
        assert_eq!(strip_mermaid_fence("  graph LR  "), "graph LR");
        assert_eq!(strip_mermaid_fence("graph LR\n```"), "graph LR");
    }

    #[test]
    fn openai_timeout_maps_to_call_timeout() {
        let err: CallError = OpenAiError::Timeout.into();
        assert!(matches!(err, CallError::Timeout));
        let err: CallError = OpenAiError::EmptyOutput.into();
        assert!(matches!(err, CallError::Provider(OpenAiError::EmptyOutput)));
    }
}
