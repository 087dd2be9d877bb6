//! Request and response bodies for the OpenAI `v1/responses` endpoint.
//!
//! Only the fields the pipeline reads are modelled; unknown fields in
//! responses are ignored by serde.

use serde::{Deserialize, Serialize};

/// Body of a `POST /v1/responses` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesRequest {
    pub model: String,
    /// System-level guidance for the model.
    pub instructions: String,
    /// The user input the model should respond to.
    pub input: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesResponse {
    pub id: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Vec<OutputItem>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ResponsesResponse {
    /// Concatenate every `output_text` part of every message item, the same
    /// aggregate the official SDKs expose as `output_text`.
    pub fn output_text(&self) -> String {
        self.output
            .iter()
            .filter(|item| item.item_type == "message")
            .flat_map(|item| item.content.iter())
            .filter(|part| part.content_type == "output_text")
            .map(|part| part.text.as_str())
            .collect()
    }
}

/// One item of the `output` array. Items other than messages (reasoning,
/// tool calls) carry no `content` and are skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputItem {
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub content: Vec<OutputContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputContent {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}
