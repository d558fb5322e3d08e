//! Model abstraction for conversation turns.
//!
//! The [`ModelClient`] trait decouples the orchestrator from the actual model
//! backend (currently an OpenAI-compatible chat completions endpoint). Tests use
//! scripted clients that return predetermined replies without any network.

use anyhow::Result;

use crate::core::tools::ToolSpec;
use crate::core::types::{Message, ToolCall, Usage};

/// Everything the model sees on one call: the full history and every tool.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub messages: &'a [Message],
    pub tools: &'a [ToolSpec],
}

/// Exactly one reply message from the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelReply {
    pub content: Option<String>,
    /// Non-empty when the model asks for tools instead of answering.
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
}

impl ModelReply {
    /// A final text answer.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// A single tool request with serialized JSON `arguments`.
    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            tool_calls: vec![ToolCall {
                id: id.into(),
                name: name.into(),
                arguments: arguments.into(),
            }],
            ..Self::default()
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Abstraction over model backends.
pub trait ModelClient {
    /// Submit the request and block until the single reply arrives.
    fn complete(&self, request: &ModelRequest<'_>) -> Result<ModelReply>;
}
