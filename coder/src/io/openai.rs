//! OpenAI-compatible chat completions backend.
//!
//! One blocking POST per model call, no retries. Request bodies and replies
//! are mapped to and from [`Message`] here so the rest of the crate never sees
//! wire JSON.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::core::tools::ToolSpec;
use crate::core::types::{Message, ToolCall, Usage};
use crate::io::model::{ModelClient, ModelReply, ModelRequest};

/// Connection settings for [`ChatCompletionsClient`].
#[derive(Clone)]
pub struct ChatCompletionsConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// `None` waits for the model indefinitely.
    pub timeout: Option<Duration>,
}

impl fmt::Debug for ChatCompletionsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatCompletionsConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    cfg: ChatCompletionsConfig,
    client: Client,
}

impl ChatCompletionsClient {
    pub fn new(cfg: ChatCompletionsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("build http client")?;
        Ok(Self { cfg, client })
    }
}

impl ModelClient for ChatCompletionsClient {
    #[instrument(skip_all, fields(model = %self.cfg.model, messages = request.messages.len()))]
    fn complete(&self, request: &ModelRequest<'_>) -> Result<ModelReply> {
        let payload = build_payload(&self.cfg, request);
        let response = self
            .client
            .post(&self.cfg.endpoint)
            .bearer_auth(&self.cfg.api_key)
            .json(&payload)
            .send()
            .map_err(|err| anyhow!("model request to {} failed: {err}", self.cfg.endpoint))?;

        let status = response.status();
        let body = response.text().context("read model response body")?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "model request rejected");
            return Err(format_api_error(status, &body));
        }
        let reply = parse_reply(&body)?;
        debug!(
            tool_calls = reply.tool_calls.len(),
            has_content = reply.content.is_some(),
            "model replied"
        );
        Ok(reply)
    }
}

fn build_payload(cfg: &ChatCompletionsConfig, request: &ModelRequest<'_>) -> Value {
    let messages: Vec<Value> = request.messages.iter().map(message_to_json).collect();
    let mut payload = json!({
        "model": cfg.model,
        "messages": messages,
    });
    if !request.tools.is_empty() {
        let tools: Vec<Value> = request.tools.iter().map(tool_to_json).collect();
        payload["tools"] = json!(tools);
        payload["tool_choice"] = json!("auto");
    }
    if let Some(temperature) = cfg.temperature {
        payload["temperature"] = json!(temperature);
    }
    if let Some(max_tokens) = cfg.max_tokens {
        payload["max_tokens"] = json!(max_tokens);
    }
    payload
}

fn message_to_json(message: &Message) -> Value {
    match message {
        Message::System { content } => json!({"role": "system", "content": content}),
        Message::User { content } => json!({"role": "user", "content": content}),
        Message::Assistant {
            content,
            tool_calls,
        } => {
            let mut msg = json!({"role": "assistant", "content": content});
            if !tool_calls.is_empty() {
                let calls: Vec<Value> = tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments,
                            }
                        })
                    })
                    .collect();
                msg["tool_calls"] = json!(calls);
            }
            msg
        }
        Message::ToolResult { call_id, content } => {
            json!({"role": "tool", "tool_call_id": call_id, "content": content})
        }
    }
}

fn tool_to_json(spec: &ToolSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": spec.name,
            "description": spec.description,
            "parameters": spec.input_schema(),
        }
    })
}

fn parse_reply(body: &str) -> Result<ModelReply> {
    let value: Value = serde_json::from_str(body).context("parse model response json")?;
    let message = value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| anyhow!("unexpected model response: missing choices[0].message"))?;

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .map(ToString::to_string);
    let tool_calls = message
        .get("tool_calls")
        .map(parse_tool_calls)
        .unwrap_or_default();
    if content.is_none() && tool_calls.is_empty() {
        return Err(anyhow!(
            "unexpected model response: message has neither content nor tool_calls"
        ));
    }

    let usage = value.get("usage").map(|usage| Usage {
        prompt_tokens: token_count(usage, "prompt_tokens"),
        completion_tokens: token_count(usage, "completion_tokens"),
        total_tokens: token_count(usage, "total_tokens"),
    });

    Ok(ModelReply {
        content,
        tool_calls,
        usage,
    })
}

fn parse_tool_calls(value: &Value) -> Vec<ToolCall> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let function = item.get("function");
            let name = function
                .and_then(|f| f.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            // Some backends send arguments as an object rather than a string.
            let arguments = match function.and_then(|f| f.get("arguments")) {
                Some(Value::String(raw)) => raw.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            let id = item
                .get("id")
                .and_then(Value::as_str)
                .filter(|id| !id.trim().is_empty())
                .map(ToString::to_string)
                .unwrap_or_else(|| format!("call_{}", idx + 1));
            ToolCall {
                id,
                name,
                arguments,
            }
        })
        .collect()
}

fn token_count(usage: &Value, key: &str) -> u64 {
    usage.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn format_api_error(status: StatusCode, body: &str) -> anyhow::Error {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(|m| m.as_str().map(ToString::to_string))
        })
        .unwrap_or_else(|| body.chars().take(200).collect());

    match status {
        StatusCode::UNAUTHORIZED => anyhow!(
            "model API rejected the API key (HTTP 401); check the variable named by api_key_env"
        ),
        StatusCode::TOO_MANY_REQUESTS => {
            anyhow!("model API rate limited the request (HTTP 429): {detail}")
        }
        _ => anyhow!("model API error (HTTP {}): {}", status.as_u16(), detail),
    }
}
