//! Conversation orchestration for one user turn at a time.
//!
//! A turn appends the user message, then alternates model calls and tool
//! dispatch until the model answers in plain text. The history is replayed in
//! full on every model call and is never trimmed.

use std::fmt;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::history::History;
use crate::core::tools::{ToolInvocation, ToolRegistry};
use crate::core::types::{Message, ToolCall, Usage};
use crate::dispatch::dispatch;
use crate::io::config::{CoderConfig, ToolErrorPolicy};
use crate::io::console::Console;
use crate::io::model::{ModelClient, ModelRequest};
use crate::io::workspace::Workspace;

/// Turn-level knobs taken from [`CoderConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub tool_errors: ToolErrorPolicy,
    pub max_tool_rounds: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let cfg = CoderConfig::default();
        Self::from(&cfg)
    }
}

impl From<&CoderConfig> for SessionConfig {
    fn from(cfg: &CoderConfig) -> Self {
        Self {
            tool_errors: cfg.tool_errors,
            max_tool_rounds: cfg.max_tool_rounds,
        }
    }
}

/// The model kept asking for tools past the configured round limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRoundLimitError {
    pub limit: u32,
}

impl fmt::Display for ToolRoundLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "model requested tools for more than {} consecutive rounds without answering",
            self.limit
        )
    }
}

impl std::error::Error for ToolRoundLimitError {}

/// Result of one completed user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Final assistant text to show the user.
    pub reply: String,
    pub model_calls: u32,
    pub tool_calls: u32,
    /// Token usage summed over the turn's model calls, when reported.
    pub usage: Usage,
}

pub struct Session {
    workspace: Workspace,
    registry: ToolRegistry,
    history: History,
    config: SessionConfig,
}

impl Session {
    pub fn new(
        workspace: Workspace,
        registry: ToolRegistry,
        system_prompt: impl Into<String>,
        config: SessionConfig,
    ) -> Self {
        Self {
            workspace,
            registry,
            history: History::primed(system_prompt),
            config,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    /// Run one user turn to completion.
    ///
    /// Tool notices are shown on `console` as they happen; the final reply is
    /// returned for the caller to display.
    #[instrument(skip_all, fields(history = self.history.len()))]
    pub fn submit<M, C>(
        &mut self,
        user_text: &str,
        model: &M,
        console: &mut C,
    ) -> Result<TurnOutcome>
    where
        M: ModelClient + ?Sized,
        C: Console + ?Sized,
    {
        self.history.push(Message::user(user_text));

        let mut rounds = 0u32;
        let mut model_calls = 0u32;
        let mut tool_calls = 0u32;
        let mut usage = Usage::default();

        loop {
            let request = ModelRequest {
                messages: self.history.messages(),
                tools: self.registry.specs(),
            };
            let reply = model.complete(&request).context("model call failed")?;
            model_calls += 1;
            if let Some(call_usage) = &reply.usage {
                info!(
                    prompt_tokens = call_usage.prompt_tokens,
                    completion_tokens = call_usage.completion_tokens,
                    total_tokens = call_usage.total_tokens,
                    "model usage"
                );
                accumulate(&mut usage, call_usage);
            }

            if !reply.has_tool_calls() {
                let text = reply.content.unwrap_or_default();
                self.history.push(Message::assistant_text(text.clone()));
                debug!(model_calls, tool_calls, "turn complete");
                return Ok(TurnOutcome {
                    reply: text,
                    model_calls,
                    tool_calls,
                    usage,
                });
            }

            if rounds >= self.config.max_tool_rounds {
                warn!(limit = self.config.max_tool_rounds, "tool round limit reached");
                return Err(ToolRoundLimitError {
                    limit: self.config.max_tool_rounds,
                }
                .into());
            }
            rounds += 1;

            // Decode every call before running any, so a malformed reply has
            // no side effects.
            let invocations = reply
                .tool_calls
                .iter()
                .map(|call| self.registry.decode(call))
                .collect::<Result<Vec<_>, _>>()?;

            self.history.push(Message::Assistant {
                content: reply.content,
                tool_calls: reply.tool_calls.clone(),
            });
            for (call, invocation) in reply.tool_calls.iter().zip(invocations) {
                self.run_tool(call, invocation, console)?;
                tool_calls += 1;
            }
        }
    }

    fn run_tool<C>(
        &mut self,
        call: &ToolCall,
        invocation: ToolInvocation,
        console: &mut C,
    ) -> Result<()>
    where
        C: Console + ?Sized,
    {
        let name = invocation.name();
        debug!(tool = name, call_id = %call.id, "dispatching tool");
        match dispatch(&self.workspace, invocation) {
            Ok(outcome) => {
                for notice in outcome.notices() {
                    console.show_notice(&notice)?;
                }
                self.history
                    .push(Message::tool_result(&call.id, outcome.content()));
                Ok(())
            }
            Err(err) => match self.config.tool_errors {
                ToolErrorPolicy::Fail => Err(err.context(format!("tool {name} failed"))),
                ToolErrorPolicy::Report => {
                    let detail = format!("{err:#}");
                    warn!(tool = name, error = %detail, "tool failed, reporting to model");
                    console.show_notice(&format!("{name} failed: {detail}"))?;
                    self.history
                        .push(Message::tool_result(&call.id, format!("Error: {detail}")));
                    Ok(())
                }
            },
        }
    }
}

fn accumulate(total: &mut Usage, call: &Usage) {
    total.prompt_tokens += call.prompt_tokens;
    total.completion_tokens += call.completion_tokens;
    total.total_tokens += call.total_tokens;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tools::ProtocolError;
    use crate::core::types::Role;
    use crate::io::model::ModelReply;
    use crate::test_support::{ScriptedConsole, ScriptedModel, TestProject};

    #[test]
    fn plain_reply_is_recorded_and_returned() {
        let project = TestProject::new();
        let mut session = project.session(SessionConfig::default());
        let model = ScriptedModel::new([ModelReply::text("hi there")]);
        let mut console = ScriptedConsole::default();

        let outcome = session.submit("hello", &model, &mut console).expect("submit");

        assert_eq!(outcome.reply, "hi there");
        assert_eq!(outcome.model_calls, 1);
        assert_eq!(outcome.tool_calls, 0);
        let roles: Vec<Role> = session.history().messages().iter().map(Message::role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        model.assert_drained();
    }

    #[test]
    fn tool_call_message_precedes_its_result() {
        let project = TestProject::new();
        project.write("a.txt", "alpha");
        let mut session = project.session(SessionConfig::default());
        let model = ScriptedModel::new([
            ModelReply::tool_call("call_1", "readProject", "{}"),
            ModelReply::text("seen"),
        ]);
        let mut console = ScriptedConsole::default();

        session.submit("look", &model, &mut console).expect("submit");

        let messages = session.history().messages();
        assert!(matches!(
            &messages[2],
            Message::Assistant { content: None, tool_calls } if tool_calls[0].id == "call_1"
        ));
        assert!(matches!(
            &messages[3],
            Message::ToolResult { call_id, content } if call_id == "call_1" && content.contains("alpha")
        ));
        assert_eq!(console.notices(), vec!["read 1 file".to_string()]);
    }

    #[test]
    fn usage_is_summed_over_the_turn() {
        let project = TestProject::new();
        let mut session = project.session(SessionConfig::default());
        let with_usage = |reply: ModelReply, total| ModelReply {
            usage: Some(Usage {
                prompt_tokens: total - 1,
                completion_tokens: 1,
                total_tokens: total,
            }),
            ..reply
        };
        let model = ScriptedModel::new([
            with_usage(ModelReply::tool_call("c", "readProject", ""), 10),
            with_usage(ModelReply::text("ok"), 20),
        ]);

        let outcome = session
            .submit("go", &model, &mut ScriptedConsole::default())
            .expect("submit");

        assert_eq!(outcome.usage.total_tokens, 30);
        assert_eq!(outcome.usage.completion_tokens, 2);
    }

    #[test]
    fn invalid_arguments_are_protocol_errors() {
        let project = TestProject::new();
        let mut session = project.session(SessionConfig {
            tool_errors: ToolErrorPolicy::Report,
            ..SessionConfig::default()
        });
        let model = ScriptedModel::new([ModelReply::tool_call(
            "c",
            "writeFiles",
            r#"{"relativePaths": "a.txt"}"#,
        )]);

        let err = session
            .submit("go", &model, &mut ScriptedConsole::default())
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::InvalidArguments { .. })
        ));
        assert!(!project.path("a.txt").exists());
    }

    #[test]
    fn round_limit_stops_runaway_tool_loops() {
        let project = TestProject::new();
        let mut session = project.session(SessionConfig {
            max_tool_rounds: 2,
            ..SessionConfig::default()
        });
        let model = ScriptedModel::new([
            ModelReply::tool_call("c1", "readProject", "{}"),
            ModelReply::tool_call("c2", "readProject", "{}"),
            ModelReply::tool_call("c3", "readProject", "{}"),
        ]);

        let err = session
            .submit("loop", &model, &mut ScriptedConsole::default())
            .unwrap_err();

        assert_eq!(
            err.downcast_ref::<ToolRoundLimitError>(),
            Some(&ToolRoundLimitError { limit: 2 })
        );
        assert_eq!(session.history().count_role(Role::Tool), 2);
    }

    #[test]
    fn model_errors_propagate() {
        let project = TestProject::new();
        let mut session = project.session(SessionConfig::default());
        let model = ScriptedModel::failing("connection refused");

        let err = session
            .submit("hi", &model, &mut ScriptedConsole::default())
            .unwrap_err();

        assert!(format!("{err:#}").contains("connection refused"));
    }
}
