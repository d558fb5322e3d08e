//! System priming text rendered from a template.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::debug;

use crate::core::tools::{READ_PROJECT, ToolRegistry, WRITE_FILES};

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");

#[derive(Debug, Clone, Serialize)]
struct ToolContext<'a> {
    name: &'a str,
    description: &'a str,
}

/// Render the system message that opens every conversation.
pub fn render_system_prompt(registry: &ToolRegistry) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("system", SYSTEM_TEMPLATE)
        .context("load system prompt template")?;
    let tools: Vec<ToolContext<'_>> = registry
        .specs()
        .iter()
        .map(|spec| ToolContext {
            name: &spec.name,
            description: &spec.description,
        })
        .collect();
    let rendered = env
        .get_template("system")
        .and_then(|template| {
            template.render(context! {
                read_tool => READ_PROJECT,
                write_tool => WRITE_FILES,
                tools => tools,
            })
        })
        .context("render system prompt")?;
    let rendered = rendered.trim().to_string();
    debug!(bytes = rendered.len(), "system prompt rendered");
    Ok(rendered)
}
