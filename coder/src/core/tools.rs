//! Tool registry exposed to the model and decoding of its tool calls.
//!
//! The model picks a tool by name and sends an untyped argument blob. Both are
//! checked here, once, and turned into a [`ToolInvocation`] before any tool
//! logic runs. Anything that does not fit is a [`ProtocolError`].

use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::core::types::ToolCall;

pub const READ_PROJECT: &str = "readProject";
pub const WRITE_FILES: &str = "writeFiles";

/// Shape of a single tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    StringArray,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    pub required: bool,
}

/// Declaration of one tool: name, description and parameters in declared order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

impl ToolSpec {
    /// JSON Schema object describing the tool arguments.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            let schema = match param.kind {
                ParamKind::StringArray => json!({
                    "type": "array",
                    "items": { "type": "string" },
                    "description": param.description,
                }),
            };
            properties.insert(param.name.clone(), schema);
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|param| param.required)
            .map(|param| param.name.as_str())
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    fn validate_arguments(&self, arguments: &Value) -> Result<(), ProtocolError> {
        let schema = self.input_schema();
        let validator = jsonschema::validator_for(&schema)
            .map_err(|err| self.invalid(format!("invalid tool schema: {err}")))?;
        let messages: Vec<String> = validator
            .iter_errors(arguments)
            .map(|err| err.to_string())
            .collect();
        if !messages.is_empty() {
            return Err(self.invalid(messages.join("; ")));
        }
        Ok(())
    }

    fn invalid(&self, reason: impl Into<String>) -> ProtocolError {
        ProtocolError::InvalidArguments {
            tool: self.name.clone(),
            reason: reason.into(),
        }
    }
}

/// A tool call that passed name and argument checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    ReadProject,
    WriteFiles {
        relative_paths: Vec<String>,
        contents: Vec<String>,
    },
}

impl ToolInvocation {
    pub fn name(&self) -> &'static str {
        match self {
            ToolInvocation::ReadProject => READ_PROJECT,
            ToolInvocation::WriteFiles { .. } => WRITE_FILES,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WriteFilesArgs {
    #[serde(rename = "relativePaths")]
    relative_paths: Vec<String>,
    #[serde(rename = "contentsArray")]
    contents: Vec<String>,
}

/// The model broke the tool-calling contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The requested tool is not in the registry.
    UnknownTool { name: String },
    /// The arguments do not fit the tool's declared parameters.
    InvalidArguments { tool: String, reason: String },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::UnknownTool { name } => {
                write!(f, "protocol error: model requested unknown tool {name:?}")
            }
            ProtocolError::InvalidArguments { tool, reason } => {
                write!(f, "protocol error: invalid arguments for {tool}: {reason}")
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Read-only set of tools offered to the model on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
}

impl ToolRegistry {
    /// The two project tools: read everything, write many files.
    pub fn builtin() -> Self {
        Self {
            specs: vec![
                ToolSpec {
                    name: READ_PROJECT.to_string(),
                    description: "Read every source file of the project into one text blob. \
                                  Each file is preceded by a `--- FILE: <relative path> ---` \
                                  header. Call this before writing any file."
                        .to_string(),
                    params: Vec::new(),
                },
                ToolSpec {
                    name: WRITE_FILES.to_string(),
                    description: "Write whole files into the project. relativePaths[i] \
                                  receives contentsArray[i]. Directories are created as \
                                  needed and existing files are overwritten."
                        .to_string(),
                    params: vec![
                        ParamSpec {
                            name: "relativePaths".to_string(),
                            kind: ParamKind::StringArray,
                            description: "Paths relative to the project root.".to_string(),
                            required: true,
                        },
                        ParamSpec {
                            name: "contentsArray".to_string(),
                            kind: ParamKind::StringArray,
                            description: "Full file contents, one per path, in the same order."
                                .to_string(),
                            required: true,
                        },
                    ],
                },
            ],
        }
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    /// Check a raw tool call against the registry and decode its arguments.
    pub fn decode(&self, call: &ToolCall) -> Result<ToolInvocation, ProtocolError> {
        let spec = self
            .get(&call.name)
            .ok_or_else(|| ProtocolError::UnknownTool {
                name: call.name.clone(),
            })?;
        let arguments = parse_arguments(spec, &call.arguments)?;
        spec.validate_arguments(&arguments)?;

        match spec.name.as_str() {
            READ_PROJECT => Ok(ToolInvocation::ReadProject),
            WRITE_FILES => {
                let args: WriteFilesArgs = serde_json::from_value(arguments)
                    .map_err(|err| spec.invalid(err.to_string()))?;
                Ok(ToolInvocation::WriteFiles {
                    relative_paths: args.relative_paths,
                    contents: args.contents,
                })
            }
            _ => Err(ProtocolError::UnknownTool {
                name: call.name.clone(),
            }),
        }
    }
}

fn parse_arguments(spec: &ToolSpec, raw: &str) -> Result<Value, ProtocolError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| spec.invalid(format!("arguments are not valid JSON: {err}")))?;
    if !value.is_object() {
        return Err(spec.invalid("arguments must be a JSON object"));
    }
    Ok(value)
}
