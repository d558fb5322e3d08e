//! Execution of decoded tool invocations against the workspace.

use anyhow::Result;
use tracing::{info, instrument};

use crate::core::tools::ToolInvocation;
use crate::io::tree_reader::read_tree;
use crate::io::workspace::Workspace;
use crate::io::writer::{pair_requests, write_files};

/// Tool result text sent back to the model after a successful write.
pub const WRITE_ACK: &str = "Done";

/// What a tool produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    ProjectRead { payload: String, files: Vec<String> },
    FilesWritten { paths: Vec<String> },
}

impl ToolOutcome {
    /// Text appended to the history as the tool result.
    pub fn content(&self) -> &str {
        match self {
            ToolOutcome::ProjectRead { payload, .. } => payload,
            ToolOutcome::FilesWritten { .. } => WRITE_ACK,
        }
    }

    /// Lines shown to the user for this outcome.
    pub fn notices(&self) -> Vec<String> {
        match self {
            ToolOutcome::ProjectRead { files, .. } => {
                let noun = if files.len() == 1 { "file" } else { "files" };
                vec![format!("read {} {noun}", files.len())]
            }
            ToolOutcome::FilesWritten { paths } => {
                paths.iter().map(|path| format!("wrote {path}")).collect()
            }
        }
    }
}

/// Run one tool.
#[instrument(skip_all, fields(tool = invocation.name()))]
pub fn dispatch(workspace: &Workspace, invocation: ToolInvocation) -> Result<ToolOutcome> {
    match invocation {
        ToolInvocation::ReadProject => {
            let snapshot = read_tree(workspace.root(), workspace.rules())?;
            info!(files = snapshot.files.len(), "project read");
            Ok(ToolOutcome::ProjectRead {
                payload: snapshot.text,
                files: snapshot.files,
            })
        }
        ToolInvocation::WriteFiles {
            relative_paths,
            contents,
        } => {
            let requests = pair_requests(relative_paths, contents)?;
            let paths = write_files(workspace.root(), &requests)?;
            Ok(ToolOutcome::FilesWritten { paths })
        }
    }
}
