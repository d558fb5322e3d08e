//! Test-only doubles: a scripted model, an in-memory console and throwaway
//! projects on disk.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

use crate::core::filter::IgnoreRuleSet;
use crate::core::tools::ToolRegistry;
use crate::core::types::Message;
use crate::io::console::Console;
use crate::io::model::{ModelClient, ModelReply, ModelRequest};
use crate::io::prompt::render_system_prompt;
use crate::io::workspace::Workspace;
use crate::session::{Session, SessionConfig};

/// Model that replays a fixed script and records every request it receives.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    script: RefCell<VecDeque<Result<ModelReply, String>>>,
    requests: RefCell<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new(replies: impl IntoIterator<Item = ModelReply>) -> Self {
        Self {
            script: RefCell::new(replies.into_iter().map(Ok).collect()),
            requests: RefCell::default(),
        }
    }

    /// Model whose first call fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            script: RefCell::new(VecDeque::from([Err(message.to_string())])),
            requests: RefCell::default(),
        }
    }

    /// Histories sent so far, one per call.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn assert_drained(&self) {
        let left = self.script.borrow().len();
        assert_eq!(left, 0, "scripted model has {left} unused replies");
    }
}

impl ModelClient for ScriptedModel {
    fn complete(&self, request: &ModelRequest<'_>) -> Result<ModelReply> {
        self.requests.borrow_mut().push(request.messages.to_vec());
        match self.script.borrow_mut().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted model has no reply left")),
        }
    }
}

/// Console fed from a list of lines that captures everything shown.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    input: VecDeque<String>,
    notices: Vec<String>,
    replies: Vec<String>,
}

impl ScriptedConsole {
    pub fn with_input<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            input: lines.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.clone()
    }

    pub fn replies(&self) -> Vec<String> {
        self.replies.clone()
    }
}

impl Console for ScriptedConsole {
    fn read_line(&mut self) -> Result<Option<String>> {
        Ok(self.input.pop_front())
    }

    fn show_reply(&mut self, reply: &str) -> Result<()> {
        self.replies.push(reply.to_string());
        Ok(())
    }

    fn show_notice(&mut self, notice: &str) -> Result<()> {
        self.notices.push(notice.to_string());
        Ok(())
    }
}

/// Project directory `proj/` inside a fresh temp dir. The temp dir itself is
/// reachable through [`TestProject::outside`] for escape checks.
pub struct TestProject {
    temp: tempfile::TempDir,
    root: PathBuf,
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

impl TestProject {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("proj");
        fs::create_dir(&root).expect("create project dir");
        let root = root.canonicalize().expect("canonical project root");
        Self { temp, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Path beside the project, not inside it.
    pub fn outside(&self, relative: &str) -> PathBuf {
        self.temp.path().join(relative)
    }

    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, contents).expect("write project file");
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative)).expect("read project file")
    }

    pub fn workspace(&self) -> Workspace {
        let rules = IgnoreRuleSet::with_defaults(Vec::<String>::new()).expect("default rules");
        Workspace::open(&self.root, rules).expect("open workspace")
    }

    /// Session over this project with the built-in tools and system prompt.
    pub fn session(&self, config: SessionConfig) -> Session {
        let registry = ToolRegistry::builtin();
        let prompt = render_system_prompt(&registry).expect("system prompt");
        Session::new(self.workspace(), registry, prompt, config)
    }
}
