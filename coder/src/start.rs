//! Startup: turn CLI options and the config file into a ready session.
//!
//! Everything that can be rejected before the first model call is checked
//! here, and failures are tagged with [`StartupError`] so the binary can exit
//! with `exit_codes::INVALID`.

use std::env;
use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::filter::IgnoreRuleSet;
use crate::core::tools::ToolRegistry;
use crate::io::config::{CoderConfig, load_config};
use crate::io::openai::{ChatCompletionsClient, ChatCompletionsConfig};
use crate::io::prompt::render_system_prompt;
use crate::io::workspace::{Workspace, resolve_project_root};
use crate::session::{Session, SessionConfig};

/// Config location relative to the project root when `--config` is absent.
pub const DEFAULT_CONFIG_PATH: &str = ".coder/config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    pub root: PathBuf,
    /// Ignore patterns added on top of the defaults and the config file.
    pub ignore: Vec<String>,
    pub config_path: Option<PathBuf>,
    /// Overrides the configured model name.
    pub model: Option<String>,
}

/// Startup rejected the environment before the conversation began.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupError {
    InvalidRoot,
    InvalidIgnorePattern,
    InvalidConfig,
    MissingApiKey { var: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::InvalidRoot => write!(f, "invalid project root"),
            StartupError::InvalidIgnorePattern => write!(f, "invalid ignore pattern"),
            StartupError::InvalidConfig => write!(f, "invalid configuration"),
            StartupError::MissingApiKey { var } => {
                write!(f, "environment variable {var} is not set or empty")
            }
        }
    }
}

impl std::error::Error for StartupError {}

/// A session ready for its first turn plus the config it was built from.
pub struct PreparedSession {
    pub session: Session,
    pub config: CoderConfig,
}

pub fn prepare_session(opts: &StartOptions) -> Result<PreparedSession> {
    // The root is validated before anything else is read.
    let root = resolve_project_root(&opts.root).context(StartupError::InvalidRoot)?;

    let config_path = opts
        .config_path
        .clone()
        .unwrap_or_else(|| root.join(DEFAULT_CONFIG_PATH));
    let mut config = load_config(&config_path).context(StartupError::InvalidConfig)?;
    if let Some(model) = &opts.model {
        config.model = model.clone();
        config.validate().context(StartupError::InvalidConfig)?;
    }
    debug!(config = %config_path.display(), model = %config.model, "config loaded");

    let rules = IgnoreRuleSet::with_defaults(config.ignore.iter().chain(&opts.ignore))
        .context(StartupError::InvalidIgnorePattern)?;
    let workspace = Workspace::open(&root, rules).context(StartupError::InvalidRoot)?;

    let registry = ToolRegistry::builtin();
    let system_prompt = render_system_prompt(&registry)?;
    info!(
        root = %workspace.root().display(),
        ignore_rules = workspace.rules().patterns().len(),
        model = %config.model,
        "session ready"
    );

    let session = Session::new(
        workspace,
        registry,
        system_prompt,
        SessionConfig::from(&config),
    );
    Ok(PreparedSession { session, config })
}

/// Build the HTTP model client, reading the API key from the environment.
pub fn build_client(config: &CoderConfig) -> Result<ChatCompletionsClient> {
    let api_key = env::var(&config.api_key_env)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| StartupError::MissingApiKey {
            var: config.api_key_env.clone(),
        })?;
    ChatCompletionsClient::new(ChatCompletionsConfig {
        endpoint: config.endpoint.clone(),
        model: config.model.clone(),
        api_key,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        timeout: config.request_timeout(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestProject;
    use std::fs;

    fn opts(root: PathBuf) -> StartOptions {
        StartOptions {
            root,
            ..StartOptions::default()
        }
    }

    fn startup_error(err: &anyhow::Error) -> Option<&StartupError> {
        err.downcast_ref::<StartupError>()
    }

    #[test]
    fn missing_root_is_a_startup_error() {
        let project = TestProject::new();
        let err = prepare_session(&opts(project.path("nope"))).err().expect("error");
        assert_eq!(startup_error(&err), Some(&StartupError::InvalidRoot));
    }

    #[test]
    fn file_root_is_a_startup_error() {
        let project = TestProject::new();
        project.write("file.txt", "x");
        let err = prepare_session(&opts(project.path("file.txt")))
            .err()
            .expect("error");
        assert_eq!(startup_error(&err), Some(&StartupError::InvalidRoot));
        assert!(format!("{err:#}").contains("not a directory"));
    }

    #[test]
    fn bad_ignore_pattern_is_a_startup_error() {
        let project = TestProject::new();
        let err = prepare_session(&StartOptions {
            ignore: vec!["(unclosed".to_string()],
            ..opts(project.root().to_path_buf())
        })
        .err()
        .expect("error");
        assert_eq!(startup_error(&err), Some(&StartupError::InvalidIgnorePattern));
    }

    #[test]
    fn config_and_cli_patterns_join_the_defaults() {
        let project = TestProject::new();
        project.write(
            DEFAULT_CONFIG_PATH,
            "ignore = [\"/fixtures/\"]\ntool_errors = \"report\"\n",
        );
        let prepared = prepare_session(&StartOptions {
            ignore: vec!["\\.log$".to_string()],
            model: Some("local-model".to_string()),
            ..opts(project.root().to_path_buf())
        })
        .expect("prepare");

        let patterns = prepared.session.workspace().rules().patterns();
        assert!(patterns.iter().any(|p| p == "/fixtures/"));
        assert!(patterns.iter().any(|p| p == "\\.log$"));
        assert!(patterns.iter().any(|p| p.contains("node_modules")));
        assert_eq!(prepared.config.model, "local-model");
        assert_eq!(
            prepared.session.config().tool_errors,
            crate::io::config::ToolErrorPolicy::Report
        );
        assert_eq!(prepared.session.history().len(), 1);
    }

    #[test]
    fn explicit_config_path_wins() {
        let project = TestProject::new();
        let config = project.outside("custom.toml");
        fs::write(&config, "max_tool_rounds = 0\n").expect("write config");

        let err = prepare_session(&StartOptions {
            config_path: Some(config),
            ..opts(project.root().to_path_buf())
        })
        .err()
        .expect("error");
        assert_eq!(startup_error(&err), Some(&StartupError::InvalidConfig));
    }

    #[test]
    fn missing_api_key_is_a_startup_error() {
        let config = CoderConfig {
            api_key_env: "CODER_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..CoderConfig::default()
        };
        let err = build_client(&config).err().expect("error");
        assert_eq!(
            startup_error(&err),
            Some(&StartupError::MissingApiKey {
                var: "CODER_TEST_KEY_THAT_IS_NEVER_SET".to_string()
            })
        );
    }
}
