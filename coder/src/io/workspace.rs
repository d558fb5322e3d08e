//! Project root resolution and the filesystem scope shared by all tools.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::core::filter::IgnoreRuleSet;

/// The directory subtree every tool call is confined to.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    rules: IgnoreRuleSet,
}

impl Workspace {
    /// Resolve `root` to an absolute directory and pair it with `rules`.
    pub fn open(root: &Path, rules: IgnoreRuleSet) -> Result<Self> {
        let root = resolve_project_root(root)?;
        debug!(root = %root.display(), rules = rules.patterns().len(), "workspace opened");
        Ok(Self { root, rules })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn rules(&self) -> &IgnoreRuleSet {
        &self.rules
    }
}

/// Canonicalize `path` and require it to be an existing directory.
pub fn resolve_project_root(path: &Path) -> Result<PathBuf> {
    let resolved = path
        .canonicalize()
        .with_context(|| format!("project root {} does not exist", path.display()))?;
    if !resolved.is_dir() {
        bail!("project root {} is not a directory", resolved.display());
    }
    Ok(resolved)
}
