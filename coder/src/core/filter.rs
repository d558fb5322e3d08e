//! Ignore rules for project traversal.
//!
//! Each rule is a regular expression matched unanchored against the absolute
//! path of a file. A path is ignored when any rule matches anywhere in it.

use std::path::Path;

use anyhow::{Context, Result};
use regex::RegexSet;

/// Built-in patterns applied to every project read.
///
/// Directory rules carry both separators so that `src/build.rs` is kept while
/// `build/out.js` is dropped.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    // version control and editor metadata
    r"/\.git/",
    r"/\.hg/",
    r"/\.svn/",
    r"/\.idea/",
    r"/\.vscode/",
    r"/\.coder/",
    r"\.DS_Store$",
    // dependency, build and output directories
    r"/node_modules/",
    r"/target/",
    r"/dist/",
    r"/build/",
    r"/out/",
    r"/coverage/",
    r"/\.next/",
    r"/__pycache__/",
    r"/\.venv/",
    // lockfiles
    r"/package-lock\.json$",
    r"/yarn\.lock$",
    r"/pnpm-lock\.yaml$",
    r"/Cargo\.lock$",
    r"/poetry\.lock$",
    // binary images
    r"(?i)\.(png|jpe?g|gif|bmp|ico|webp|tiff?)$",
];

/// Ordered, de-duplicated set of ignore patterns compiled into one matcher.
#[derive(Debug, Clone)]
pub struct IgnoreRuleSet {
    patterns: Vec<String>,
    matcher: RegexSet,
}

impl IgnoreRuleSet {
    /// Compile `patterns` in order, dropping exact duplicates.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<String> = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if !unique.iter().any(|existing| existing == pattern) {
                unique.push(pattern.to_string());
            }
        }
        // Compile one by one first so the error names the offending pattern.
        for pattern in &unique {
            regex::Regex::new(pattern)
                .with_context(|| format!("invalid ignore pattern {pattern:?}"))?;
        }
        let matcher = RegexSet::new(&unique).context("compile ignore patterns")?;
        Ok(Self {
            patterns: unique,
            matcher,
        })
    }

    /// Built-in defaults followed by `extra`.
    pub fn with_defaults<I, S>(extra: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let defaults = DEFAULT_IGNORE_PATTERNS.iter().map(|p| p.to_string());
        let extra = extra.into_iter().map(|p| p.as_ref().to_string());
        Self::new(defaults.chain(extra))
    }

    /// A rule set that ignores nothing.
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            matcher: RegexSet::empty(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        is_ignored(path, self)
    }
}

/// Return true when any rule in `rules` matches anywhere in `path`.
pub fn is_ignored(path: &Path, rules: &IgnoreRuleSet) -> bool {
    if rules.is_empty() {
        return false;
    }
    rules.matcher.is_match(&path.to_string_lossy())
}
