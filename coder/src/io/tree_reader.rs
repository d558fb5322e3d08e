//! Reads a whole project tree into one ordered text payload.
//!
//! Entries are visited depth-first with siblings sorted by file name, so the
//! payload order is lexicographic by path and stable for an unchanged tree on
//! any filesystem. `walkdir` keeps its own stack, so depth does not grow the
//! call stack.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, instrument};
use walkdir::{DirEntry, WalkDir};

use crate::core::filter::IgnoreRuleSet;
use crate::core::path::relative_display;

/// Concatenated contents of every readable, non-ignored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSnapshot {
    /// Payload handed to the model.
    pub text: String,
    /// Root-relative paths included, in payload order.
    pub files: Vec<String>,
}

/// Header line written before each file's contents.
pub fn file_header(relative: &str) -> String {
    format!("--- FILE: {relative} ---\n")
}

/// Read every file under `root` not matched by `rules`.
///
/// Contents are decoded lossily, so binary files contribute replacement
/// characters instead of failing. Any entry that cannot be listed or read
/// aborts the read; no partial payload is returned. Symlinks are skipped
/// because they may point outside `root`.
///
/// A directory is not entered when its path with a trailing `/` matches a
/// rule. This only agrees with per-file filtering for rules that match a
/// directory segment, such as `/node_modules/`; a rule anchored on the
/// separator itself (`/src/$`) would prune files it never matches.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn read_tree(root: &Path, rules: &IgnoreRuleSet) -> Result<ProjectSnapshot> {
    let mut text = String::new();
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_pruned_dir(entry, rules));
    for entry in walker {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            debug!(path = %entry.path().display(), "skipping symlink");
            continue;
        }
        if !file_type.is_file() {
            continue;
        }
        let path = entry.path();
        if rules.is_ignored(path) {
            continue;
        }

        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let relative = relative_display(root, path);
        text.push_str(&file_header(&relative));
        text.push_str(&String::from_utf8_lossy(&bytes));
        text.push('\n');
        files.push(relative);
    }

    debug!(files = files.len(), bytes = text.len(), "project read");
    Ok(ProjectSnapshot { text, files })
}

fn is_pruned_dir(entry: &DirEntry, rules: &IgnoreRuleSet) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let mut dir = entry.path().as_os_str().to_owned();
    dir.push("/");
    let pruned = rules.is_ignored(Path::new(&dir));
    if pruned {
        debug!(path = %entry.path().display(), "skipping ignored directory");
    }
    pruned
}
