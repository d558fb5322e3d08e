//! Batch file writes confined to the project root.
//!
//! A batch is validated as a whole before anything touches disk: one bad path
//! rejects every write in the batch. Accepted files are overwritten in place
//! with no backup.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::path::{relative_display, resolve_within};

/// One file to write, addressed relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWriteRequest {
    pub relative_path: String,
    pub contents: String,
}

/// Reasons a write batch is rejected before any file is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteBatchError {
    /// `relativePaths` and `contentsArray` differ in length.
    LengthMismatch { paths: usize, contents: usize },
    /// The path at `index` is empty.
    EmptyPath { index: usize },
    /// The path at `index` resolves outside the project root.
    EscapesRoot { index: usize, path: String },
    /// The path at `index` names an existing directory.
    TargetIsDirectory { index: usize, path: String },
    /// Some existing parent of the path at `index` is a file.
    ParentNotDirectory { index: usize, path: String },
    /// The path at `index` would have to be a file and also the parent
    /// directory of the path at `other`.
    PathConflict {
        index: usize,
        path: String,
        other: usize,
    },
}

impl fmt::Display for WriteBatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteBatchError::LengthMismatch { paths, contents } => write!(
                f,
                "write batch rejected: {paths} paths but {contents} contents"
            ),
            WriteBatchError::EmptyPath { index } => {
                write!(f, "write batch rejected: path #{index} is empty")
            }
            WriteBatchError::EscapesRoot { index, path } => write!(
                f,
                "security violation: path #{index} {path:?} resolves outside the project root"
            ),
            WriteBatchError::TargetIsDirectory { index, path } => write!(
                f,
                "write batch rejected: path #{index} {path:?} is an existing directory"
            ),
            WriteBatchError::ParentNotDirectory { index, path } => write!(
                f,
                "write batch rejected: path #{index} {path:?} has a parent that is not a directory"
            ),
            WriteBatchError::PathConflict { index, path, other } => write!(
                f,
                "write batch rejected: path #{index} {path:?} is also the parent of path #{other}"
            ),
        }
    }
}

impl std::error::Error for WriteBatchError {}

/// Zip parallel path/content sequences into requests.
pub fn pair_requests(
    relative_paths: Vec<String>,
    contents: Vec<String>,
) -> Result<Vec<FileWriteRequest>, WriteBatchError> {
    if relative_paths.len() != contents.len() {
        return Err(WriteBatchError::LengthMismatch {
            paths: relative_paths.len(),
            contents: contents.len(),
        });
    }
    Ok(relative_paths
        .into_iter()
        .zip(contents)
        .map(|(relative_path, contents)| FileWriteRequest {
            relative_path,
            contents,
        })
        .collect())
}

/// Validate every request, then write them in order.
///
/// Returns the root-relative paths written. On a validation failure nothing is
/// written; an I/O failure mid-batch stops at the failing file.
#[instrument(skip_all, fields(root = %root.display(), files = requests.len()))]
pub fn write_files(root: &Path, requests: &[FileWriteRequest]) -> Result<Vec<String>> {
    let root = root
        .canonicalize()
        .with_context(|| format!("resolve project root {}", root.display()))?;

    let targets = check_batch(&root, requests).inspect_err(|err| {
        warn!(%err, "rejecting write batch");
    })?;

    let mut written = Vec::with_capacity(targets.len());
    for (target, request) in targets.iter().zip(requests) {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(target, &request.contents)
            .with_context(|| format!("write {}", target.display()))?;
        let relative = relative_display(&root, target);
        info!(path = %relative, bytes = request.contents.len(), "file written");
        written.push(relative);
    }
    Ok(written)
}

/// Check every request, then reject batches where one path is both a file and
/// the parent directory of another.
fn check_batch(
    root: &Path,
    requests: &[FileWriteRequest],
) -> Result<Vec<PathBuf>, WriteBatchError> {
    let mut targets = Vec::with_capacity(requests.len());
    for (index, request) in requests.iter().enumerate() {
        targets.push(check_request(root, index, request)?);
    }
    for (index, target) in targets.iter().enumerate() {
        if let Some(other) = targets
            .iter()
            .position(|candidate| candidate != target && candidate.starts_with(target))
        {
            return Err(WriteBatchError::PathConflict {
                index,
                path: requests[index].relative_path.clone(),
                other,
            });
        }
    }
    Ok(targets)
}

/// Check one request against the current filesystem.
///
/// Symlinks on the deepest existing part of the target are followed and the
/// real location must stay under `root`; dangling links count as escapes.
/// That existing part must be a directory, unless it is the target itself,
/// which must then not be one.
fn check_request(
    root: &Path,
    index: usize,
    request: &FileWriteRequest,
) -> Result<PathBuf, WriteBatchError> {
    if request.relative_path.trim().is_empty() {
        return Err(WriteBatchError::EmptyPath { index });
    }
    let path = || request.relative_path.clone();
    let escapes = || WriteBatchError::EscapesRoot {
        index,
        path: path(),
    };
    let target = resolve_within(root, &request.relative_path).ok_or_else(escapes)?;

    let existing = target
        .ancestors()
        .find(|ancestor| fs::symlink_metadata(ancestor).is_ok())
        .ok_or_else(escapes)?;
    let real = existing.canonicalize().map_err(|_| escapes())?;
    if !real.starts_with(root) {
        return Err(escapes());
    }

    let is_dir = real.is_dir();
    if existing == target && is_dir {
        return Err(WriteBatchError::TargetIsDirectory {
            index,
            path: path(),
        });
    }
    if existing != target && !is_dir {
        return Err(WriteBatchError::ParentNotDirectory {
            index,
            path: path(),
        });
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> (tempfile::TempDir, PathBuf) {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("proj");
        fs::create_dir(&root).expect("mkdir");
        let root = root.canonicalize().expect("canonical");
        (temp, root)
    }

    fn batch(pairs: &[(&str, &str)]) -> Vec<FileWriteRequest> {
        pairs
            .iter()
            .map(|(path, contents)| FileWriteRequest {
                relative_path: path.to_string(),
                contents: contents.to_string(),
            })
            .collect()
    }

    fn snapshot(dir: &Path) -> Vec<(PathBuf, Vec<u8>)> {
        let mut entries: Vec<(PathBuf, Vec<u8>)> = walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .map(|entry| entry.expect("walk"))
            .map(|entry| {
                let bytes = if entry.file_type().is_file() {
                    fs::read(entry.path()).expect("read")
                } else {
                    Vec::new()
                };
                (entry.path().to_path_buf(), bytes)
            })
            .collect();
        entries.sort();
        entries
    }

    #[test]
    fn written_files_read_back_with_same_contents() {
        let (_temp, root) = project();
        let written = write_files(&root, &batch(&[("src/a.ts", "1"), ("src/b.ts", "2")]))
            .expect("write");

        assert_eq!(written, vec!["src/a.ts", "src/b.ts"]);
        assert_eq!(fs::read_to_string(root.join("src/a.ts")).expect("a"), "1");
        assert_eq!(fs::read_to_string(root.join("src/b.ts")).expect("b"), "2");
    }

    #[test]
    fn existing_files_are_overwritten() {
        let (_temp, root) = project();
        fs::write(root.join("main.rs"), "old contents that are longer").expect("seed");
        write_files(&root, &batch(&[("main.rs", "new")])).expect("write");
        assert_eq!(fs::read_to_string(root.join("main.rs")).expect("read"), "new");
    }

    #[test]
    fn writing_same_batch_twice_is_idempotent() {
        let (temp, root) = project();
        let requests = batch(&[("a/b/c.txt", "deep"), ("top.txt", "top")]);
        write_files(&root, &requests).expect("first");
        let once = snapshot(temp.path());
        write_files(&root, &requests).expect("second");
        assert_eq!(snapshot(temp.path()), once);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let err = pair_requests(vec!["a".to_string(), "b".to_string()], vec!["1".to_string()])
            .unwrap_err();
        assert_eq!(
            err,
            WriteBatchError::LengthMismatch {
                paths: 2,
                contents: 1
            }
        );
    }

    #[test]
    fn escaping_path_rejects_whole_batch_without_writing() {
        let (temp, root) = project();
        let before = snapshot(temp.path());

        let err = write_files(
            &root,
            &batch(&[("ok.txt", "fine"), ("../../etc/passwd", "pwned"), ("late.txt", "x")]),
        )
        .unwrap_err();

        let batch_err = err.downcast_ref::<WriteBatchError>().expect("batch error");
        assert_eq!(
            batch_err,
            &WriteBatchError::EscapesRoot {
                index: 1,
                path: "../../etc/passwd".to_string()
            }
        );
        assert_eq!(snapshot(temp.path()), before);
    }

    #[test]
    fn sibling_directory_sharing_a_prefix_is_outside() {
        let (temp, root) = project();
        let err = write_files(&root, &batch(&[("../proj-evil/x.txt", "x")])).unwrap_err();
        assert!(err.to_string().contains("security violation"));
        assert!(!temp.path().join("proj-evil").exists());
    }

    #[test]
    fn empty_path_is_rejected() {
        let (_temp, root) = project();
        let err = write_files(&root, &batch(&[("a.txt", "a"), ("  ", "b")])).unwrap_err();
        assert_eq!(
            err.downcast_ref::<WriteBatchError>(),
            Some(&WriteBatchError::EmptyPath { index: 1 })
        );
        assert!(!root.join("a.txt").exists());
    }

    #[test]
    fn existing_directory_target_rejects_whole_batch() {
        let (_temp, root) = project();
        fs::create_dir(root.join("src")).expect("mkdir src");

        let err = write_files(&root, &batch(&[("a.txt", "a"), ("src", "b")])).unwrap_err();

        assert_eq!(
            err.downcast_ref::<WriteBatchError>(),
            Some(&WriteBatchError::TargetIsDirectory {
                index: 1,
                path: "src".to_string()
            })
        );
        assert!(!root.join("a.txt").exists());
    }

    #[test]
    fn file_in_the_parent_chain_rejects_whole_batch() {
        let (_temp, root) = project();
        fs::write(root.join("notes.md"), "notes").expect("seed");

        let err =
            write_files(&root, &batch(&[("a.txt", "a"), ("notes.md/x", "b")])).unwrap_err();

        assert_eq!(
            err.downcast_ref::<WriteBatchError>(),
            Some(&WriteBatchError::ParentNotDirectory {
                index: 1,
                path: "notes.md/x".to_string()
            })
        );
        assert!(!root.join("a.txt").exists());
        assert_eq!(fs::read_to_string(root.join("notes.md")).expect("read"), "notes");
    }

    #[test]
    fn file_and_child_in_same_batch_conflict() {
        let (_temp, root) = project();
        for pairs in [
            [("a.txt", "a"), ("lib", "file"), ("lib/mod.rs", "child")],
            [("a.txt", "a"), ("lib/mod.rs", "child"), ("lib", "file")],
        ] {
            let err = write_files(&root, &batch(&pairs)).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<WriteBatchError>(),
                Some(WriteBatchError::PathConflict { path, .. }) if path == "lib"
            ));
            assert!(!root.join("a.txt").exists());
            assert!(!root.join("lib").exists());
        }
    }

    #[test]
    fn overwriting_a_file_inside_existing_directory_is_allowed() {
        let (_temp, root) = project();
        fs::create_dir(root.join("src")).expect("mkdir");
        fs::write(root.join("src/lib.rs"), "old").expect("seed");

        write_files(&root, &batch(&[("src/lib.rs", "new"), ("src/./lib.rs", "newer")]))
            .expect("write");

        assert_eq!(fs::read_to_string(root.join("src/lib.rs")).expect("read"), "newer");
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory_pointing_outside_is_rejected() {
        let (temp, root) = project();
        let outside = temp.path().join("outside");
        fs::create_dir(&outside).expect("mkdir outside");
        std::os::unix::fs::symlink(&outside, root.join("escape")).expect("symlink");

        let err = write_files(&root, &batch(&[("escape/x.txt", "x")])).unwrap_err();

        assert!(err.to_string().contains("escape/x.txt"));
        assert!(!outside.join("x.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_target_is_rejected() {
        let (temp, root) = project();
        let outside = temp.path().join("created-outside.txt");
        std::os::unix::fs::symlink(&outside, root.join("dangling.txt")).expect("symlink");

        let err = write_files(&root, &batch(&[("dangling.txt", "x")])).unwrap_err();

        assert!(err.downcast_ref::<WriteBatchError>().is_some());
        assert!(!outside.exists());
    }
}
