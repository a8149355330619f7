//! Path navigation confined to a sandbox root.
//!
//! Every user-supplied path is joined onto the session's current directory,
//! normalized lexically and then classified against the root:
//!
//! - inside the root: must exist (and must not be a symlink leading out)
//! - an ancestor of the root: clamped to the root, so `cd ..` at the top is a no-op
//! - anything else: reported as not found

use std::fs;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR, MAIN_SEPARATOR_STR};

use thiserror::Error;

/// Errors raised while navigating the sandbox.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The path does not exist or lies outside the sandbox.
    #[error("Target path not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    /// A regular file was required.
    #[error("This is not a file!")]
    NotAFile(PathBuf),

    /// The sandbox root itself is not a directory.
    #[error("sandbox root is not a directory: {}", .0.display())]
    RootNotADirectory(PathBuf),

    /// IO error.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Per-session view of the served directory tree.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    /// Canonical root, fixed for the sandbox's lifetime.
    root: PathBuf,
    /// Absolute current directory, always `root` or below it.
    cwd: PathBuf,
}

impl PathSandbox {
    /// Open a sandbox rooted at `root`, starting at the root.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SandboxError> {
        let root = root.as_ref();
        let canonical = fs::canonicalize(root)?;
        if !canonical.is_dir() {
            return Err(SandboxError::RootNotADirectory(root.to_path_buf()));
        }
        Ok(Self {
            cwd: canonical.clone(),
            root: canonical,
        })
    }

    /// The canonical sandbox root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute current directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Current directory relative to the root (empty at the root).
    pub fn current_dir(&self) -> &Path {
        self.cwd.strip_prefix(&self.root).unwrap_or(Path::new(""))
    }

    /// Working-directory prompt shown to the client, e.g. `/docs/2024`.
    pub fn prompt(&self) -> String {
        let relative = self
            .current_dir()
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join(MAIN_SEPARATOR_STR);
        format!("{}{}", MAIN_SEPARATOR, relative)
    }

    /// Resolve a relative or absolute path against the current directory.
    ///
    /// The result is either the root itself or an existing path inside it.
    pub fn resolve(&self, path: &Path) -> Result<PathBuf, SandboxError> {
        let normalized = normalize(&self.cwd.join(path));

        if normalized.starts_with(&self.root) {
            let relative = normalized
                .strip_prefix(&self.root)
                .unwrap_or(Path::new(""))
                .to_path_buf();

            // canonicalize fails for anything missing, which is what we want
            let canonical = fs::canonicalize(&normalized)
                .map_err(|_| SandboxError::PathNotFound(relative.clone()))?;
            if !canonical.starts_with(&self.root) {
                return Err(SandboxError::PathNotFound(relative));
            }
            Ok(normalized)
        } else if self.root.starts_with(&normalized) {
            Ok(self.root.clone())
        } else {
            Err(SandboxError::PathNotFound(path.to_path_buf()))
        }
    }

    /// Change the current directory.
    ///
    /// Naming a regular file moves to the directory containing it.
    pub fn change_directory(&mut self, path: &Path) -> Result<(), SandboxError> {
        let mut target = self.resolve(path)?;
        if target.is_file() {
            if let Some(parent) = target.parent() {
                target = parent.to_path_buf();
            }
        }
        self.cwd = target;
        Ok(())
    }

    /// List a directory's immediate children in filesystem order.
    ///
    /// Listing a non-directory yields just that entry. Defaults to the
    /// current directory.
    pub fn list(&self, path: Option<&Path>) -> Result<Vec<PathBuf>, SandboxError> {
        let target = match path {
            Some(path) => self.resolve(path)?,
            None => self.cwd.clone(),
        };

        if !target.is_dir() {
            return Ok(vec![target]);
        }

        let mut children = Vec::new();
        for entry in fs::read_dir(&target)? {
            children.push(entry?.path());
        }
        Ok(children)
    }

    /// Resolve a path that must be a regular file.
    pub fn get_file(&self, path: &Path) -> Result<PathBuf, SandboxError> {
        let file = self.resolve(path)?;
        if file.is_file() {
            Ok(file)
        } else {
            Err(SandboxError::NotAFile(file))
        }
    }
}

/// Collapse `.` and `..` components without touching the filesystem.
///
/// `..` above the filesystem root stays at the filesystem root.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if out.parent().is_some() {
                    out.pop();
                }
            }
            Component::Normal(name) => out.push(name),
        }
    }
    out
}
