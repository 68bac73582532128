//! Path sanitization and base-directory confinement.
//!
//! Every user-supplied path goes through [`sanitize`] and then
//! [`is_valid`] before it touches the filesystem. [`BaseDir`] bundles both
//! steps for a fixed root.

use std::fmt;
use std::io;
use std::path::{Component, MAIN_SEPARATOR_STR, Path, PathBuf};

use tracing::warn;

use crate::error::FileServerError;

/// A relative path with no `.`/`..` components, never absolute.
///
/// The empty path denotes the base directory itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SanitizedPath(String);

impl SanitizedPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split(MAIN_SEPARATOR_STR).filter(|c| !c.is_empty())
    }
}

impl fmt::Display for SanitizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lexically clean a slash-separated path.
///
/// Collapses repeated separators, drops `.` and resolves `..` against the
/// preceding segment. A rooted path cannot climb above `/`; a relative path
/// keeps its leading `..` segments. Never touches the filesystem.
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if out.last().is_some_and(|last| *last != "..") {
                    out.pop();
                } else if !rooted {
                    out.push("..");
                }
            }
            _ => out.push(segment),
        }
    }

    let joined = out.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Turn untrusted input into a traversal-free relative path.
///
/// Total: malformed input degrades to a shorter path instead of failing.
pub fn sanitize(input: &str) -> SanitizedPath {
    let cleaned = clean(input);
    let trimmed = cleaned.strip_prefix("../").unwrap_or(&cleaned);
    let trimmed = trimmed.strip_prefix('/').unwrap_or(trimmed);

    let parts: Vec<&str> = trimmed
        .split('/')
        .filter(|part| !matches!(*part, "" | "." | ".."))
        .collect();

    SanitizedPath(parts.join(MAIN_SEPARATOR_STR))
}

/// Lexically normalize a path: drop `.`, fold `..` into its parent.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(name) => out.push(name),
        }
    }
    out
}

/// Check that `candidate`, joined onto `base`, stays inside `base`.
///
/// Containment is component-aware, so `/a/bc` is not inside `/a/b`. Any
/// failure to compute an absolute form counts as invalid.
///
/// The check is purely lexical and never touches the filesystem. Symlinks
/// are not followed: a link inside `base` whose target lies outside it
/// still passes.
pub fn is_valid(base: &Path, candidate: impl AsRef<Path>) -> bool {
    let Ok(abs_base) = std::path::absolute(base) else {
        return false;
    };
    let Ok(abs_full) = std::path::absolute(base.join(candidate)) else {
        return false;
    };

    normalize(&abs_full).starts_with(normalize(&abs_base))
}

/// Whether `path` lies at or below `dir`, both taken in normalized absolute
/// form. Unresolvable inputs are treated as not contained.
pub fn is_within(dir: &Path, path: &Path) -> bool {
    match (std::path::absolute(dir), std::path::absolute(path)) {
        (Ok(dir), Ok(path)) => normalize(&path).starts_with(normalize(&dir)),
        _ => false,
    }
}

/// A path that passed sanitization and validation against a [`BaseDir`].
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    pub relative: SanitizedPath,
    pub full: PathBuf,
}

/// The absolute root all listing, search and serving is confined to.
#[derive(Debug, Clone)]
pub struct BaseDir {
    root: PathBuf,
}

impl BaseDir {
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = normalize(&std::path::absolute(root.as_ref())?);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sanitize and validate `relative`, rejecting anything that escapes.
    pub fn resolve(&self, relative: &str) -> Result<ResolvedPath, FileServerError> {
        let sanitized = sanitize(relative);

        if !is_valid(&self.root, sanitized.as_path()) {
            warn!("Rejected path outside base directory: {:?}", relative);
            return Err(FileServerError::InvalidPath(relative.to_string()));
        }

        let full = if sanitized.is_root() {
            self.root.clone()
        } else {
            self.root.join(sanitized.as_path())
        };

        Ok(ResolvedPath {
            relative: sanitized,
            full,
        })
    }

    /// Path of `full` relative to the root, empty if it is not below it.
    pub fn relative_of(&self, full: &Path) -> String {
        full.strip_prefix(&self.root)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}
