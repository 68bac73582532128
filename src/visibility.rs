//! Hidden-file and blocked-path filtering shared by listing, search and
//! direct serving.

use std::sync::Arc;

/// Dotfiles and dot-directories are hidden.
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Plain string-prefix match against the blocked set.
///
/// Not segment-aware: `private-files2` is blocked by `private-files`. This
/// over-broad behavior is kept on purpose so the blocked set reads as a list
/// of simple prefixes.
pub fn is_blocked(relative_path: &str, blocked: &[String]) -> bool {
    blocked
        .iter()
        .any(|prefix| relative_path.starts_with(prefix.as_str()))
}

/// Immutable visibility policy built once from configuration.
#[derive(Debug, Clone)]
pub struct VisibilityFilter {
    blocked: Arc<[String]>,
}

impl VisibilityFilter {
    pub fn new(blocked: impl IntoIterator<Item = String>) -> Self {
        Self {
            blocked: blocked.into_iter().collect(),
        }
    }

    pub fn blocked(&self) -> &[String] {
        &self.blocked
    }

    pub fn is_blocked(&self, relative_path: &str) -> bool {
        is_blocked(relative_path, &self.blocked)
    }

    /// An entry is visible when its name is not hidden and its path relative
    /// to the base directory is not blocked.
    pub fn is_visible(&self, name: &str, relative_path: &str) -> bool {
        !is_hidden(name) && !self.is_blocked(relative_path)
    }
}
