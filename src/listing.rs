//! Single-level directory listing.

use std::io;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::error::FileServerError;
use crate::paths::BaseDir;
use crate::visibility::{VisibilityFilter, is_hidden};

/// One visible child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    /// For a symlink this describes the link target.
    pub is_directory: bool,
}

/// Decides what a symlink points at.
pub trait LinkResolver: Send + Sync {
    fn target_is_dir(&self, link: &Path) -> io::Result<bool>;
}

/// Follow exactly one level of symlink.
///
/// A link whose target is itself a link is reported as a non-directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FollowOnce;

impl LinkResolver for FollowOnce {
    fn target_is_dir(&self, link: &Path) -> io::Result<bool> {
        let target = std::fs::read_link(link)?;
        let target = match link.parent() {
            Some(parent) => parent.join(target),
            None => target,
        };
        Ok(std::fs::symlink_metadata(target)?.is_dir())
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryLister<R = FollowOnce> {
    base: BaseDir,
    filter: VisibilityFilter,
    links: R,
}

impl DirectoryLister {
    pub fn new(base: BaseDir, filter: VisibilityFilter) -> Self {
        Self::with_resolver(base, filter, FollowOnce)
    }
}

impl<R: LinkResolver> DirectoryLister<R> {
    pub fn with_resolver(base: BaseDir, filter: VisibilityFilter, links: R) -> Self {
        Self {
            base,
            filter,
            links,
        }
    }

    /// List the visible direct children of `relative`.
    ///
    /// Entries that cannot be inspected are skipped rather than failing the
    /// whole listing. Directories come first, then names case-insensitively.
    pub fn list(&self, relative: &str) -> Result<Vec<DirectoryEntry>, FileServerError> {
        let resolved = self.base.resolve(relative)?;

        if resolved.relative.components().any(is_hidden) {
            debug!("Refusing to list hidden directory {:?}", resolved.relative.as_str());
            return Err(FileServerError::NotFound(resolved.relative.to_string()));
        }

        if resolved.full.is_file() {
            return Err(FileServerError::NotADirectory);
        }

        let entries = std::fs::read_dir(&resolved.full).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FileServerError::NotFound(resolved.relative.to_string()),
            _ => FileServerError::Io(e),
        })?;

        debug!("Listing directory: {}", resolved.full.display());

        let mut files = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            let entry_path = entry.path();
            let relative_path = self.base.relative_of(&entry_path);

            if !self.filter.is_visible(&name, &relative_path) {
                continue;
            }

            let Ok(file_type) = entry.file_type() else {
                continue;
            };

            let is_directory = if file_type.is_symlink() {
                self.links.target_is_dir(&entry_path).unwrap_or(false)
            } else {
                file_type.is_dir()
            };

            files.push(DirectoryEntry { name, is_directory });
        }

        files.sort_by(|a, b| match (a.is_directory, b.is_directory) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        });

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, DirectoryLister) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join(".env"), "SECRET=1").unwrap();
        fs::write(root.join("notes.md"), "# notes").unwrap();
        fs::write(root.join("Archive.zip"), "zip").unwrap();
        fs::create_dir_all(root.join("private-files")).unwrap();
        fs::create_dir_all(root.join("incoming")).unwrap();
        fs::create_dir_all(root.join("docs/incoming")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("docs/guide.md"), "guide").unwrap();

        let base = BaseDir::new(root).unwrap();
        let filter = VisibilityFilter::new(vec!["incoming".to_string(), "private-files".to_string()]);
        (temp_dir, DirectoryLister::new(base, filter))
    }

    fn names(entries: &[DirectoryEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_list_excludes_hidden_and_blocked() {
        let (_temp, lister) = setup();
        let entries = lister.list("").unwrap();

        assert_eq!(names(&entries), vec!["docs", "Archive.zip", "notes.md"]);
        assert!(entries[0].is_directory);
        assert!(!entries[1].is_directory);
    }

    #[test]
    fn test_blocked_match_uses_path_relative_to_base() {
        let (_temp, lister) = setup();
        let entries = lister.list("docs").unwrap();

        assert_eq!(names(&entries), vec!["incoming", "guide.md"]);
    }

    #[test]
    fn test_list_traversal_is_confined() {
        let (_temp, lister) = setup();
        let entries = lister.list("../../..").unwrap();
        assert_eq!(names(&entries), vec!["docs", "Archive.zip", "notes.md"]);
    }

    #[test]
    fn test_list_missing_directory() {
        let (_temp, lister) = setup();
        let result = lister.list("nope");
        assert!(matches!(result, Err(FileServerError::NotFound(_))));
    }

    #[test]
    fn test_list_inside_hidden_directory_is_not_found() {
        let (temp, lister) = setup();
        fs::create_dir_all(temp.path().join(".git/objects")).unwrap();
        fs::write(temp.path().join(".git/config"), "[core]").unwrap();

        assert!(matches!(lister.list(".git"), Err(FileServerError::NotFound(_))));
        assert!(matches!(
            lister.list(".git/objects"),
            Err(FileServerError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_file_is_not_a_directory() {
        let (_temp, lister) = setup();
        let result = lister.list("notes.md");
        assert!(matches!(result, Err(FileServerError::NotADirectory)));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_target_type() {
        use std::os::unix::fs::symlink;

        let (temp, lister) = setup();
        let root = temp.path();
        symlink(root.join("docs"), root.join("docs-link")).unwrap();
        symlink(root.join("notes.md"), root.join("notes-link.md")).unwrap();
        symlink(root.join("missing"), root.join("dangling")).unwrap();

        let entries = lister.list("").unwrap();
        let find = |name: &str| entries.iter().find(|e| e.name == name).unwrap().is_directory;

        assert!(find("docs-link"));
        assert!(!find("notes-link.md"));
        assert!(!find("dangling"));
    }

    #[cfg(unix)]
    #[test]
    fn test_follow_once_stops_at_one_level() {
        use std::os::unix::fs::symlink;

        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir(root.join("real")).unwrap();
        symlink("real", root.join("first")).unwrap();
        symlink("first", root.join("second")).unwrap();

        assert!(FollowOnce.target_is_dir(&root.join("first")).unwrap());
        assert!(!FollowOnce.target_is_dir(&root.join("second")).unwrap());
        assert!(FollowOnce.target_is_dir(&root.join("real")).is_err());
    }

    struct FailingResolver;

    impl LinkResolver for FailingResolver {
        fn target_is_dir(&self, _link: &Path) -> io::Result<bool> {
            Err(io::Error::other("stat failed"))
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_resolver_failure_falls_back_to_file() {
        use std::os::unix::fs::symlink;

        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir(root.join("real")).unwrap();
        symlink(root.join("real"), root.join("link")).unwrap();

        let lister = DirectoryLister::with_resolver(
            BaseDir::new(root).unwrap(),
            VisibilityFilter::new(Vec::new()),
            FailingResolver,
        );
        let entries = lister.list("").unwrap();

        assert_eq!(
            entries,
            vec![
                DirectoryEntry {
                    name: "real".to_string(),
                    is_directory: true
                },
                DirectoryEntry {
                    name: "link".to_string(),
                    is_directory: false
                },
            ]
        );
    }
}
