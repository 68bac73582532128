//! Recursive, best-effort file name search.

use serde::Serialize;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::FileServerError;
use crate::paths::BaseDir;
use crate::visibility::{VisibilityFilter, is_hidden};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub file_name: String,
    /// Absolute path of the match.
    pub file_path: String,
    /// Path of the match relative to the base directory.
    pub relative_path: String,
}

#[derive(Debug, Clone)]
pub struct RecursiveSearcher {
    base: BaseDir,
    filter: VisibilityFilter,
}

impl RecursiveSearcher {
    pub fn new(base: BaseDir, filter: VisibilityFilter) -> Self {
        Self { base, filter }
    }

    /// Find non-directory entries below `directory` (default: the base root)
    /// whose name contains `query`, ignoring case.
    ///
    /// Hidden directories are never descended into. Unreadable entries are
    /// skipped and the walk carries on.
    pub fn search(
        &self,
        query: &str,
        directory: Option<&str>,
    ) -> Result<Vec<SearchResult>, FileServerError> {
        if query.is_empty() {
            return Err(FileServerError::BadRequest(
                "Search query is required".to_string(),
            ));
        }

        let start = self.base.resolve(directory.unwrap_or(""))?;

        // Starting inside a hidden directory would mean descending into it.
        if start.relative.components().any(is_hidden) {
            debug!("Search start {:?} is inside a hidden directory", start.relative.as_str());
            return Ok(Vec::new());
        }

        debug!("Searching {} for {:?}", start.full.display(), query);

        let needle = query.to_lowercase();
        let mut results = Vec::new();

        let walker = WalkDir::new(&start.full)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                !(e.file_type().is_dir() && is_hidden(&e.file_name().to_string_lossy()))
            });

        for entry in walker.filter_map(Result::ok) {
            if entry.file_type().is_dir() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().to_string();
            if is_hidden(&file_name) {
                continue;
            }

            let relative_path = self.base.relative_of(entry.path());
            if self.filter.is_blocked(&relative_path) {
                continue;
            }

            if file_name.to_lowercase().contains(&needle) {
                results.push(SearchResult {
                    file_name,
                    file_path: entry.path().to_string_lossy().to_string(),
                    relative_path,
                });
            }
        }

        Ok(results)
    }
}
