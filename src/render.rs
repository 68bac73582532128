//! Access gate and render decision for `/files/*` requests.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::FileServerError;
use crate::paths::{BaseDir, ResolvedPath, is_within};
use crate::visibility::{VisibilityFilter, is_hidden};

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "ogv", "mov", "m4v", "mkv", "avi"];
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a", "flac", "aac"];

/// How a resolved path is presented to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderDecision {
    /// Directory with an `index.html`; serve that file.
    DirectoryIndex(PathBuf),
    /// Directory without an index; serve the browser UI.
    DirectoryBrowse,
    /// Markdown file; serve the viewer UI, which fetches the content itself.
    MarkdownView,
    /// Audio or video file; serve the player UI.
    MediaPlay,
    /// Serve the file bytes.
    RawServe,
}

/// Lowercased extension without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

pub fn is_media_extension(ext: &str) -> bool {
    VIDEO_EXTENSIONS.contains(&ext) || AUDIO_EXTENSIONS.contains(&ext)
}

/// `.md` or `.markdown`, any case. Used by the markdown content API; the
/// viewer route itself only triggers on `.md`.
pub fn is_markdown_file(name: &str) -> bool {
    matches!(
        extension_of(Path::new(name)).as_deref(),
        Some("md") | Some("markdown")
    )
}

/// Pick a render decision for an existing, already authorized path.
pub fn decide(path: &Path, raw: bool) -> RenderDecision {
    if path.is_dir() {
        let index = path.join("index.html");
        return if index.is_file() {
            RenderDecision::DirectoryIndex(index)
        } else {
            RenderDecision::DirectoryBrowse
        };
    }

    if raw {
        return RenderDecision::RawServe;
    }

    match extension_of(path).as_deref() {
        Some("md") => RenderDecision::MarkdownView,
        Some(ext) if is_media_extension(ext) => RenderDecision::MediaPlay,
        _ => RenderDecision::RawServe,
    }
}

/// Gatekeeper in front of direct file serving.
#[derive(Debug, Clone)]
pub struct ContentRouter {
    base: BaseDir,
    incoming_dir: PathBuf,
    filter: VisibilityFilter,
}

impl ContentRouter {
    pub fn new(base: BaseDir, incoming_dir: PathBuf, filter: VisibilityFilter) -> Self {
        Self {
            base,
            incoming_dir,
            filter,
        }
    }

    /// Resolve `relative` and check it may be served.
    ///
    /// Escaping the base, targeting the incoming area or a blocked prefix is
    /// `Forbidden`. Hidden entries and missing paths are `NotFound`.
    pub fn authorize(&self, relative: &str) -> Result<ResolvedPath, FileServerError> {
        let resolved = self.base.resolve(relative).map_err(|_| {
            FileServerError::Forbidden("path escapes the served directory".to_string())
        })?;

        if is_within(&self.incoming_dir, &resolved.full) {
            warn!("Rejected request into incoming area: {:?}", relative);
            return Err(FileServerError::Forbidden(
                "uploads in progress are not browsable".to_string(),
            ));
        }

        if !resolved.relative.is_root() && self.filter.is_blocked(resolved.relative.as_str()) {
            return Err(FileServerError::Forbidden("path is blocked".to_string()));
        }

        if resolved.relative.components().any(is_hidden) || !resolved.full.exists() {
            return Err(FileServerError::NotFound(resolved.relative.to_string()));
        }

        Ok(resolved)
    }

    /// Authorize, then decide how to render.
    pub fn route(
        &self,
        relative: &str,
        raw: bool,
    ) -> Result<(ResolvedPath, RenderDecision), FileServerError> {
        let resolved = self.authorize(relative)?;
        let decision = decide(&resolved.full, raw);
        Ok((resolved, decision))
    }
}
