use std::path::Path as FsPath;

use axum::{
    Json,
    body::Body,
    extract::{
        Multipart, Path, Query, Request, State,
        multipart::MultipartError,
    },
    http::{StatusCode, header},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::AppState;
use crate::assets;
use crate::error::FileServerError;
use crate::listing::DirectoryEntry;
use crate::render::{RenderDecision, is_markdown_file};
use crate::search::SearchResult;

/// Query parameters for the list endpoint
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Directory relative to the upload root (defaults to the root)
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct MarkdownQuery {
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Case-insensitive name fragment
    pub q: Option<String>,
    /// Directory to search below (defaults to the root)
    #[serde(default)]
    pub dir: String,
}

#[derive(Debug, Deserialize)]
pub struct ServeQuery {
    /// `raw=1` forces the file bytes instead of a viewer page
    pub raw: Option<String>,
}

impl ServeQuery {
    fn is_raw(&self) -> bool {
        self.raw.as_deref() == Some("1")
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub files: Vec<DirectoryEntry>,
}

#[derive(Debug, Serialize)]
pub struct MarkdownResponse {
    pub content: String,
    pub filename: String,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct SearchEcho {
    pub keyword: String,
    pub directory: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: SearchEcho,
    pub results: Vec<SearchResult>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct UploadData {
    pub filename: String,
    pub size: u64,
}

/// Response for successful operations
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    pub message: String,
    pub data: T,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

fn join_error(err: tokio::task::JoinError) -> FileServerError {
    FileServerError::Io(std::io::Error::other(err.to_string()))
}

fn multipart_error(err: MultipartError, limit: u64) -> FileServerError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!("Upload exceeded request body limit");
        return FileServerError::TooLarge {
            size: limit.saturating_add(1),
            limit,
        };
    }
    FileServerError::BadRequest(format!("Invalid upload: {}", err.body_text()))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/list-files - Visible children of one directory
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, FileServerError> {
    let lister = state.lister.clone();
    let files = tokio::task::spawn_blocking(move || lister.list(&query.path))
        .await
        .map_err(join_error)??;

    Ok(Json(ListResponse { files }))
}

/// GET /api/markdown-content - Raw markdown for the viewer page
pub async fn markdown_content(
    State(state): State<AppState>,
    Query(query): Query<MarkdownQuery>,
) -> Result<Json<MarkdownResponse>, FileServerError> {
    let path = query
        .path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| FileServerError::BadRequest("Path parameter is required".to_string()))?;

    if !is_markdown_file(&path) {
        return Err(FileServerError::BadRequest(
            "File is not a markdown file".to_string(),
        ));
    }

    let resolved = state.router.authorize(&path)?;

    let bytes = fs::read(&resolved.full).await.map_err(|e| {
        debug!("Markdown read failed: {}", e);
        FileServerError::NotFound(path.clone())
    })?;

    let filename = FsPath::new(&path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(Json(MarkdownResponse {
        content: String::from_utf8_lossy(&bytes).into_owned(),
        filename,
        path,
    }))
}

/// GET /api/search - Recursive name search
pub async fn search_files(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, FileServerError> {
    let keyword = query
        .q
        .filter(|q| !q.is_empty())
        .ok_or_else(|| FileServerError::BadRequest("Search query is required".to_string()))?;

    let searcher = state.searcher.clone();
    let (needle, directory) = (keyword.clone(), query.dir.clone());
    let results = tokio::task::spawn_blocking(move || {
        let dir = (!directory.is_empty()).then_some(directory.as_str());
        searcher.search(&needle, dir)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(SearchResponse {
        count: results.len(),
        query: SearchEcho {
            keyword,
            directory: query.dir,
        },
        results,
    }))
}

/// POST /upload - Store the multipart field `file` in the incoming area
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SuccessResponse<UploadData>>, FileServerError> {
    let limit = state.uploader.max_size();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let Some(declared_name) = field.file_name().map(|s| s.to_string()) else {
            break;
        };

        let stored = state
            .uploader
            .accept(&declared_name, field.map_err(|e| multipart_error(e, limit)))
            .await?;

        return Ok(Json(SuccessResponse {
            message: "File uploaded successfully".to_string(),
            data: UploadData {
                filename: stored.filename,
                size: stored.size,
            },
        }));
    }

    Err(FileServerError::BadRequest("No file uploaded".to_string()))
}

/// GET /files and /files/ - Root of the browsable tree
pub async fn serve_root(
    State(state): State<AppState>,
    Query(query): Query<ServeQuery>,
) -> Result<Response, FileServerError> {
    serve_path(&state, "", query.is_raw()).await
}

/// GET /files/{*path} - Viewer page, index file or raw bytes
pub async fn serve_files(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<ServeQuery>,
) -> Result<Response, FileServerError> {
    serve_path(&state, &path, query.is_raw()).await
}

async fn serve_path(state: &AppState, path: &str, raw: bool) -> Result<Response, FileServerError> {
    let (resolved, decision) = state.router.route(path, raw)?;

    debug!("Serving {:?} as {:?}", resolved.relative.as_str(), decision);

    match decision {
        RenderDecision::DirectoryIndex(index) => stream_file(&index).await,
        RenderDecision::DirectoryBrowse => Ok(Html(assets::FILE_BROWSER_PAGE).into_response()),
        RenderDecision::MarkdownView => Ok(Html(assets::MARKDOWN_VIEWER_PAGE).into_response()),
        RenderDecision::MediaPlay => Ok(Html(assets::MEDIA_PLAYER_PAGE).into_response()),
        RenderDecision::RawServe => stream_file(&resolved.full).await,
    }
}

/// Stream a file without loading it into memory.
async fn stream_file(path: &FsPath) -> Result<Response, FileServerError> {
    let file = fs::File::open(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => FileServerError::NotFound(
            path.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        ),
        _ => FileServerError::Io(e),
    })?;
    let file_size = file.metadata().await.map_err(FileServerError::Io)?.len();

    let body = Body::from_stream(ReaderStream::new(file));

    let mime = mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string();

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    // Sanitize filename for Content-Disposition header
    let safe_filename = file_name.replace(['"', '\r', '\n'], "'");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime),
            (header::CONTENT_LENGTH, file_size.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", safe_filename),
            ),
        ],
        body,
    )
        .into_response())
}

/// Reject any request whose path tries to climb directories.
pub async fn reject_traversal(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_ascii_lowercase().replace("%2e", ".");
    if path.contains("..") {
        warn!("Rejected request with traversal in URL: {}", request.uri().path());
        return FileServerError::BadRequest("Invalid path".to_string()).into_response();
    }
    next.run(request).await
}
