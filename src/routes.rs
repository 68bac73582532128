//! Route definitions and the middleware stack.

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, StatusCode, header};
use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::AppState;
use crate::handlers;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let storage = &state.config.storage;

    let body_limit = usize::try_from(storage.max_upload_size.saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);
    let timeout = state.config.read_timeout() + state.config.write_timeout();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/list-files", get(handlers::list_files))
        .route("/api/markdown-content", get(handlers::markdown_content))
        .route("/api/search", get(handlers::search_files))
        .route("/upload", post(handlers::upload_file));

    let file_routes = Router::new()
        .route("/files", get(handlers::serve_root))
        .route("/files/", get(handlers::serve_root))
        .route("/files/{*path}", get(handlers::serve_files));

    let static_routes = Router::new()
        .nest_service("/public", ServeDir::new(&storage.public_dir))
        .nest_service("/private-files", ServeDir::new(&storage.private_dir))
        .route_service("/", ServeFile::new(storage.public_dir.join("index.html")));

    Router::new()
        .merge(api_routes)
        .merge(file_routes)
        .merge(static_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(handlers::reject_traversal))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(cors)
        .layer(trace_layer)
        .with_state(state)
}
