//! Test utilities and common setup.

use std::fs;
use std::path::Path;

use axum::Router;
use simple_fileserver::config::Config;
use simple_fileserver::{AppState, create_router};
use tempfile::TempDir;

/// Upload limit used by every test app.
pub const MAX_UPLOAD: u64 = 1024;

pub const BOUNDARY: &str = "----simple-fileserver-test";

/// A served tree plus the router in front of it.
///
/// Keep the `TempDir` alive for as long as the router is used.
pub struct TestApp {
    pub dir: TempDir,
    pub router: Router,
}

impl TestApp {
    pub fn files(&self) -> std::path::PathBuf {
        self.dir.path().join("files")
    }

    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

fn write(root: &Path, relative: &str, content: &[u8]) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Create a test application over a small fixture tree:
///
/// ```text
/// files/
///   notes.md  report.txt  clip.mp4  .env
///   docs/guide.md  docs/config.txt
///   site/index.html
///   .git/config
///   incoming/
///   private-files/secret.txt
/// public/index.html
/// ```
pub fn test_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let files = root.join("files");

    write(&files, "notes.md", b"# Notes\n\nhello");
    write(&files, "report.txt", b"quarterly numbers");
    write(&files, "clip.mp4", b"\x00\x00\x00\x18ftypmp42");
    write(&files, ".env", b"SECRET=1");
    write(&files, "docs/guide.md", b"# Guide");
    write(&files, "docs/config.txt", b"key=value");
    write(&files, "site/index.html", b"<h1>site</h1>");
    write(&files, ".git/config", b"[core]");
    write(&files, "private-files/secret.txt", b"top secret");
    fs::create_dir_all(files.join("incoming")).unwrap();
    write(root, "public/index.html", b"<h1>welcome</h1>");

    let mut config = Config::default();
    config.storage.upload_dir = files.clone();
    config.storage.incoming_dir = files.join("incoming");
    config.storage.private_dir = files.join("private-files");
    config.storage.public_dir = root.join("public");
    config.storage.max_upload_size = MAX_UPLOAD;
    config.logging.enabled = false;

    let state = AppState::new(config).unwrap();
    TestApp {
        router: create_router(state),
        dir,
    }
}

/// Build a multipart body with one `file` field.
pub fn multipart_body(filename: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Build a multipart body with a single plain text field and no file.
pub fn multipart_without_file() -> Vec<u8> {
    format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhi\r\n--{BOUNDARY}--\r\n"
    )
    .into_bytes()
}
