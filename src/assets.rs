//! UI pages compiled into the binary.

pub const FILE_BROWSER_PAGE: &str = include_str!("../assets/file-browser.html");
pub const MARKDOWN_VIEWER_PAGE: &str = include_str!("../assets/markdown-viewer.html");
pub const MEDIA_PLAYER_PAGE: &str = include_str!("../assets/media-player.html");
pub const NOT_FOUND_PAGE: &str = include_str!("../assets/not-found.html");
