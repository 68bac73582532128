//! Small HTTP file server: browse, search, view and upload files below a
//! single root directory.

pub mod assets;
pub mod config;
pub mod error;
pub mod handlers;
pub mod listing;
pub mod logging;
pub mod paths;
pub mod render;
pub mod routes;
pub mod search;
pub mod upload;
pub mod visibility;

use std::io;
use std::sync::Arc;

pub use config::Config;
pub use error::FileServerError;
pub use routes::create_router;

use listing::DirectoryLister;
use paths::{BaseDir, normalize};
use render::ContentRouter;
use search::RecursiveSearcher;
use upload::UploadAcceptor;
use visibility::VisibilityFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub lister: Arc<DirectoryLister>,
    pub searcher: Arc<RecursiveSearcher>,
    pub router: Arc<ContentRouter>,
    pub uploader: Arc<UploadAcceptor>,
}

impl AppState {
    pub fn new(config: Config) -> io::Result<Self> {
        let base = BaseDir::new(&config.storage.upload_dir)?;
        let incoming_dir = normalize(&std::path::absolute(&config.storage.incoming_dir)?);
        let filter = VisibilityFilter::new(config.security.blocked_paths.iter().cloned());

        let uploader = UploadAcceptor::new(
            incoming_dir.clone(),
            config.storage.max_upload_size,
            config.security.allowed_extensions.iter().cloned(),
        );

        Ok(Self {
            lister: Arc::new(DirectoryLister::new(base.clone(), filter.clone())),
            searcher: Arc::new(RecursiveSearcher::new(base.clone(), filter.clone())),
            router: Arc::new(ContentRouter::new(base, incoming_dir, filter)),
            uploader: Arc::new(uploader),
            config: Arc::new(config),
        })
    }
}
