use crate::Config;
use crate::downloader::Downloader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub downloader: Arc<Downloader>,
    pub download_permits: Arc<Semaphore>,

    pub static_dir: PathBuf,
    pub temp_root: PathBuf,
}

impl AppState {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let static_dir = std::path::absolute(config.static_dir())?;
        let temp_root = config.temp_root();
        info!(permits = config.permits, ?static_dir, ?temp_root, "App state created");

        Ok(Self {
            downloader: Arc::new(Downloader::new(config.to_downloader_config())),
            download_permits: Arc::new(Semaphore::new(config.permits)),
            static_dir,
            temp_root,
        })
    }

    pub fn static_dir(&self) -> &Path {
        self.static_dir.as_path()
    }

    pub fn temp_root(&self) -> &Path {
        self.temp_root.as_path()
    }
}
