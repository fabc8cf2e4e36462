use std::io;
use std::path::PathBuf;

use log::debug;

/// Local payload store rooted at a single directory: `put` sources its
/// upload bytes here and `get` sinks downloads here. Remote paths are
/// resolved relative to the root.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    pub async fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        let target = self.resolve(path);
        debug!("Reading local file {:?}", target);
        tokio::fs::read(target).await
    }

    /// Creates or overwrites the file, creating parent directories as
    /// needed.
    pub async fn write(&self, path: &str, data: &[u8]) -> io::Result<()> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        debug!("Writing {} bytes to {:?}", data.len(), target);
        tokio::fs::write(target, data).await
    }
}
