//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::FileSystemAccess,
};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Tokio-based file system implementation
///
/// Relative paths are resolved against a base directory, which defaults to
/// the process working directory.
#[derive(Debug, Clone, Default)]
pub struct TokioFileSystem {
    base_dir: Option<PathBuf>,
}

impl TokioFileSystem {
    /// Create a file system accessor rooted at the working directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a file system accessor that resolves relative paths under `base_dir`
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Convert std::io::Error to BridgeError
    fn map_io_error(e: std::io::Error) -> BridgeError {
        BridgeError::Io(e)
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn exists(&self, path: &Path) -> Result<bool> {
        fs::try_exists(self.resolve(path))
            .await
            .map_err(Self::map_io_error)
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        let path = self.resolve(path);
        let data = fs::read(&path).await.map_err(Self::map_io_error)?;
        debug!(path = ?path, size = data.len(), "Read file");
        Ok(Bytes::from(data))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        let path = self.resolve(path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(Self::map_io_error)?;
        }

        fs::write(&path, data.as_ref())
            .await
            .map_err(Self::map_io_error)?;
        debug!(path = ?path, size = data.len(), "Wrote file");
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        let path = self.resolve(path);
        fs::remove_file(&path).await.map_err(Self::map_io_error)?;
        debug!(path = ?path, "Deleted file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn scratch_dir(name: &str) -> PathBuf {
        env::temp_dir().join(format!("bridge-desktop-{}-{}", name, std::process::id()))
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let fs = TokioFileSystem::new();
        let test_file = scratch_dir("rw").join("test-file.txt");

        let data = Bytes::from("Hello, World!");
        fs.write_file(&test_file, data.clone()).await.unwrap();
        assert!(fs.exists(&test_file).await.unwrap());

        let read_data = fs.read_file(&test_file).await.unwrap();
        assert_eq!(data, read_data);

        fs.delete_file(&test_file).await.unwrap();
        assert!(!fs.exists(&test_file).await.unwrap());
    }

    #[tokio::test]
    async fn test_relative_paths_use_base_dir() {
        let base = scratch_dir("base");
        let fs = TokioFileSystem::with_base_dir(&base);

        fs.write_file(Path::new("nested/token.json"), Bytes::from("{}"))
            .await
            .unwrap();

        assert!(base.join("nested/token.json").exists());
        fs.delete_file(Path::new("nested/token.json")).await.unwrap();
    }

    #[tokio::test]
    async fn test_read_missing_file_is_io_error() {
        let fs = TokioFileSystem::new();
        let result = fs.read_file(&scratch_dir("missing").join("nope.json")).await;
        assert!(matches!(result, Err(BridgeError::Io(_))));
    }
}
