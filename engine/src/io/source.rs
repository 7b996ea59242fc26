//! Asset readers

use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Failure to fetch an asset
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("asset not found: {path}")]
    NotFound { path: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid UTF-8: {source}")]
    Utf8 {
        path: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Asynchronous source of asset bytes addressed by relative path
pub trait AssetReader: Send + Sync {
    fn read_bytes(&self, path: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;

    /// Read an asset and require it to be UTF-8
    fn read_text(&self, path: &str) -> impl Future<Output = Result<String, FetchError>> + Send {
        async move {
            let bytes = self.read_bytes(path).await?;
            String::from_utf8(bytes).map_err(|source| FetchError::Utf8 {
                path: path.to_string(),
                source,
            })
        }
    }
}

/// Reads assets from a directory on disk
///
/// Reads go through `tokio::fs`, so the futures must be polled inside a
/// tokio runtime. Concurrent reads proceed in parallel on its blocking pool.
#[derive(Debug, Clone)]
pub struct FileAssetReader {
    root: PathBuf,
}

impl FileAssetReader {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetReader for FileAssetReader {
    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let full = self.root.join(path);
        match tokio::fs::read(&full).await {
            Ok(data) => {
                debug!(path = ?full, bytes = data.len(), "Read asset");
                Ok(data)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(path = ?full, "Asset not found");
                Err(FetchError::NotFound {
                    path: path.to_string(),
                })
            }
            Err(source) => Err(FetchError::Io {
                path: path.to_string(),
                source,
            }),
        }
    }
}

/// In-memory asset table
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetReader {
    assets: HashMap<String, Vec<u8>>,
}

impl MemoryAssetReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.assets.insert(path.into(), data.into());
    }

    pub fn with(mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(path, data);
        self
    }
}

impl AssetReader for MemoryAssetReader {
    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        self.assets
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                path: path.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_reader_reads_relative_to_root() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("mesh")).unwrap();
        fs::write(dir.path().join("mesh/a.obj"), "v 0 0 0\n").unwrap();

        let reader = FileAssetReader::new(dir.path());
        let text = reader.read_text("mesh/a.obj").await.unwrap();
        assert_eq!(text, "v 0 0 0\n");
    }

    #[tokio::test]
    async fn test_file_reader_missing_file() {
        let dir = TempDir::new().unwrap();
        let reader = FileAssetReader::new(dir.path());
        let err = reader.read_bytes("nope.obj").await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound { ref path } if path == "nope.obj"));
    }

    #[tokio::test]
    async fn test_file_read_yields_instead_of_blocking() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.obj"), "v 0 0 0\n").unwrap();
        let reader = FileAssetReader::new(dir.path());

        // The read is handed to the blocking pool, so the first poll is pending
        assert!(reader.read_bytes("a.obj").now_or_never().is_none());

        let (first, second) =
            futures::try_join!(reader.read_text("a.obj"), reader.read_text("a.obj")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_read_text_rejects_invalid_utf8() {
        let reader = MemoryAssetReader::new().with("bad.wgsl", vec![0xffu8, 0xfe]);
        let err = pollster::block_on(reader.read_text("bad.wgsl")).unwrap_err();
        assert!(matches!(err, FetchError::Utf8 { .. }));
    }

    #[test]
    fn test_memory_reader() {
        let reader = MemoryAssetReader::new().with("a", "hello");
        assert_eq!(pollster::block_on(reader.read_bytes("a")).unwrap(), b"hello");
        assert!(pollster::block_on(reader.read_bytes("b")).is_err());
    }
}
