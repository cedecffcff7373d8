//! Input resolution: validate the source path and load the document bytes.
//!
//! All checks happen before any network call so that a typo in a path costs
//! nothing remotely. The file is read in one scoped call; no handle stays
//! open while the task is being polled.

use crate::error::OcrError;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A validated source document held in memory.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    /// Final path component, used as the archive key.
    pub file_name: String,
    pub bytes: Bytes,
}

/// Validate that `path` is a readable regular file and read it.
pub async fn load_source(path: &Path) -> Result<SourceDocument, OcrError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| map_io_error(path, e))?;

    if !metadata.is_file() {
        return Err(OcrError::NotAFile {
            path: path.to_path_buf(),
        });
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| map_io_error(path, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());

    debug!("Loaded source {} ({} bytes)", path.display(), bytes.len());

    Ok(SourceDocument {
        path: path.to_path_buf(),
        file_name,
        bytes: Bytes::from(bytes),
    })
}

fn map_io_error(path: &Path, err: std::io::Error) -> OcrError {
    let path = path.to_path_buf();
    match err.kind() {
        ErrorKind::PermissionDenied => OcrError::PermissionDenied { path },
        ErrorKind::NotFound => OcrError::FileNotFound { path },
        // A directory read or similar; the metadata check catches most of these first.
        _ => OcrError::NotAFile { path },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_source(&dir.path().join("nope.png")).await.unwrap_err();
        assert!(matches!(err, OcrError::FileNotFound { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_source(dir.path()).await.unwrap_err();
        assert!(matches!(err, OcrError::NotAFile { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn reads_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.jpg");
        std::fs::write(&path, b"\xff\xd8\xff fake jpeg").unwrap();

        let doc = load_source(&path).await.unwrap();
        assert_eq!(doc.file_name, "receipt.jpg");
        assert_eq!(&doc.bytes[..3], b"\xff\xd8\xff");
        assert_eq!(doc.path, path);
    }
}
