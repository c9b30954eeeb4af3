//! Filesystem backend: serves files below a root directory.

use super::{FetchResult, Storage, StorageError, backend_path};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use percent_encoding::percent_decode_str;
use std::path::PathBuf;

pub struct LocalStorage {
    root: PathBuf,
    path_prefix: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, path_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            path_prefix: path_prefix.into(),
        }
    }

    /// Map a request path onto the root. Each segment is percent-decoded
    /// on its own; a segment that decodes to something other than a plain
    /// file name (`..`, or one carrying a separator) is refused, as is
    /// anything that is not valid UTF-8 once decoded.
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let invalid = || StorageError::InvalidPath(path.to_string());
        let relative = backend_path(path, &self.path_prefix);
        let mut resolved = self.root.clone();
        for raw in relative.split('/') {
            let segment = percent_decode_str(raw).decode_utf8().map_err(|_| invalid())?;
            match &*segment {
                "" | "." => {}
                ".." => return Err(invalid()),
                s if s.contains(['/', '\\', '\0']) => return Err(invalid()),
                s => resolved.push(s),
            }
        }
        if resolved == self.root {
            return Err(invalid());
        }
        Ok(resolved)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn fetch(&self, path: &str) -> FetchResult {
        let file = self.resolve(path)?;
        match tokio::fs::read(&file).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(path.to_string())),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                Err(StorageError::Forbidden(path.to_string()))
            }
            // Directories and other non-files read as missing objects.
            Err(_) if file.is_dir() => Err(StorageError::NotFound(path.to_string())),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}
